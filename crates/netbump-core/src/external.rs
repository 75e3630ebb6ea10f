//! Collaborators outside the engine: external tools, container registries,
//! and the run-wide cancellation signal.
//!
//! Each collaborator is a trait so the orchestrator can be driven by fakes in
//! tests. The system implementations are thin: [`SystemProcessRunner`] spawns
//! a child and waits with a timeout, [`HttpRegistryClient`] issues one
//! manifest `HEAD` request per lookup.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::BumpError;

// ============================================================================
// Cancellation
// ============================================================================

/// Shared cancellation flag, observed at file open, process invocation and
/// registry calls.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has fired.
    pub fn check(&self) -> Result<(), BumpError> {
        if self.is_cancelled() {
            Err(BumpError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Process Runner
// ============================================================================

/// Captured result of an external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed or timed out.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external dependency-upgrade and formatting tools.
pub trait ProcessRunner {
    /// Run `program` with `args` in `cwd`, killing it after `timeout`.
    ///
    /// Errors only when the program cannot be started; a non-zero exit is a
    /// normal [`ProcessOutput`].
    fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, BumpError>;
}

/// Spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, BumpError> {
        let spawn_err = |message: String| BumpError::Process {
            program: program.to_string(),
            message,
        };
        let resolved = which::which(program).map_err(|e| spawn_err(e.to_string()))?;

        let start = Instant::now();
        let mut child = Command::new(&resolved)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_err(e.to_string()))?;

        // OS-level wait, no polling
        match child
            .wait_timeout(timeout)
            .map_err(|e| spawn_err(e.to_string()))?
        {
            Some(status) => {
                let stdout = read_pipe(child.stdout.take());
                let stderr = read_pipe(child.stderr.take());
                debug!(
                    program,
                    code = ?status.code(),
                    elapsed = ?start.elapsed(),
                    "external tool finished"
                );
                Ok(ProcessOutput {
                    exit_code: status.code(),
                    stdout,
                    stderr,
                    timed_out: false,
                })
            }
            None => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(program, ?timeout, "external tool timed out");
                Ok(ProcessOutput {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!("timed out after {:?}", timeout),
                    timed_out: true,
                })
            }
        }
    }
}

fn read_pipe(pipe: Option<impl Read>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).ok();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

// ============================================================================
// Registry Client
// ============================================================================

/// Resolves an image tag to a content digest.
pub trait RegistryClient {
    /// `Ok(None)` when the registry does not know the tag or refuses an
    /// anonymous lookup.
    fn resolve_digest(&self, image: &str, tag: &str) -> Result<Option<String>, BumpError>;
}

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.docker.distribution.manifest.v2+json";

/// Registry HTTP API v2 client over `ureq`.
pub struct HttpRegistryClient {
    agent: ureq::Agent,
}

impl HttpRegistryClient {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        HttpRegistryClient {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// Manifest URL for `image:tag`. Images without a registry host resolve
    /// against Docker Hub.
    pub fn manifest_url(image: &str, tag: &str) -> String {
        let (host, repository) = match image.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            _ if !image.contains('/') => {
                ("registry-1.docker.io".to_string(), format!("library/{}", image))
            }
            _ => ("registry-1.docker.io".to_string(), image.to_string()),
        };
        format!("https://{}/v2/{}/manifests/{}", host, repository, tag)
    }
}

impl RegistryClient for HttpRegistryClient {
    fn resolve_digest(&self, image: &str, tag: &str) -> Result<Option<String>, BumpError> {
        let url = Self::manifest_url(image, tag);
        let response = self
            .agent
            .head(&url)
            .header("Accept", MANIFEST_ACCEPT)
            .call()
            .map_err(|e| BumpError::Registry {
                image: image.to_string(),
                tag: tag.to_string(),
                message: e.to_string(),
            })?;
        let status = response.status().as_u16();
        if status != 200 {
            debug!(%url, status, "registry did not resolve tag");
            return Ok(None);
        }
        Ok(response
            .headers()
            .get("docker-content-digest")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }
}

/// Run-scoped `image:tag -> digest` memo.
///
/// Misses are cached too, so a tag that does not resolve is asked for once.
#[derive(Debug, Default)]
pub struct DigestCache {
    entries: HashMap<(String, String), Option<String>>,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `image:tag`, asking `client` only on the first request.
    pub fn resolve(
        &mut self,
        client: &dyn RegistryClient,
        image: &str,
        tag: &str,
    ) -> Result<Option<String>, BumpError> {
        let key = (image.to_string(), tag.to_string());
        if let Some(cached) = self.entries.get(&key) {
            return Ok(cached.clone());
        }
        let digest = client.resolve_digest(image, tag)?;
        self.entries.insert(key, digest.clone());
        Ok(digest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
