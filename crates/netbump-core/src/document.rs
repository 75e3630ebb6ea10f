//! Source documents: decoding, file metadata, and all-or-nothing write-back.
//!
//! A [`SourceText`] is created when a file is opened for an upgrade pass and
//! dropped once the file has been rewritten or abandoned. Its
//! [`FileMetadata`] records the encoding, BOM and newline convention seen at
//! read time; [`SourceText::encode`] reuses that metadata unchanged, so
//! decoding and immediately re-encoding reproduces the original bytes.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::DocumentError;
use crate::patch::ContentHash;

// ============================================================================
// File Metadata
// ============================================================================

/// Text encoding detected from the byte-order mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextEncoding::Utf8 => write!(f, "UTF-8"),
            TextEncoding::Utf16Le => write!(f, "UTF-16LE"),
            TextEncoding::Utf16Be => write!(f, "UTF-16BE"),
        }
    }
}

/// Dominant line terminator of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Newline {
    #[default]
    Lf,
    CrLf,
}

impl Newline {
    /// Detect the convention from the first line terminator in `text`.
    ///
    /// Text without any terminator reports `Lf`.
    pub fn detect(text: &str) -> Self {
        match text.find('\n') {
            Some(i) if i > 0 && text.as_bytes()[i - 1] == b'\r' => Newline::CrLf,
            _ => Newline::Lf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
        }
    }
}

/// Encoding and newline metadata captured at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub encoding: TextEncoding,
    /// Whether the file started with a byte-order mark.
    pub bom: bool,
    pub newline: Newline,
}

// ============================================================================
// Source Text
// ============================================================================

/// Decoded text of one file plus the metadata needed to write it back.
#[derive(Debug, Clone)]
pub struct SourceText {
    /// Path the text was read from.
    pub path: PathBuf,
    /// Decoded text without the byte-order mark.
    pub text: String,
    pub metadata: FileMetadata,
    /// Hash of the raw bytes as read.
    pub hash: ContentHash,
}

impl SourceText {
    /// Read and decode a file.
    pub fn read(path: &Path) -> Result<Self, DocumentError> {
        let bytes = fs::read(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let (text, metadata) = decode(&bytes).ok_or_else(|| DocumentError::Decode {
            path: path.to_path_buf(),
            encoding: sniff_encoding(&bytes).0.to_string(),
        })?;
        debug!(
            path = %path.display(),
            encoding = %metadata.encoding,
            bom = metadata.bom,
            newline = ?metadata.newline,
            "read document"
        );
        Ok(SourceText {
            path: path.to_path_buf(),
            text,
            metadata,
            hash: ContentHash::compute(&bytes),
        })
    }

    /// Encode `text` with this document's metadata.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        encode(text, &self.metadata)
    }

    /// Persist `new_text` over the original file.
    ///
    /// The on-disk bytes must still hash to the value seen at read time; the
    /// new content is fully written to a temporary file in the same directory
    /// before it replaces the original, so a failure never leaves a partially
    /// written file behind.
    pub fn write_back(&self, new_text: &str) -> Result<(), DocumentError> {
        let current = fs::read(&self.path).map_err(|source| DocumentError::Write {
            path: self.path.clone(),
            source,
        })?;
        if ContentHash::compute(&current) != self.hash {
            return Err(DocumentError::Modified {
                path: self.path.clone(),
            });
        }
        write_atomic(&self.path, &self.encode(new_text))
    }
}

/// Write `bytes` to `path` through a temporary sibling file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocumentError> {
    let write_err = |source| DocumentError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    if let Ok(metadata) = fs::metadata(path) {
        // Keep the original file mode; a failure here is not worth aborting for.
        let _ = fs::set_permissions(tmp.path(), metadata.permissions());
    }
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

// ============================================================================
// Encoding
// ============================================================================

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

fn sniff_encoding(bytes: &[u8]) -> (TextEncoding, bool) {
    if bytes.starts_with(UTF8_BOM) {
        (TextEncoding::Utf8, true)
    } else if bytes.starts_with(UTF16LE_BOM) {
        (TextEncoding::Utf16Le, true)
    } else if bytes.starts_with(UTF16BE_BOM) {
        (TextEncoding::Utf16Be, true)
    } else {
        (TextEncoding::Utf8, false)
    }
}

/// Decode raw file bytes, returning the text (BOM stripped) and metadata.
///
/// Returns `None` for bytes that are not valid in the sniffed encoding.
pub fn decode(bytes: &[u8]) -> Option<(String, FileMetadata)> {
    let (encoding, bom) = sniff_encoding(bytes);
    let text = match encoding {
        TextEncoding::Utf8 => {
            let body = if bom { &bytes[UTF8_BOM.len()..] } else { bytes };
            String::from_utf8(body.to_vec()).ok()?
        }
        TextEncoding::Utf16Le | TextEncoding::Utf16Be => {
            let body = &bytes[2..];
            if body.len() % 2 != 0 {
                return None;
            }
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|pair| match encoding {
                    TextEncoding::Utf16Le => u16::from_le_bytes([pair[0], pair[1]]),
                    _ => u16::from_be_bytes([pair[0], pair[1]]),
                })
                .collect();
            String::from_utf16(&units).ok()?
        }
    };
    let metadata = FileMetadata {
        encoding,
        bom,
        newline: Newline::detect(&text),
    };
    Some((text, metadata))
}

/// Encode text with the given metadata, restoring the BOM if there was one.
pub fn encode(text: &str, metadata: &FileMetadata) -> Vec<u8> {
    match metadata.encoding {
        TextEncoding::Utf8 => {
            let mut out = Vec::with_capacity(text.len() + 3);
            if metadata.bom {
                out.extend_from_slice(UTF8_BOM);
            }
            out.extend_from_slice(text.as_bytes());
            out
        }
        TextEncoding::Utf16Le => {
            let mut out = Vec::with_capacity(text.len() * 2 + 2);
            if metadata.bom {
                out.extend_from_slice(UTF16LE_BOM);
            }
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out
        }
        TextEncoding::Utf16Be => {
            let mut out = Vec::with_capacity(text.len() * 2 + 2);
            if metadata.bom {
                out.extend_from_slice(UTF16BE_BOM);
            }
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod roundtrip {
        use super::*;

        fn assert_roundtrip(bytes: &[u8]) {
            let (text, metadata) = decode(bytes).expect("decodes");
            assert_eq!(encode(&text, &metadata), bytes);
        }

        #[test]
        fn utf8_without_bom() {
            assert_roundtrip(b"{\n  \"sdk\": { \"version\": \"6.0.100\" }\n}\n");
        }

        #[test]
        fn utf8_with_bom_and_crlf() {
            let mut bytes = UTF8_BOM.to_vec();
            bytes.extend_from_slice(b"<Project>\r\n</Project>\r\n");
            assert_roundtrip(&bytes);
            let (text, metadata) = decode(&bytes).unwrap();
            assert!(metadata.bom);
            assert_eq!(metadata.newline, Newline::CrLf);
            assert!(text.starts_with("<Project>"));
        }

        #[test]
        fn utf16_le_with_bom() {
            let mut bytes = UTF16LE_BOM.to_vec();
            for unit in "net6.0\r\n".encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            assert_roundtrip(&bytes);
            let (text, metadata) = decode(&bytes).unwrap();
            assert_eq!(metadata.encoding, TextEncoding::Utf16Le);
            assert_eq!(text, "net6.0\r\n");
        }

        #[test]
        fn utf16_be_with_bom() {
            let mut bytes = UTF16BE_BOM.to_vec();
            for unit in "x: 1".encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            assert_roundtrip(&bytes);
        }

        #[test]
        fn invalid_utf8_is_rejected() {
            assert!(decode(&[0x66, 0x6f, 0xff, 0x6f]).is_none());
        }
    }

    mod newline {
        use super::*;

        #[test]
        fn detect_newline() {
            assert_eq!(Newline::detect("a\r\nb\n"), Newline::CrLf);
            assert_eq!(Newline::detect("a\nb\r\n"), Newline::Lf);
            assert_eq!(Newline::detect("single line"), Newline::Lf);
        }
    }

    mod write_back {
        use super::*;

        #[test]
        fn write_back_preserves_bom() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("global.json");
            let mut bytes = UTF8_BOM.to_vec();
            bytes.extend_from_slice(b"{\"sdk\":{\"version\":\"6.0.100\"}}");
            fs::write(&path, &bytes).unwrap();

            let source = SourceText::read(&path).unwrap();
            let updated = source.text.replace("6.0.100", "8.0.100");
            source.write_back(&updated).unwrap();

            let written = fs::read(&path).unwrap();
            assert!(written.starts_with(UTF8_BOM));
            assert_eq!(&written[3..], b"{\"sdk\":{\"version\":\"8.0.100\"}}");
        }

        #[test]
        fn write_back_refuses_concurrent_modification() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("Dockerfile");
            fs::write(&path, "FROM a:6.0\n").unwrap();

            let source = SourceText::read(&path).unwrap();
            fs::write(&path, "FROM a:7.0\n").unwrap();

            let err = source.write_back("FROM a:8.0\n").unwrap_err();
            assert!(matches!(err, DocumentError::Modified { .. }));
            assert_eq!(fs::read_to_string(&path).unwrap(), "FROM a:7.0\n");
        }
    }
}
