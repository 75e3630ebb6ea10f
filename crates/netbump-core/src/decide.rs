//! Upgrade decisions for located tokens.
//!
//! Rules, in priority order:
//! 1. A token already at or above the channel is left unchanged.
//! 2. A policy-gated kind whose gate fails is unsupported.
//! 3. Otherwise the replacement is the token formatted for the channel.
//! 4. A replacement identical to the original is reported as unchanged.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::version::{format_upgraded, FormatOptions, TokenKind, UpgradeChannel, VersionToken};

/// Outcome of deciding one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Unchanged,
    Replace(String),
    /// A newer value exists but policy forbids proposing it.
    Unsupported,
}

/// Which token kinds are gated on the channel's support status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradePolicy {
    /// Kinds that may only move to an LTS channel in active or maintenance
    /// support.
    pub lts_only: Vec<TokenKind>,
}

impl Default for UpgradePolicy {
    fn default() -> Self {
        UpgradePolicy {
            lts_only: vec![TokenKind::ManagedRuntime],
        }
    }
}

impl UpgradePolicy {
    pub fn is_gated(&self, kind: TokenKind) -> bool {
        self.lts_only.contains(&kind)
    }

    /// Whether `kind` may be upgraded to `channel`.
    pub fn allows(&self, kind: TokenKind, channel: &UpgradeChannel) -> bool {
        !self.is_gated(kind) || channel.is_supported_lts()
    }

    /// Human-readable reason for an unsupported decision.
    pub fn explain(&self, kind: TokenKind, channel: &UpgradeChannel) -> String {
        format!(
            "{} values only move to a long-term support channel in active or maintenance support; \
             channel {} is {} in phase {}",
            kind,
            channel,
            channel.release_kind(),
            channel.support_phase()
        )
    }
}

/// Apply the decision rules to one token.
pub fn decide(
    token: &VersionToken,
    channel: &UpgradeChannel,
    policy: &UpgradePolicy,
    options: &FormatOptions,
) -> Decision {
    if token.is_at_least(channel) {
        return Decision::Unchanged;
    }
    if !policy.allows(token.kind(), channel) {
        return Decision::Unsupported;
    }
    let replacement = format_upgraded(token, channel, options);
    if replacement == token.raw() {
        return Decision::Unchanged;
    }
    Decision::Replace(replacement)
}

/// Decision state for one file-set.
///
/// Remembers whether an unsupported decision has already been surfaced so
/// the warning appears once rather than once per occurrence.
#[derive(Debug)]
pub struct DecisionEngine<'a> {
    channel: &'a UpgradeChannel,
    policy: &'a UpgradePolicy,
    warned: bool,
}

impl<'a> DecisionEngine<'a> {
    pub fn new(channel: &'a UpgradeChannel, policy: &'a UpgradePolicy) -> Self {
        DecisionEngine {
            channel,
            policy,
            warned: false,
        }
    }

    pub fn channel(&self) -> &UpgradeChannel {
        self.channel
    }

    pub fn policy(&self) -> &UpgradePolicy {
        self.policy
    }

    pub fn decide(&self, token: &VersionToken, options: &FormatOptions) -> Decision {
        let decision = decide(token, self.channel, self.policy, options);
        debug!(token = token.raw(), kind = %token.kind(), ?decision, "decided");
        decision
    }

    /// Record an unsupported decision. Returns `true` only the first time,
    /// when the caller should surface the warning.
    pub fn note_unsupported(&mut self) -> bool {
        !std::mem::replace(&mut self.warned, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{parse, ReleaseKind, SupportPhase};

    fn channel(text: &str) -> UpgradeChannel {
        UpgradeChannel::parse(text).unwrap()
    }

    fn run(text: &str, kind: TokenKind, channel: &UpgradeChannel) -> Decision {
        let token = parse(text, kind).unwrap();
        decide(&token, channel, &UpgradePolicy::default(), &FormatOptions::default())
    }

    mod rules {
        use super::*;

        #[test]
        fn current_tokens_are_unchanged() {
            let c = channel("8.0");
            assert_eq!(run("8.0.x", TokenKind::FloatingChannel, &c), Decision::Unchanged);
            assert_eq!(run("net9.0", TokenKind::FrameworkMoniker, &c), Decision::Unchanged);
            assert_eq!(run("dotnet8", TokenKind::ManagedRuntime, &c), Decision::Unchanged);
        }

        #[test]
        fn lower_tokens_are_replaced() {
            let c = channel("8.0");
            assert_eq!(
                run("6.0.x", TokenKind::FloatingChannel, &c),
                Decision::Replace("8.0.x".into())
            );
            assert_eq!(
                run("win10-x64", TokenKind::RuntimeIdentifier, &c),
                Decision::Replace("win-x64".into())
            );
        }

        #[test]
        fn managed_runtime_on_supported_lts_is_replaced() {
            let c = channel("8.0");
            assert_eq!(
                run("dotnet6", TokenKind::ManagedRuntime, &c),
                Decision::Replace("dotnet8".into())
            );
        }

        #[test]
        fn managed_runtime_outside_active_lts_is_unsupported() {
            let standard = channel("9.0");
            assert_eq!(run("dotnet6", TokenKind::ManagedRuntime, &standard), Decision::Unsupported);

            let preview = channel("10.0").with_release(ReleaseKind::Lts, SupportPhase::Preview);
            assert_eq!(run("dotnet8", TokenKind::ManagedRuntime, &preview), Decision::Unsupported);
        }

        #[test]
        fn gate_does_not_apply_to_other_kinds() {
            let standard = channel("9.0");
            assert_eq!(
                run("net8.0", TokenKind::FrameworkMoniker, &standard),
                Decision::Replace("net9.0".into())
            );
        }

        #[test]
        fn legacy_only_monikers_are_unchanged() {
            let c = channel("8.0");
            assert_eq!(run("net48", TokenKind::FrameworkMoniker, &c), Decision::Unchanged);
        }
    }

    mod engine {
        use super::*;

        #[test]
        fn unsupported_is_noted_once() {
            let c = channel("9.0");
            let policy = UpgradePolicy::default();
            let mut engine = DecisionEngine::new(&c, &policy);
            assert!(engine.note_unsupported());
            assert!(!engine.note_unsupported());
            assert!(!engine.note_unsupported());
        }

        #[test]
        fn explanation_names_the_channel() {
            let c = channel("9.0");
            let text = UpgradePolicy::default().explain(TokenKind::ManagedRuntime, &c);
            assert!(text.contains("channel 9.0 is standard"));
        }
    }
}
