//! Acknowledgment policy model.
//!
//! A policy says *when* an inbound broker message is settled
//! ([`AckMode`]) and *how* a failed task is settled ([`FailureAction`] +
//! [`NackOutcome`]).
//!
//! Two shapes exist:
//! - [`AckPolicy`]: fully resolved, every field present. This is what the
//!   settlement path consumes.
//! - [`AckPolicyOverride`]: partial, as written in configuration. Any subset
//!   of fields may be present; merging is done by
//!   [`PolicyResolver`](crate::app::PolicyResolver).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// When the inbound message is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Settled as soon as the message is received (outside this crate).
    #[default]
    OnReceive,

    /// Settlement deferred until the task completes, times out, or the
    /// gateway shuts down.
    OnCompletion,
}

/// What to do with the message when its task fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
    /// Acknowledge anyway (drop the message).
    Ack,

    /// Negatively acknowledge with the configured [`NackOutcome`].
    #[default]
    Nack,
}

/// The broker-side fate of a nacked message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NackOutcome {
    /// Eligible for redelivery.
    #[default]
    Rejected,

    /// Not redelivered; routed to the dead message queue if one exists.
    Failed,
}

/// Error for a policy value that does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {field} value '{value}' (expected one of: {expected})")]
pub struct ParsePolicyError {
    pub field: &'static str,
    pub value: String,
    pub expected: &'static str,
}

macro_rules! policy_enum_str {
    ($ty:ty, $field:literal, $expected:literal, { $($name:literal => $variant:path),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParsePolicyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($variant),)+
                    _ => Err(ParsePolicyError {
                        field: $field,
                        value: s.to_string(),
                        expected: $expected,
                    }),
                }
            }
        }
    };
}

policy_enum_str!(AckMode, "mode", "on_receive, on_completion", {
    "on_receive" => AckMode::OnReceive,
    "on_completion" => AckMode::OnCompletion,
});

policy_enum_str!(FailureAction, "on_failure.action", "ack, nack", {
    "ack" => FailureAction::Ack,
    "nack" => FailureAction::Nack,
});

policy_enum_str!(NackOutcome, "on_failure.nack_outcome", "rejected, failed", {
    "rejected" => NackOutcome::Rejected,
    "failed" => NackOutcome::Failed,
});

/// Fully resolved failure settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FailurePolicy {
    pub action: FailureAction,
    pub nack_outcome: NackOutcome,
}

/// Fully resolved acknowledgment policy.
///
/// `Default` is the hardcoded baseline: `OnReceive`, `Nack`, `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AckPolicy {
    pub mode: AckMode,
    pub on_failure: FailurePolicy,
}

impl AckPolicy {
    /// Deferred policies hold the message until the task reaches a terminal state.
    pub fn is_deferred(&self) -> bool {
        self.mode == AckMode::OnCompletion
    }

    /// Shorthand for an `OnCompletion` policy with default failure handling.
    pub fn on_completion() -> Self {
        Self {
            mode: AckMode::OnCompletion,
            ..Self::default()
        }
    }

    pub fn with_failure(mut self, action: FailureAction, nack_outcome: NackOutcome) -> Self {
        self.on_failure = FailurePolicy {
            action,
            nack_outcome,
        };
        self
    }
}

/// Partial failure settlement, as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailurePolicyOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<FailureAction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nack_outcome: Option<NackOutcome>,
}

/// Partial acknowledgment policy, as written in configuration.
///
/// Used both for the gateway-wide default and for per-handler overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AckPolicyOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<AckMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<FailurePolicyOverride>,
}

impl AckPolicyOverride {
    pub fn mode(mode: AckMode) -> Self {
        Self {
            mode: Some(mode),
            on_failure: None,
        }
    }

    pub fn with_action(mut self, action: FailureAction) -> Self {
        self.on_failure.get_or_insert_with(Default::default).action = Some(action);
        self
    }

    pub fn with_nack_outcome(mut self, outcome: NackOutcome) -> Self {
        self.on_failure.get_or_insert_with(Default::default).nack_outcome = Some(outcome);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self
                .on_failure
                .is_none_or(|f| f.action.is_none() && f.nack_outcome.is_none())
    }
}

/// Per-handler configuration: a name plus an optional partial policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_policy: Option<AckPolicyOverride>,
}

impl HandlerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ack_policy: None,
        }
    }

    pub fn with_policy(mut self, policy: AckPolicyOverride) -> Self {
        self.ack_policy = Some(policy);
        self
    }
}
