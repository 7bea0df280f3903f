//! Settlement outcome model.
//!
//! [`SettlementOutcome`] is the decision actually applied to a broker
//! message. [`SettleCause`] records *why* settlement happened, and
//! [`RejectReason`] why a message never got a task at all.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::policy::NackOutcome;

/// The broker call made for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "decision", content = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Ack,
    Nack(NackOutcome),
}

impl fmt::Display for SettlementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementOutcome::Ack => f.write_str("ack"),
            SettlementOutcome::Nack(outcome) => write!(f, "nack({outcome})"),
        }
    }
}

/// What drove a deferred task to settlement.
///
/// Only `Completed` counts as success; every other cause follows the
/// policy's `on_failure` branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleCause {
    /// The task executor reported success.
    Completed,

    /// The task executor reported failure.
    Failed,

    /// The settlement deadline elapsed before the task finished.
    Timeout,

    /// The gateway drained pending contexts during shutdown.
    Shutdown,
}

impl SettleCause {
    pub fn from_success(success: bool) -> Self {
        if success {
            SettleCause::Completed
        } else {
            SettleCause::Failed
        }
    }

    pub fn is_success(self) -> bool {
        self == SettleCause::Completed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SettleCause::Completed => "completed",
            SettleCause::Failed => "failed",
            SettleCause::Timeout => "timeout",
            SettleCause::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for SettleCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a message was turned away before any task context existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No handler or route matched the message.
    NoRoute,

    /// Authentication or authorization failed.
    Unauthorized,

    /// The gateway is draining and accepts no new work.
    ShuttingDown,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::NoRoute => "no_route",
            RejectReason::Unauthorized => "unauthorized",
            RejectReason::ShuttingDown => "shutting_down",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
