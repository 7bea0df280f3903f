//! Events - settlement のドメインイベント
//!
//! Observability sink に送る構造化レコードです。
//! settlement の判断、no-op、transport 失敗、重複、drain ごとに 1 件発行します。

use serde::{Deserialize, Serialize};

use super::ids::{MessageId, TaskId};
use super::outcome::{RejectReason, SettleCause, SettlementOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SettlementEvent {
    /// A deferred context was stored and its deadline armed.
    Deferred {
        task_id: TaskId,
        message_id: MessageId,
        handler: String,
    },

    /// The broker call for a task was made.
    Settled {
        task_id: TaskId,
        message_id: MessageId,
        handler: String,
        cause: SettleCause,
        outcome: SettlementOutcome,
        /// Shutdown reason, for settlements forced by a drain.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// `settle` found no context: already settled or never deferred.
    AlreadySettled { task_id: TaskId, cause: SettleCause },

    /// A message was nacked before any task existed.
    PreSubmissionSettled {
        message_id: MessageId,
        reason: RejectReason,
        outcome: SettlementOutcome,
    },

    /// A message was turned away before any task existed, but the gateway
    /// default is not deferred so it was already settled upstream.
    PreSubmissionSkipped {
        message_id: MessageId,
        reason: RejectReason,
    },

    /// The broker call failed; not retried.
    TransportFailed {
        message_id: MessageId,
        task_id: Option<TaskId>,
        outcome: SettlementOutcome,
        error: String,
    },

    /// A second context for the same task was refused.
    DuplicateTask { task_id: TaskId, handler: String },

    /// Shutdown drain finished.
    Drained { reason: String, drained: usize },
}

impl SettlementEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SettlementEvent::Deferred { .. } => "deferred",
            SettlementEvent::Settled { .. } => "settled",
            SettlementEvent::AlreadySettled { .. } => "already_settled",
            SettlementEvent::PreSubmissionSettled { .. } => "pre_submission_settled",
            SettlementEvent::PreSubmissionSkipped { .. } => "pre_submission_skipped",
            SettlementEvent::TransportFailed { .. } => "transport_failed",
            SettlementEvent::DuplicateTask { .. } => "duplicate_task",
            SettlementEvent::Drained { .. } => "drained",
        }
    }
}
