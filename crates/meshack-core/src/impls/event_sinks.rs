//! EventSink の実装
//!
//! - **TracingEventSink**: tracing の構造化ログに変換（デフォルト）
//! - **RecordingEventSink**: イベントをメモリに保持（テスト・CLI 用）

use std::sync::{Mutex, PoisonError};

use crate::domain::SettlementEvent;
use crate::ports::EventSink;

/// Renders settlement events as `tracing` events.
///
/// Decisions go to `info`, race no-ops to `debug`, transport failures to
/// `warn` and duplicate tasks to `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &SettlementEvent) {
        match event {
            SettlementEvent::Deferred {
                task_id,
                message_id,
                handler,
            } => tracing::debug!(
                task_id = %task_id,
                message_id = %message_id,
                handler = %handler,
                "settlement deferred until task completion"
            ),
            SettlementEvent::Settled {
                task_id,
                message_id,
                handler,
                cause,
                outcome,
                reason,
            } => tracing::info!(
                task_id = %task_id,
                message_id = %message_id,
                handler = %handler,
                cause = %cause,
                outcome = %outcome,
                reason = reason.as_deref(),
                "message settled"
            ),
            SettlementEvent::AlreadySettled { task_id, cause } => tracing::debug!(
                task_id = %task_id,
                cause = %cause,
                "no pending context; already settled or never deferred"
            ),
            SettlementEvent::PreSubmissionSettled {
                message_id,
                reason,
                outcome,
            } => tracing::info!(
                message_id = %message_id,
                reason = %reason,
                outcome = %outcome,
                "message settled before task submission"
            ),
            SettlementEvent::PreSubmissionSkipped { message_id, reason } => tracing::debug!(
                message_id = %message_id,
                reason = %reason,
                "gateway default is on_receive; message already settled upstream"
            ),
            SettlementEvent::TransportFailed {
                message_id,
                task_id,
                outcome,
                error,
            } => tracing::warn!(
                message_id = %message_id,
                task_id = ?task_id,
                outcome = %outcome,
                error = %error,
                "broker settlement call failed; not retried"
            ),
            SettlementEvent::DuplicateTask { task_id, handler } => tracing::error!(
                task_id = %task_id,
                handler = %handler,
                "task already has a pending context; keeping the original"
            ),
            SettlementEvent::Drained { reason, drained } => tracing::info!(
                reason = %reason,
                drained = drained,
                "pending contexts drained"
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<SettlementEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SettlementEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events with the given [`SettlementEvent::name`].
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &SettlementEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
