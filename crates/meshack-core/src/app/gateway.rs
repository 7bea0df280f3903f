//! Gateway - dispatcher / routing 層から見た入口
//!
//! - `accept`: handler を引いて effective policy で submit（未知の handler は NoRoute で reject）
//! - `reject`: routing / 認証で弾かれたメッセージ（gateway default のみ適用）
//! - `complete`: タスクの終端結果で settle
//! - `shutdown`: 新規受付を止めてから drain

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::drain::{DrainReport, ShutdownDrain};
use super::handlers::HandlerTable;
use super::settlement::{SettlementEngine, Submission};
use super::status::SettlementCounts;
use crate::domain::{ContextSnapshot, RejectReason, SettlementOutcome, SubmitError, TaskId};
use crate::ports::MessageHandle;

/// What happened to a message handed to [`Gateway::accept`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Settlement waits for the task's terminal outcome.
    Deferred,

    /// The handler settles on receive; nothing left to do here.
    SettledUpstream,

    /// No task should run. `outcome` is the settlement sent, if any: the
    /// gateway default's nack for a rejected message, or the shutdown
    /// settlement of a context stored while the gateway was closing.
    Rejected {
        reason: RejectReason,
        outcome: Option<SettlementOutcome>,
    },
}

pub struct Gateway {
    engine: Arc<SettlementEngine>,
    handlers: HandlerTable,
    drain: ShutdownDrain,
    closed: AtomicBool,
}

impl Gateway {
    pub(crate) fn new(engine: Arc<SettlementEngine>, handlers: HandlerTable) -> Self {
        let drain = ShutdownDrain::new(Arc::clone(&engine), handlers.any_defers());
        Self {
            engine,
            handlers,
            drain,
            closed: AtomicBool::new(false),
        }
    }

    /// Hand over an inbound message whose task has been accepted by
    /// `handler_name`.
    pub async fn accept(
        &self,
        task_id: TaskId,
        handle: Box<dyn MessageHandle>,
        handler_name: &str,
    ) -> Result<Acceptance, SubmitError> {
        if self.is_closed() {
            return Ok(self.rejected(handle, RejectReason::ShuttingDown).await);
        }

        let Some(policy) = self.handlers.policy_for(handler_name) else {
            return Ok(self.rejected(handle, RejectReason::NoRoute).await);
        };

        match self.engine.submit(task_id, handle, handler_name, policy)? {
            Submission::Deferred if self.is_closed() => {
                // Shutdown started after the check above; the drain may
                // already have listed the store without this context.
                let outcome = self
                    .engine
                    .settle_for_shutdown(task_id, "accepted during shutdown")
                    .await;
                Ok(Acceptance::Rejected {
                    reason: RejectReason::ShuttingDown,
                    outcome,
                })
            }
            Submission::Deferred => Ok(Acceptance::Deferred),
            Submission::SettledUpstream => Ok(Acceptance::SettledUpstream),
        }
    }

    /// A message the routing or auth layer turned away.
    pub async fn reject(
        &self,
        handle: Box<dyn MessageHandle>,
        reason: RejectReason,
    ) -> Option<SettlementOutcome> {
        self.engine
            .handle_pre_submission_failure(handle, &self.handlers.default_policy(), reason)
            .await
    }

    async fn rejected(&self, handle: Box<dyn MessageHandle>, reason: RejectReason) -> Acceptance {
        let outcome = self.reject(handle, reason).await;
        Acceptance::Rejected { reason, outcome }
    }

    /// The task executor reports a terminal outcome.
    pub async fn complete(&self, task_id: TaskId, success: bool) -> Option<SettlementOutcome> {
        self.engine.settle(task_id, success).await
    }

    /// Stop accepting work and settle everything still pending.
    ///
    /// Call before releasing the broker connection.
    pub async fn shutdown(&self, reason: &str) -> DrainReport {
        self.closed.store(true, Ordering::SeqCst);
        self.drain.drain(reason).await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn counts(&self) -> SettlementCounts {
        self.engine.counts()
    }

    pub fn pending(&self) -> Vec<ContextSnapshot> {
        self.engine.pending()
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    pub fn engine(&self) -> &Arc<SettlementEngine> {
        &self.engine
    }
}
