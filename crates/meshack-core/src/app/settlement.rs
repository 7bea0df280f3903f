//! SettlementEngine - deferred ack/nack をタスクごとに 1 回だけ実行する
//!
//! # フロー
//! 1. `submit`: policy が deferred なら TaskContext を保存し、期限を設定
//! 2. `settle`: ContextStore から context を atomic に取り出す（取れなければ no-op）
//! 3. 原因と effective policy から判断（[`decide`]）
//! 4. ハンドルの `ack` / `nack` を 1 回だけ呼ぶ
//! 5. 期限を解除（ベストエフォート）
//!
//! transport エラーはここで捕捉してログとカウンタに残し、再送も伝播もしません。

use std::sync::{Arc, Weak};
use std::time::Duration;

use super::status::{SettlementCounts, SettlementStats};
use super::timeout::TimeoutSupervisor;
use crate::domain::{
    AckPolicy, ContextSnapshot, MessageId, RejectReason, SettleCause, SettlementEvent,
    SettlementOutcome, SubmitError, TaskContext, TaskId, TransportError, decide,
};
use crate::ports::{Clock, ContextStore, EventSink, MessageHandle};

/// Result of a successful [`SettlementEngine::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A context was stored and a deadline armed.
    Deferred,

    /// The policy settles on receive; the message was already handled
    /// upstream and the handle has been dropped untouched.
    SettledUpstream,
}

pub struct SettlementEngine {
    store: Arc<dyn ContextStore>,
    timeouts: TimeoutSupervisor,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    stats: SettlementStats,
    settlement_timeout: Duration,
}

impl SettlementEngine {
    pub fn new(
        store: Arc<dyn ContextStore>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        settlement_timeout: Duration,
    ) -> Self {
        Self {
            store,
            timeouts: TimeoutSupervisor::new(),
            sink,
            clock,
            stats: SettlementStats::default(),
            settlement_timeout,
        }
    }

    /// Start tracking a task whose message settlement may be deferred.
    ///
    /// Must be called from within a tokio runtime when `policy` is deferred,
    /// since the deadline runs as a tokio task.
    pub fn submit(
        self: &Arc<Self>,
        task_id: TaskId,
        handle: Box<dyn MessageHandle>,
        handler_name: &str,
        policy: AckPolicy,
    ) -> Result<Submission, SubmitError> {
        if !policy.is_deferred() {
            return Ok(Submission::SettledUpstream);
        }

        let message_id = handle.message_id();
        let ctx = TaskContext::new(task_id, handle, handler_name, policy, self.clock.now());
        if let Err(dup) = self.store.store(ctx) {
            self.stats.record_duplicate();
            self.sink.emit(&SettlementEvent::DuplicateTask {
                task_id,
                handler: handler_name.to_string(),
            });
            return Err(dup.into());
        }

        let engine: Weak<Self> = Arc::downgrade(self);
        self.timeouts
            .arm(task_id, self.settlement_timeout, async move {
                if let Some(engine) = engine.upgrade() {
                    engine.settle_with_cause(task_id, SettleCause::Timeout).await;
                }
            });

        self.stats.record_deferred();
        self.sink.emit(&SettlementEvent::Deferred {
            task_id,
            message_id,
            handler: handler_name.to_string(),
        });
        Ok(Submission::Deferred)
    }

    /// Settle a task after the executor reports its terminal outcome.
    ///
    /// Returns the applied decision, or `None` if the task had no pending
    /// context (already settled, or never deferred).
    pub async fn settle(&self, task_id: TaskId, success: bool) -> Option<SettlementOutcome> {
        self.settle_with_cause(task_id, SettleCause::from_success(success))
            .await
    }

    /// Settle a task for an explicit cause.
    ///
    /// The store's atomic `remove` is the only gate: concurrent callers for
    /// the same task race on it, and exactly one of them makes the broker
    /// call.
    pub async fn settle_with_cause(
        &self,
        task_id: TaskId,
        cause: SettleCause,
    ) -> Option<SettlementOutcome> {
        self.settle_inner(task_id, cause, None).await
    }

    /// Settle a task as part of a shutdown; `reason` is carried on the
    /// settlement event.
    pub async fn settle_for_shutdown(
        &self,
        task_id: TaskId,
        reason: &str,
    ) -> Option<SettlementOutcome> {
        self.settle_inner(task_id, SettleCause::Shutdown, Some(reason))
            .await
    }

    async fn settle_inner(
        &self,
        task_id: TaskId,
        cause: SettleCause,
        reason: Option<&str>,
    ) -> Option<SettlementOutcome> {
        let Some(ctx) = self.store.remove(task_id) else {
            self.stats.record_noop();
            self.sink
                .emit(&SettlementEvent::AlreadySettled { task_id, cause });
            return None;
        };

        if cause != SettleCause::Timeout {
            self.timeouts.cancel(task_id);
        }

        let (snapshot, handle) = ctx.into_parts();
        let outcome = decide(cause, &snapshot.effective_policy);

        self.stats.record_outcome(outcome);
        if cause == SettleCause::Timeout {
            self.stats.record_timeout_fired();
        }
        self.sink.emit(&SettlementEvent::Settled {
            task_id,
            message_id: snapshot.message_id,
            handler: snapshot.handler_name.clone(),
            cause,
            outcome,
            reason: reason.map(str::to_string),
        });

        if let Err(err) = apply(handle, outcome).await {
            self.report_transport_failure(snapshot.message_id, Some(task_id), outcome, &err);
        }
        Some(outcome)
    }

    /// Settle a message that was turned away before any task existed.
    ///
    /// Only the gateway default applies here, since no handler was
    /// identified. A deferred default nacks with its `nack_outcome`; an
    /// on-receive default was already settled upstream and nothing happens.
    pub async fn handle_pre_submission_failure(
        &self,
        handle: Box<dyn MessageHandle>,
        gateway_default: &AckPolicy,
        reason: RejectReason,
    ) -> Option<SettlementOutcome> {
        let message_id = handle.message_id();
        if !gateway_default.is_deferred() {
            self.sink
                .emit(&SettlementEvent::PreSubmissionSkipped { message_id, reason });
            return None;
        }

        let outcome = SettlementOutcome::Nack(gateway_default.on_failure.nack_outcome);
        self.stats.record_pre_submission_nack();
        self.sink.emit(&SettlementEvent::PreSubmissionSettled {
            message_id,
            reason,
            outcome,
        });

        if let Err(err) = apply(handle, outcome).await {
            self.report_transport_failure(message_id, None, outcome, &err);
        }
        Some(outcome)
    }

    fn report_transport_failure(
        &self,
        message_id: MessageId,
        task_id: Option<TaskId>,
        outcome: SettlementOutcome,
        err: &TransportError,
    ) {
        self.stats.record_transport_failure();
        self.sink.emit(&SettlementEvent::TransportFailed {
            message_id,
            task_id,
            outcome,
            error: err.to_string(),
        });
    }

    pub fn pending(&self) -> Vec<ContextSnapshot> {
        self.store.list_all()
    }

    pub fn counts(&self) -> SettlementCounts {
        self.stats.snapshot(self.store.len())
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    pub fn timeouts(&self) -> &TimeoutSupervisor {
        &self.timeouts
    }

    pub(crate) fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    pub fn settlement_timeout(&self) -> Duration {
        self.settlement_timeout
    }
}

async fn apply(
    handle: Box<dyn MessageHandle>,
    outcome: SettlementOutcome,
) -> Result<(), TransportError> {
    match outcome {
        SettlementOutcome::Ack => handle.ack().await,
        SettlementOutcome::Nack(nack_outcome) => handle.nack(nack_outcome).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureAction, NackOutcome};
    use crate::impls::{HandleLedger, InMemoryContextStore, RecordingEventSink};
    use crate::ports::SystemClock;
    use ulid::Ulid;

    struct Fixture {
        engine: Arc<SettlementEngine>,
        ledger: HandleLedger,
        sink: Arc<RecordingEventSink>,
    }

    fn fixture(timeout: Duration) -> Fixture {
        let sink = Arc::new(RecordingEventSink::new());
        let engine = Arc::new(SettlementEngine::new(
            Arc::new(InMemoryContextStore::new()),
            sink.clone(),
            Arc::new(SystemClock),
            timeout,
        ));
        Fixture {
            engine,
            ledger: HandleLedger::new(),
            sink,
        }
    }

    impl Fixture {
        fn submit(&self, policy: AckPolicy) -> (TaskId, MessageId) {
            let task_id = TaskId::from_ulid(Ulid::new());
            let message_id = MessageId::from_ulid(Ulid::new());
            let handle = Box::new(self.ledger.handle(message_id));
            self.engine
                .submit(task_id, handle, "orders", policy)
                .unwrap();
            (task_id, message_id)
        }
    }

    #[tokio::test]
    async fn on_receive_policy_is_never_touched() {
        let f = fixture(Duration::from_secs(30));
        let (task_id, _) = f.submit(AckPolicy::default());

        assert_eq!(f.engine.settle(task_id, true).await, None);
        assert_eq!(f.engine.settle(task_id, false).await, None);

        assert_eq!(f.ledger.calls().len(), 0);
        assert!(f.engine.store().is_empty());
        assert_eq!(f.engine.timeouts().armed_count(), 0);
    }

    #[tokio::test]
    async fn success_acks_exactly_once() {
        let f = fixture(Duration::from_secs(30));
        let (task_id, message_id) = f.submit(AckPolicy::on_completion());
        assert!(f.engine.timeouts().is_armed(task_id));

        assert_eq!(f.engine.settle(task_id, true).await, Some(SettlementOutcome::Ack));
        for _ in 0..3 {
            assert_eq!(f.engine.settle(task_id, true).await, None);
            assert_eq!(f.engine.settle(task_id, false).await, None);
        }

        assert_eq!(f.ledger.calls_for(message_id), vec![SettlementOutcome::Ack]);
        assert!(!f.engine.timeouts().is_armed(task_id));
        let counts = f.engine.counts();
        assert_eq!(counts.acked, 1);
        assert_eq!(counts.noops, 6);
        assert_eq!(counts.pending, 0);
    }

    #[tokio::test]
    async fn failure_nacks_with_resolved_outcome() {
        let f = fixture(Duration::from_secs(30));
        let policy = AckPolicy::on_completion().with_failure(FailureAction::Nack, NackOutcome::Failed);
        let (task_id, message_id) = f.submit(policy);

        assert_eq!(
            f.engine.settle(task_id, false).await,
            Some(SettlementOutcome::Nack(NackOutcome::Failed))
        );
        assert_eq!(
            f.ledger.calls_for(message_id),
            vec![SettlementOutcome::Nack(NackOutcome::Failed)]
        );
    }

    #[tokio::test]
    async fn failure_with_ack_action_acks() {
        let f = fixture(Duration::from_secs(30));
        let policy = AckPolicy::on_completion().with_failure(FailureAction::Ack, NackOutcome::Rejected);
        let (task_id, _) = f.submit(policy);

        assert_eq!(f.engine.settle(task_id, false).await, Some(SettlementOutcome::Ack));
        assert_eq!(f.ledger.acks(), 1);
        assert_eq!(f.ledger.nacks(), 0);
    }

    #[tokio::test]
    async fn duplicate_submit_keeps_original_and_returns_handle() {
        let f = fixture(Duration::from_secs(30));
        let (task_id, first_message) = f.submit(AckPolicy::on_completion());

        let second_message = MessageId::from_ulid(Ulid::new());
        let err = f
            .engine
            .submit(
                task_id,
                Box::new(f.ledger.handle(second_message)),
                "orders",
                AckPolicy::on_completion(),
            )
            .unwrap_err();

        assert_eq!(err.task_id(), task_id);
        let SubmitError::Duplicate(dup) = err;
        assert_eq!(dup.rejected.message_id(), second_message);
        assert_eq!(f.engine.store().get(task_id).unwrap().message_id, first_message);
        assert_eq!(f.engine.counts().duplicates, 1);
        assert_eq!(f.sink.count("duplicate_task"), 1);

        f.engine.settle(task_id, true).await;
        assert_eq!(f.ledger.calls_for(first_message), vec![SettlementOutcome::Ack]);
        assert!(f.ledger.calls_for(second_message).is_empty());
    }

    #[tokio::test]
    async fn transport_error_is_contained() {
        let f = fixture(Duration::from_secs(30));
        f.ledger.set_fail_transport(true);
        let (task_id, _) = f.submit(AckPolicy::on_completion());

        let outcome = f.engine.settle(task_id, false).await;

        assert_eq!(outcome, Some(SettlementOutcome::Nack(NackOutcome::Rejected)));
        assert_eq!(f.ledger.failed_calls(), 1);
        assert_eq!(f.engine.counts().transport_failures, 1);
        assert_eq!(f.sink.count("transport_failed"), 1);
        // Not retried: the context is gone.
        assert_eq!(f.engine.settle(task_id, false).await, None);
        assert_eq!(f.ledger.calls().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_settle_makes_one_broker_call() {
        let f = fixture(Duration::from_secs(30));
        f.ledger.set_latency(Duration::from_millis(10));

        let mut tasks = Vec::new();
        for _ in 0..50 {
            tasks.push(f.submit(AckPolicy::on_completion()));
        }

        let mut joins = Vec::new();
        for (task_id, _) in &tasks {
            for success in [true, false] {
                let engine = Arc::clone(&f.engine);
                let task_id = *task_id;
                joins.push(tokio::spawn(async move {
                    engine.settle(task_id, success).await
                }));
            }
        }

        let mut settled = 0;
        for join in joins {
            if join.await.unwrap().is_some() {
                settled += 1;
            }
        }

        assert_eq!(settled, 50);
        assert_eq!(f.ledger.calls().len(), 50);
        for (_, message_id) in &tasks {
            assert_eq!(f.ledger.calls_for(*message_id).len(), 1);
        }
        assert_eq!(f.engine.counts().noops, 50);
    }

    #[tokio::test]
    async fn timeout_settles_as_failure() {
        let f = fixture(Duration::from_millis(30));
        let policy = AckPolicy::on_completion().with_failure(FailureAction::Nack, NackOutcome::Failed);
        let (task_id, message_id) = f.submit(policy);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(
            f.ledger.calls_for(message_id),
            vec![SettlementOutcome::Nack(NackOutcome::Failed)]
        );
        assert!(f.engine.store().get(task_id).is_none());
        assert_eq!(f.engine.counts().timeouts_fired, 1);

        // Late completion after the timeout is a no-op.
        assert_eq!(f.engine.settle(task_id, true).await, None);
        assert_eq!(f.ledger.calls().len(), 1);
    }

    #[tokio::test]
    async fn timeout_after_settlement_is_a_noop() {
        let f = fixture(Duration::from_secs(30));
        let (task_id, _) = f.submit(AckPolicy::on_completion());
        f.engine.settle(task_id, true).await;

        // Simulates a timer that lost the race with cancellation.
        assert_eq!(
            f.engine.settle_with_cause(task_id, SettleCause::Timeout).await,
            None
        );
        assert_eq!(f.ledger.calls().len(), 1);
        assert_eq!(f.engine.counts().timeouts_fired, 0);
    }

    #[tokio::test]
    async fn pre_submission_failure_follows_gateway_default() {
        let f = fixture(Duration::from_secs(30));

        let deferred = AckPolicy::on_completion().with_failure(FailureAction::Nack, NackOutcome::Failed);
        let m1 = MessageId::from_ulid(Ulid::new());
        let outcome = f
            .engine
            .handle_pre_submission_failure(
                Box::new(f.ledger.handle(m1)),
                &deferred,
                RejectReason::NoRoute,
            )
            .await;
        assert_eq!(outcome, Some(SettlementOutcome::Nack(NackOutcome::Failed)));

        let m2 = MessageId::from_ulid(Ulid::new());
        let outcome = f
            .engine
            .handle_pre_submission_failure(
                Box::new(f.ledger.handle(m2)),
                &AckPolicy::default(),
                RejectReason::Unauthorized,
            )
            .await;
        assert_eq!(outcome, None);

        assert_eq!(f.ledger.calls_for(m1).len(), 1);
        assert!(f.ledger.calls_for(m2).is_empty());
        assert_eq!(f.engine.counts().pre_submission_nacks, 1);
        assert_eq!(f.sink.count("pre_submission_skipped"), 1);
    }
}
