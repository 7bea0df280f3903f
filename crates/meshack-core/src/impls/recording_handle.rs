//! RecordingMessageHandle - 開発・テスト用のブローカーハンドル
//!
//! 実際のブローカーに接続せず、ack / nack の呼び出しを [`HandleLedger`] に記録します。
//! CLI のシミュレーションとテストで使います。
//!
//! # 学習ポイント
//! - 複数ハンドルで 1 つの ledger を共有（Arc + atomic カウンタ）
//! - transport 障害の注入（`set_fail_transport`）
//! - 遅いブローカーの再現（`set_latency`）

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{MessageId, NackOutcome, SettlementOutcome, TransportError};
use crate::ports::MessageHandle;

#[derive(Debug, Default)]
struct LedgerInner {
    acks: AtomicUsize,
    nacks: AtomicUsize,
    failed_calls: AtomicUsize,
    fail_transport: AtomicBool,
    latency_ms: AtomicU64,
    calls: Mutex<Vec<(MessageId, SettlementOutcome)>>,
}

/// Shared record of every settlement call made through its handles.
///
/// Cloning is cheap; all clones observe the same counters.
#[derive(Debug, Clone, Default)]
pub struct HandleLedger {
    inner: Arc<LedgerInner>,
}

impl HandleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a handle for one inbound message.
    pub fn handle(&self, message_id: MessageId) -> RecordingMessageHandle {
        RecordingMessageHandle {
            message_id,
            ledger: self.clone(),
        }
    }

    /// Make every subsequent call fail with [`TransportError::Disconnected`].
    pub fn set_fail_transport(&self, fail: bool) {
        self.inner.fail_transport.store(fail, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.inner.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Successful ack calls.
    pub fn acks(&self) -> usize {
        self.inner.acks.load(Ordering::SeqCst)
    }

    /// Successful nack calls.
    pub fn nacks(&self) -> usize {
        self.inner.nacks.load(Ordering::SeqCst)
    }

    /// Calls that returned a transport error.
    pub fn failed_calls(&self) -> usize {
        self.inner.failed_calls.load(Ordering::SeqCst)
    }

    /// Every call in arrival order, including failed ones.
    pub fn calls(&self) -> Vec<(MessageId, SettlementOutcome)> {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls_for(&self, message_id: MessageId) -> Vec<SettlementOutcome> {
        self.calls()
            .into_iter()
            .filter(|(id, _)| *id == message_id)
            .map(|(_, outcome)| outcome)
            .collect()
    }

    async fn record(
        &self,
        message_id: MessageId,
        outcome: SettlementOutcome,
    ) -> Result<(), TransportError> {
        let latency = self.inner.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((message_id, outcome));

        if self.inner.fail_transport.load(Ordering::SeqCst) {
            self.inner.failed_calls.fetch_add(1, Ordering::SeqCst);
            return Err(TransportError::Disconnected);
        }

        match outcome {
            SettlementOutcome::Ack => self.inner.acks.fetch_add(1, Ordering::SeqCst),
            SettlementOutcome::Nack(_) => self.inner.nacks.fetch_add(1, Ordering::SeqCst),
        };
        Ok(())
    }
}

/// A [`MessageHandle`] that reports to a [`HandleLedger`].
#[derive(Debug)]
pub struct RecordingMessageHandle {
    message_id: MessageId,
    ledger: HandleLedger,
}

#[async_trait]
impl MessageHandle for RecordingMessageHandle {
    fn message_id(&self) -> MessageId {
        self.message_id
    }

    async fn ack(self: Box<Self>) -> Result<(), TransportError> {
        self.ledger
            .record(self.message_id, SettlementOutcome::Ack)
            .await
    }

    async fn nack(self: Box<Self>, outcome: NackOutcome) -> Result<(), TransportError> {
        self.ledger
            .record(self.message_id, SettlementOutcome::Nack(outcome))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[tokio::test]
    async fn ledger_counts_calls() {
        let ledger = HandleLedger::new();
        let m1 = MessageId::from_ulid(Ulid::new());
        let m2 = MessageId::from_ulid(Ulid::new());

        Box::new(ledger.handle(m1)).ack().await.unwrap();
        Box::new(ledger.handle(m2))
            .nack(NackOutcome::Failed)
            .await
            .unwrap();

        assert_eq!(ledger.acks(), 1);
        assert_eq!(ledger.nacks(), 1);
        assert_eq!(ledger.calls_for(m2), vec![SettlementOutcome::Nack(NackOutcome::Failed)]);
    }

    #[test]
    fn oversized_latency_saturates() {
        let ledger = HandleLedger::new();
        ledger.set_latency(Duration::MAX);
        assert_eq!(ledger.inner.latency_ms.load(Ordering::SeqCst), u64::MAX);
    }

    #[tokio::test]
    async fn injected_transport_failure() {
        let ledger = HandleLedger::new();
        ledger.set_fail_transport(true);

        let err = Box::new(ledger.handle(MessageId::from_ulid(Ulid::new())))
            .ack()
            .await
            .unwrap_err();

        assert_eq!(err, TransportError::Disconnected);
        assert_eq!(ledger.acks(), 0);
        assert_eq!(ledger.failed_calls(), 1);
        assert_eq!(ledger.calls().len(), 1);
    }
}
