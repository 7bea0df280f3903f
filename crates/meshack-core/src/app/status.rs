//! Status - settlement のカウンタ
//!
//! `SettlementStats` は settlement 経路で更新する atomic カウンタ、
//! `SettlementCounts` はそれを読み出したスナップショットです。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::SettlementOutcome;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementCounts {
    /// Contexts still waiting for settlement.
    pub pending: usize,
    pub deferred: u64,
    pub acked: u64,
    pub nacked: u64,
    pub noops: u64,
    pub transport_failures: u64,
    pub duplicates: u64,
    pub timeouts_fired: u64,
    pub pre_submission_nacks: u64,
}

#[derive(Debug, Default)]
pub struct SettlementStats {
    deferred: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
    noops: AtomicU64,
    transport_failures: AtomicU64,
    duplicates: AtomicU64,
    timeouts_fired: AtomicU64,
    pre_submission_nacks: AtomicU64,
}

impl SettlementStats {
    pub fn record_deferred(&self) {
        self.deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, outcome: SettlementOutcome) {
        match outcome {
            SettlementOutcome::Ack => self.acked.fetch_add(1, Ordering::Relaxed),
            SettlementOutcome::Nack(_) => self.nacked.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_noop(&self) {
        self.noops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout_fired(&self) {
        self.timeouts_fired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pre_submission_nack(&self) {
        self.pre_submission_nacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, pending: usize) -> SettlementCounts {
        SettlementCounts {
            pending,
            deferred: self.deferred.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            nacked: self.nacked.load(Ordering::Relaxed),
            noops: self.noops.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            timeouts_fired: self.timeouts_fired.load(Ordering::Relaxed),
            pre_submission_nacks: self.pre_submission_nacks.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NackOutcome;

    #[test]
    fn snapshot_reflects_recorded_values() {
        let stats = SettlementStats::default();
        stats.record_deferred();
        stats.record_outcome(SettlementOutcome::Ack);
        stats.record_outcome(SettlementOutcome::Nack(NackOutcome::Failed));
        stats.record_noop();

        let counts = stats.snapshot(3);
        assert_eq!(counts.pending, 3);
        assert_eq!(counts.deferred, 1);
        assert_eq!(counts.acked, 1);
        assert_eq!(counts.nacked, 1);
        assert_eq!(counts.noops, 1);
        assert_eq!(counts.transport_failures, 0);
    }
}
