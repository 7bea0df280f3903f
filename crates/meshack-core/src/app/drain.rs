//! ShutdownDrain - シャットダウン時に保留中の context をすべて settle する
//!
//! # フロー
//! 1. deferred な handler が 1 つもなければ store に触れずに即 return
//! 2. `list_all()` のスナップショットを取り、1 件ずつ `SettleCause::Shutdown` で settle
//!    （期限は settle 側で個別に解除）
//!
//! スナップショット後に保存された context の期限には触れません。
//! その context は自分の期限か Gateway の再チェックで settle されます。
//!
//! 各 context の transport 失敗は settle 内で捕捉されるので、drain は必ず最後まで進みます。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::settlement::SettlementEngine;
use crate::domain::{SettlementEvent, SettlementOutcome};

/// What a drain pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// No handler defers, so the store was not consulted.
    pub skipped: bool,
    /// Contexts found pending when the drain started.
    pub pending: usize,
    pub acked: usize,
    pub nacked: usize,
    /// Contexts that were settled by someone else between listing and settling.
    pub noops: usize,
}

impl DrainReport {
    pub fn drained(&self) -> usize {
        self.acked + self.nacked
    }
}

pub struct ShutdownDrain {
    engine: Arc<SettlementEngine>,
    any_defers: bool,
}

impl ShutdownDrain {
    /// `any_defers` comes from
    /// [`PolicyResolver::any_defers`](super::PolicyResolver::any_defers) over
    /// the configured handlers.
    pub fn new(engine: Arc<SettlementEngine>, any_defers: bool) -> Self {
        Self { engine, any_defers }
    }

    /// Force settlement of every pending context, treating each as failed.
    pub async fn drain(&self, reason: &str) -> DrainReport {
        if !self.any_defers {
            tracing::debug!(reason, "no handler defers acknowledgment; nothing to drain");
            return DrainReport {
                skipped: true,
                ..DrainReport::default()
            };
        }

        let pending = self.engine.store().list_all();
        tracing::info!(reason, pending = pending.len(), "draining pending settlements");

        let mut report = DrainReport {
            pending: pending.len(),
            ..DrainReport::default()
        };
        for ctx in pending {
            match self
                .engine
                .settle_for_shutdown(ctx.task_id, reason)
                .await
            {
                Some(SettlementOutcome::Ack) => report.acked += 1,
                Some(SettlementOutcome::Nack(_)) => report.nacked += 1,
                None => report.noops += 1,
            }
        }

        self.engine.sink().emit(&SettlementEvent::Drained {
            reason: reason.to_string(),
            drained: report.drained(),
        });
        report
    }
}
