//! EventSink port - settlement イベントの送信先
//!
//! # 実装
//! - `TracingEventSink`: tracing の構造化ログとして出力（デフォルト）
//! - `RecordingEventSink`: メモリに記録（テスト用）

use crate::domain::SettlementEvent;

/// Receives one structured record per settlement decision and per no-op.
///
/// `emit` is called on the settlement path, so implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SettlementEvent);
}
