//! Impls - ports の実装（インメモリ・開発用）
//!
//! # 含まれる実装
//! - **InMemoryContextStore**: 保留 context の保存先
//! - **RecordingMessageHandle / HandleLedger**: ブローカー呼び出しを記録するハンドル
//! - **TracingEventSink / RecordingEventSink**: observability sink
//!
//! # 本番用実装
//! 本番のブローカーハンドルは transport アダプタ側（別クレート）が `MessageHandle` を実装します。

pub mod event_sinks;
pub mod inmem_store;
pub mod recording_handle;

pub use self::event_sinks::{RecordingEventSink, TracingEventSink};
pub use self::inmem_store::InMemoryContextStore;
pub use self::recording_handle::{HandleLedger, RecordingMessageHandle};
