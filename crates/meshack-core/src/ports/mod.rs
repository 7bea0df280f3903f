//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。
//! ブローカー transport・保留 context の保存先・observability sink を trait として切り出し、
//! settlement のロジックから実装の詳細を隠蔽します。

pub mod clock;
pub mod context_store;
pub mod event_sink;
pub mod id_generator;
pub mod message_handle;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::context_store::ContextStore;
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::message_handle::MessageHandle;
