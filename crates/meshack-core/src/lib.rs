//! meshack-core
//!
//! Deferred acknowledgment settlement for an event mesh gateway.
//!
//! An inbound broker message whose task runs asynchronously is only acked or
//! nacked once the task finishes, times out, or the gateway shuts down, and
//! exactly once whichever of those happens first.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, policy, context, outcome, decision, events, errors）
//! - **ports**: 抽象化レイヤー（MessageHandle, ContextStore, EventSink, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryContextStore, RecordingMessageHandle, TracingEventSink など）
//! - **app**: アプリケーションロジック（resolver, settlement, timeout, drain, gateway, builder）
//! - **config**: 起動時の設定読み込みと検証

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{Acceptance, DrainReport, Gateway, GatewayBuilder, SettlementCounts};
pub use config::GatewayConfig;
