//! App - アプリケーション層
//!
//! ports を組み合わせて deferred acknowledgment の settlement を実装します。
//!
//! # 主要コンポーネント
//! - **PolicyResolver**: gateway default と handler override のマージ
//! - **HandlerTable**: handler 名 → effective policy
//! - **SettlementEngine**: ack / nack をタスクごとに 1 回だけ実行
//! - **TimeoutSupervisor**: タスクごとの期限
//! - **ShutdownDrain**: シャットダウン時に保留中の context を settle
//! - **GatewayBuilder / Gateway**: ワイヤリングと外部からの入口

pub mod builder;
pub mod drain;
pub mod gateway;
pub mod handlers;
pub mod resolver;
pub mod settlement;
pub mod status;
pub mod timeout;

pub use self::builder::{BuildError, GatewayBuilder};
pub use self::drain::{DrainReport, ShutdownDrain};
pub use self::gateway::{Acceptance, Gateway};
pub use self::handlers::HandlerTable;
pub use self::resolver::PolicyResolver;
pub use self::settlement::{SettlementEngine, Submission};
pub use self::status::{SettlementCounts, SettlementStats};
pub use self::timeout::TimeoutSupervisor;
