//! GatewayBuilder - Gateway の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - `build()` で設定を検証（不正な policy 値・重複 handler・0 秒 timeout）
//! - `expect_handlers()` で期待される handler 名を登録し、
//!   「期待集合 ⊆ 設定済み集合」を起動時にチェック
//! - store / event sink / clock は差し替え可能（デフォルトはインメモリ + tracing + システム時刻）

use std::sync::Arc;
use std::time::Duration;

use super::gateway::Gateway;
use super::handlers::HandlerTable;
use super::settlement::SettlementEngine;
use crate::config::GatewayConfig;
use crate::domain::ConfigError;
use crate::impls::{InMemoryContextStore, TracingEventSink};
use crate::ports::{Clock, ContextStore, EventSink, SystemClock};

/// BuildError はゲートウェイ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Missing handlers: {0:?}. These handlers were expected but not configured.")]
    MissingHandlers(Vec<String>),
}

/// # 使用例
/// ```ignore
/// let gateway = GatewayBuilder::new(GatewayConfig::from_path("gateway.json")?)
///     .expect_handlers(&["orders"])
///     .build()?;
/// ```
pub struct GatewayBuilder {
    config: GatewayConfig,
    expected_handlers: Option<Vec<String>>,
    store: Option<Arc<dyn ContextStore>>,
    sink: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn Clock>>,
    settlement_timeout: Option<Duration>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            expected_handlers: None,
            store: None,
            sink: None,
            clock: None,
            settlement_timeout: None,
        }
    }

    pub fn expect_handlers(mut self, names: &[&str]) -> Self {
        self.expected_handlers = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn context_store(mut self, store: Arc<dyn ContextStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sub-second deadline override; the config only expresses whole seconds.
    pub fn settlement_timeout(mut self, timeout: Duration) -> Self {
        self.settlement_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<Gateway, BuildError> {
        self.config.validate()?;
        let handlers = HandlerTable::build(&self.config.default_ack_policy, &self.config.handlers)?;

        if let Some(expected) = &self.expected_handlers {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| handlers.policy_for(name).is_none())
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingHandlers(missing));
            }
        }

        let timeout = match self.settlement_timeout {
            Some(timeout) if timeout.is_zero() => return Err(ConfigError::InvalidTimeout.into()),
            Some(timeout) => timeout,
            None => self.config.settlement_timeout(),
        };

        let engine = SettlementEngine::new(
            self.store
                .unwrap_or_else(|| Arc::new(InMemoryContextStore::new())),
            self.sink.unwrap_or_else(|| Arc::new(TracingEventSink)),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            timeout,
        );

        tracing::info!(
            handlers = handlers.len(),
            any_defers = handlers.any_defers(),
            default_deferred = handlers.default_policy().is_deferred(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "gateway settlement configured"
        );
        Ok(Gateway::new(Arc::new(engine), handlers))
    }
}
