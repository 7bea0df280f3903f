//! Gateway configuration.
//!
//! Read once at startup; there is no hot reload. Any malformed value (an
//! unknown policy mode, a typo in a key, a zero timeout, a duplicated
//! handler) is a [`ConfigError`] and should stop the process.
//!
//! ```json
//! {
//!   "default_ack_policy": { "mode": "on_completion" },
//!   "settlement_timeout_secs": 120,
//!   "handlers": [
//!     { "name": "orders" },
//!     { "name": "audit", "ack_policy": { "on_failure": { "nack_outcome": "failed" } } }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{AckPolicyOverride, ConfigError, HandlerConfig};

pub const DEFAULT_SETTLEMENT_TIMEOUT_SECS: u64 = 300;

fn default_settlement_timeout_secs() -> u64 {
    DEFAULT_SETTLEMENT_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Gateway-wide policy; fields left out fall back to the hardcoded defaults.
    #[serde(default)]
    pub default_ack_policy: AckPolicyOverride,

    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,

    /// How long a deferred message may stay unsettled. Applies to every
    /// handler.
    #[serde(default = "default_settlement_timeout_secs")]
    pub settlement_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_ack_policy: AckPolicyOverride::default(),
            handlers: Vec::new(),
            settlement_timeout_secs: DEFAULT_SETTLEMENT_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    /// Parse and validate.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settlement_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        let mut seen = HashSet::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            if handler.name.trim().is_empty() {
                return Err(ConfigError::EmptyHandlerName);
            }
            if !seen.insert(handler.name.as_str()) {
                return Err(ConfigError::DuplicateHandler(handler.name.clone()));
            }
        }
        Ok(())
    }

    pub fn settlement_timeout(&self) -> Duration {
        Duration::from_secs(self.settlement_timeout_secs)
    }

    pub fn with_handler(mut self, handler: HandlerConfig) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_default_policy(mut self, policy: AckPolicyOverride) -> Self {
        self.default_ack_policy = policy;
        self
    }
}
