//! HandlerTable - handler 名から effective policy への対応表
//!
//! 起動時に 1 度だけ構築し、実行中は不変です（ロック不要）。

use std::collections::HashMap;

use super::resolver::PolicyResolver;
use crate::domain::{AckPolicy, AckPolicyOverride, ConfigError, HandlerConfig};

#[derive(Debug, Clone)]
pub struct HandlerTable {
    default_policy: AckPolicy,
    policies: HashMap<String, AckPolicy>,
    any_defers: bool,
}

impl HandlerTable {
    /// Resolve every handler's effective policy.
    ///
    /// Handler names must be non-empty and unique.
    pub fn build(
        gateway_default: &AckPolicyOverride,
        handlers: &[HandlerConfig],
    ) -> Result<Self, ConfigError> {
        let mut policies = HashMap::with_capacity(handlers.len());
        for handler in handlers {
            if handler.name.trim().is_empty() {
                return Err(ConfigError::EmptyHandlerName);
            }
            if policies.contains_key(&handler.name) {
                return Err(ConfigError::DuplicateHandler(handler.name.clone()));
            }
            let policy = PolicyResolver::resolve(gateway_default, handler.ack_policy.as_ref());
            policies.insert(handler.name.clone(), policy);
        }

        Ok(Self {
            default_policy: PolicyResolver::resolve_default(gateway_default),
            any_defers: PolicyResolver::any_defers(gateway_default, handlers),
            policies,
        })
    }

    /// Effective policy for a handler, or `None` if it is not configured.
    pub fn policy_for(&self, handler_name: &str) -> Option<AckPolicy> {
        self.policies.get(handler_name).copied()
    }

    /// The resolved gateway default (used when no handler is identified).
    pub fn default_policy(&self) -> AckPolicy {
        self.default_policy
    }

    pub fn any_defers(&self) -> bool {
        self.any_defers
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.policies.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
