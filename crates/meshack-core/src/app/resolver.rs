//! PolicyResolver - gateway default と handler override のマージ
//!
//! フィールド単位の deep merge です。
//! handler のフィールドがあればそれを使い、なければ gateway default、
//! それもなければハードコードされた既定値（`AckPolicy::default()`）に落ちます。
//!
//! マージ関数はここ 1 箇所だけにして、呼び出し側で既定値を補わないようにします。

use crate::domain::{AckPolicy, AckPolicyOverride, FailurePolicy, HandlerConfig};

#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyResolver;

impl PolicyResolver {
    /// Merge `handler` onto `gateway` onto the hardcoded defaults.
    pub fn resolve(gateway: &AckPolicyOverride, handler: Option<&AckPolicyOverride>) -> AckPolicy {
        let base = AckPolicy::default();
        let handler_failure = handler.and_then(|h| h.on_failure);
        let gateway_failure = gateway.on_failure;

        AckPolicy {
            mode: handler
                .and_then(|h| h.mode)
                .or(gateway.mode)
                .unwrap_or(base.mode),
            on_failure: FailurePolicy {
                action: handler_failure
                    .and_then(|f| f.action)
                    .or(gateway_failure.and_then(|f| f.action))
                    .unwrap_or(base.on_failure.action),
                nack_outcome: handler_failure
                    .and_then(|f| f.nack_outcome)
                    .or(gateway_failure.and_then(|f| f.nack_outcome))
                    .unwrap_or(base.on_failure.nack_outcome),
            },
        }
    }

    /// The gateway default on its own, as used for pre-submission failures.
    pub fn resolve_default(gateway: &AckPolicyOverride) -> AckPolicy {
        Self::resolve(gateway, None)
    }

    pub fn is_deferred(policy: &AckPolicy) -> bool {
        policy.is_deferred()
    }

    /// True iff at least one handler's effective policy is deferred.
    pub fn any_defers(gateway: &AckPolicyOverride, handlers: &[HandlerConfig]) -> bool {
        handlers
            .iter()
            .any(|h| Self::resolve(gateway, h.ack_policy.as_ref()).is_deferred())
    }
}
