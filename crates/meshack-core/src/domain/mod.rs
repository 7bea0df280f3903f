//! Domain model (ids, policies, contexts, outcomes, decisions, events, errors).

pub mod context;
pub mod decision;
pub mod errors;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod policy;

pub use context::{ContextSnapshot, TaskContext};
pub use decision::decide;
pub use errors::{ConfigError, DuplicateTask, SubmitError, TransportError};
pub use events::SettlementEvent;
pub use ids::{MessageId, TaskId};
pub use outcome::{RejectReason, SettleCause, SettlementOutcome};
pub use policy::{
    AckMode, AckPolicy, AckPolicyOverride, FailureAction, FailurePolicy, FailurePolicyOverride,
    HandlerConfig, NackOutcome, ParsePolicyError,
};
