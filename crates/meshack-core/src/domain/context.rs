//! Task context: the in-memory record that ties a deferred broker message to
//! its in-flight task.
//!
//! A context is immutable once built. It owns the message handle, so the only
//! way to settle the message is to take the context out of the store and
//! consume it with [`TaskContext::into_parts`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{MessageId, TaskId};
use super::policy::AckPolicy;
use crate::ports::MessageHandle;

pub struct TaskContext {
    task_id: TaskId,
    handle: Box<dyn MessageHandle>,
    handler_name: String,
    effective_policy: AckPolicy,
    created_at: DateTime<Utc>,
}

impl TaskContext {
    pub fn new(
        task_id: TaskId,
        handle: Box<dyn MessageHandle>,
        handler_name: impl Into<String>,
        effective_policy: AckPolicy,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            handle,
            handler_name: handler_name.into(),
            effective_policy,
            created_at,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn message_id(&self) -> MessageId {
        self.handle.message_id()
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }

    pub fn effective_policy(&self) -> &AckPolicy {
        &self.effective_policy
    }

    /// Contexts only exist for deferred policies, so this is always true for
    /// a context built through the settlement engine.
    pub fn deferred_ack_enabled(&self) -> bool {
        self.effective_policy.is_deferred()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Read-only view without the message handle.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            task_id: self.task_id,
            message_id: self.message_id(),
            deferred_ack_enabled: self.deferred_ack_enabled(),
            handler_name: self.handler_name.clone(),
            effective_policy: self.effective_policy,
            created_at: self.created_at,
        }
    }

    /// Split the context; the caller becomes the sole owner of the handle.
    pub fn into_parts(self) -> (ContextSnapshot, Box<dyn MessageHandle>) {
        let snapshot = self.snapshot();
        (snapshot, self.handle)
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("task_id", &self.task_id)
            .field("message_id", &self.message_id())
            .field("handler_name", &self.handler_name)
            .field("effective_policy", &self.effective_policy)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Everything in a [`TaskContext`] except the handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub task_id: TaskId,
    pub message_id: MessageId,
    pub deferred_ack_enabled: bool,
    pub handler_name: String,
    pub effective_policy: AckPolicy,
    pub created_at: DateTime<Utc>,
}
