//! Errors - エラー型と分類
//!
//! # 伝播方針
//! - `ConfigError`: 起動時に致命的（fail-fast）
//! - `DuplicateTask`: エラーとしてログに残す。先に保存された context は上書きしない
//! - `TransportError`: settlement の呼び出し箇所で捕捉してログに残す。再送も伝播もしない

use thiserror::Error;

use super::context::TaskContext;
use super::ids::TaskId;

/// Broker transport failure while acking or nacking.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("broker connection is closed")]
    Disconnected,

    #[error("broker rejected the settlement: {0}")]
    Rejected(String),

    #[error("{0}")]
    Other(String),
}

/// Configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse gateway config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read gateway config: {0}")]
    Io(#[from] std::io::Error),

    #[error("settlement timeout must be greater than zero")]
    InvalidTimeout,

    #[error("handler name must not be empty")]
    EmptyHandlerName,

    #[error("duplicate handler name '{0}'")]
    DuplicateHandler(String),
}

/// `store()` was called for a task id that already has a pending context.
///
/// The rejected context is handed back so its handle is not silently dropped.
#[derive(Debug, Error)]
#[error("task {task_id} already has a pending context")]
pub struct DuplicateTask {
    pub task_id: TaskId,
    pub rejected: TaskContext,
}

/// Why a deferred submission was refused.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Duplicate(#[from] DuplicateTask),
}

impl SubmitError {
    pub fn task_id(&self) -> TaskId {
        match self {
            SubmitError::Duplicate(dup) => dup.task_id,
        }
    }
}
