//! ContextStore port - 保留中 context の正本
//!
//! TaskContextStore は「このタスクはまだ settle されていないか」を知る唯一の場所です。
//!
//! # 設計原則
//! - `remove` が唯一の状態遷移（atomic pop）。同時に呼ばれても non-None を受け取るのは 1 人だけ
//! - get してから delete する、という read-then-write は行わない
//! - 保存済み context をその場で書き換えない

use crate::domain::{ContextSnapshot, DuplicateTask, TaskContext, TaskId};

/// Concurrent map from task id to pending settlement context.
///
/// Every method must be safe to call from many tasks at once, and `remove`
/// must be linearizable: for a given id exactly one caller gets `Some`.
pub trait ContextStore: Send + Sync {
    /// Insert a context. An existing entry is never overwritten; the new
    /// context is handed back inside the error instead.
    fn store(&self, ctx: TaskContext) -> Result<(), DuplicateTask>;

    /// Read-only lookup.
    fn get(&self, task_id: TaskId) -> Option<ContextSnapshot>;

    /// Atomically take the context out of the store.
    fn remove(&self, task_id: TaskId) -> Option<TaskContext>;

    /// Snapshot of every pending context.
    fn list_all(&self) -> Vec<ContextSnapshot>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
