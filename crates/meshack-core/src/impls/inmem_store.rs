//! InMemoryContextStore - 保留中 context のインメモリ保存先
//!
//! # 実装詳細
//! - `Mutex<HashMap<TaskId, TaskContext>>` で排他制御
//! - ロック中に await しない（すべてのメソッドは同期）
//! - `remove` は HashMap::remove 1 回なので、ロックの下で atomic に pop される
//!
//! 保留 context はプロセス再起動をまたいで永続化しません。

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{ContextSnapshot, DuplicateTask, TaskContext, TaskId};
use crate::ports::ContextStore;

#[derive(Default)]
pub struct InMemoryContextStore {
    contexts: Mutex<HashMap<TaskId, TaskContext>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section is a single map operation, so a poisoned map is
    // still consistent and safe to keep using.
    fn contexts(&self) -> MutexGuard<'_, HashMap<TaskId, TaskContext>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContextStore for InMemoryContextStore {
    fn store(&self, ctx: TaskContext) -> Result<(), DuplicateTask> {
        let task_id = ctx.task_id();
        match self.contexts().entry(task_id) {
            Entry::Vacant(slot) => {
                slot.insert(ctx);
                Ok(())
            }
            Entry::Occupied(_) => Err(DuplicateTask {
                task_id,
                rejected: ctx,
            }),
        }
    }

    fn get(&self, task_id: TaskId) -> Option<ContextSnapshot> {
        self.contexts().get(&task_id).map(TaskContext::snapshot)
    }

    fn remove(&self, task_id: TaskId) -> Option<TaskContext> {
        self.contexts().remove(&task_id)
    }

    fn list_all(&self) -> Vec<ContextSnapshot> {
        self.contexts().values().map(TaskContext::snapshot).collect()
    }

    fn len(&self) -> usize {
        self.contexts().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AckPolicy, MessageId};
    use crate::impls::HandleLedger;
    use chrono::Utc;
    use std::sync::Arc;
    use ulid::Ulid;

    fn context(ledger: &HandleLedger, task_id: TaskId) -> TaskContext {
        TaskContext::new(
            task_id,
            Box::new(ledger.handle(MessageId::from_ulid(Ulid::new()))),
            "orders",
            AckPolicy::on_completion(),
            Utc::now(),
        )
    }

    #[test]
    fn store_get_remove_roundtrip() {
        let ledger = HandleLedger::new();
        let store = InMemoryContextStore::new();
        let task_id = TaskId::from_ulid(Ulid::new());

        store.store(context(&ledger, task_id)).unwrap();
        let snapshot = store.get(task_id).unwrap();
        assert_eq!(snapshot.handler_name, "orders");
        assert!(snapshot.deferred_ack_enabled);
        assert_eq!(store.len(), 1);

        let removed = store.remove(task_id).unwrap();
        assert_eq!(removed.task_id(), task_id);
        assert!(store.get(task_id).is_none());
        assert!(store.remove(task_id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_store_keeps_the_original() {
        let ledger = HandleLedger::new();
        let store = InMemoryContextStore::new();
        let task_id = TaskId::from_ulid(Ulid::new());

        let first = context(&ledger, task_id);
        let first_message = first.message_id();
        store.store(first).unwrap();

        let second = context(&ledger, task_id);
        let second_message = second.message_id();
        let err = store.store(second).unwrap_err();

        assert_eq!(err.task_id, task_id);
        assert_eq!(err.rejected.message_id(), second_message);
        assert_eq!(store.get(task_id).unwrap().message_id, first_message);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn list_all_is_a_snapshot() {
        let ledger = HandleLedger::new();
        let store = InMemoryContextStore::new();
        let ids: Vec<TaskId> = (0..3).map(|_| TaskId::from_ulid(Ulid::new())).collect();
        for id in &ids {
            store.store(context(&ledger, *id)).unwrap();
        }

        let listed = store.list_all();
        store.remove(ids[0]);

        assert_eq!(listed.len(), 3);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn concurrent_remove_has_exactly_one_winner() {
        let ledger = HandleLedger::new();
        let store = Arc::new(InMemoryContextStore::new());
        let task_id = TaskId::from_ulid(Ulid::new());
        store.store(context(&ledger, task_id)).unwrap();

        let winners: usize = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.remove(task_id).is_some())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| usize::from(h.join().unwrap()))
            .sum();

        assert_eq!(winners, 1);
    }
}
