//! TimeoutSupervisor - タスクごとの settlement 期限
//!
//! # 状態（タスクごと）
//! - `Armed -> Fired`（終端）: 期限切れ。登録されたコールバックを 1 回実行
//! - `Armed -> Cancelled`（終端）: settle 側から解除
//!
//! キャンセルは最適化にすぎません。二重 settlement を防ぐのは
//! ContextStore の atomic な `remove` であり、キャンセルが競合に負けても
//! 遅れて発火したコールバックは no-op になります。

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::TaskId;

struct ArmedTimer {
    seq: u64,
    handle: JoinHandle<()>,
}

type TimerMap = HashMap<TaskId, ArmedTimer>;

/// One-shot deadlines keyed by task id.
///
/// Timers run as tokio tasks, so [`arm`](Self::arm) must be called from
/// within a tokio runtime.
#[derive(Default)]
pub struct TimeoutSupervisor {
    timers: Arc<Mutex<TimerMap>>,
    next_seq: AtomicU64,
}

fn lock(timers: &Mutex<TimerMap>) -> MutexGuard<'_, TimerMap> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TimeoutSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_fire` to run once after `deadline`.
    ///
    /// Returns `false` (and schedules nothing) if the task already has an
    /// armed timer.
    pub fn arm<F>(&self, task_id: TaskId, deadline: Duration, on_fire: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut timers = lock(&self.timers);
        if timers.contains_key(&task_id) {
            return false;
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(&self.timers);
        // The entry is inserted before the lock is released, so the spawned
        // task can never observe the map without its own entry.
        let handle = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;

            let fired = {
                let mut timers = lock(&registry);
                match timers.get(&task_id) {
                    Some(timer) if timer.seq == seq => {
                        timers.remove(&task_id);
                        true
                    }
                    _ => false,
                }
            };
            if fired {
                tracing::trace!(task_id = %task_id, "settlement deadline fired");
                on_fire.await;
            }
        });

        timers.insert(task_id, ArmedTimer { seq, handle });
        tracing::trace!(task_id = %task_id, ?deadline, "settlement deadline armed");
        true
    }

    /// Disarm a task's timer. Returns `true` if a timer was still armed.
    pub fn cancel(&self, task_id: TaskId) -> bool {
        let removed = lock(&self.timers).remove(&task_id);
        match removed {
            Some(timer) => {
                timer.handle.abort();
                tracing::trace!(task_id = %task_id, "settlement deadline cancelled");
                true
            }
            None => false,
        }
    }

    /// Disarm every timer. Returns how many were armed.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<ArmedTimer> = lock(&self.timers).drain().map(|(_, t)| t).collect();
        for timer in &drained {
            timer.handle.abort();
        }
        drained.len()
    }

    pub fn is_armed(&self, task_id: TaskId) -> bool {
        lock(&self.timers).contains_key(&task_id)
    }

    pub fn armed_count(&self) -> usize {
        lock(&self.timers).len()
    }
}

impl Drop for TimeoutSupervisor {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use ulid::Ulid;

    fn counter_future(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn fires_once_after_deadline() {
        let supervisor = TimeoutSupervisor::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let task_id = TaskId::from_ulid(Ulid::new());

        assert!(supervisor.arm(task_id, Duration::from_millis(20), counter_future(&fired)));
        assert!(supervisor.is_armed(task_id));

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!supervisor.is_armed(task_id));
        // Fired is terminal.
        assert!(!supervisor.cancel(task_id));
    }

    #[tokio::test]
    async fn cancelled_timer_never_fires() {
        let supervisor = TimeoutSupervisor::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let task_id = TaskId::from_ulid(Ulid::new());

        supervisor.arm(task_id, Duration::from_millis(30), counter_future(&fired));
        assert!(supervisor.cancel(task_id));
        assert!(!supervisor.cancel(task_id));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(supervisor.armed_count(), 0);
    }

    #[tokio::test]
    async fn second_arm_for_same_task_is_refused() {
        let supervisor = TimeoutSupervisor::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let task_id = TaskId::from_ulid(Ulid::new());

        assert!(supervisor.arm(task_id, Duration::from_millis(20), counter_future(&fired)));
        assert!(!supervisor.arm(task_id, Duration::from_millis(20), counter_future(&fired)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_all_disarms_everything() {
        let supervisor = TimeoutSupervisor::new();
        let fired = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            supervisor.arm(
                TaskId::from_ulid(Ulid::new()),
                Duration::from_millis(30),
                counter_future(&fired),
            );
        }

        assert_eq!(supervisor.armed_count(), 3);
        assert_eq!(supervisor.cancel_all(), 3);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
