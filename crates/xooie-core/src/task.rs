//! Deferred task queue.
//!
//! Work that must happen "after the current call returns" (settling a widget
//! whose constructor chain is still pending, re-polling a countdown) is posted
//! here. Each call to [`TaskQueue::run_turn`] models one turn of the event
//! loop: only tasks that were queued before the turn started run, so a task
//! that re-posts itself yields until the next turn.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::TaskError;

/// A unique identifier for a deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Get the raw u64 value of this task ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Global counter for generating unique task IDs.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> TaskId {
    TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

/// A boxed task closure.
type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

struct TaskData {
    id: TaskId,
    task: BoxedTask,
}

/// A thread-safe FIFO of deferred tasks.
///
/// Tasks never run while the queue lock is held, so a running task may post
/// or cancel other tasks.
#[derive(Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<TaskData>>,
}

impl TaskQueue {
    /// Create an empty task queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a task to run on a later turn.
    pub fn post<F>(&self, task: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = next_task_id();
        self.tasks.lock().push_back(TaskData {
            id,
            task: Box::new(task),
        });
        tracing::trace!(target: "xooie_core::task", task_id = id.as_u64(), "posted task");
        id
    }

    /// Cancel a pending task.
    pub fn cancel(&self, id: TaskId) -> Result<(), TaskError> {
        let mut tasks = self.tasks.lock();
        match tasks.iter().position(|t| t.id == id) {
            Some(pos) => {
                tasks.remove(pos);
                Ok(())
            }
            None => Err(TaskError::UnknownTask),
        }
    }

    /// Check if there are any pending tasks.
    pub fn has_pending(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    /// Get the number of pending tasks.
    pub fn pending_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Run one turn: every task queued before this call, in FIFO order.
    ///
    /// Returns the number of tasks run.
    #[tracing::instrument(skip(self), target = "xooie_core::task", level = "trace")]
    pub fn run_turn(&self) -> usize {
        let batch: Vec<TaskData> = self.tasks.lock().drain(..).collect();
        let count = batch.len();
        for task_data in batch {
            (task_data.task)();
        }
        count
    }

    /// Run turns until the queue is empty or `max_turns` turns have run.
    ///
    /// Returns the number of turns that ran at least one task.
    pub fn run_until_idle(&self, max_turns: usize) -> usize {
        let mut turns = 0;
        while turns < max_turns && self.run_turn() > 0 {
            turns += 1;
        }
        turns
    }
}
