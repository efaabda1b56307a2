//! A unit of deferred work (spec.md §3.3): a priority class, an optional
//! byte payload, and an execution callback. Jobs are owned by the queue
//! that holds them until popped by a worker.

use crate::priority::Priority;

pub struct Job {
    priority: Priority,
    payload: Option<Vec<u8>>,
    callback: Box<dyn FnOnce(Option<Vec<u8>>) + Send>,
}

impl Job {
    pub fn new<F>(priority: Priority, payload: Option<Vec<u8>>, callback: F) -> Job
    where
        F: FnOnce(Option<Vec<u8>>) + Send + 'static,
    {
        Job { priority, payload, callback: Box::new(callback) }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Runs the job's callback, consuming it. Called by a worker outside
    /// the pool's mutex (spec.md §4.7).
    pub fn run(self) {
        (self.callback)(self.payload)
    }
}
