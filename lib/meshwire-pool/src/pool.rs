//! Mutex-protected, priority-keyed FIFO job queues (spec.md §4.6). Grounded
//! directly on `job_pool.cpp`'s `push`/`pop`/`contain`/`append_notification`
//! quartet, rendered with `std::sync::Mutex` in place of the original's
//! `scoped_lock`, and `hashbrown::HashMap` in place of its `map<priorities,
//! queue<job>>`.

use crate::job::Job;
use crate::priority::Priority;
use hashbrown::HashMap;
use meshwire_support::logging::{self, Logger};
use std::collections::VecDeque;
use std::sync::Mutex;

type Notifier = Box<dyn Fn(Priority) + Send + Sync>;

struct Inner {
    queues: HashMap<Priority, VecDeque<Job>>,
    notifiers: Vec<Notifier>,
    locked: bool,
}

/// The pool's push/pop/contains surface, guarded by a single mutex — the
/// only shared mutable structure in the fabric (spec.md §5).
pub struct JobPool {
    inner: Mutex<Inner>,
    log: Logger,
}

impl JobPool {
    pub fn new(log: Logger) -> JobPool {
        JobPool {
            inner: Mutex::new(Inner { queues: HashMap::new(), notifiers: Vec::new(), locked: false }),
            log,
        }
    }

    /// Appends `job` to its priority's queue and fires every registered
    /// notifier. Silently dropped if the pool is locked for teardown.
    pub fn push(&self, job: Job) -> bool {
        let priority = job.priority();

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.locked {
                logging::debug!(self.log, "push rejected: pool locked"; "priority" => ?priority);
                return false;
            }
            inner.queues.entry(priority).or_insert_with(VecDeque::new).push_back(job);
        }

        self.notify(priority);
        true
    }

    fn notify(&self, priority: Priority) {
        // Snapshot is unnecessary here since notifiers are never removed,
        // but the lock is still released before invoking them: a notifier
        // may itself call back into the pool (e.g. a worker's wake closure
        // calling `contains`), and holding the pool's mutex across that
        // call would deadlock a single-threaded caller against itself.
        let notifiers_len = {
            let inner = self.inner.lock().unwrap();
            inner.notifiers.len()
        };
        for i in 0..notifiers_len {
            let inner = self.inner.lock().unwrap();
            let notifier = &inner.notifiers[i];
            notifier(priority);
        }
    }

    /// Returns the head of `primary`'s queue, or the head of the first
    /// non-empty fallback queue, in order. No intrinsic priority ordering.
    pub fn pop(&self, primary: Priority, fallbacks: &[Priority]) -> Option<Job> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(job) = inner.queues.get_mut(&primary).and_then(VecDeque::pop_front) {
            return Some(job);
        }
        for fallback in fallbacks {
            if let Some(job) = inner.queues.get_mut(fallback).and_then(VecDeque::pop_front) {
                return Some(job);
            }
        }
        None
    }

    /// Non-destructive predicate with identical semantics to `pop`.
    pub fn contains(&self, primary: Priority, fallbacks: &[Priority]) -> bool {
        let inner = self.inner.lock().unwrap();
        let has = |p: &Priority| inner.queues.get(p).map(|q| !q.is_empty()).unwrap_or(false);
        has(&primary) || fallbacks.iter().any(has)
    }

    pub fn append_notification<F>(&self, f: F)
    where
        F: Fn(Priority) + Send + Sync + 'static,
    {
        self.inner.lock().unwrap().notifiers.push(Box::new(f));
    }

    /// Locks the pool against new pushes; used during teardown to drain
    /// in-flight work without accepting more (spec.md §5).
    pub fn lock_for_teardown(&self) {
        self.inner.lock().unwrap().locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock().unwrap().locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn pop_prefers_primary_over_fallback() {
        let pool = JobPool::new(logging::discard());
        pool.push(Job::new(Priority::Low, None, |_| {}));
        pool.push(Job::new(Priority::High, None, |_| {}));

        let job = pool.pop(Priority::High, &[Priority::Low]).unwrap();
        assert_eq!(job.priority(), Priority::High);
    }

    #[test]
    fn pop_falls_back_in_caller_order() {
        let pool = JobPool::new(logging::discard());
        pool.push(Job::new(Priority::Low, None, |_| {}));

        let job = pool.pop(Priority::Normal, &[Priority::Low, Priority::High]).unwrap();
        assert_eq!(job.priority(), Priority::Low);
    }

    #[test]
    fn push_after_lock_is_dropped() {
        let pool = JobPool::new(logging::discard());
        pool.lock_for_teardown();
        assert!(!pool.push(Job::new(Priority::High, None, |_| {})));
        assert!(!pool.contains(Priority::High, &[]));
    }

    #[test]
    fn notifiers_fire_on_matching_push() {
        let pool = JobPool::new(logging::discard());
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        pool.append_notification(move |p| {
            if p == Priority::High {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        pool.push(Job::new(Priority::High, None, |_| {}));
        pool.push(Job::new(Priority::Low, None, |_| {}));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn contains_is_non_destructive() {
        let pool = JobPool::new(logging::discard());
        pool.push(Job::new(Priority::High, None, |_| {}));
        assert!(pool.contains(Priority::High, &[]));
        assert!(pool.contains(Priority::High, &[]));
        assert!(pool.pop(Priority::High, &[]).is_some());
    }
}
