//! A worker thread bound to a primary priority and an ordered fallback list
//! (spec.md §4.7). Grounded on `thread_worker.h`/`.cpp`'s
//! mutex+condition_variable+atomic-stop-flag shape, rendered with
//! `std::sync::{Condvar, Mutex}` and a `std::thread::JoinHandle`.

use crate::pool::JobPool;
use crate::priority::Priority;
use meshwire_support::logging::{self, Logger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

struct Signal {
    mutex: Mutex<()>,
    condvar: Condvar,
    stop: AtomicBool,
}

/// Owns one OS thread that repeatedly waits for work matching its
/// `(primary, fallbacks)` service set, pops a job, and runs it outside any
/// lock. Jobs in flight are never forcibly cancelled.
pub struct Worker {
    primary: Priority,
    fallbacks: Vec<Priority>,
    signal: Arc<Signal>,
    handle: Mutex<Option<JoinHandle<()>>>,
    log: Logger,
}

impl Worker {
    pub fn new(primary: Priority, fallbacks: Vec<Priority>, log: Logger) -> Worker {
        Worker {
            primary,
            fallbacks,
            signal: Arc::new(Signal { mutex: Mutex::new(()), condvar: Condvar::new(), stop: AtomicBool::new(false) }),
            handle: Mutex::new(None),
            log,
        }
    }

    pub fn priority(&self) -> Priority {
        self.primary
    }

    /// Registers the worker as a pool notifier, then spawns its thread.
    /// `pool` must outlive the worker (callers hold it in an `Arc`).
    pub fn start(&self, pool: Arc<JobPool>) {
        let signal = self.signal.clone();
        let primary = self.primary;
        let fallbacks = self.fallbacks.clone();

        pool.append_notification({
            let signal = signal.clone();
            move |priority| {
                if priority == primary || fallbacks.contains(&priority) {
                    let _guard = signal.mutex.lock().unwrap();
                    signal.condvar.notify_one();
                }
            }
        });

        let fallbacks = self.fallbacks.clone();
        let log = self.log.clone();
        let handle = std::thread::spawn(move || {
            logging::debug!(log, "worker started"; "priority" => ?primary);
            loop {
                {
                    let mut guard = signal.mutex.lock().unwrap();
                    while !signal.stop.load(Ordering::SeqCst) && !pool.contains(primary, &fallbacks) {
                        guard = signal.condvar.wait(guard).unwrap();
                    }
                }

                if signal.stop.load(Ordering::SeqCst) {
                    break;
                }

                if let Some(job) = pool.pop(primary, &fallbacks) {
                    job.run();
                }
            }
            logging::debug!(log, "worker stopped"; "priority" => ?primary);
        });

        *self.handle.lock().unwrap() = Some(handle);
    }

    /// Signals the worker to stop after its current job (if any) completes,
    /// and joins the thread.
    pub fn stop(&self) {
        self.signal.stop.store(true, Ordering::SeqCst);
        {
            let _guard = self.signal.mutex.lock().unwrap();
            self.signal.condvar.notify_one();
        }
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn worker_services_its_matching_priority() {
        let pool = Arc::new(JobPool::new(logging::discard()));
        let worker = Worker::new(Priority::High, vec![], logging::discard());
        worker.start(pool.clone());

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        pool.push(Job::new(Priority::High, None, move |_| {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        }));

        std::thread::sleep(Duration::from_millis(100));
        worker.stop();

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn worker_ignores_non_matching_priority() {
        let pool = Arc::new(JobPool::new(logging::discard()));
        let worker = Worker::new(Priority::High, vec![], logging::discard());
        worker.start(pool.clone());

        pool.push(Job::new(Priority::Low, None, |_| {}));
        std::thread::sleep(Duration::from_millis(50));

        assert!(pool.contains(Priority::Low, &[]));
        worker.stop();
    }
}
