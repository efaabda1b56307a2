//! Priority job pool and worker threads (spec.md §3.3, §3.4, §4.6, §4.7):
//! the process-internal scheduling layer that decouples frame arrival from
//! decode/dispatch work.

pub mod job;
pub mod pool;
pub mod priority;
pub mod worker;

pub use job::Job;
pub use pool::JobPool;
pub use priority::Priority;
pub use worker::Worker;
