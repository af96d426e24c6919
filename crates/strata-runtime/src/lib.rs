//! Task queue, worker pool and the jobs they carry.
#![forbid(unsafe_code)]

mod job;
mod pool;
mod task_queue;

pub use job::{Cmd, Job, JobError, JobKey, JobOut, WorkerCtx, process_job};
pub use pool::{JobHandler, PoolStats, WorkerPool};
pub use task_queue::TaskQueue;
