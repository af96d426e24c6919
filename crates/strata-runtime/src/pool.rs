use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use hashbrown::{HashMap, HashSet};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::job::{Job, JobError, JobKey, JobOut, WorkerCtx, process_job};

/// Function each worker runs per job.
pub type JobHandler = fn(&mut WorkerCtx, Job) -> Result<Option<JobOut>, JobError>;

struct Dispatch {
    job: Job,
    // broadcasts do not occupy the worker slot
    tracked: bool,
}

struct Report {
    worker: usize,
    key: JobKey,
    tracked: bool,
    result: Result<Option<JobOut>, JobError>,
}

struct WorkerSlot {
    tx: Sender<Dispatch>,
    busy: Option<JobKey>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub idle: usize,
    pub pending_specific: usize,
    pub pending_general: usize,
    pub in_flight: usize,
    pub completed: u64,
    pub failed: u64,
}

/// Fixed set of background workers fed from a keyed "specific" queue and a
/// FIFO "general" queue.
///
/// Specific jobs are de-duplicated by [`JobKey`]: a newer job replaces the
/// pending one, and a key with a job in flight is held back until it
/// completes. Results are collected on the owning thread by [`update`].
///
/// [`update`]: WorkerPool::update
pub struct WorkerPool {
    workers: Vec<WorkerSlot>,
    res_rx: Receiver<Report>,
    specific: HashMap<JobKey, Job>,
    specific_order: VecDeque<JobKey>,
    general: VecDeque<Job>,
    inflight_specific: HashSet<JobKey>,
    in_flight: usize,
    completed: u64,
    failed: u64,
    _pool: Arc<ThreadPool>,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        Self::with_handler(worker_count, process_job)
    }

    pub fn with_handler(worker_count: usize, handler: JobHandler) -> Self {
        let worker_count = worker_count.max(1);
        let (res_tx, res_rx) = unbounded::<Report>();
        let pool = Arc::new(
            ThreadPoolBuilder::new()
                .num_threads(worker_count)
                .thread_name(|i| format!("strata-worker-{i}"))
                .build()
                .expect("worker pool"),
        );
        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let (tx, rx) = unbounded::<Dispatch>();
            let res_tx = res_tx.clone();
            pool.spawn(move || worker_loop(index, rx, res_tx, handler));
            workers.push(WorkerSlot { tx, busy: None });
        }
        log::info!(target: "worker", "worker pool started with {} workers", worker_count);
        Self {
            workers,
            res_rx,
            specific: HashMap::new(),
            specific_order: VecDeque::new(),
            general: VecDeque::new(),
            inflight_specific: HashSet::new(),
            in_flight: 0,
            completed: 0,
            failed: 0,
            _pool: pool,
        }
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job that supersedes any pending job with the same key.
    pub fn queue_specific_job(&mut self, job: Job) {
        let key = job.key();
        if self.specific.insert(key, job).is_some() {
            log::trace!(target: "worker", "superseded pending {:?}", key);
        } else {
            self.specific_order.push_back(key);
        }
    }

    pub fn queue_general_job(&mut self, job: Job) {
        self.general.push_back(job);
    }

    /// Send `job` to every worker now, ahead of anything queued later.
    pub fn broadcast(&mut self, job: Job) {
        for (i, w) in self.workers.iter().enumerate() {
            if w
                .tx
                .send(Dispatch {
                    job: job.clone(),
                    tracked: false,
                })
                .is_err()
            {
                log::warn!(target: "worker", "worker {} is gone; broadcast dropped", i);
            }
        }
    }

    /// Collect finished jobs and hand queued jobs to idle workers. Each
    /// successful job is returned exactly once.
    pub fn update(&mut self) -> Vec<JobOut> {
        let mut out = Vec::new();
        while let Ok(report) = self.res_rx.try_recv() {
            self.on_report(report, &mut out);
        }
        self.dispatch();
        out
    }

    /// Like [`update`](Self::update), but when work is in flight and nothing
    /// has finished yet, waits up to `timeout` for the first result.
    pub fn update_blocking(&mut self, timeout: Duration) -> Vec<JobOut> {
        self.dispatch();
        let mut out = Vec::new();
        if self.in_flight > 0 {
            match self.res_rx.recv_timeout(timeout) {
                Ok(report) => self.on_report(report, &mut out),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!(target: "worker", "all workers disconnected");
                }
            }
        }
        out.extend(self.update());
        out
    }

    /// Nothing queued and nothing running.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.specific.is_empty() && self.general.is_empty()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers.len(),
            idle: self.workers.iter().filter(|w| w.busy.is_none()).count(),
            pending_specific: self.specific.len(),
            pending_general: self.general.len(),
            in_flight: self.in_flight,
            completed: self.completed,
            failed: self.failed,
        }
    }

    fn on_report(&mut self, report: Report, out: &mut Vec<JobOut>) {
        if report.tracked {
            if let Some(slot) = self.workers.get_mut(report.worker) {
                slot.busy = None;
            }
            self.in_flight = self.in_flight.saturating_sub(1);
            self.inflight_specific.remove(&report.key);
        }
        match report.result {
            Ok(Some(res)) => {
                self.completed += 1;
                out.push(res);
            }
            Ok(None) => {}
            Err(err) => {
                self.failed += 1;
                log::warn!(
                    target: "worker",
                    "worker {} dropped {:?}: {}",
                    report.worker,
                    report.key,
                    err
                );
            }
        }
    }

    fn next_job(&mut self) -> Option<(Job, bool)> {
        let mut deferred = 0;
        while deferred < self.specific_order.len() {
            let Some(key) = self.specific_order.pop_front() else {
                break;
            };
            if self.inflight_specific.contains(&key) {
                self.specific_order.push_back(key);
                deferred += 1;
                continue;
            }
            if let Some(job) = self.specific.remove(&key) {
                return Some((job, true));
            }
        }
        self.general.pop_front().map(|job| (job, false))
    }

    fn dispatch(&mut self) {
        for i in 0..self.workers.len() {
            if self.workers[i].busy.is_some() {
                continue;
            }
            let Some((job, specific)) = self.next_job() else {
                return;
            };
            let key = job.key();
            if self.workers[i]
                .tx
                .send(Dispatch { job, tracked: true })
                .is_err()
            {
                self.failed += 1;
                log::warn!(target: "worker", "worker {} is gone; {:?} dropped", i, key);
                continue;
            }
            if specific {
                self.inflight_specific.insert(key);
            }
            self.workers[i].busy = Some(key);
            self.in_flight += 1;
        }
    }
}

fn worker_loop(index: usize, rx: Receiver<Dispatch>, tx: Sender<Report>, handler: JobHandler) {
    let mut ctx = WorkerCtx::new(index);
    while let Ok(Dispatch { job, tracked }) = rx.recv() {
        let key = job.key();
        let cmd = job.cmd();
        let result = catch_unwind(AssertUnwindSafe(|| handler(&mut ctx, job))).unwrap_or_else(
            |payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(JobError::Panicked { cmd, message })
            },
        );
        if tx
            .send(Report {
                worker: index,
                key,
                tracked,
                result,
            })
            .is_err()
        {
            break;
        }
    }
}
