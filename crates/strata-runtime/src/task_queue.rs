use std::collections::VecDeque;

/// FIFO of deferred owning-thread work, stored as batches.
///
/// A batch is atomic: it is never split across ticks and never interleaved
/// with another batch. There is no cancellation; everything queued runs.
#[derive(Debug)]
pub struct TaskQueue<T> {
    batches: VecDeque<Vec<T>>,
    queued: usize,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self {
            batches: VecDeque::new(),
            queued: 0,
        }
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, task: T) {
        self.queued += 1;
        self.batches.push_back(vec![task]);
    }

    pub fn add_tasks(&mut self, tasks: Vec<T>) {
        if tasks.is_empty() {
            return;
        }
        self.queued += tasks.len();
        self.batches.push_back(tasks);
    }

    /// Run up to `max_batches` batches in enqueue order (`0` = every batch
    /// queued when the call starts). Returns the number of tasks run.
    pub fn update(&mut self, max_batches: usize, mut run: impl FnMut(T)) -> usize {
        let available = self.batches.len();
        let limit = if max_batches == 0 {
            available
        } else {
            max_batches.min(available)
        };
        let mut ran = 0;
        for _ in 0..limit {
            let Some(batch) = self.batches.pop_front() else {
                break;
            };
            self.queued -= batch.len();
            for task in batch {
                run(task);
                ran += 1;
            }
        }
        ran
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queued
    }

    #[inline]
    pub fn batches(&self) -> usize {
        self.batches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Pending tasks in the order they will run.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.batches.iter().flatten()
    }
}
