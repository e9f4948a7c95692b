use crate::config::WorkerSettings;
use crate::error::{GachaError, GachaResult};
use log::{error, info};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Dedicated rayon pool for Monte Carlo trials.
#[derive(Clone)]
pub struct TrialWorker {
    pool: Arc<ThreadPool>,
    num_threads: usize,
    chunk_size: usize,
}

impl TrialWorker {
    pub fn new(settings: &WorkerSettings) -> GachaResult<Self> {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let mut num_threads = if cores > settings.reserve_cores {
            cores - settings.reserve_cores
        } else {
            1
        };
        if settings.max_threads > 0 && num_threads > settings.max_threads {
            num_threads = settings.max_threads;
        }
        let stack_size = if settings.stack_size_mb == 0 {
            4 * 1024 * 1024
        } else {
            settings.stack_size_mb * 1024 * 1024
        };
        Self::build_pool(num_threads, stack_size, settings.chunk_size.max(1))
    }

    /// Pool with an explicit thread count and default stack size.
    pub fn with_threads(num_threads: usize) -> GachaResult<Self> {
        let settings = WorkerSettings::default();
        let stack_size = settings.stack_size_mb * 1024 * 1024;
        Self::build_pool(num_threads.max(1), stack_size, settings.chunk_size)
    }

    fn build_pool(num_threads: usize, stack_size: usize, chunk_size: usize) -> GachaResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("trial-worker-{}", i))
            .stack_size(stack_size)
            .panic_handler(|err| {
                error!("Worker thread panicked: {:?}", err);
            })
            .build()
            .map_err(|e| GachaError::Worker(format!("failed to build worker pool: {}", e)))?;

        info!("Worker initialized with {} threads.", num_threads);

        Ok(Self {
            pool: Arc::new(pool),
            num_threads,
            chunk_size,
        })
    }

    /// Runs `f` inside the pool; a panic is caught and returned as an error.
    pub fn execute<F, R>(&self, f: F) -> GachaResult<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        let result = self
            .pool
            .install(|| panic::catch_unwind(AssertUnwindSafe(f)));

        result.map_err(|err| {
            let msg = if let Some(s) = err.downcast_ref::<&str>() {
                format!("Task panicked: {}", s)
            } else if let Some(s) = err.downcast_ref::<String>() {
                format!("Task panicked: {}", s)
            } else {
                "Task panicked with unknown error".to_string()
            };
            GachaError::Worker(msg)
        })
    }

    pub fn thread_count(&self) -> usize {
        self.num_threads
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn execute_runs_parallel_work() {
        let worker = TrialWorker::with_threads(2).unwrap();
        assert_eq!(worker.thread_count(), 2);
        let total: u64 = worker
            .execute(|| (0..1000u64).into_par_iter().sum())
            .unwrap();
        assert_eq!(total, 499_500);
    }

    #[test]
    fn execute_captures_panics() {
        let worker = TrialWorker::with_threads(1).unwrap();
        let res: GachaResult<()> = worker.execute(|| panic!("boom"));
        match res {
            Err(GachaError::Worker(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected result: {:?}", other.is_ok()),
        }
    }

    #[test]
    fn settings_cap_thread_count() {
        let settings = WorkerSettings {
            max_threads: 1,
            reserve_cores: 0,
            stack_size_mb: 2,
            chunk_size: 0,
        };
        let worker = TrialWorker::new(&settings).unwrap();
        assert_eq!(worker.thread_count(), 1);
        assert_eq!(worker.chunk_size(), 1);
    }
}
