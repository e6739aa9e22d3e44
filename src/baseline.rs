//! CPU reference implementations.
//!
//! All three strategies evaluate [`Workload::compute_rows`]; they differ
//! only in how rows are spread over threads.  The serial result is the
//! ground truth every other implementation is checked against.

use std::time::{Duration, Instant};

use log::debug;
use rayon::prelude::*;

use crate::config::Config;
use crate::engine::partition;
use crate::error::Result;
use crate::workloads::Workload;

pub struct BaselineRunner {
    pool: rayon::ThreadPool,
    iterations: usize,
}

impl BaselineRunner {
    /// Build the fixed-size worker pool described by `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let prefix = config.thread_name_prefix.clone();
        let mut builder = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads())
            .thread_name(move |id| format!("{prefix}-{id}"));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        let pool = builder.build()?;
        debug!("baseline pool: {} threads", pool.current_num_threads());
        Ok(Self {
            pool,
            iterations: config.iterations.max(1),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Single-threaded loop over every row.
    pub fn run_serial(&self, workload: &dyn Workload) -> (Vec<f32>, Duration) {
        self.best_of(workload, |w, out| w.compute_rows(0, out))
    }

    /// Rayon parallel iterator over rows, on the global rayon pool.
    pub fn run_data_parallel(&self, workload: &dyn Workload) -> (Vec<f32>, Duration) {
        self.best_of(workload, |w, out| {
            let row_len = w.row_len();
            out.par_chunks_mut(row_len)
                .enumerate()
                .for_each(|(row, chunk)| w.compute_rows(row, chunk));
        })
    }

    /// One contiguous block of rows per worker of the fixed pool.
    pub fn run_thread_pool(&self, workload: &dyn Workload) -> (Vec<f32>, Duration) {
        let threads = self.threads();
        self.best_of(workload, |w, out| {
            let row_len = w.row_len();
            let blocks = partition(w.rows(), threads);
            self.pool.scope(|scope| {
                let mut rest = out;
                for block in blocks {
                    let (chunk, tail) = rest.split_at_mut(block.len() * row_len);
                    rest = tail;
                    if chunk.is_empty() {
                        continue;
                    }
                    scope.spawn(move |_| w.compute_rows(block.start, chunk));
                }
            });
        })
    }

    fn best_of<F>(&self, workload: &dyn Workload, run: F) -> (Vec<f32>, Duration)
    where
        F: Fn(&dyn Workload, &mut [f32]),
    {
        let mut out = vec![0.0; workload.output_len()];
        let mut best = Duration::MAX;
        for _ in 0..self.iterations {
            let start = Instant::now();
            run(workload, &mut out);
            best = best.min(start.elapsed());
        }
        (out, best)
    }
}

impl std::fmt::Debug for BaselineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaselineRunner")
            .field("threads", &self.threads())
            .field("iterations", &self.iterations)
            .finish()
    }
}
