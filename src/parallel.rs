//! Bounded, order-preserving fan-out.
//!
//! Work runs on a dedicated rayon pool with a fixed number of threads.
//! Results come back in input order, so output files are deterministic no
//! matter how the work was scheduled.

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::LabelkitError;

/// Workers used for annotations within one task.
pub const ANNOTATION_WORKERS: usize = 8;

/// Workers used for image overlay rendering.
pub const IMAGE_WORKERS: usize = 4;

/// A fixed-size worker pool.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, LabelkitError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("labelkit-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn for_annotations() -> Result<Self, LabelkitError> {
        Self::new(ANNOTATION_WORKERS)
    }

    pub fn for_images() -> Result<Self, LabelkitError> {
        Self::new(IMAGE_WORKERS)
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Applies `f` to every item and returns the results in input order.
    pub fn map_ordered<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(f).collect())
    }
}
