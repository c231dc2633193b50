//! Emulated data-parallel execution backend.
//!
//! The pipeline is written against a two-level model:
//!
//! | Level | Emulation | Synchronization |
//! |-------|-----------|-----------------|
//! | Device | rayon thread pool | stage boundary (all groups complete) |
//! | Work group | one rayon task per group | [`LocalBuffer::barrier`] between phases |
//! | Lane | loop iteration inside the group task | none within a phase |
//!
//! Groups never synchronize with each other inside a stage. Ordering across
//! groups comes only from finishing one dispatch before starting the next.

pub mod group;

pub use group::{dispatch_groups, dispatch_groups_mut, LocalBuffer, WorkGroup};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{EqualizeError, Result};

/// Execution device: a worker pool plus the largest group it can run.
pub struct Backend {
    pool: Option<ThreadPool>,
    max_group_size: usize,
}

impl Backend {
    /// Create a backend.
    ///
    /// # Arguments
    /// * `max_group_size` - Maximum lanes per work group (the segment width)
    /// * `threads` - Dedicated worker count, or `None` to share rayon's global pool
    pub fn new(max_group_size: usize, threads: Option<usize>) -> Result<Self> {
        if max_group_size == 0 {
            return Err(EqualizeError::InvalidConfig(
                "maximum group size must be non-zero".into(),
            ));
        }

        let pool = match threads {
            Some(0) => {
                return Err(EqualizeError::InvalidConfig(
                    "worker thread count must be non-zero".into(),
                ))
            }
            Some(n) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("histeq-worker-{i}"))
                    .build()?,
            ),
            None => None,
        };

        Ok(Self { pool, max_group_size })
    }

    pub fn max_group_size(&self) -> usize {
        self.max_group_size
    }

    /// Number of workers available to a dispatch.
    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Run a sequence of stages on this backend's workers.
    pub fn run<R, F>(&self, stages: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(stages),
            None => stages(),
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("threads", &self.threads())
            .field("max_group_size", &self.max_group_size)
            .finish()
    }
}
