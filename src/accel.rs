//! The accelerator queue.
//!
//! Device-mode contexts offload per-segment work and copies to a dedicated
//! worker pool. Every entry point blocks until the submitted work has
//! finished, so no asynchronous completion ever escapes to callers. Built
//! without the `accelerator` feature, the queue runs the same work inline on
//! the calling thread with identical results.

#[cfg(feature = "accelerator")]
use rayon::prelude::*;

#[cfg(feature = "accelerator")]
use crate::error::DrError;
use crate::error::Result;

/// Elements per work item for offloaded copies.
#[cfg(feature = "accelerator")]
const COPY_CHUNK: usize = 4096;

/// A blocking work queue standing in for an accelerator device.
pub struct Accelerator {
    #[cfg(feature = "accelerator")]
    pool: rayon::ThreadPool,
    threads: usize,
}

impl Accelerator {
    /// Creates a queue with `threads` workers (`0` picks the default width).
    ///
    /// # Errors
    /// Returns [`DrError::Accelerator`] if the workers cannot be started.
    pub fn new(threads: usize) -> Result<Self> {
        #[cfg(feature = "accelerator")]
        {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("accel-{i}"))
                .build()
                .map_err(|err| DrError::Accelerator(err.to_string()))?;
            let threads = pool.current_num_threads();
            tracing::debug!(threads, "accelerator queue started");
            Ok(Self { pool, threads })
        }
        #[cfg(not(feature = "accelerator"))]
        {
            tracing::warn!("built without the `accelerator` feature; device work runs inline");
            Ok(Self { threads: threads.max(1) })
        }
    }

    /// Number of workers.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Applies `op` to every item and waits for completion.
    pub fn for_each<I, F>(&self, items: I, op: F)
    where
        I: Iterator + Send,
        I::Item: Send,
        F: Fn(I::Item) + Sync + Send,
    {
        #[cfg(feature = "accelerator")]
        self.pool.install(|| items.par_bridge().for_each(op));
        #[cfg(not(feature = "accelerator"))]
        items.for_each(op);
    }

    /// Folds every item with `op`; `None` when there are no items.
    ///
    /// `op` must be associative and commutative: the combination order is
    /// unspecified.
    pub fn reduce<I, F>(&self, items: I, op: F) -> Option<I::Item>
    where
        I: Iterator + Send,
        I::Item: Send,
        F: Fn(I::Item, I::Item) -> I::Item + Sync + Send,
    {
        #[cfg(feature = "accelerator")]
        let folded = self.pool.install(|| items.par_bridge().reduce_with(op));
        #[cfg(not(feature = "accelerator"))]
        let folded = items.reduce(op);
        folded
    }

    /// Copies `src` into `dst` on the queue and waits for completion.
    pub fn copy<T: Copy + Send + Sync>(&self, src: &[T], dst: &mut [T]) {
        debug_assert_eq!(src.len(), dst.len());
        #[cfg(feature = "accelerator")]
        self.pool.install(|| {
            dst.par_chunks_mut(COPY_CHUNK)
                .zip(src.par_chunks(COPY_CHUNK))
                .for_each(|(d, s)| d.copy_from_slice(s));
        });
        #[cfg(not(feature = "accelerator"))]
        dst.copy_from_slice(src);
    }
}

impl core::fmt::Debug for Accelerator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Accelerator").field("threads", &self.threads).finish()
    }
}
