//! Process group launch and shared state.

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

use super::mailbox::Mailbox;
use super::window::{RegionSlot, WindowId};
use super::Communicator;
use crate::usage_violation;

/// State shared by every rank of one process group.
///
/// ```rust
/// use dranges::Fabric;
///
/// let ranks = Fabric::run(3, |comm| comm.rank() * 10);
/// assert_eq!(ranks, vec![0, 10, 20]);
/// ```
pub struct Fabric {
    size: usize,
    mailboxes: Vec<CachePadded<Mailbox>>,
    barrier: Barrier,
    contexts: Vec<CachePadded<AtomicBool>>,
    regions: Mutex<HashMap<WindowId, Vec<Option<RegionSlot>>>>,
}

impl Fabric {
    /// Creates a process group of `size` ranks.
    ///
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Arc<Self> {
        if size == 0 {
            usage_violation!("a process group needs at least one rank");
        }
        Arc::new(Self {
            size,
            mailboxes: (0..size).map(|_| CachePadded::new(Mailbox::new())).collect(),
            barrier: Barrier::new(size),
            contexts: (0..size).map(|_| CachePadded::new(AtomicBool::new(false))).collect(),
            regions: Mutex::new(HashMap::new()),
        })
    }

    /// Number of ranks.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Handle for `rank`. Each rank must use exactly one thread at a time.
    pub fn communicator(self: &Arc<Self>, rank: usize) -> Communicator {
        if rank >= self.size {
            usage_violation!("rank {rank} outside a group of {}", self.size);
        }
        Communicator::new(Arc::clone(self), rank)
    }

    /// Runs `program` once per rank, each on its own thread, and returns the
    /// results in rank order.
    ///
    /// A panic on any rank is re-raised here once every rank has finished.
    /// Ranks blocked on a peer that panicked never finish.
    pub fn run<R, F>(size: usize, program: F) -> Vec<R>
    where
        R: Send,
        F: Fn(Communicator) -> R + Sync,
    {
        let fabric = Fabric::new(size);
        tracing::debug!(size, "launching ranks");
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let comm = fabric.communicator(rank);
                    let program = &program;
                    std::thread::Builder::new()
                        .name(format!("rank-{rank}"))
                        .spawn_scoped(scope, move || program(comm))
                        .unwrap_or_else(|err| panic!("failed to launch rank {rank}: {err}"))
                })
                .collect();

            let mut results = Vec::with_capacity(size);
            let mut failure = None;
            for handle in handles {
                match handle.join() {
                    Ok(result) => results.push(result),
                    Err(payload) => {
                        failure.get_or_insert(payload);
                    }
                }
            }
            if let Some(payload) = failure {
                std::panic::resume_unwind(payload);
            }
            results
        })
    }

    #[inline]
    pub(crate) fn mailbox(&self, rank: usize) -> &Mailbox {
        &self.mailboxes[rank]
    }

    #[inline]
    pub(crate) fn wait(&self) {
        self.barrier.wait();
    }

    /// Marks `rank` as having a live context; `false` if it already has one.
    pub(crate) fn claim_context(&self, rank: usize) -> bool {
        self.contexts[rank]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_context(&self, rank: usize) {
        self.contexts[rank].store(false, Ordering::Release);
    }

    /// Records `slot` as `rank`'s memory for window `id`.
    pub(crate) fn register_slot(&self, id: WindowId, rank: usize, slot: RegionSlot) {
        let mut regions = self.regions.lock();
        let slots = regions.entry(id).or_insert_with(|| vec![None; self.size]);
        slots[rank] = Some(slot);
    }

    /// Snapshot of every rank's slot for window `id`; missing ranks are empty.
    pub(crate) fn slots(&self, id: WindowId) -> Vec<RegionSlot> {
        let regions = self.regions.lock();
        match regions.get(&id) {
            Some(slots) => slots.iter().map(|s| s.unwrap_or(RegionSlot::EMPTY)).collect(),
            None => vec![RegionSlot::EMPTY; self.size],
        }
    }

    /// Drops `rank`'s slot of window `id`, and the window once all are gone.
    pub(crate) fn release_slot(&self, id: WindowId, rank: usize) {
        let mut regions = self.regions.lock();
        if let Some(slots) = regions.get_mut(&id) {
            slots[rank] = None;
            if slots.iter().all(Option::is_none) {
                regions.remove(&id);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn open_windows(&self) -> usize {
        self.regions.lock().len()
    }
}

impl core::fmt::Debug for Fabric {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Fabric").field("size", &self.size).finish_non_exhaustive()
    }
}
