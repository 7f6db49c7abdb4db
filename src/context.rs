//! The per-rank communication context.
//!
//! A [`Context`] bundles everything a rank needs to take part in distributed
//! operations: its communicator, the execution mode fixed at initialization,
//! the allocator and accelerator queue derived from it, and a registry of the
//! one-sided regions currently open on this rank.
//!
//! Containers borrow the context for their whole lifetime, so a context can
//! only be finalized once every container built on it is gone.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::accel::Accelerator;
use crate::alloc::Allocator;
use crate::comm::{Communicator, Window, WindowId};
use crate::config::{ContextConfig, ExecutionMode};
use crate::error::Result;
use crate::usage_violation;

/// Per-rank state shared by every container and algorithm.
pub struct Context {
    comm: Communicator,
    config: ContextConfig,
    allocator: Allocator,
    accelerator: Option<Arc<Accelerator>>,
    regions: RefCell<BTreeMap<WindowId, Weak<Window>>>,
    next_region: Cell<WindowId>,
}

impl Context {
    /// Initializes the context of `comm`'s rank.
    ///
    /// Panics if this rank already has a live context.
    ///
    /// # Errors
    /// Returns [`DrError::Accelerator`](crate::DrError::Accelerator) if device
    /// mode is requested and the accelerator queue cannot be started.
    pub fn init(comm: Communicator, config: ContextConfig) -> Result<Self> {
        let rank = comm.rank();
        if !comm.fabric().claim_context(rank) {
            usage_violation!("rank {rank} already has a live context");
        }
        let accelerator = match config.mode {
            ExecutionMode::Host => None,
            ExecutionMode::Device => match Accelerator::new(config.accelerator_threads) {
                Ok(accelerator) => Some(Arc::new(accelerator)),
                Err(err) => {
                    comm.fabric().release_context(rank);
                    return Err(err);
                }
            },
        };
        tracing::debug!(rank = comm.rank(), size = comm.size(), mode = ?config.mode, "context initialized");
        Ok(Self {
            allocator: Allocator::new(config.mode, accelerator.clone()),
            comm,
            config,
            accelerator,
            regions: RefCell::new(BTreeMap::new()),
            next_region: Cell::new(0),
        })
    }

    /// Initializes a context configured from the environment.
    ///
    /// # Errors
    /// See [`ContextConfig::from_env`] and [`Context::init`].
    pub fn from_env(comm: Communicator) -> Result<Self> {
        Self::init(comm, ContextConfig::from_env()?)
    }

    /// Runs `f` with a fresh context and finalizes it afterwards.
    ///
    /// # Errors
    /// See [`Context::init`].
    pub fn scope<R>(comm: Communicator, config: ContextConfig, f: impl FnOnce(&Context) -> R) -> Result<R> {
        let ctx = Self::init(comm, config)?;
        let out = f(&ctx);
        ctx.finalize();
        Ok(out)
    }

    /// Tears the context down. Collective: returns once every rank finalized.
    pub fn finalize(self) {
        self.comm.barrier();
        tracing::debug!(rank = self.rank(), "context finalized");
    }

    /// This rank.
    #[inline]
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Number of ranks.
    #[inline]
    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// The underlying communicator.
    #[inline]
    pub fn comm(&self) -> &Communicator {
        &self.comm
    }

    /// The configuration this context was initialized with.
    #[inline]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Execution mode fixed at initialization.
    #[inline]
    pub fn mode(&self) -> ExecutionMode {
        self.config.mode
    }

    /// Allocator dispatching on [`Context::mode`].
    #[inline]
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// The accelerator queue; present exactly in device mode.
    #[inline]
    pub fn accelerator(&self) -> Option<&Accelerator> {
        self.accelerator.as_deref()
    }

    /// Blocks until every rank reaches the barrier.
    pub fn barrier(&self) {
        self.comm.barrier();
    }

    /// Fences every open region; a no-op when none is open.
    ///
    /// Collective over the ranks that share the open regions.
    pub fn fence(&self) {
        let open: Vec<Rc<Window>> = self.regions.borrow().values().filter_map(Weak::upgrade).collect();
        for window in open {
            window.fence();
        }
    }

    /// Number of regions currently registered.
    pub fn open_regions(&self) -> usize {
        self.regions.borrow().len()
    }

    /// Next region identifier. Every rank creates regions in the same order,
    /// so identifiers agree across ranks.
    pub(crate) fn next_region_id(&self) -> WindowId {
        let id = self.next_region.get();
        self.next_region.set(id + 1);
        id
    }

    pub(crate) fn register_region(&self, window: &Rc<Window>) {
        self.regions.borrow_mut().insert(window.id(), Rc::downgrade(window));
    }

    pub(crate) fn unregister_region(&self, id: WindowId) {
        self.regions.borrow_mut().remove(&id);
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.comm.fabric().release_context(self.rank());
    }
}

impl core::fmt::Debug for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Context")
            .field("rank", &self.rank())
            .field("size", &self.size())
            .field("mode", &self.mode())
            .field("open_regions", &self.open_regions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fabric;

    #[test]
    fn init_and_finalize_on_every_rank() {
        let out = Fabric::run(3, |comm| {
            let ctx = Context::init(comm, ContextConfig::host()).unwrap();
            let seen = (ctx.rank(), ctx.size(), ctx.accelerator().is_none());
            ctx.finalize();
            seen
        });
        assert_eq!(out, vec![(0, 3, true), (1, 3, true), (2, 3, true)]);
    }

    #[test]
    fn device_mode_starts_an_accelerator() {
        Fabric::run(1, |comm| {
            let ctx = Context::init(comm, ContextConfig::device(2)).unwrap();
            assert_eq!(ctx.mode(), ExecutionMode::Device);
            assert!(ctx.accelerator().is_some());
        });
    }

    #[test]
    fn reinit_after_finalize_is_allowed() {
        Fabric::run(2, |comm| {
            Context::init(comm.clone(), ContextConfig::host()).unwrap().finalize();
            Context::init(comm, ContextConfig::host()).unwrap().finalize();
        });
    }

    #[test]
    #[should_panic(expected = "already has a live context")]
    fn double_init_is_a_violation() {
        Fabric::run(1, |comm| {
            let _first = Context::init(comm.clone(), ContextConfig::host()).unwrap();
            let _second = Context::init(comm, ContextConfig::host());
        });
    }

    #[test]
    fn fence_without_regions_is_a_no_op() {
        Fabric::run(2, |comm| {
            Context::scope(comm, ContextConfig::host(), |ctx| {
                assert_eq!(ctx.open_regions(), 0);
                ctx.fence();
            })
            .unwrap();
        });
    }

    #[test]
    fn region_ids_follow_program_order() {
        Fabric::run(1, |comm| {
            let ctx = Context::init(comm, ContextConfig::host()).unwrap();
            assert_eq!(ctx.next_region_id(), 0);
            assert_eq!(ctx.next_region_id(), 1);
        });
    }
}
