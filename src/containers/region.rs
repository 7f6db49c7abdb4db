//! Container storage exposed as a one-sided region.

use core::mem::size_of;
use std::rc::Rc;

use crate::alloc::Allocation;
use crate::comm::Window;
use crate::context::Context;
use crate::error::Result;
use crate::range::Element;

/// Local storage of one rank, reachable by every rank through a window.
///
/// Creation and destruction are collective.
pub(crate) struct Region<'ctx, T> {
    ctx: &'ctx Context,
    // Dropped before `storage`: the window is released on every rank before
    // the memory it exposes is freed.
    window: Rc<Window>,
    storage: Allocation<T>,
}

impl<'ctx, T: Element> Region<'ctx, T> {
    /// Allocates `count` zeroed elements and registers them with `ctx`.
    pub(crate) fn new(ctx: &'ctx Context, count: usize) -> Result<Self> {
        let storage = ctx.allocator().allocate::<T>(count)?;
        let id = ctx.next_region_id();
        // SAFETY: the allocation is owned by this region and outlives the
        // window, which is dropped first.
        let window = unsafe {
            Window::create(ctx.comm(), id, storage.as_ptr().cast(), count * size_of::<T>())
        };
        let window = Rc::new(window);
        ctx.register_region(&window);
        tracing::debug!(rank = ctx.rank(), window = id, count, kind = ?storage.kind(), "region opened");
        Ok(Self {
            ctx,
            window,
            storage,
        })
    }

    #[inline]
    pub(crate) fn ctx(&self) -> &'ctx Context {
        self.ctx
    }

    #[inline]
    pub(crate) fn window(&self) -> &Window {
        &self.window
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[T] {
        self.storage.as_slice()
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        self.storage.as_mut_slice()
    }
}

impl<T> Drop for Region<'_, T> {
    fn drop(&mut self) {
        self.ctx.unregister_region(self.window.id());
        tracing::debug!(rank = self.ctx.rank(), window = self.window.id(), "region closed");
    }
}
