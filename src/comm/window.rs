//! One-sided memory windows.

use core::mem::size_of;
use core::ptr;
use std::sync::atomic::{fence, Ordering};
use zerocopy::{AsBytes, FromBytes};

use super::Communicator;
use crate::usage_violation;

/// Identifier agreed on by every rank for one collectively created window.
pub type WindowId = u64;

/// One rank's exposed memory.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegionSlot {
    base: *mut u8,
    bytes: usize,
}

// SAFETY: a slot is an address range; access through it is governed by the
// window's fence protocol.
unsafe impl Send for RegionSlot {}
unsafe impl Sync for RegionSlot {}

impl RegionSlot {
    pub(crate) const EMPTY: Self = Self {
        base: ptr::null_mut(),
        bytes: 0,
    };
}

/// Memory exposed by every rank of a group for remote `get` and `put`.
///
/// Creation and destruction are collective. Remote accesses issued between
/// two [`fence`](Window::fence) calls must not conflict with each other or
/// with the owner's local accesses; a fence makes every earlier access
/// visible to every rank.
pub struct Window {
    comm: Communicator,
    id: WindowId,
    slots: Vec<RegionSlot>,
}

impl Window {
    /// Collectively exposes `bytes` bytes at `base` on this rank as window `id`.
    ///
    /// # Safety
    /// `base..base + bytes` must stay valid, and must not be moved or freed,
    /// until the window is dropped on every rank.
    pub unsafe fn create(comm: &Communicator, id: WindowId, base: *mut u8, bytes: usize) -> Self {
        let fabric = comm.fabric();
        fabric.register_slot(id, comm.rank(), RegionSlot { base, bytes });
        comm.barrier();
        let slots = fabric.slots(id);
        tracing::debug!(rank = comm.rank(), window = id, bytes, "window created");
        Self {
            comm: comm.clone(),
            id,
            slots,
        }
    }

    /// Identifier of this window.
    #[inline]
    pub fn id(&self) -> WindowId {
        self.id
    }

    /// Bytes exposed by `rank`.
    #[inline]
    pub fn exposed(&self, rank: usize) -> usize {
        self.slot(rank).bytes
    }

    fn slot(&self, rank: usize) -> RegionSlot {
        match self.slots.get(rank) {
            Some(slot) => *slot,
            None => usage_violation!("window {} has no rank {rank}", self.id),
        }
    }

    /// Address of `count` elements at element displacement `disp` on `rank`.
    fn target<T>(&self, rank: usize, disp: usize, count: usize) -> *mut u8 {
        let slot = self.slot(rank);
        let width = size_of::<T>();
        let end = disp
            .checked_add(count)
            .and_then(|n| n.checked_mul(width))
            .unwrap_or(usize::MAX);
        if end > slot.bytes {
            usage_violation!(
                "window {} access [{disp}, {}) on rank {rank} exceeds {} exposed bytes",
                self.id,
                disp.saturating_add(count),
                slot.bytes
            );
        }
        // SAFETY: in bounds of the exposed range checked above.
        unsafe { slot.base.add(disp * width) }
    }

    /// Reads the element at `disp` on `rank`.
    pub fn get<T: FromBytes>(&self, rank: usize, disp: usize) -> T {
        let src = self.target::<T>(rank, disp, 1);
        // SAFETY: in bounds, and every bit pattern is a valid `T`.
        unsafe { ptr::read_unaligned(src.cast::<T>()) }
    }

    /// Reads `out.len()` elements starting at `disp` on `rank`.
    pub fn get_into<T: AsBytes + FromBytes>(&self, rank: usize, disp: usize, out: &mut [T]) {
        let src = self.target::<T>(rank, disp, out.len());
        let dst = out.as_bytes_mut();
        // SAFETY: both ranges are in bounds; exposed memory never aliases `out`
        // because `out` is a unique borrow.
        unsafe { ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), dst.len()) }
    }

    /// Writes `value` at `disp` on `rank`.
    pub fn put<T: AsBytes>(&self, rank: usize, disp: usize, value: &T) {
        self.put_slice(rank, disp, core::slice::from_ref(value));
    }

    /// Writes `values` starting at `disp` on `rank`.
    pub fn put_slice<T: AsBytes>(&self, rank: usize, disp: usize, values: &[T]) {
        let dst = self.target::<T>(rank, disp, values.len());
        let src = values.as_bytes();
        // SAFETY: in bounds; see `get_into`.
        unsafe { ptr::copy(src.as_ptr(), dst, src.len()) }
    }

    /// Completes every access issued on this window by any rank.
    pub fn fence(&self) {
        fence(Ordering::SeqCst);
        self.comm.barrier();
        fence(Ordering::SeqCst);
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.comm.barrier();
        self.comm.fabric().release_slot(self.id, self.comm.rank());
        tracing::debug!(rank = self.comm.rank(), window = self.id, "window freed");
    }
}

impl core::fmt::Debug for Window {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.id)
            .field("rank", &self.comm.rank())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fabric;

    #[test]
    fn put_then_fence_is_visible_to_owner() {
        let out = Fabric::run(3, |comm| {
            let mut local = vec![0u32; 3];
            // SAFETY: `local` outlives the window and is not moved.
            let window = unsafe { Window::create(&comm, 0, local.as_mut_ptr().cast(), 12) };
            let value = 100 + comm.rank() as u32;
            window.put(comm.next(), comm.rank(), &value);
            window.fence();
            let remote: u32 = window.get(comm.prev(), comm.prev());
            window.fence();
            drop(window);
            (local, remote)
        });
        assert_eq!(out[0].0, vec![0, 0, 102]);
        assert_eq!(out[1].0, vec![100, 0, 0]);
        assert_eq!(out[0].1, 0);
    }

    #[test]
    fn get_into_reads_ranges() {
        let out = Fabric::run(2, |comm| {
            let mut local: Vec<i64> = (0..4).map(|i| i + 10 * comm.rank() as i64).collect();
            // SAFETY: `local` outlives the window.
            let window = unsafe { Window::create(&comm, 9, local.as_mut_ptr().cast(), 32) };
            let mut buf = [0i64; 2];
            window.get_into(1 - comm.rank(), 1, &mut buf);
            window.fence();
            buf
        });
        assert_eq!(out, vec![[11, 12], [1, 2]]);
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn out_of_bounds_access_is_a_violation() {
        Fabric::run(1, |comm| {
            let mut local = [0u8; 4];
            // SAFETY: `local` outlives the window.
            let window = unsafe { Window::create(&comm, 0, local.as_mut_ptr(), 4) };
            let _: u32 = window.get(0, 1);
        });
    }
}
