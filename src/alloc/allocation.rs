use core::alloc::Layout;
use core::marker::PhantomData;
use core::ptr::NonNull;
use std::alloc::{alloc_zeroed, dealloc};
use zerocopy::FromZeroes;

use super::syscall;
use super::AllocError;

/// The backend an allocation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryKind {
    /// The global host allocator.
    Host,
    /// Page-granular accelerator-addressable mappings.
    Device,
}

/// An owning handle to `count` zero-initialized elements of `T`.
///
/// The handle is empty (no pointer) exactly when `count == 0`. Dropping it
/// returns the memory to the backend it came from.
pub struct Allocation<T> {
    ptr: Option<NonNull<T>>,
    count: usize,
    kind: MemoryKind,
    _owns: PhantomData<T>,
}

// SAFETY: an allocation is uniquely owned memory; sharing follows `T`.
unsafe impl<T: Send> Send for Allocation<T> {}
unsafe impl<T: Sync> Sync for Allocation<T> {}

impl<T> Allocation<T> {
    pub(crate) const fn empty(kind: MemoryKind) -> Self {
        Self {
            ptr: None,
            count: 0,
            kind,
            _owns: PhantomData,
        }
    }

    /// Allocates `count` zeroed elements from `kind`'s backend.
    pub(crate) fn zeroed(count: usize, kind: MemoryKind) -> Result<Self, AllocError>
    where
        T: FromZeroes,
    {
        if count == 0 {
            return Ok(Self::empty(kind));
        }
        let layout = Layout::array::<T>(count).map_err(|_| AllocError)?;
        let raw = if layout.size() == 0 {
            NonNull::<T>::dangling().as_ptr().cast::<u8>()
        } else {
            match kind {
                // SAFETY: the layout has a nonzero size.
                MemoryKind::Host => unsafe { alloc_zeroed(layout) },
                MemoryKind::Device => {
                    let bytes = syscall::round_to_pages(layout.size()).ok_or(AllocError)?;
                    // SAFETY: mapping fresh anonymous pages has no preconditions.
                    unsafe { syscall::map_pages(bytes) }.unwrap_or(core::ptr::null_mut())
                }
            }
        };
        let ptr = NonNull::new(raw.cast::<T>()).ok_or(AllocError)?;
        Ok(Self {
            ptr: Some(ptr),
            count,
            kind,
            _owns: PhantomData,
        })
    }

    /// Rebuilds a handle from parts produced by [`Allocation::into_raw_parts`].
    ///
    /// # Safety
    /// `ptr`, `count` and `kind` must come from a single `into_raw_parts` call
    /// and must not have been released since.
    pub(crate) unsafe fn from_raw_parts(ptr: NonNull<T>, count: usize, kind: MemoryKind) -> Self {
        Self {
            ptr: Some(ptr),
            count,
            kind,
            _owns: PhantomData,
        }
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` for a zero-element allocation.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Backend the memory came from.
    #[inline]
    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    /// Raw pointer to the first element; null for an empty allocation.
    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.map_or(core::ptr::null_mut(), NonNull::as_ptr)
    }

    /// The elements as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        match self.ptr {
            // SAFETY: `count` initialized elements live at `ptr` (zeroed at
            // allocation, valid for `T: FromZeroes`, written only as `T` since).
            Some(ptr) => unsafe { core::slice::from_raw_parts(ptr.as_ptr(), self.count) },
            None => &[],
        }
    }

    /// The elements as a mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self.ptr {
            // SAFETY: as in `as_slice`, and `&mut self` guarantees uniqueness.
            Some(ptr) => unsafe { core::slice::from_raw_parts_mut(ptr.as_ptr(), self.count) },
            None => &mut [],
        }
    }

    /// Releases ownership without freeing: `(pointer, count, kind)`.
    ///
    /// The pointer is null exactly when `count == 0`.
    pub fn into_raw_parts(self) -> (*mut T, usize, MemoryKind) {
        let parts = (self.as_ptr(), self.count, self.kind);
        core::mem::forget(self);
        parts
    }
}

impl<T> Drop for Allocation<T> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: the pointer was produced by `zeroed` with this count and kind.
            unsafe { release(ptr, self.count, self.kind) };
        }
    }
}

impl<T> core::fmt::Debug for Allocation<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Allocation")
            .field("ptr", &self.as_ptr())
            .field("count", &self.count)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Returns memory to its backend.
///
/// # Safety
/// `ptr` must have been allocated by [`Allocation::zeroed`] with exactly
/// `count` elements of `T` from `kind`.
pub(crate) unsafe fn release<T>(ptr: NonNull<T>, count: usize, kind: MemoryKind) {
    let Ok(layout) = Layout::array::<T>(count) else {
        return;
    };
    if layout.size() == 0 {
        return;
    }
    match kind {
        MemoryKind::Host => dealloc(ptr.as_ptr().cast::<u8>(), layout),
        MemoryKind::Device => {
            if let Some(bytes) = syscall::round_to_pages(layout.size()) {
                syscall::unmap_pages(ptr.as_ptr().cast::<u8>(), bytes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_allocation_has_no_pointer() {
        for kind in [MemoryKind::Host, MemoryKind::Device] {
            let a = Allocation::<u64>::zeroed(0, kind).unwrap();
            assert!(a.is_empty());
            assert!(a.as_ptr().is_null());
            assert!(a.as_slice().is_empty());
        }
    }

    #[test]
    fn allocations_are_zeroed_and_owned() {
        for kind in [MemoryKind::Host, MemoryKind::Device] {
            let mut a = Allocation::<i32>::zeroed(1000, kind).unwrap();
            assert_eq!(a.len(), 1000);
            assert_eq!(a.kind(), kind);
            assert!(a.as_slice().iter().all(|&x| x == 0));
            a.as_mut_slice()[999] = -5;
            assert_eq!(a.as_slice()[999], -5);
        }
    }

    #[test]
    fn raw_parts_round_trip() {
        let mut a = Allocation::<u16>::zeroed(8, MemoryKind::Host).unwrap();
        a.as_mut_slice()[3] = 42;
        let (ptr, count, kind) = a.into_raw_parts();
        assert!(!ptr.is_null());
        let a = unsafe { Allocation::from_raw_parts(NonNull::new(ptr).unwrap(), count, kind) };
        assert_eq!(a.as_slice()[3], 42);
    }

    #[test]
    fn oversized_requests_fail_cleanly() {
        assert_eq!(
            Allocation::<u64>::zeroed(usize::MAX, MemoryKind::Host).unwrap_err(),
            AllocError
        );
    }
}
