use core::ptr::NonNull;
use std::sync::Arc;
use zerocopy::FromZeroes;

use super::{Allocation, MemoryKind};
use crate::accel::Accelerator;
use crate::config::ExecutionMode;
use crate::usage_violation;

/// Dispatches allocation, deallocation and copies to the host or the device
/// backend.
///
/// The backend is chosen once, from the execution mode of the owning context,
/// and never per call. Both paths share the same signatures and the same
/// completion guarantee: every call returns only once its effect is visible.
#[derive(Clone)]
pub struct Allocator {
    mode: ExecutionMode,
    accelerator: Option<Arc<Accelerator>>,
}

impl Allocator {
    /// Host allocator.
    pub fn host() -> Self {
        Self {
            mode: ExecutionMode::Host,
            accelerator: None,
        }
    }

    /// Allocator for `mode`. Device copies run on `accelerator` when given.
    pub fn new(mode: ExecutionMode, accelerator: Option<Arc<Accelerator>>) -> Self {
        Self { mode, accelerator }
    }

    /// Execution mode this allocator dispatches on.
    #[inline]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Memory kind handed out by [`Allocator::allocate`].
    #[inline]
    pub fn kind(&self) -> MemoryKind {
        match self.mode {
            ExecutionMode::Host => MemoryKind::Host,
            ExecutionMode::Device => MemoryKind::Device,
        }
    }

    /// Allocates `count` zero-initialized elements.
    ///
    /// `count == 0` returns an empty allocation without touching a backend.
    ///
    /// # Errors
    /// Returns [`AllocError`] if the backend cannot provide the memory.
    pub fn allocate<T: FromZeroes>(&self, count: usize) -> Result<Allocation<T>, AllocError> {
        let allocation = Allocation::zeroed(count, self.kind());
        match &allocation {
            Ok(a) => tracing::trace!(count, kind = ?a.kind(), ptr = ?a.as_ptr(), "allocate"),
            Err(_) => tracing::warn!(count, kind = ?self.kind(), "allocation failed"),
        }
        allocation
    }

    /// Returns an allocation to its backend.
    pub fn deallocate<T>(&self, allocation: Allocation<T>) {
        tracing::trace!(count = allocation.len(), kind = ?allocation.kind(), "deallocate");
        drop(allocation);
    }

    /// Frees raw parts obtained from [`Allocation::into_raw_parts`].
    ///
    /// `count == 0` requires a null pointer and is a no-op; a nonzero count
    /// with a null pointer, or a non-null pointer with count 0, is a usage
    /// violation.
    ///
    /// # Safety
    /// A non-null `ptr` must come from `into_raw_parts` of an allocation of
    /// exactly `count` elements of `kind`, and must not be freed twice.
    pub unsafe fn deallocate_raw<T>(&self, ptr: *mut T, count: usize, kind: MemoryKind) {
        if count == 0 {
            if !ptr.is_null() {
                usage_violation!("deallocate of 0 elements with non-null pointer {ptr:p}");
            }
            return;
        }
        let Some(ptr) = NonNull::new(ptr) else {
            usage_violation!("deallocate of {count} elements with a null pointer");
        };
        tracing::trace!(count, ?kind, "deallocate raw");
        drop(Allocation::from_raw_parts(ptr, count, kind));
    }

    /// Copies `src` into `dst`, returning once the copy is complete.
    ///
    /// Device mode runs the copy on the accelerator queue and waits for it.
    pub fn copy<T: Copy + Send + Sync>(&self, src: &[T], dst: &mut [T]) {
        if src.len() != dst.len() {
            usage_violation!("copy of {} elements into {} slots", src.len(), dst.len());
        }
        match (&self.mode, &self.accelerator) {
            (ExecutionMode::Device, Some(accelerator)) => accelerator.copy(src, dst),
            _ => dst.copy_from_slice(src),
        }
    }
}

impl core::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Allocator")
            .field("mode", &self.mode)
            .field("accelerator", &self.accelerator.is_some())
            .finish()
    }
}

/// The error type for allocation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl std::error::Error for AllocError {}
