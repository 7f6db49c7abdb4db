//! Page-granular mappings backing device allocations.
//!
//! Device memory is modelled as anonymous, zero-filled page mappings that the
//! accelerator queue addresses directly. Mapping sizes are always rounded up
//! to whole pages.

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub(crate) use unix::{map_pages, page_size, unmap_pages};

#[cfg(windows)]
pub(crate) use windows::{map_pages, page_size, unmap_pages};

#[cfg(not(any(unix, windows)))]
mod fallback {
    use std::alloc::{alloc_zeroed, dealloc, Layout};

    pub(crate) fn page_size() -> usize {
        4096
    }

    pub(crate) unsafe fn map_pages(size: usize) -> Option<*mut u8> {
        let layout = Layout::from_size_align(size, page_size()).ok()?;
        let ptr = alloc_zeroed(layout);
        (!ptr.is_null()).then_some(ptr)
    }

    pub(crate) unsafe fn unmap_pages(ptr: *mut u8, size: usize) {
        if let Ok(layout) = Layout::from_size_align(size, page_size()) {
            dealloc(ptr, layout);
        }
    }
}

#[cfg(not(any(unix, windows)))]
pub(crate) use fallback::{map_pages, page_size, unmap_pages};

/// Rounds `bytes` up to a whole number of pages.
pub(crate) fn round_to_pages(bytes: usize) -> Option<usize> {
    let page = page_size();
    bytes.checked_add(page - 1).map(|b| b / page * page)
}
