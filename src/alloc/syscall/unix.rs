use libc::{c_void, mmap, munmap, sysconf, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, _SC_PAGESIZE};
use std::ptr;
use std::sync::OnceLock;

pub(crate) fn page_size() -> usize {
    static PAGE: OnceLock<usize> = OnceLock::new();
    *PAGE.get_or_init(|| {
        // SAFETY: sysconf has no preconditions.
        let page = unsafe { sysconf(_SC_PAGESIZE) };
        usize::try_from(page).ok().filter(|&p| p > 0).unwrap_or(4096)
    })
}

/// Maps `size` bytes of zero-filled memory.
/// Returns `None` if the mapping failed.
pub(crate) unsafe fn map_pages(size: usize) -> Option<*mut u8> {
    let ptr = mmap(
        ptr::null_mut(),
        size,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
    );

    if ptr == MAP_FAILED {
        None
    } else {
        Some(ptr.cast::<u8>())
    }
}

pub(crate) unsafe fn unmap_pages(ptr: *mut u8, size: usize) {
    munmap(ptr.cast::<c_void>(), size);
}
