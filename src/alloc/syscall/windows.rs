use std::mem::MaybeUninit;
use std::ptr;
use std::sync::OnceLock;
use windows_sys::Win32::System::Memory::{VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE};
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

pub(crate) fn page_size() -> usize {
    static PAGE: OnceLock<usize> = OnceLock::new();
    *PAGE.get_or_init(|| {
        let mut info = MaybeUninit::<SYSTEM_INFO>::zeroed();
        // SAFETY: GetSystemInfo fills the provided structure.
        let info = unsafe {
            GetSystemInfo(info.as_mut_ptr());
            info.assume_init()
        };
        (info.dwPageSize as usize).max(1)
    })
}

pub(crate) unsafe fn map_pages(size: usize) -> Option<*mut u8> {
    let ptr = VirtualAlloc(ptr::null_mut(), size, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE);
    if ptr.is_null() {
        None
    } else {
        Some(ptr.cast::<u8>())
    }
}

pub(crate) unsafe fn unmap_pages(ptr: *mut u8, _size: usize) {
    // MEM_RELEASE frees the whole reservation; the size must be 0.
    VirtualFree(ptr.cast(), 0, MEM_RELEASE);
}
