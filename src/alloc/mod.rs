//! Memory allocation dispatch.
//!
//! Every container obtains its storage from an [`Allocator`], which picks the
//! host or the device backend from the execution mode fixed at context
//! initialization. Storage is handed out as an owning [`Allocation`] that
//! tracks pointer, count and memory kind together, so the "count 0 ⇔ no
//! pointer" pairing is a property of the type rather than a convention.

pub mod allocation;
pub mod allocator;
mod syscall;

pub use allocation::{Allocation, MemoryKind};
pub use allocator::{AllocError, Allocator};
