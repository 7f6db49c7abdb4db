//! Collective algorithms over distributed ranges.
//!
//! Every algorithm is called by all ranks with the same arguments. Work on
//! local segments runs on the accelerator queue in device mode and on the
//! calling thread in host mode; both paths share one implementation and
//! complete before the algorithm returns.

mod for_each;
mod iota;
mod reduce;
mod transfer;
mod transform;

pub use for_each::for_each;
pub use iota::{fill, iota};
pub use reduce::{all_reduce, reduce};
pub use transfer::{copy_from_root, copy_to_root, gather, scatter};
pub use transform::{copy, transform};
