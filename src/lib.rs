//! # `dranges` - Distributed Ranges
//!
//! Partitioned containers whose elements are spread across cooperating ranks,
//! exposed through a range interface so that sequential-style algorithms run
//! over partitioned data without reasoning about partition boundaries, remote
//! memory or synchronization.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! 1. **Fabric** ([`Fabric`], [`Communicator`]): ranks are threads of one
//!    process exchanging buffered messages, running collectives and exposing
//!    memory through one-sided windows.
//! 2. **Allocation dispatch** ([`alloc::Allocator`]): host or
//!    accelerator-addressable storage, chosen once per context.
//! 3. **Range model** ([`range`]): [`Segment`]s, the capability traits and
//!    lazy [`views`].
//! 4. **Alignment** ([`aligned`](range::aligned)): whether ranges share one
//!    partitioning, which selects the fast path of every algorithm.
//! 5. **Halo exchange** ([`halo`]): ghost-region refresh and reduction
//!    between neighboring segments.
//! 6. **Context** ([`Context`]): per-rank communicator, execution mode,
//!    accelerator queue and region registry.
//! 7. **Containers** ([`DistributedVector`], [`DenseMatrix`],
//!    [`SparseMatrix`]) and **algorithms** ([`algorithms`]).
//!
//! ## Example
//!
//! ```rust
//! use dranges::{algorithms, views, Context, ContextConfig, DistributedVector, Fabric};
//!
//! let results = Fabric::run(4, |comm| {
//!     let ctx = Context::init(comm, ContextConfig::host()).unwrap();
//!     let mut v = DistributedVector::<i64>::new(&ctx, 10).unwrap();
//!     algorithms::iota(&ctx, &mut v, 100);
//!     let squares = views::transform(&v, |x| x * x);
//!     algorithms::reduce(&ctx, 0, squares, 0, |a, b| a + b)
//! });
//! assert_eq!(results[0], (100..110).map(|x: i64| x * x).sum::<i64>());
//! ```
//!
//! ## Failure model
//!
//! Recoverable conditions (allocation failure, invalid configuration) are
//! returned as [`DrError`]. Usage-contract violations panic after logging at
//! `error` level. A rank that panics leaves its peers blocked at their next
//! synchronization point.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

pub mod accel;
pub mod algorithms;
pub mod alloc;
pub mod comm;
pub mod config;
pub mod containers;
pub mod context;
pub mod error;
pub mod halo;
pub mod range;

pub use comm::{Communicator, Fabric, Tag, Window};
pub use config::{ContextConfig, Distribution, ExecutionMode, HaloBounds};
pub use containers::{DenseMatrix, DistributedVector, MatrixEntry, MatrixEntryMut, SparseMatrix};
pub use context::Context;
pub use error::{DrError, Result};
pub use halo::{HaloOp, HaloState};
pub use range::{
    aligned, local_segments, views, DistributedRange, DistributedRangeMut, Element, LocalRange, Segment, Segmented,
};

#[doc(hidden)]
pub use tracing as __tracing;

// Compile-time layout checks
const _: () = {
    use core::mem;

    assert!(mem::size_of::<Segment>() == 3 * mem::size_of::<usize>());
    assert!(mem::size_of::<ExecutionMode>() == 1);
    assert!(mem::size_of::<alloc::Allocation<u8>>() <= 4 * mem::size_of::<usize>());
};
