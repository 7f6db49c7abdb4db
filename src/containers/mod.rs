//! Distributed containers.
//!
//! Every container owns one block of its index space per rank, allocated
//! through the context's allocator and exposed to the other ranks as a
//! one-sided region. Containers borrow their [`Context`](crate::Context) and
//! are created and destroyed collectively.

mod dense_matrix;
mod partition;
mod region;
mod sparse_matrix;
mod storage;
mod vector;

pub use dense_matrix::DenseMatrix;
pub use partition::Partition;
pub use sparse_matrix::{MatrixEntry, MatrixEntryMut, SparseMatrix};
pub use storage::{LocalIter, LocalIterMut};
pub use vector::DistributedVector;
