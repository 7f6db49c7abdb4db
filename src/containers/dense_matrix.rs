//! Row-block distributed dense matrices.

use core::ops::Range;

use super::storage::{BlockStorage, LocalIter, LocalIterMut};
use crate::config::Distribution;
use crate::context::Context;
use crate::error::Result;
use crate::halo::Halo;
use crate::range::{DistributedRange, DistributedRangeMut, Element, LocalRange, Segment, Segmented};
use crate::usage_violation;

/// A row-major matrix split into blocks of whole rows, one block per rank.
///
/// As a range it is the row-major flattening of its elements. Halo widths
/// and granularity of the [`Distribution`] count rows, so ghost regions hold
/// complete neighbor rows, as stencil codes need.
pub struct DenseMatrix<'ctx, T> {
    storage: BlockStorage<'ctx, T>,
    rows: usize,
    cols: usize,
}

impl<'ctx, T: Element> DenseMatrix<'ctx, T> {
    /// Collectively creates a zeroed `rows x cols` matrix without ghosts.
    ///
    /// # Errors
    /// See [`DenseMatrix::with_distribution`].
    pub fn new(ctx: &'ctx Context, rows: usize, cols: usize) -> Result<Self> {
        Self::with_distribution(ctx, rows, cols, Distribution::default())
    }

    /// Collectively creates a zeroed matrix laid out per `distribution`.
    ///
    /// # Errors
    /// Returns [`DrError::Config`](crate::DrError::Config) for an invalid
    /// distribution and [`DrError::Alloc`](crate::DrError::Alloc) if the
    /// local block cannot be allocated.
    pub fn with_distribution(ctx: &'ctx Context, rows: usize, cols: usize, distribution: Distribution) -> Result<Self> {
        distribution.validate()?;
        let row_len = cols.max(1);
        let storage = BlockStorage::new(
            ctx,
            rows * cols,
            distribution.halo.scaled(cols),
            distribution.granularity * row_len,
        )?;
        tracing::debug!(rank = ctx.rank(), rows, cols, "dense matrix created");
        Ok(Self { storage, rows, cols })
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn flat(&self, row: usize, col: usize) -> usize {
        if row >= self.rows || col >= self.cols {
            usage_violation!("({row}, {col}) outside a {}x{} matrix", self.rows, self.cols);
        }
        row * self.cols + col
    }

    /// Reads element `(row, col)`, wherever it lives.
    pub fn at(&self, row: usize, col: usize) -> T {
        self.storage.get(self.flat(row, col))
    }

    /// Writes element `(row, col)`, wherever it lives.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        let index = self.flat(row, col);
        self.storage.put(index, value);
    }

    /// Global indices of the rows owned by this rank.
    pub fn row_range(&self) -> Range<usize> {
        let seg = self.storage.own_segment();
        match self.cols {
            0 => 0..0,
            cols => seg.offset() / cols..seg.end() / cols,
        }
    }

    /// Rows owned by this rank.
    pub fn local_rows(&self) -> core::slice::ChunksExact<'_, T> {
        self.storage.owned().chunks_exact(self.cols.max(1))
    }

    /// Rows owned by this rank; marks the halo stale.
    pub fn local_rows_mut(&mut self) -> core::slice::ChunksExactMut<'_, T> {
        let cols = self.cols.max(1);
        self.storage.owned_mut().chunks_exact_mut(cols)
    }

    /// Row at `offset` from the first owned row. Negative offsets reach into
    /// the previous ghosts, offsets past the owned rows into the next ghosts.
    pub fn local_row(&self, offset: isize) -> &[T] {
        let buffer = self.storage.with_halo();
        let first = (self.storage.halo().owned_range().start / self.cols.max(1)) as isize;
        let row = first + offset;
        let start = row.max(0) as usize * self.cols;
        if row < 0 || start + self.cols > buffer.len() {
            usage_violation!("local row {offset} outside the owned rows and their ghosts");
        }
        &buffer[start..start + self.cols]
    }

    /// Neighbor groups and synchronization state.
    pub fn halo(&self) -> &Halo {
        self.storage.halo()
    }

    /// Refreshes the ghost rows from the neighbors. Collective.
    pub fn exchange(&mut self) {
        self.storage.exchange();
    }
}

impl<T: Element> Segmented for DenseMatrix<'_, T> {
    fn len(&self) -> usize {
        self.storage.len()
    }

    fn segments(&self) -> Vec<Segment> {
        self.storage.partition().segments().to_vec()
    }
}

impl<T: Element> DistributedRange for DenseMatrix<'_, T> {
    type Value = T;

    fn get(&self, index: usize) -> T {
        self.storage.get(index)
    }

    fn get_many(&self, offset: usize, out: &mut [T]) {
        self.storage.get_many(offset, out);
    }
}

impl<T: Element> DistributedRangeMut for DenseMatrix<'_, T> {
    fn put(&mut self, index: usize, value: T) {
        self.storage.put(index, value);
    }

    fn put_many(&mut self, offset: usize, values: &[T]) {
        self.storage.put_many(offset, values);
    }
}

impl<'a, T: Element> LocalRange for &'a DenseMatrix<'_, T> {
    type Item = T;
    type Iter = LocalIter<'a, T>;

    fn into_local(self, segments: &[Segment]) -> Self::Iter {
        self.storage.local_iter(segments)
    }
}

impl<'a, T: Element> LocalRange for &'a mut DenseMatrix<'_, T> {
    type Item = &'a mut T;
    type Iter = LocalIterMut<'a, T>;

    fn into_local(self, segments: &[Segment]) -> Self::Iter {
        self.storage.local_iter_mut(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContextConfig, Fabric};

    #[test]
    fn segments_hold_whole_rows() {
        Fabric::run(3, |comm| {
            let ctx = Context::init(comm, ContextConfig::host()).unwrap();
            let m = DenseMatrix::<f64>::new(&ctx, 7, 4).unwrap();
            assert_eq!(m.shape(), (7, 4));
            for seg in m.segments() {
                assert_eq!(seg.offset() % 4, 0);
                assert_eq!(seg.len() % 4, 0);
            }
            assert_eq!(m.local_rows().count(), m.row_range().len());
        });
    }

    #[test]
    fn set_and_at_reach_every_rank() {
        Fabric::run(2, |comm| {
            let ctx = Context::init(comm, ContextConfig::host()).unwrap();
            let mut m = DenseMatrix::<i32>::new(&ctx, 4, 3).unwrap();
            if ctx.rank() == 1 {
                m.set(0, 2, -5);
            }
            ctx.fence();
            assert_eq!(m.at(0, 2), -5);
            ctx.barrier();
        });
    }

    #[test]
    fn ghost_rows_follow_exchange() {
        Fabric::run(2, |comm| {
            let ctx = Context::init(comm, ContextConfig::host()).unwrap();
            let mut m = DenseMatrix::<u16>::with_distribution(&ctx, 4, 2, Distribution::new().halo(1)).unwrap();
            let first = m.row_range().start;
            for (i, row) in m.local_rows_mut().enumerate() {
                row.fill((first + i) as u16);
            }
            m.exchange();
            if ctx.rank() == 0 {
                assert_eq!(m.local_row(2), &[2, 2]);
            } else {
                assert_eq!(m.local_row(-1), &[1, 1]);
            }
        });
    }
}
