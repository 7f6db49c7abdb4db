//! Row-block distributed sparse matrices in CSR form.

use core::ops::Range;

use super::partition::Partition;
use super::region::Region;
use crate::context::Context;
use crate::error::Result;
use crate::range::{DistributedRange, Element, LocalRange, Segment, Segmented};
use crate::usage_violation;

/// A stored entry of a [`SparseMatrix`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixEntry<T> {
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
    /// Stored value.
    pub value: T,
}

/// A stored entry with a writable value.
#[derive(Debug)]
pub struct MatrixEntryMut<'a, T> {
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
    /// Stored value.
    pub value: &'a mut T,
}

/// A CSR matrix split into blocks of whole rows, one block per rank.
///
/// As a range it is the sequence of stored entries in row-major order; its
/// segments cover each rank's entries. The sparsity structure is fixed at
/// construction.
pub struct SparseMatrix<'ctx, T> {
    ctx: &'ctx Context,
    shape: (usize, usize),
    rows: Partition,
    /// First entry index of every rank, plus the total.
    offsets: Vec<usize>,
    segments: Vec<Segment>,
    /// Local CSR row pointers, relative to this rank's first entry.
    row_ptr: Vec<usize>,
    row_idx: Region<'ctx, u64>,
    col_idx: Region<'ctx, u64>,
    values: Region<'ctx, T>,
}

impl<'ctx, T: Element> SparseMatrix<'ctx, T> {
    /// Collectively builds a `shape.0 x shape.1` matrix from triplets held
    /// by `root`. Other ranks pass `None`.
    ///
    /// Duplicate coordinates are kept as separate entries.
    ///
    /// # Errors
    /// Returns [`DrError::Alloc`](crate::DrError::Alloc) if local storage
    /// cannot be allocated.
    pub fn from_triplets(
        ctx: &'ctx Context,
        root: usize,
        shape: (usize, usize),
        triplets: Option<&[(usize, usize, T)]>,
    ) -> Result<Self> {
        let (nrows, ncols) = shape;
        let rows = Partition::block(nrows, ctx.size(), 1, 0);
        let comm = ctx.comm();

        let buckets = (ctx.rank() == root).then(|| {
            let mut sorted: Vec<(usize, usize, T)> = triplets.unwrap_or_default().to_vec();
            if let Some(&(r, c, _)) = sorted.iter().find(|(r, c, _)| *r >= nrows || *c >= ncols) {
                usage_violation!("entry ({r}, {c}) outside a {nrows}x{ncols} matrix");
            }
            sorted.sort_by_key(|&(r, c, _)| (r, c));
            let mut buckets: Vec<(Vec<u64>, Vec<u64>, Vec<T>)> =
                (0..ctx.size()).map(|_| (Vec::new(), Vec::new(), Vec::new())).collect();
            for (r, c, v) in sorted {
                let (owner, _) = rows.locate(r);
                let bucket = &mut buckets[owner];
                bucket.0.push(r as u64);
                bucket.1.push(c as u64);
                bucket.2.push(v);
            }
            buckets
        });
        let (row_chunks, col_chunks, value_chunks) = match buckets {
            Some(buckets) => {
                let mut rc = Vec::with_capacity(buckets.len());
                let mut cc = Vec::with_capacity(buckets.len());
                let mut vc = Vec::with_capacity(buckets.len());
                for (r, c, v) in buckets {
                    rc.push(r);
                    cc.push(c);
                    vc.push(v);
                }
                (Some(rc), Some(cc), Some(vc))
            }
            None => (None, None, None),
        };
        let local_rows: Vec<u64> = comm.scatterv(root, row_chunks);
        let local_cols: Vec<u64> = comm.scatterv(root, col_chunks);
        let local_values: Vec<T> = comm.scatterv(root, value_chunks);

        let counts = comm.all_gather(local_values.len() as u64);
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        let mut total = 0usize;
        offsets.push(0);
        for &count in &counts {
            total += count as usize;
            offsets.push(total);
        }
        let segments = counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count > 0)
            .map(|(rank, &count)| Segment::new(rank, offsets[rank], count as usize))
            .collect();

        let own_rows = rows
            .segment_of(ctx.rank())
            .map_or(0..0, |s| s.offset()..s.end());
        let mut row_ptr = vec![0usize; own_rows.len() + 1];
        for &r in &local_rows {
            row_ptr[r as usize - own_rows.start + 1] += 1;
        }
        for i in 1..row_ptr.len() {
            row_ptr[i] += row_ptr[i - 1];
        }

        let nnz = local_values.len();
        let mut row_idx = Region::new(ctx, nnz)?;
        let mut col_idx = Region::new(ctx, nnz)?;
        let mut values = Region::new(ctx, nnz)?;
        row_idx.as_mut_slice().copy_from_slice(&local_rows);
        col_idx.as_mut_slice().copy_from_slice(&local_cols);
        ctx.allocator().copy(&local_values, values.as_mut_slice());
        ctx.barrier();
        tracing::debug!(rank = ctx.rank(), nrows, ncols, nnz, total, "sparse matrix created");

        Ok(Self {
            ctx,
            shape,
            rows,
            offsets,
            segments,
            row_ptr,
            row_idx,
            col_idx,
            values,
        })
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Number of stored entries on all ranks.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Global indices of the rows owned by this rank.
    pub fn row_range(&self) -> Range<usize> {
        self.rows
            .segment_of(self.ctx.rank())
            .map_or(0..0, |s| s.offset()..s.end())
    }

    /// Columns and values of owned row `row`.
    pub fn local_row(&self, row: usize) -> (&[u64], &[T]) {
        let owned = self.row_range();
        if !owned.contains(&row) {
            usage_violation!("rank {} does not own row {row}", self.ctx.rank());
        }
        let span = self.row_ptr[row - owned.start]..self.row_ptr[row - owned.start + 1];
        (&self.col_idx.as_slice()[span.clone()], &self.values.as_slice()[span])
    }

    /// Locally stored values, in row-major order.
    pub fn local_values(&self) -> &[T] {
        self.values.as_slice()
    }

    /// Collects every entry on `root`, in row-major order. Collective.
    pub fn gather_triplets(&self, root: usize) -> Option<Vec<(usize, usize, T)>> {
        let comm = self.ctx.comm();
        let rows = comm.gatherv(root, self.row_idx.as_slice());
        let cols = comm.gatherv(root, self.col_idx.as_slice());
        let values = comm.gatherv(root, self.values.as_slice());
        let (rows, cols, values) = (rows?, cols?, values?);
        Some(
            rows.into_iter()
                .flatten()
                .zip(cols.into_iter().flatten())
                .zip(values.into_iter().flatten())
                .map(|((r, c), v)| (r as usize, c as usize, v))
                .collect(),
        )
    }

    /// Owner and local displacement of entry `index`.
    fn locate(&self, index: usize) -> (usize, usize) {
        if index >= self.nnz() {
            usage_violation!("entry {index} out of range for {} stored entries", self.nnz());
        }
        let rank = self.offsets.partition_point(|&start| start <= index) - 1;
        (rank, index - self.offsets[rank])
    }

    fn local_span(&self, seg: &Segment) -> Range<usize> {
        let rank = self.ctx.rank();
        let start = self.offsets[rank];
        if !seg.is_local(rank) || seg.offset() < start || seg.end() > self.offsets[rank + 1] {
            usage_violation!("rank {rank} does not own {seg:?}");
        }
        seg.offset() - start..seg.end() - start
    }
}

impl<T: Element> Segmented for SparseMatrix<'_, T> {
    fn len(&self) -> usize {
        self.nnz()
    }

    fn segments(&self) -> Vec<Segment> {
        self.segments.clone()
    }
}

impl<T: Element> DistributedRange for SparseMatrix<'_, T> {
    type Value = MatrixEntry<T>;

    fn get(&self, index: usize) -> MatrixEntry<T> {
        let (rank, disp) = self.locate(index);
        if rank == self.ctx.rank() {
            return MatrixEntry {
                row: self.row_idx.as_slice()[disp] as usize,
                col: self.col_idx.as_slice()[disp] as usize,
                value: self.values.as_slice()[disp],
            };
        }
        let row: u64 = self.row_idx.window().get(rank, disp);
        let col: u64 = self.col_idx.window().get(rank, disp);
        MatrixEntry {
            row: row as usize,
            col: col as usize,
            value: self.values.window().get(rank, disp),
        }
    }
}

impl<'a, T: Element> LocalRange for &'a SparseMatrix<'_, T> {
    type Item = MatrixEntry<T>;
    type Iter = std::vec::IntoIter<MatrixEntry<T>>;

    fn into_local(self, segments: &[Segment]) -> Self::Iter {
        let (rows, cols, values) = (self.row_idx.as_slice(), self.col_idx.as_slice(), self.values.as_slice());
        segments
            .iter()
            .flat_map(|seg| self.local_span(seg))
            .map(|i| MatrixEntry {
                row: rows[i] as usize,
                col: cols[i] as usize,
                value: values[i],
            })
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl<'a, T: Element> LocalRange for &'a mut SparseMatrix<'_, T> {
    type Item = MatrixEntryMut<'a, T>;
    type Iter = std::vec::IntoIter<MatrixEntryMut<'a, T>>;

    fn into_local(self, segments: &[Segment]) -> Self::Iter {
        let spans: Vec<Range<usize>> = segments.iter().map(|seg| self.local_span(seg)).collect();
        let rows = self.row_idx.as_slice();
        let cols = self.col_idx.as_slice();
        let mut slots: Vec<Option<&'a mut T>> = self.values.as_mut_slice().iter_mut().map(Some).collect();
        let mut out = Vec::new();
        for span in spans {
            for i in span {
                match slots[i].take() {
                    Some(value) => out.push(MatrixEntryMut {
                        row: rows[i] as usize,
                        col: cols[i] as usize,
                        value,
                    }),
                    None => usage_violation!("overlapping local segments at entry {i}"),
                }
            }
        }
        out.into_iter()
    }
}
