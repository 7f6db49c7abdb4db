//! Block-partitioned storage shared by the dense containers.

use core::mem;
use num_traits::Num;

use super::partition::Partition;
use super::region::Region;
use crate::config::{Distribution, HaloBounds};
use crate::context::Context;
use crate::error::Result;
use crate::halo::{Halo, HaloOp};
use crate::range::{Element, Segment};
use crate::usage_violation;

/// Local iterator over shared borrows of owned elements.
pub type LocalIter<'a, T> = core::iter::Copied<core::iter::Flatten<std::vec::IntoIter<&'a [T]>>>;

/// Local iterator over exclusive borrows of owned elements.
pub type LocalIterMut<'a, T> = core::iter::Flatten<std::vec::IntoIter<&'a mut [T]>>;

/// One block per rank, stored as `[prev ghosts | owned | next ghosts]`.
pub(crate) struct BlockStorage<'ctx, T> {
    partition: Partition,
    halo: Halo,
    region: Region<'ctx, T>,
}

impl<'ctx, T: Element> BlockStorage<'ctx, T> {
    /// Collectively allocates `len` elements; `bounds` and `granularity` are
    /// in elements.
    pub(crate) fn new(ctx: &'ctx Context, len: usize, bounds: HaloBounds, granularity: usize) -> Result<Self> {
        Distribution::new().granularity(granularity).validate()?;
        let partition = Partition::block(len, ctx.size(), granularity, bounds.prev.max(bounds.next));
        let halo = Halo::new(partition.segments(), ctx.rank(), bounds);
        let region = Region::new(ctx, halo.buffer_len())?;
        Ok(Self {
            partition,
            halo,
            region,
        })
    }

    #[inline]
    pub(crate) fn ctx(&self) -> &'ctx Context {
        self.region.ctx()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.partition.len()
    }

    #[inline]
    pub(crate) fn partition(&self) -> &Partition {
        &self.partition
    }

    #[inline]
    pub(crate) fn halo(&self) -> &Halo {
        &self.halo
    }

    /// This rank's segment; empty past the last segment.
    pub(crate) fn own_segment(&self) -> Segment {
        let rank = self.ctx().rank();
        self.partition
            .segment_of(rank)
            .unwrap_or_else(|| Segment::new(rank, self.len(), 0))
    }

    pub(crate) fn owned(&self) -> &[T] {
        &self.region.as_slice()[self.halo.owned_range()]
    }

    /// Owned elements; marks the halo stale.
    pub(crate) fn owned_mut(&mut self) -> &mut [T] {
        self.halo.mark_dirty();
        let range = self.halo.owned_range();
        &mut self.region.as_mut_slice()[range]
    }

    /// `[prev ghosts | owned | next ghosts]`.
    pub(crate) fn with_halo(&self) -> &[T] {
        self.region.as_slice()
    }

    pub(crate) fn prev_ghosts(&self) -> &[T] {
        &self.region.as_slice()[..self.halo.owned_range().start]
    }

    pub(crate) fn next_ghosts(&self) -> &[T] {
        &self.region.as_slice()[self.halo.owned_range().end..]
    }

    /// Local reference to global element `index`, if this rank owns it.
    pub(crate) fn local(&self, index: usize) -> Option<&T> {
        let seg = self.own_segment();
        seg.contains(index).then(|| &self.owned()[index - seg.offset()])
    }

    pub(crate) fn local_mut(&mut self, index: usize) -> Option<&mut T> {
        let seg = self.own_segment();
        if seg.contains(index) {
            Some(&mut self.owned_mut()[index - seg.offset()])
        } else {
            None
        }
    }

    /// Owner and buffer displacement of `index`.
    fn locate(&self, index: usize) -> (usize, usize) {
        if index >= self.len() {
            usage_violation!("index {index} out of range for length {}", self.len());
        }
        let (rank, offset) = self.partition.locate(index);
        (rank, self.halo.bounds().prev + offset)
    }

    pub(crate) fn get(&self, index: usize) -> T {
        let (rank, disp) = self.locate(index);
        if rank == self.ctx().rank() {
            self.region.as_slice()[disp]
        } else {
            self.region.window().get(rank, disp)
        }
    }

    pub(crate) fn put(&mut self, index: usize, value: T) {
        let (rank, disp) = self.locate(index);
        if rank == self.ctx().rank() {
            self.halo.mark_dirty();
            self.region.as_mut_slice()[disp] = value;
        } else {
            self.region.window().put(rank, disp, &value);
        }
    }

    /// Per-segment pieces of `[offset, offset + count)`.
    fn pieces(&self, offset: usize, count: usize) -> Vec<Segment> {
        if offset + count > self.len() {
            usage_violation!(
                "access [{offset}, {}) out of range for length {}",
                offset + count,
                self.len()
            );
        }
        self.partition
            .segments()
            .iter()
            .filter_map(|s| s.clip(offset, offset + count))
            .collect()
    }

    pub(crate) fn get_many(&self, offset: usize, out: &mut [T]) {
        for piece in self.pieces(offset, out.len()) {
            let (rank, disp) = self.locate(offset + piece.offset());
            let dst = &mut out[piece.offset()..piece.end()];
            if rank == self.ctx().rank() {
                dst.copy_from_slice(&self.region.as_slice()[disp..disp + piece.len()]);
            } else {
                self.region.window().get_into(rank, disp, dst);
            }
        }
    }

    pub(crate) fn put_many(&mut self, offset: usize, values: &[T]) {
        for piece in self.pieces(offset, values.len()) {
            let (rank, disp) = self.locate(offset + piece.offset());
            let src = &values[piece.offset()..piece.end()];
            if rank == self.ctx().rank() {
                self.halo.mark_dirty();
                self.region.as_mut_slice()[disp..disp + piece.len()].copy_from_slice(src);
            } else {
                self.region.window().put_slice(rank, disp, src);
            }
        }
    }

    fn check_owned(&self, seg: &Segment, own: &Segment) {
        if !seg.is_local(own.rank()) || seg.offset() < own.offset() || seg.end() > own.end() {
            usage_violation!("rank {} does not own {seg:?}", own.rank());
        }
    }

    /// Local slices of `segments`, all of which must be owned by this rank.
    pub(crate) fn carve(&self, segments: &[Segment]) -> Vec<&[T]> {
        let own = self.own_segment();
        let owned = self.owned();
        segments
            .iter()
            .map(|seg| {
                self.check_owned(seg, &own);
                let start = seg.offset() - own.offset();
                &owned[start..start + seg.len()]
            })
            .collect()
    }

    /// Disjoint mutable slices of `segments`, which must be owned by this
    /// rank, ascending and non-overlapping. Marks the halo stale.
    pub(crate) fn carve_mut(&mut self, segments: &[Segment]) -> Vec<&mut [T]> {
        let own = self.own_segment();
        for seg in segments {
            self.check_owned(seg, &own);
        }
        let mut rest = self.owned_mut();
        let mut cursor = own.offset();
        let mut out = Vec::with_capacity(segments.len());
        for seg in segments {
            if seg.offset() < cursor {
                usage_violation!("overlapping or unordered local segment {seg:?}");
            }
            let tail = mem::take(&mut rest);
            let (_, tail) = tail.split_at_mut(seg.offset() - cursor);
            let (piece, tail) = tail.split_at_mut(seg.len());
            out.push(piece);
            rest = tail;
            cursor = seg.end();
        }
        out
    }

    pub(crate) fn local_iter<'a>(&'a self, segments: &[Segment]) -> LocalIter<'a, T> {
        self.carve(segments).into_iter().flatten().copied()
    }

    pub(crate) fn local_iter_mut<'a>(&'a mut self, segments: &[Segment]) -> LocalIterMut<'a, T> {
        self.carve_mut(segments).into_iter().flatten()
    }

    pub(crate) fn exchange_begin(&mut self) {
        let comm = self.region.ctx().comm();
        self.halo.exchange_begin(comm, self.region.as_slice());
    }

    pub(crate) fn exchange_finalize(&mut self) {
        let comm = self.region.ctx().comm();
        self.halo.exchange_finalize(comm, self.region.as_mut_slice());
    }

    pub(crate) fn exchange(&mut self) {
        self.exchange_begin();
        self.exchange_finalize();
    }

    pub(crate) fn halo_reduce(&mut self, op: HaloOp)
    where
        T: Num + PartialOrd,
    {
        let comm = self.region.ctx().comm();
        self.halo.reduce(comm, self.region.as_mut_slice(), op);
    }
}
