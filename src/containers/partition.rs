//! Block partitioning of an index space over ranks.

use crate::range::Segment;

/// Contiguous blocks of equal size, one per rank in rank order.
///
/// The last block may be shorter; trailing ranks may own nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    len: usize,
    segment_size: usize,
    segments: Vec<Segment>,
}

impl Partition {
    /// Splits `[0, len)` over `ranks` ranks.
    ///
    /// The block size is `ceil(len / ranks)`, raised to at least
    /// `min_segment` and rounded up to a multiple of `granularity`.
    pub fn block(len: usize, ranks: usize, granularity: usize, min_segment: usize) -> Self {
        let granularity = granularity.max(1);
        let ranks = ranks.max(1);
        let segment_size = len
            .div_ceil(ranks)
            .max(min_segment)
            .max(1)
            .next_multiple_of(granularity);
        let segments = (0..len)
            .step_by(segment_size)
            .enumerate()
            .map(|(rank, offset)| Segment::new(rank, offset, segment_size.min(len - offset)))
            .collect();
        Self {
            len,
            segment_size,
            segments,
        }
    }

    /// Total number of indices.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there is nothing to partition.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of every block but possibly the last.
    #[inline]
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Blocks in index order.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Block owned by `rank`, if any.
    pub fn segment_of(&self, rank: usize) -> Option<Segment> {
        self.segments.get(rank).copied()
    }

    /// Owning rank and offset within its block of `index`.
    #[inline]
    pub fn locate(&self, index: usize) -> (usize, usize) {
        (index / self.segment_size, index % self.segment_size)
    }
}
