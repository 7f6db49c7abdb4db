//! Rank-owned slices of a range's index space.

/// A contiguous block of a range owned by one rank.
///
/// `offset` is the global index of the first element. The segments of a
/// container partition `[0, len)` in index order without gaps or overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    rank: usize,
    offset: usize,
    len: usize,
}

impl Segment {
    /// Creates a segment of `len` elements at `offset`, owned by `rank`.
    #[inline]
    pub const fn new(rank: usize, offset: usize, len: usize) -> Self {
        Self { rank, offset, len }
    }

    /// Owning rank.
    #[inline]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    /// Global index of the first element.
    #[inline]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Number of elements.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for a segment without elements.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last global index.
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Returns `true` if `index` falls inside the segment.
    #[inline]
    pub const fn contains(&self, index: usize) -> bool {
        index >= self.offset && index < self.end()
    }

    /// Returns `true` if `rank` owns the segment.
    #[inline]
    pub const fn is_local(&self, rank: usize) -> bool {
        self.rank == rank
    }

    /// The part of the segment inside `[start, end)`, re-based so that
    /// `start` becomes index 0. `None` if nothing remains.
    pub fn clip(&self, start: usize, end: usize) -> Option<Segment> {
        let lo = self.offset.max(start);
        let hi = self.end().min(end);
        (lo < hi).then(|| Segment::new(self.rank, lo - start, hi - lo))
    }

    /// The same segment moved `by` indices up.
    #[must_use]
    pub const fn shift(self, by: usize) -> Segment {
        Segment::new(self.rank, self.offset + by, self.len)
    }
}
