//! The distributed-range model.
//!
//! A distributed range is anything that can describe itself as an ordered
//! list of [`Segment`]s. Containers and views implement the capability
//! traits below; algorithms only ever talk to these traits.
//!
//! - [`Segmented`]: length and segments (object safe, used by alignment).
//! - [`DistributedRange`]: globally consistent element reads.
//! - [`DistributedRangeMut`]: element writes to any rank.
//! - [`LocalRange`]: conversion of locally owned segments into an iterator
//!   over local storage.

mod alignment;
mod segment;
pub mod views;

pub use alignment::{aligned, segments_aligned};
pub use segment::Segment;

use zerocopy::{AsBytes, FromBytes};

/// Element types storable in distributed containers.
///
/// Elements travel between ranks as raw bytes, so every bit pattern must be
/// a valid value.
pub trait Element: Copy + Send + Sync + AsBytes + FromBytes + 'static {}

impl<T: Copy + Send + Sync + AsBytes + FromBytes + 'static> Element for T {}

/// A range that knows how it is partitioned.
pub trait Segmented {
    /// Number of elements.
    fn len(&self) -> usize;

    /// Returns `true` for an empty range.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segments in index order.
    ///
    /// Empty for a range without a usable partition, such as a zip of
    /// differently partitioned ranges.
    fn segments(&self) -> Vec<Segment>;

    /// Returns `true` if every element is available on every rank.
    fn is_replicated(&self) -> bool {
        false
    }
}

/// A range whose elements can be read from any rank.
pub trait DistributedRange: Segmented {
    /// Element value.
    type Value;

    /// Reads element `index`, wherever it lives.
    fn get(&self, index: usize) -> Self::Value;

    /// Reads `out.len()` elements starting at `offset`.
    fn get_many(&self, offset: usize, out: &mut [Self::Value]) {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.get(offset + i);
        }
    }
}

/// A range whose elements can be written from any rank.
///
/// Remote writes become visible to their owner at the next fence.
pub trait DistributedRangeMut: DistributedRange {
    /// Writes element `index`, wherever it lives.
    fn put(&mut self, index: usize, value: Self::Value);

    /// Writes `values` starting at `offset`.
    fn put_many(&mut self, offset: usize, values: &[Self::Value])
    where
        Self::Value: Clone,
    {
        for (i, value) in values.iter().enumerate() {
            self.put(offset + i, value.clone());
        }
    }
}

/// A range with direct access to the storage of its locally owned segments.
pub trait LocalRange: DistributedRange + Sized {
    /// Local element: a value for shared access, `&mut` for exclusive access.
    type Item: Send;
    /// Iterator over the elements of the requested segments.
    type Iter: Iterator<Item = Self::Item> + Send;

    /// Iterates the elements of `segments`, in order.
    ///
    /// Every segment must be owned by the calling rank.
    fn into_local(self, segments: &[Segment]) -> Self::Iter;
}

/// Segments of `segments` owned by `rank`.
pub fn local_segments(rank: usize, segments: &[Segment]) -> Vec<Segment> {
    segments.iter().copied().filter(|s| s.is_local(rank)).collect()
}

impl<R: Segmented + ?Sized> Segmented for &R {
    fn len(&self) -> usize {
        (**self).len()
    }
    fn segments(&self) -> Vec<Segment> {
        (**self).segments()
    }
    fn is_replicated(&self) -> bool {
        (**self).is_replicated()
    }
}

impl<R: Segmented + ?Sized> Segmented for &mut R {
    fn len(&self) -> usize {
        (**self).len()
    }
    fn segments(&self) -> Vec<Segment> {
        (**self).segments()
    }
    fn is_replicated(&self) -> bool {
        (**self).is_replicated()
    }
}

impl<R: DistributedRange + ?Sized> DistributedRange for &R {
    type Value = R::Value;

    fn get(&self, index: usize) -> R::Value {
        (**self).get(index)
    }
    fn get_many(&self, offset: usize, out: &mut [R::Value]) {
        (**self).get_many(offset, out);
    }
}

impl<R: DistributedRange + ?Sized> DistributedRange for &mut R {
    type Value = R::Value;

    fn get(&self, index: usize) -> R::Value {
        (**self).get(index)
    }
    fn get_many(&self, offset: usize, out: &mut [R::Value]) {
        (**self).get_many(offset, out);
    }
}

impl<R: DistributedRangeMut + ?Sized> DistributedRangeMut for &mut R {
    fn put(&mut self, index: usize, value: R::Value) {
        (**self).put(index, value);
    }
    fn put_many(&mut self, offset: usize, values: &[R::Value])
    where
        R::Value: Clone,
    {
        (**self).put_many(offset, values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_segments_filters_by_owner() {
        let segs = [Segment::new(0, 0, 3), Segment::new(1, 3, 3), Segment::new(0, 6, 1)];
        assert_eq!(local_segments(0, &segs), vec![segs[0], segs[2]]);
        assert!(local_segments(2, &segs).is_empty());
    }
}
