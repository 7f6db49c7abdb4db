//! Lazy views over distributed ranges.
//!
//! Views never own or copy elements. They derive their segments from the
//! ranges they wrap, and local iteration is forwarded to those ranges.

use core::ops::Range;
use num_traits::NumCast;

use super::{DistributedRange, DistributedRangeMut, LocalRange, Segment, Segmented};
use crate::usage_violation;

fn clip_all(segments: Vec<Segment>, start: usize, end: usize) -> Vec<Segment> {
    segments.iter().filter_map(|s| s.clip(start, end)).collect()
}

fn check_index(index: usize, len: usize) {
    if index >= len {
        usage_violation!("index {index} out of range for a view of length {len}");
    }
}

/// Elements `[start, end)` of a range, re-indexed from 0.
#[derive(Debug, Clone)]
pub struct Subrange<R> {
    base: R,
    start: usize,
    end: usize,
}

/// Elements `[start, end)` of `base`; bounds are clamped to the range.
pub fn subrange<R: Segmented>(base: R, start: usize, end: usize) -> Subrange<R> {
    let end = end.min(base.len());
    let start = start.min(end);
    Subrange { base, start, end }
}

/// The first `n` elements of `base`.
pub fn take<R: Segmented>(base: R, n: usize) -> Subrange<R> {
    subrange(base, 0, n)
}

/// Everything after the first `n` elements of `base`.
pub fn drop<R: Segmented>(base: R, n: usize) -> Subrange<R> {
    let len = base.len();
    subrange(base, n, len)
}

impl<R> Subrange<R> {
    /// The wrapped range.
    pub fn into_inner(self) -> R {
        self.base
    }
}

impl<R: Segmented> Segmented for Subrange<R> {
    fn len(&self) -> usize {
        self.end - self.start
    }
    fn segments(&self) -> Vec<Segment> {
        clip_all(self.base.segments(), self.start, self.end)
    }
    fn is_replicated(&self) -> bool {
        self.base.is_replicated()
    }
}

impl<R: DistributedRange> DistributedRange for Subrange<R> {
    type Value = R::Value;

    fn get(&self, index: usize) -> R::Value {
        check_index(index, self.len());
        self.base.get(self.start + index)
    }
}

impl<R: DistributedRangeMut> DistributedRangeMut for Subrange<R> {
    fn put(&mut self, index: usize, value: R::Value) {
        check_index(index, self.len());
        self.base.put(self.start + index, value);
    }
}

impl<R: LocalRange> LocalRange for Subrange<R> {
    type Item = R::Item;
    type Iter = R::Iter;

    fn into_local(self, segments: &[Segment]) -> R::Iter {
        let shifted: Vec<Segment> = segments.iter().map(|s| s.shift(self.start)).collect();
        self.base.into_local(&shifted)
    }
}

/// Two ranges walked in lockstep.
///
/// The zip is as long as the shorter range. Its segments are those of the
/// non-replicated side, or empty when both sides are distributed but not
/// aligned.
#[derive(Debug, Clone)]
pub struct Zip<A, B> {
    a: A,
    b: B,
}

/// Pairs `a[i]` with `b[i]`.
pub fn zip<A: Segmented, B: Segmented>(a: A, b: B) -> Zip<A, B> {
    Zip { a, b }
}

impl<A, B> Zip<A, B> {
    /// The two wrapped ranges.
    pub fn into_inner(self) -> (A, B) {
        (self.a, self.b)
    }
}

impl<A: Segmented, B: Segmented> Segmented for Zip<A, B> {
    fn len(&self) -> usize {
        self.a.len().min(self.b.len())
    }

    fn segments(&self) -> Vec<Segment> {
        let n = self.len();
        match (self.a.is_replicated(), self.b.is_replicated()) {
            (_, true) => clip_all(self.a.segments(), 0, n),
            (true, false) => clip_all(self.b.segments(), 0, n),
            (false, false) => {
                let a = clip_all(self.a.segments(), 0, n);
                let b = clip_all(self.b.segments(), 0, n);
                if super::segments_aligned(&a, &b) {
                    a
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn is_replicated(&self) -> bool {
        self.a.is_replicated() && self.b.is_replicated()
    }
}

impl<A: DistributedRange, B: DistributedRange> DistributedRange for Zip<A, B> {
    type Value = (A::Value, B::Value);

    fn get(&self, index: usize) -> Self::Value {
        check_index(index, self.len());
        (self.a.get(index), self.b.get(index))
    }
}

impl<A: LocalRange, B: LocalRange> LocalRange for Zip<A, B> {
    type Item = (A::Item, B::Item);
    type Iter = core::iter::Zip<A::Iter, B::Iter>;

    fn into_local(self, segments: &[Segment]) -> Self::Iter {
        self.a.into_local(segments).zip(self.b.into_local(segments))
    }
}

/// A range with `op` applied to every element on access.
#[derive(Debug, Clone)]
pub struct Transform<R, F> {
    base: R,
    op: F,
}

/// Applies `op` lazily to every element of `base`.
pub fn transform<R, F, U>(base: R, op: F) -> Transform<R, F>
where
    R: DistributedRange,
    F: Fn(R::Value) -> U,
{
    Transform { base, op }
}

impl<R: Segmented, F> Segmented for Transform<R, F> {
    fn len(&self) -> usize {
        self.base.len()
    }
    fn segments(&self) -> Vec<Segment> {
        self.base.segments()
    }
    fn is_replicated(&self) -> bool {
        self.base.is_replicated()
    }
}

impl<R, F, U> DistributedRange for Transform<R, F>
where
    R: DistributedRange,
    F: Fn(R::Value) -> U,
{
    type Value = U;

    fn get(&self, index: usize) -> U {
        (self.op)(self.base.get(index))
    }
}

impl<R, F, U> LocalRange for Transform<R, F>
where
    R: LocalRange<Item = <R as DistributedRange>::Value>,
    F: Fn(R::Value) -> U + Send,
    U: Send,
{
    type Item = U;
    type Iter = core::iter::Map<R::Iter, F>;

    fn into_local(self, segments: &[Segment]) -> Self::Iter {
        self.base.into_local(segments).map(self.op)
    }
}

/// The replicated sequence `start, start + 1, ...`.
#[derive(Debug, Clone, Copy)]
pub struct Iota<T> {
    start: T,
    len: usize,
}

/// An unbounded iota; zipping bounds it by the other range.
pub fn iota<T>(start: T) -> Iota<T> {
    Iota { start, len: usize::MAX }
}

/// `n` values starting at `start`.
pub fn iota_n<T>(start: T, n: usize) -> Iota<T> {
    Iota { start, len: n }
}

/// Values an [`Iota`] can produce: `forward(n)` is `self + n`, or `None` when
/// the sum does not fit the type.
pub trait Step: Copy {
    /// Advances by `n`.
    fn forward(self, n: usize) -> Option<Self>;
}

macro_rules! step_integer {
    ($($t:ty),*) => {$(
        impl Step for $t {
            #[inline]
            fn forward(self, n: usize) -> Option<Self> {
                <$t as NumCast>::from(n).and_then(|n| self.checked_add(n))
            }
        }
    )*};
}

macro_rules! step_float {
    ($($t:ty),*) => {$(
        impl Step for $t {
            #[inline]
            fn forward(self, n: usize) -> Option<Self> {
                <$t as NumCast>::from(n).map(|n| self + n)
            }
        }
    )*};
}

step_integer!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
step_float!(f32, f64);

fn iota_value<T: Step>(start: T, index: usize) -> T {
    match start.forward(index) {
        Some(value) => value,
        None => usage_violation!("iota index {index} does not fit the value type"),
    }
}

impl<T> Segmented for Iota<T> {
    fn len(&self) -> usize {
        self.len
    }
    fn segments(&self) -> Vec<Segment> {
        if self.len == 0 {
            Vec::new()
        } else {
            vec![Segment::new(0, 0, self.len)]
        }
    }
    fn is_replicated(&self) -> bool {
        true
    }
}

impl<T: Step> DistributedRange for Iota<T> {
    type Value = T;

    fn get(&self, index: usize) -> T {
        check_index(index, self.len);
        iota_value(self.start, index)
    }
}

impl<T: Step + Send> LocalRange for Iota<T> {
    type Item = T;
    type Iter = IotaIter<T>;

    fn into_local(self, segments: &[Segment]) -> IotaIter<T> {
        let ranges: Vec<Range<usize>> = segments.iter().map(|s| s.offset()..s.end()).collect();
        IotaIter {
            start: self.start,
            ranges: ranges.into_iter(),
            current: 0..0,
        }
    }
}

/// Local iterator of an [`Iota`].
#[derive(Debug)]
pub struct IotaIter<T> {
    start: T,
    ranges: std::vec::IntoIter<Range<usize>>,
    current: Range<usize>,
}

impl<T: Step> Iterator for IotaIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(index) = self.current.next() {
                return Some(iota_value(self.start, index));
            }
            self.current = self.ranges.next()?;
        }
    }
}

/// Pairs every element of `base` with its index.
pub fn enumerate<R: Segmented>(base: R) -> Zip<Iota<usize>, R> {
    let n = base.len();
    zip(iota_n(0, n), base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blocks {
        segs: Vec<Segment>,
    }

    impl Segmented for Blocks {
        fn len(&self) -> usize {
            self.segs.iter().map(Segment::len).sum()
        }
        fn segments(&self) -> Vec<Segment> {
            self.segs.clone()
        }
    }

    impl DistributedRange for Blocks {
        type Value = usize;
        fn get(&self, index: usize) -> usize {
            index * 10
        }
    }

    fn four_by_three() -> Blocks {
        Blocks {
            segs: (0..4).map(|r| Segment::new(r, r * 3, 3)).collect(),
        }
    }

    #[test]
    fn subrange_rebases_segments() {
        let view = subrange(four_by_three(), 2, 7);
        assert_eq!(view.len(), 5);
        assert_eq!(
            view.segments(),
            vec![Segment::new(0, 0, 1), Segment::new(1, 1, 3), Segment::new(2, 4, 1)]
        );
        assert_eq!(view.get(0), 20);
    }

    #[test]
    fn take_and_drop_clamp() {
        assert_eq!(take(four_by_three(), 100).len(), 12);
        assert_eq!(drop(four_by_three(), 100).len(), 0);
        assert!(drop(four_by_three(), 100).segments().is_empty());
        assert_eq!(drop(four_by_three(), 10).segments(), vec![Segment::new(3, 0, 2)]);
    }

    #[test]
    fn zip_uses_distributed_side_segments() {
        let z = zip(iota(5u64), four_by_three());
        assert_eq!(z.len(), 12);
        assert_eq!(z.segments(), four_by_three().segments());
        assert_eq!(z.get(3), (8, 30));
    }

    #[test]
    fn misaligned_zip_has_no_segments() {
        let z = zip(four_by_three(), drop(four_by_three(), 1));
        assert_eq!(z.len(), 11);
        assert!(z.segments().is_empty());
    }

    #[test]
    fn transform_applies_lazily() {
        let t = transform(four_by_three(), |v| v + 1);
        assert_eq!(t.get(2), 21);
        assert_eq!(t.segments().len(), 4);
    }

    #[test]
    fn iota_local_iteration_follows_segments() {
        let values: Vec<i64> = iota(100i64)
            .into_local(&[Segment::new(0, 2, 2), Segment::new(0, 7, 1)])
            .collect();
        assert_eq!(values, vec![102, 103, 107]);
    }

    #[test]
    fn enumerate_pairs_indices() {
        let e = enumerate(four_by_three());
        assert_eq!(e.get(4), (4, 40));
        assert_eq!(e.segments(), four_by_three().segments());
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn iota_overflow_is_a_violation() {
        let _ = iota(0u8).get(300);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn iota_sum_past_the_type_is_a_violation() {
        let _: Vec<i8> = iota_n(100i8, 50).into_local(&[Segment::new(0, 0, 50)]).collect();
    }

    #[test]
    fn float_iota_steps_by_one() {
        assert_eq!(iota(0.5f64).get(3), 3.5);
        assert_eq!(10u8.forward(245), Some(255));
        assert_eq!(10u8.forward(246), None);
    }
}
