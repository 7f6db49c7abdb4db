//! Deciding whether ranges share one partitioning.
//!
//! Algorithms over several ranges take a segment-local fast path only when
//! the ranges are aligned; otherwise they fall back to element-wise remote
//! access.

use super::{Segment, Segmented};

/// Returns `true` if the two segment lists pair up one to one with equal
/// owners and lengths.
///
/// Offsets are not compared: `subrange(v, 2, 6)` and `subrange(w, 2, 6)`
/// start at 0 even though the underlying containers differ.
pub fn segments_aligned(a: &[Segment], b: &[Segment]) -> bool {
    if a.len() != b.len() {
        tracing::debug!(left = a.len(), right = b.len(), "unaligned: segment counts differ");
        return false;
    }
    match a
        .iter()
        .zip(b)
        .position(|(x, y)| x.rank() != y.rank() || x.len() != y.len())
    {
        Some(i) => {
            tracing::debug!(segment = i, left = ?a[i], right = ?b[i], "unaligned: segments differ");
            false
        }
        None => true,
    }
}

/// Returns `true` if every non-replicated range shares one partitioning.
///
/// Replicated ranges (such as [`iota`](super::views::iota)) are available
/// everywhere and never break alignment; a tuple of only replicated ranges
/// is aligned. A non-replicated range without segments makes the tuple
/// unaligned.
pub fn aligned(ranges: &[&dyn Segmented]) -> bool {
    let distributed: Vec<Vec<Segment>> = ranges
        .iter()
        .filter(|r| !r.is_replicated())
        .map(|r| r.segments())
        .collect();
    if let Some(i) = distributed.iter().position(Vec::is_empty) {
        tracing::debug!(range = i, "unaligned: range has no segments");
        return false;
    }
    distributed.windows(2).all(|pair| segments_aligned(&pair[0], &pair[1]))
}

/// Checks alignment of any number of ranges.
///
/// ```rust
/// use dranges::{aligned, views};
///
/// assert!(aligned!(views::iota_n(0u32, 4), views::iota_n(7u32, 4)));
/// ```
#[macro_export]
macro_rules! aligned {
    ($($range:expr),+ $(,)?) => {
        $crate::range::aligned(&[$(&$range as &dyn $crate::range::Segmented),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Fixed(Vec<Segment>);

    impl Segmented for Fixed {
        fn len(&self) -> usize {
            self.0.iter().map(Segment::len).sum()
        }
        fn segments(&self) -> Vec<Segment> {
            self.0.clone()
        }
    }

    fn blocks(lens: &[usize]) -> Fixed {
        let mut offset = 0;
        Fixed(
            lens.iter()
                .enumerate()
                .map(|(rank, &len)| {
                    let seg = Segment::new(rank, offset, len);
                    offset += len;
                    seg
                })
                .collect(),
        )
    }

    #[test]
    fn equal_partitions_align() {
        assert!(aligned(&[&blocks(&[3, 3, 2]), &blocks(&[3, 3, 2])]));
        assert!(!aligned(&[&blocks(&[3, 3, 2]), &blocks(&[3, 2, 3])]));
        assert!(!aligned(&[&blocks(&[3, 3]), &blocks(&[3, 3, 2])]));
    }

    #[test]
    fn owners_must_match() {
        let a = Fixed(vec![Segment::new(0, 0, 4)]);
        let b = Fixed(vec![Segment::new(1, 0, 4)]);
        assert!(!aligned(&[&a, &b]));
    }

    #[test]
    fn empty_segment_sets_never_align() {
        assert!(!aligned(&[&Fixed(vec![]), &Fixed(vec![])]));
        assert!(!aligned(&[&Fixed(vec![])]));
    }

    #[test]
    fn replicated_only_tuples_align() {
        let iota = crate::range::views::iota_n(0i32, 5);
        assert!(aligned(&[&iota, &iota]));
        assert!(aligned(&[&iota, &blocks(&[2, 3])]));
    }

    proptest! {
        #[test]
        fn alignment_is_symmetric(a in prop::collection::vec(1usize..6, 1..5),
                                  b in prop::collection::vec(1usize..6, 1..5)) {
            let (a, b) = (blocks(&a), blocks(&b));
            prop_assert_eq!(aligned(&[&a, &b]), aligned(&[&b, &a]));
        }

        #[test]
        fn alignment_is_transitive(a in prop::collection::vec(1usize..4, 1..4),
                                   b in prop::collection::vec(1usize..4, 1..4),
                                   c in prop::collection::vec(1usize..4, 1..4)) {
            let (a, b, c) = (blocks(&a), blocks(&b), blocks(&c));
            if aligned(&[&a, &b]) && aligned(&[&b, &c]) {
                prop_assert!(aligned(&[&a, &c]));
                prop_assert!(aligned(&[&a, &b, &c]));
            }
        }
    }
}
