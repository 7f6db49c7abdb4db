//! Ghost-region (halo) exchange.
//!
//! A halo-bearing block is stored as `[prev ghosts | owned | next ghosts]`.
//! The ghosts replicate the boundary elements of the neighboring segments and
//! are refreshed only by an explicit [`Halo::exchange`]. Any mutable access
//! to the owned elements marks the halo stale again.
//!
//! The reverse operation, [`Halo::reduce`], folds ghost contents back into the
//! neighbors' owned boundary elements.
//!
//! Besides the block layout, [`Halo::from_index_maps`] builds a halo over
//! arbitrary local slots given as per-peer index lists.

use core::ops::Range;
use num_traits::Num;

use crate::comm::{Communicator, Tag};
use crate::range::{Element, Segment};
use crate::usage_violation;

pub use crate::config::HaloBounds;

/// Freshness of the ghost regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HaloState {
    /// Ghosts may differ from the neighbors' owned data.
    #[default]
    Unsynchronized,
    /// Boundary data has been sent; ghosts are not received yet.
    Synchronizing,
    /// Ghosts match the neighbors' owned data.
    Synchronized,
}

/// Combination applied by [`Halo::reduce`] to `(owned, ghost)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaloOp {
    /// Keep the ghost value.
    Second,
    /// Sum.
    Plus,
    /// Maximum.
    Max,
    /// Minimum.
    Min,
    /// Product.
    Multiplies,
}

impl HaloOp {
    /// Combines an owned value with an incoming ghost value.
    pub fn apply<T: Num + PartialOrd + Copy>(self, owned: T, ghost: T) -> T {
        match self {
            HaloOp::Second => ghost,
            HaloOp::Plus => owned + ghost,
            HaloOp::Max => {
                if ghost > owned {
                    ghost
                } else {
                    owned
                }
            }
            HaloOp::Min => {
                if ghost < owned {
                    ghost
                } else {
                    owned
                }
            }
            HaloOp::Multiplies => owned * ghost,
        }
    }
}

/// Buffer slots covered by one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slots {
    /// A contiguous run, sent and received in place.
    Span(Range<usize>),
    /// Scattered slots, packed into one message in list order.
    Indices(Vec<usize>),
}

impl Slots {
    /// Wraps an index list; a run of consecutive indices becomes a span.
    pub fn from_indices(indices: Vec<usize>) -> Self {
        match (indices.first(), indices.last()) {
            (Some(&first), Some(&last)) if indices.windows(2).all(|w| w[1] == w[0] + 1) => {
                Slots::Span(first..last + 1)
            }
            _ => Slots::Indices(indices),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        match self {
            Slots::Span(range) => range.len(),
            Slots::Indices(indices) => indices.len(),
        }
    }

    /// Returns `true` if the group covers no slot.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One past the highest slot.
    fn end(&self) -> usize {
        match self {
            Slots::Span(range) => range.end,
            Slots::Indices(indices) => indices.iter().max().map_or(0, |&i| i + 1),
        }
    }
}

/// One neighbor exchange: which rank, which message class, which buffer slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaloGroup {
    /// Peer rank.
    pub neighbor: usize,
    /// Message class of the exchange direction.
    pub tag: Tag,
    /// Slots in the local buffer.
    pub slots: Slots,
}

impl HaloGroup {
    fn post<T: Element>(&self, comm: &Communicator, tag: Tag, buffer: &[T]) {
        match &self.slots {
            Slots::Span(range) => comm.send(self.neighbor, tag, &buffer[range.clone()]),
            Slots::Indices(indices) => {
                let packed: Vec<T> = indices.iter().map(|&i| buffer[i]).collect();
                comm.send(self.neighbor, tag, &packed);
            }
        }
    }

    fn receive<T: Element>(&self, comm: &Communicator, tag: Tag, buffer: &mut [T]) {
        match &self.slots {
            Slots::Span(range) => comm.recv_into(self.neighbor, tag, &mut buffer[range.clone()]),
            Slots::Indices(_) => self.combine(comm, tag, buffer, |_, incoming| incoming),
        }
    }

    fn combine<T: Element>(&self, comm: &Communicator, tag: Tag, buffer: &mut [T], op: impl Fn(T, T) -> T) {
        let incoming: Vec<T> = comm.recv(self.neighbor, tag);
        if incoming.len() != self.slots.len() {
            usage_violation!(
                "halo group of {} slots received {} elements from rank {}",
                self.slots.len(),
                incoming.len(),
                self.neighbor
            );
        }
        match &self.slots {
            Slots::Span(range) => {
                for (slot, value) in buffer[range.clone()].iter_mut().zip(incoming) {
                    *slot = op(*slot, value);
                }
            }
            Slots::Indices(indices) => {
                for (&i, value) in indices.iter().zip(incoming) {
                    buffer[i] = op(buffer[i], value);
                }
            }
        }
    }
}

fn reversed(tag: Tag) -> Tag {
    match tag {
        Tag::HaloForward => Tag::HaloReverse,
        Tag::HaloReverse => Tag::HaloForward,
        other => other,
    }
}

/// A run of consecutive ghost slots of one segment filled from one owner.
struct Piece {
    owner: usize,
    tag: Tag,
    ghost: Range<usize>,
    source: Range<usize>,
}

/// Ghost slots of segment `k` in slot order, each run mapped to the segment
/// owning its elements and the slots they occupy in that owner's buffer.
/// A ghost region wider than the adjacent segment continues into the
/// segments beyond it.
fn ghost_pieces(segments: &[Segment], k: usize, bounds: HaloBounds) -> Vec<Piece> {
    let total = segments.last().map_or(0, Segment::end);
    if total == 0 {
        return Vec::new();
    }
    let (p, q) = (bounds.prev, bounds.next);
    let seg = segments[k];
    let before = (0..p).map(|s| (s, seg.offset() as isize - (p - s) as isize, Tag::HaloForward));
    let after = (0..q).map(|s| (p + seg.len() + s, (seg.end() + s) as isize, Tag::HaloReverse));

    let mut pieces: Vec<Piece> = Vec::new();
    for (slot, global, tag) in before.chain(after) {
        let index = if bounds.periodic {
            global.rem_euclid(total as isize) as usize
        } else if global < 0 || global >= total as isize {
            continue;
        } else {
            global as usize
        };
        let owner = segments.partition_point(|s| s.end() <= index);
        let source = p + index - segments[owner].offset();
        match pieces.last_mut() {
            Some(last) if last.owner == owner && last.tag == tag && last.ghost.end == slot && last.source.end == source => {
                last.ghost.end += 1;
                last.source.end += 1;
            }
            _ => pieces.push(Piece {
                owner,
                tag,
                ghost: slot..slot + 1,
                source: source..source + 1,
            }),
        }
    }
    pieces
}

/// Neighbor groups and synchronization state of one rank's buffer.
#[derive(Debug, Clone)]
pub struct Halo {
    bounds: HaloBounds,
    owned: Range<usize>,
    len: usize,
    sends: Vec<HaloGroup>,
    receives: Vec<HaloGroup>,
    state: HaloState,
    reducing: bool,
}

impl Halo {
    /// Derives the groups of `rank` from a container's segments.
    ///
    /// Ghost slots are filled from whichever segments own the neighboring
    /// indices, so a ghost region wider than the adjacent segment reaches
    /// into the next one over. Without periodicity the slots past the domain
    /// edges are never written. A rank without a segment gets no groups.
    pub fn new(segments: &[Segment], rank: usize, bounds: HaloBounds) -> Self {
        let (p, q) = (bounds.prev, bounds.next);
        let Some(i) = segments.iter().position(|s| s.is_local(rank)) else {
            return Self::with_groups(bounds, p..p, p + q, Vec::new(), Vec::new());
        };
        let n = segments[i].len();

        let receives: Vec<HaloGroup> = ghost_pieces(segments, i, bounds)
            .into_iter()
            .map(|piece| HaloGroup {
                neighbor: segments[piece.owner].rank(),
                tag: piece.tag,
                slots: Slots::Span(piece.ghost),
            })
            .collect();
        let sends: Vec<HaloGroup> = (0..segments.len())
            .flat_map(|k| {
                ghost_pieces(segments, k, bounds)
                    .into_iter()
                    .filter(move |piece| piece.owner == i)
                    .map(move |piece| HaloGroup {
                        neighbor: segments[k].rank(),
                        tag: piece.tag,
                        slots: Slots::Span(piece.source),
                    })
            })
            .collect();
        tracing::debug!(
            rank,
            sources = ?receives.iter().map(|g| g.neighbor).collect::<Vec<_>>(),
            sends = sends.len(),
            receives = receives.len(),
            "halo groups"
        );
        Self::with_groups(bounds, p..p + n, p + n + q, sends, receives)
    }

    /// Builds an index-list halo over a local buffer of `len` elements.
    ///
    /// `owned` maps each peer rank to the local slots it keeps ghost copies
    /// of; `ghosts` maps each peer rank to the local slots replicating its
    /// elements. Both sides of a peer pair must list the same number of
    /// slots, and several lists for one peer pair in the same order.
    pub fn from_index_maps(len: usize, owned: Vec<(usize, Vec<usize>)>, ghosts: Vec<(usize, Vec<usize>)>) -> Self {
        let groups = |map: Vec<(usize, Vec<usize>)>| -> Vec<HaloGroup> {
            map.into_iter()
                .map(|(neighbor, indices)| HaloGroup {
                    neighbor,
                    tag: Tag::HaloIndex,
                    slots: Slots::from_indices(indices),
                })
                .collect()
        };
        let sends = groups(owned);
        let receives = groups(ghosts);
        if let Some(group) = sends.iter().chain(&receives).find(|g| g.slots.end() > len) {
            usage_violation!("halo slots {:?} exceed a buffer of {len}", group.slots);
        }
        tracing::debug!(len, sends = sends.len(), receives = receives.len(), "index halo groups");
        Self::with_groups(HaloBounds::default(), 0..len, len, sends, receives)
    }

    fn with_groups(
        bounds: HaloBounds,
        owned: Range<usize>,
        len: usize,
        sends: Vec<HaloGroup>,
        receives: Vec<HaloGroup>,
    ) -> Self {
        Self {
            bounds,
            owned,
            len,
            sends,
            receives,
            state: HaloState::Unsynchronized,
            reducing: false,
        }
    }

    /// Configured ghost widths; empty for an index-list halo.
    #[inline]
    pub fn bounds(&self) -> HaloBounds {
        self.bounds
    }

    /// Current synchronization state.
    #[inline]
    pub fn state(&self) -> HaloState {
        self.state
    }

    /// Groups whose owned slots are sent during an exchange.
    pub fn sends(&self) -> &[HaloGroup] {
        &self.sends
    }

    /// Groups whose ghost slots are filled during an exchange.
    pub fn receives(&self) -> &[HaloGroup] {
        &self.receives
    }

    /// Length of the local buffer.
    #[inline]
    pub fn buffer_len(&self) -> usize {
        self.len
    }

    /// Slots of the owned elements in the local buffer.
    #[inline]
    pub fn owned_range(&self) -> Range<usize> {
        self.owned.clone()
    }

    /// Records a mutable access to the owned elements.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.state = HaloState::Unsynchronized;
    }

    fn check_buffer(&self, len: usize) {
        if len != self.len {
            usage_violation!("halo buffer of {len} slots, expected {}", self.len);
        }
    }

    /// Posts the owned boundary elements to the neighbors.
    pub fn exchange_begin<T: Element>(&mut self, comm: &Communicator, buffer: &[T]) {
        self.check_buffer(buffer.len());
        for group in &self.sends {
            group.post(comm, group.tag, buffer);
        }
        self.state = HaloState::Synchronizing;
    }

    /// Receives the neighbors' boundary elements into the ghost slots.
    pub fn exchange_finalize<T: Element>(&mut self, comm: &Communicator, buffer: &mut [T]) {
        self.check_buffer(buffer.len());
        if self.state != HaloState::Synchronizing || self.reducing {
            usage_violation!("halo exchange finalized without a matching begin");
        }
        for group in &self.receives {
            group.receive(comm, group.tag, buffer);
        }
        self.state = HaloState::Synchronized;
    }

    /// Refreshes every ghost slot from the neighbors.
    pub fn exchange<T: Element>(&mut self, comm: &Communicator, buffer: &mut [T]) {
        self.exchange_begin(comm, buffer);
        self.exchange_finalize(comm, buffer);
    }

    /// Posts the ghost contents back to their owners.
    pub fn reduce_begin<T: Element>(&mut self, comm: &Communicator, buffer: &[T]) {
        self.check_buffer(buffer.len());
        for group in &self.receives {
            group.post(comm, reversed(group.tag), buffer);
        }
        self.state = HaloState::Synchronizing;
        self.reducing = true;
    }

    /// Combines the neighbors' ghost contents into the owned boundary.
    pub fn reduce_finalize<T>(&mut self, comm: &Communicator, buffer: &mut [T], op: HaloOp)
    where
        T: Element + Num + PartialOrd,
    {
        self.check_buffer(buffer.len());
        if !self.reducing {
            usage_violation!("halo reduction finalized without a matching begin");
        }
        for group in &self.sends {
            group.combine(comm, reversed(group.tag), buffer, |owned, ghost| op.apply(owned, ghost));
        }
        self.reducing = false;
        self.state = HaloState::Unsynchronized;
    }

    /// Folds every ghost slot into its owner with `op`.
    pub fn reduce<T>(&mut self, comm: &Communicator, buffer: &mut [T], op: HaloOp)
    where
        T: Element + Num + PartialOrd,
    {
        self.reduce_begin(comm, buffer);
        self.reduce_finalize(comm, buffer, op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fabric;

    fn blocks(lens: &[usize]) -> Vec<Segment> {
        let mut offset = 0;
        lens.iter()
            .enumerate()
            .map(|(rank, &len)| {
                let seg = Segment::new(rank, offset, len);
                offset += len;
                seg
            })
            .collect()
    }

    #[test]
    fn interior_rank_talks_to_both_sides() {
        let halo = Halo::new(&blocks(&[5, 5, 5]), 1, HaloBounds::symmetric(2, false));
        assert_eq!(halo.buffer_len(), 9);
        assert_eq!(
            halo.receives(),
            &[
                HaloGroup { neighbor: 0, tag: Tag::HaloForward, slots: Slots::Span(0..2) },
                HaloGroup { neighbor: 2, tag: Tag::HaloReverse, slots: Slots::Span(7..9) },
            ]
        );
        assert_eq!(
            halo.sends(),
            &[
                HaloGroup { neighbor: 0, tag: Tag::HaloReverse, slots: Slots::Span(2..4) },
                HaloGroup { neighbor: 2, tag: Tag::HaloForward, slots: Slots::Span(5..7) },
            ]
        );
    }

    #[test]
    fn edges_are_open_without_periodicity() {
        let segs = blocks(&[4, 4]);
        let first = Halo::new(&segs, 0, HaloBounds::symmetric(1, false));
        assert_eq!(first.receives().len(), 1);
        assert_eq!(first.receives()[0].neighbor, 1);

        let wrapped = Halo::new(&segs, 0, HaloBounds::symmetric(1, true));
        assert_eq!(wrapped.receives().len(), 2);
    }

    #[test]
    fn open_edge_slots_stay_unfilled() {
        let halo = Halo::new(&blocks(&[1, 6]), 1, HaloBounds::asymmetric(3, 0, false));
        assert_eq!(halo.receives().len(), 1);
        assert_eq!(halo.receives()[0].slots, Slots::Span(2..3));
        assert!(halo.sends().is_empty());
    }

    #[test]
    fn wide_ghosts_reach_past_a_short_neighbor() {
        let segs = blocks(&[3, 3, 3, 1]);
        let first = Halo::new(&segs, 0, HaloBounds::symmetric(2, true));
        assert_eq!(
            first.receives(),
            &[
                HaloGroup { neighbor: 2, tag: Tag::HaloForward, slots: Slots::Span(0..1) },
                HaloGroup { neighbor: 3, tag: Tag::HaloForward, slots: Slots::Span(1..2) },
                HaloGroup { neighbor: 1, tag: Tag::HaloReverse, slots: Slots::Span(5..7) },
            ]
        );
        let third = Halo::new(&segs, 2, HaloBounds::symmetric(2, true));
        assert!(third.sends().contains(&HaloGroup {
            neighbor: 0,
            tag: Tag::HaloForward,
            slots: Slots::Span(4..5),
        }));
    }

    #[test]
    fn index_lists_collapse_to_spans() {
        assert_eq!(Slots::from_indices(vec![4, 5, 6]), Slots::Span(4..7));
        assert_eq!(Slots::from_indices(vec![6, 5]), Slots::Indices(vec![6, 5]));
        assert!(Slots::from_indices(Vec::new()).is_empty());
    }

    #[test]
    #[should_panic(expected = "exceed a buffer")]
    fn index_map_outside_the_buffer_is_a_violation() {
        let _ = Halo::from_index_maps(4, vec![(1, vec![0, 4])], Vec::new());
    }

    #[test]
    fn rank_without_segment_has_no_groups() {
        let halo = Halo::new(&blocks(&[3, 3]), 2, HaloBounds::symmetric(1, true));
        assert!(halo.sends().is_empty() && halo.receives().is_empty());
    }

    #[test]
    fn ops_combine_owned_and_ghost() {
        assert_eq!(HaloOp::Second.apply(1, 2), 2);
        assert_eq!(HaloOp::Plus.apply(1, 2), 3);
        assert_eq!(HaloOp::Max.apply(1, 2), 2);
        assert_eq!(HaloOp::Min.apply(1.5, 2.0), 1.5);
        assert_eq!(HaloOp::Multiplies.apply(3, 4), 12);
    }

    #[test]
    fn exchange_over_raw_buffers() {
        let out = Fabric::run(3, |comm| {
            let segs = blocks(&[3, 3, 3]);
            let mut halo = Halo::new(&segs, comm.rank(), HaloBounds::symmetric(1, true));
            let base = comm.rank() as i32 * 3;
            let mut buffer = vec![-1, base, base + 1, base + 2, -1];
            halo.exchange(&comm, &mut buffer);
            assert_eq!(halo.state(), HaloState::Synchronized);
            buffer
        });
        assert_eq!(out[0], vec![8, 0, 1, 2, 3]);
        assert_eq!(out[1], vec![2, 3, 4, 5, 6]);
        assert_eq!(out[2], vec![5, 6, 7, 8, 0]);
    }

    #[test]
    #[should_panic(expected = "without a matching begin")]
    fn finalize_without_begin_is_a_violation() {
        Fabric::run(1, |comm| {
            let mut halo = Halo::new(&blocks(&[4]), 0, HaloBounds::symmetric(1, false));
            let mut buffer = [0u8; 6];
            halo.exchange_finalize(&comm, &mut buffer);
        });
    }
}
