//! Point-to-point messaging and collectives.

use std::sync::Arc;
use zerocopy::{AsBytes, FromBytes};

use super::{Fabric, Tag};
use crate::usage_violation;

/// A rank's handle onto its process group.
///
/// Collectives must be called by every rank of the group in the same order.
/// Messages are matched on `(source, tag)` and never overtake each other, so
/// repeated collectives pair up without sequence numbers.
#[derive(Clone)]
pub struct Communicator {
    fabric: Arc<Fabric>,
    rank: usize,
}

impl Communicator {
    pub(crate) fn new(fabric: Arc<Fabric>, rank: usize) -> Self {
        Self { fabric, rank }
    }

    /// This rank.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks.
    #[inline]
    pub fn size(&self) -> usize {
        self.fabric.size()
    }

    /// Previous rank, wrapping at the start.
    #[inline]
    pub fn prev(&self) -> usize {
        (self.rank + self.size() - 1) % self.size()
    }

    /// Next rank, wrapping at the end.
    #[inline]
    pub fn next(&self) -> usize {
        (self.rank + 1) % self.size()
    }

    /// Returns `true` on rank 0.
    #[inline]
    pub fn first(&self) -> bool {
        self.rank == 0
    }

    /// Returns `true` on the highest rank.
    #[inline]
    pub fn last(&self) -> bool {
        self.rank + 1 == self.size()
    }

    pub(crate) fn fabric(&self) -> &Arc<Fabric> {
        &self.fabric
    }

    /// Blocks until every rank has called `barrier`.
    pub fn barrier(&self) {
        self.fabric.wait();
    }

    /// Sends `data` to `dst`. Buffered: returns without waiting for the receive.
    pub fn send<T: AsBytes>(&self, dst: usize, tag: Tag, data: &[T]) {
        if dst >= self.size() {
            usage_violation!("send to rank {dst} outside a group of {}", self.size());
        }
        let payload = data.as_bytes().to_vec();
        tracing::trace!(src = self.rank, dst, ?tag, bytes = payload.len(), "send");
        self.fabric.mailbox(dst).deliver(self.rank, tag, payload);
    }

    /// Receives the oldest message from `src` with `tag`.
    pub fn recv<T: FromBytes>(&self, src: usize, tag: Tag) -> Vec<T> {
        let payload = self.take(src, tag);
        decode(&payload)
    }

    /// Receives into `out`, which must match the message length exactly.
    pub fn recv_into<T: AsBytes + FromBytes>(&self, src: usize, tag: Tag, out: &mut [T]) {
        let payload = self.take(src, tag);
        let slots = out.as_bytes_mut();
        if payload.len() != slots.len() {
            usage_violation!(
                "rank {} expected {} bytes from rank {src} ({tag:?}), received {}",
                self.rank,
                slots.len(),
                payload.len()
            );
        }
        slots.copy_from_slice(&payload);
    }

    fn take(&self, src: usize, tag: Tag) -> Vec<u8> {
        if src >= self.size() {
            usage_violation!("receive from rank {src} outside a group of {}", self.size());
        }
        let payload = self.fabric.mailbox(self.rank).take(src, tag);
        tracing::trace!(src, dst = self.rank, ?tag, bytes = payload.len(), "recv");
        payload
    }

    /// Distributes `root`'s `data` to every rank. Other ranks' `data` is ignored.
    pub fn broadcast<T: AsBytes + FromBytes>(&self, root: usize, data: &[T]) -> Vec<T> {
        if self.rank == root {
            for dst in (0..self.size()).filter(|&r| r != root) {
                self.send(dst, Tag::Broadcast, data);
            }
            decode(data.as_bytes())
        } else {
            self.recv(root, Tag::Broadcast)
        }
    }

    /// Collects every rank's `data` on `root`, in rank order.
    ///
    /// Returns `None` on every other rank.
    pub fn gatherv<T: AsBytes + FromBytes>(&self, root: usize, data: &[T]) -> Option<Vec<Vec<T>>> {
        if self.rank != root {
            self.send(root, Tag::Gather, data);
            return None;
        }
        Some(
            (0..self.size())
                .map(|src| {
                    if src == root {
                        decode(data.as_bytes())
                    } else {
                        self.recv(src, Tag::Gather)
                    }
                })
                .collect(),
        )
    }

    /// Collects one value per rank on `root`, in rank order.
    pub fn gather<T: AsBytes + FromBytes>(&self, root: usize, value: T) -> Option<Vec<T>> {
        self.gatherv(root, core::slice::from_ref(&value))
            .map(|parts| parts.into_iter().flatten().collect())
    }

    /// Collects one value per rank on every rank, in rank order.
    pub fn all_gather<T: AsBytes + FromBytes>(&self, value: T) -> Vec<T> {
        let gathered = self.gather(0, value).unwrap_or_default();
        self.broadcast(0, &gathered)
    }

    /// Hands chunk `i` of `root`'s `chunks` to rank `i`.
    ///
    /// `root` must pass exactly one chunk per rank; other ranks pass `None`.
    pub fn scatterv<T: AsBytes + FromBytes>(&self, root: usize, chunks: Option<Vec<Vec<T>>>) -> Vec<T> {
        if self.rank != root {
            return self.recv(root, Tag::Scatter);
        }
        let Some(chunks) = chunks.filter(|c| c.len() == self.size()) else {
            usage_violation!("scatter root must provide one chunk per rank");
        };
        let mut own = Vec::new();
        for (dst, chunk) in chunks.into_iter().enumerate() {
            if dst == root {
                own = chunk;
            } else {
                self.send(dst, Tag::Scatter, &chunk);
            }
        }
        own
    }
}

impl core::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Communicator")
            .field("rank", &self.rank)
            .field("size", &self.size())
            .finish()
    }
}

/// Reinterprets a byte payload as elements; trailing partial elements are dropped.
fn decode<T: FromBytes>(bytes: &[u8]) -> Vec<T> {
    let width = core::mem::size_of::<T>();
    if width == 0 {
        return Vec::new();
    }
    bytes.chunks_exact(width).filter_map(T::read_from).collect()
}
