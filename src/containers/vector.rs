//! The distributed vector.

use num_traits::Num;

use super::storage::{BlockStorage, LocalIter, LocalIterMut};
use crate::config::Distribution;
use crate::context::Context;
use crate::error::Result;
use crate::halo::{Halo, HaloOp};
use crate::range::{DistributedRange, DistributedRangeMut, Element, LocalRange, Segment, Segmented};

/// A one-dimensional array split into one contiguous block per rank.
///
/// Construction and destruction are collective. Every rank sees the same
/// length and segments; elements owned by other ranks are reachable through
/// [`DistributedRange::get`] and [`DistributedRangeMut::put`].
///
/// ```rust
/// use dranges::{algorithms, Context, ContextConfig, DistributedVector, Fabric};
///
/// let sums = Fabric::run(2, |comm| {
///     let ctx = Context::init(comm, ContextConfig::host()).unwrap();
///     let mut v = DistributedVector::<u32>::new(&ctx, 8).unwrap();
///     algorithms::iota(&ctx, &mut v, 1);
///     algorithms::reduce(&ctx, 0, &v, 0, |a, b| a + b)
/// });
/// assert_eq!(sums[0], 36);
/// ```
pub struct DistributedVector<'ctx, T> {
    storage: BlockStorage<'ctx, T>,
    distribution: Distribution,
}

impl<'ctx, T: Element> DistributedVector<'ctx, T> {
    /// Collectively creates a zeroed vector without ghosts.
    ///
    /// # Errors
    /// Returns [`DrError::Alloc`](crate::DrError::Alloc) if the local block
    /// cannot be allocated.
    pub fn new(ctx: &'ctx Context, len: usize) -> Result<Self> {
        Self::with_distribution(ctx, len, Distribution::default())
    }

    /// Collectively creates a zeroed vector laid out per `distribution`.
    ///
    /// # Errors
    /// Returns [`DrError::Config`](crate::DrError::Config) for an invalid
    /// distribution and [`DrError::Alloc`](crate::DrError::Alloc) if the
    /// local block cannot be allocated.
    pub fn with_distribution(ctx: &'ctx Context, len: usize, distribution: Distribution) -> Result<Self> {
        distribution.validate()?;
        let storage = BlockStorage::new(ctx, len, distribution.halo, distribution.granularity)?;
        tracing::debug!(
            rank = ctx.rank(),
            len,
            segments = storage.partition().segments().len(),
            halo = ?distribution.halo,
            "vector created"
        );
        Ok(Self { storage, distribution })
    }

    /// Collectively creates a vector with every element set to `value`.
    ///
    /// # Errors
    /// See [`DistributedVector::with_distribution`].
    pub fn from_elem(ctx: &'ctx Context, len: usize, value: T, distribution: Distribution) -> Result<Self> {
        let mut v = Self::with_distribution(ctx, len, distribution)?;
        v.storage.owned_mut().fill(value);
        ctx.barrier();
        Ok(v)
    }

    /// The context this vector lives in.
    #[inline]
    pub fn context(&self) -> &'ctx Context {
        self.storage.ctx()
    }

    /// Layout of this vector.
    #[inline]
    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    /// Local reference to element `index`, if this rank owns it.
    pub fn local(&self, index: usize) -> Option<&T> {
        self.storage.local(index)
    }

    /// Mutable local reference to element `index`, if this rank owns it.
    pub fn local_mut(&mut self, index: usize) -> Option<&mut T> {
        self.storage.local_mut(index)
    }

    /// This rank's segment, empty for ranks past the last segment.
    pub fn local_segment(&self) -> Segment {
        self.storage.own_segment()
    }

    /// Elements owned by this rank.
    pub fn local_slice(&self) -> &[T] {
        self.storage.owned()
    }

    /// Elements owned by this rank; marks the halo stale.
    pub fn local_slice_mut(&mut self) -> &mut [T] {
        self.storage.owned_mut()
    }

    /// `[prev ghosts | owned | next ghosts]`.
    pub fn local_with_halo(&self) -> &[T] {
        self.storage.with_halo()
    }

    /// Ghost copies of the previous segment's tail.
    pub fn prev_ghosts(&self) -> &[T] {
        self.storage.prev_ghosts()
    }

    /// Ghost copies of the next segment's head.
    pub fn next_ghosts(&self) -> &[T] {
        self.storage.next_ghosts()
    }

    /// Neighbor groups and synchronization state.
    pub fn halo(&self) -> &Halo {
        self.storage.halo()
    }

    /// Refreshes the ghosts from the neighbors. Collective.
    pub fn exchange(&mut self) {
        self.storage.exchange();
    }

    /// Sends the owned boundary to the neighbors.
    pub fn exchange_begin(&mut self) {
        self.storage.exchange_begin();
    }

    /// Receives the neighbors' boundary into the ghosts.
    pub fn exchange_finalize(&mut self) {
        self.storage.exchange_finalize();
    }

    /// Folds the ghosts back into their owners' boundary with `op`. Collective.
    pub fn halo_reduce(&mut self, op: HaloOp)
    where
        T: Num + PartialOrd,
    {
        self.storage.halo_reduce(op);
    }
}

impl<T: Element> Segmented for DistributedVector<'_, T> {
    fn len(&self) -> usize {
        self.storage.len()
    }

    fn segments(&self) -> Vec<Segment> {
        self.storage.partition().segments().to_vec()
    }
}

impl<T: Element> DistributedRange for DistributedVector<'_, T> {
    type Value = T;

    fn get(&self, index: usize) -> T {
        self.storage.get(index)
    }

    fn get_many(&self, offset: usize, out: &mut [T]) {
        self.storage.get_many(offset, out);
    }
}

impl<T: Element> DistributedRangeMut for DistributedVector<'_, T> {
    fn put(&mut self, index: usize, value: T) {
        self.storage.put(index, value);
    }

    fn put_many(&mut self, offset: usize, values: &[T]) {
        self.storage.put_many(offset, values);
    }
}

impl<'a, T: Element> LocalRange for &'a DistributedVector<'_, T> {
    type Item = T;
    type Iter = LocalIter<'a, T>;

    fn into_local(self, segments: &[Segment]) -> Self::Iter {
        self.storage.local_iter(segments)
    }
}

impl<'a, T: Element> LocalRange for &'a mut DistributedVector<'_, T> {
    type Item = &'a mut T;
    type Iter = LocalIterMut<'a, T>;

    fn into_local(self, segments: &[Segment]) -> Self::Iter {
        self.storage.local_iter_mut(segments)
    }
}

impl<T: Element + core::fmt::Debug> core::fmt::Debug for DistributedVector<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DistributedVector")
            .field("len", &self.len())
            .field("local", &self.local_slice())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContextConfig, Fabric};

    #[test]
    fn local_access_matches_ownership() {
        Fabric::run(3, |comm| {
            let ctx = Context::init(comm, ContextConfig::host()).unwrap();
            let mut v = DistributedVector::<i32>::new(&ctx, 7).unwrap();
            let seg = v.local_segment();
            for i in seg.offset()..seg.end() {
                *v.local_mut(i).unwrap() = i as i32;
            }
            for i in 0..7 {
                assert_eq!(v.local(i).is_some(), seg.contains(i));
            }
            ctx.barrier();
            assert_eq!(v.get(6), 6);
        });
    }

    #[test]
    fn remote_put_is_visible_after_fence() {
        Fabric::run(2, |comm| {
            let ctx = Context::init(comm, ContextConfig::host()).unwrap();
            let mut v = DistributedVector::<u64>::new(&ctx, 4).unwrap();
            if ctx.rank() == 0 {
                v.put(3, 42);
                v.put_many(1, &[7, 8]);
            }
            ctx.fence();
            let mut all = [0u64; 4];
            v.get_many(0, &mut all);
            assert_eq!(all, [0, 7, 8, 42]);
            ctx.barrier();
        });
    }

    #[test]
    fn from_elem_fills_every_segment() {
        Fabric::run(4, |comm| {
            let ctx = Context::init(comm, ContextConfig::host()).unwrap();
            let v = DistributedVector::from_elem(&ctx, 10, 2.5f32, Distribution::default()).unwrap();
            assert!(v.local_slice().iter().all(|&x| x == 2.5));
            assert!((0..10).all(|i| v.get(i) == 2.5));
            ctx.barrier();
        });
    }

    #[test]
    fn regions_are_registered_while_alive() {
        Fabric::run(2, |comm| {
            let ctx = Context::init(comm, ContextConfig::host()).unwrap();
            {
                let _a = DistributedVector::<u8>::new(&ctx, 5).unwrap();
                let _b = DistributedVector::<u8>::new(&ctx, 0).unwrap();
                assert_eq!(ctx.open_regions(), 2);
            }
            assert_eq!(ctx.open_regions(), 0);
        });
    }
}
