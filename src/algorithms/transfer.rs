//! Moving data between a root rank and a distributed range.

use core::ops::DerefMut;

use crate::context::Context;
use crate::range::{local_segments, DistributedRange, DistributedRangeMut, Element, LocalRange};
use crate::usage_violation;

/// Copies all of `input` into `out` on `root`, reading remote elements
/// one-sidedly. Other ranks' `out` is untouched.
pub fn copy_to_root<R, T>(ctx: &Context, root: usize, input: R, out: &mut [T])
where
    R: DistributedRange<Value = T>,
{
    if ctx.rank() == root {
        let n = input.len();
        if out.len() < n {
            usage_violation!("copy of {n} elements into a buffer of {}", out.len());
        }
        input.get_many(0, &mut out[..n]);
    }
    ctx.barrier();
}

/// Copies `root`'s `input` into the first `input.len()` elements of
/// `output`, writing remote elements one-sidedly and fencing the open
/// regions. Other ranks' `input` is ignored.
pub fn copy_from_root<O, T>(ctx: &Context, root: usize, input: &[T], mut output: O)
where
    O: DistributedRangeMut<Value = T>,
    T: Clone,
{
    if ctx.rank() == root {
        if output.len() < input.len() {
            usage_violation!("copy of {} elements into a range of {}", input.len(), output.len());
        }
        output.put_many(0, input);
    }
    ctx.fence();
}

/// Distributes `root`'s `src` over `output` by message passing: each rank
/// receives exactly the elements of its own segments. Other ranks' `src` is
/// ignored.
pub fn scatter<O, T>(ctx: &Context, root: usize, src: &[T], output: O)
where
    O: LocalRange,
    O::Item: DerefMut<Target = T>,
    T: Element,
{
    let segments = output.segments();
    let chunks = (ctx.rank() == root).then(|| {
        if src.len() < output.len() {
            usage_violation!("scatter of {} elements into a range of {}", src.len(), output.len());
        }
        let mut chunks = vec![Vec::new(); ctx.size()];
        for seg in &segments {
            chunks[seg.rank()].extend_from_slice(&src[seg.offset()..seg.end()]);
        }
        chunks
    });
    let mine = ctx.comm().scatterv(root, chunks);
    let local = local_segments(ctx.rank(), &segments);
    for (mut slot, value) in output.into_local(&local).zip(mine) {
        *slot = value;
    }
    ctx.barrier();
}

/// Collects `input` on `root` by message passing; `None` on other ranks.
pub fn gather<R, T>(ctx: &Context, root: usize, input: R) -> Option<Vec<T>>
where
    R: LocalRange<Item = T> + DistributedRange<Value = T>,
    T: Element,
{
    let segments = input.segments();
    if segments.is_empty() && !input.is_empty() {
        usage_violation!("gather of {} elements without segments", input.len());
    }
    let len = input.len();
    let local = local_segments(ctx.rank(), &segments);
    let mine: Vec<T> = input.into_local(&local).collect();
    let parts = ctx.comm().gatherv(root, &mine);
    ctx.barrier();
    parts.map(|parts| {
        let mut parts: Vec<_> = parts.into_iter().map(Vec::into_iter).collect();
        let mut out = Vec::with_capacity(len);
        for seg in &segments {
            out.extend(parts[seg.rank()].by_ref().take(seg.len()));
        }
        out
    })
}
