use core::ops::DerefMut;

use super::for_each;
use crate::context::Context;
use crate::range::views::{take, zip};
use crate::range::{aligned, local_segments, DistributedRange, DistributedRangeMut, LocalRange, Segmented};
use crate::usage_violation;

/// Writes `op(input[i])` to `output[i]` for every index of `input`.
///
/// Aligned ranges are processed segment by segment on their owners. Otherwise
/// every rank computes the elements of `output` it owns, reading `input`
/// remotely where needed, and the open regions are fenced.
pub fn transform<I, O, F>(ctx: &Context, input: I, mut output: O, op: F)
where
    I: LocalRange<Item = <I as DistributedRange>::Value>,
    O: LocalRange + DistributedRangeMut,
    O::Item: DerefMut<Target = O::Value>,
    F: Fn(I::Value) -> O::Value + Sync + Send,
{
    let n = input.len();
    if n == 0 {
        return;
    }
    if output.len() < n {
        usage_violation!("transform of {n} elements into a range of {}", output.len());
    }
    if aligned(&[&input, &take(&output, n)]) {
        tracing::debug!(rank = ctx.rank(), n, "transform: aligned");
        for_each(ctx, zip(input, take(output, n)), |(value, mut slot)| *slot = op(value));
        return;
    }
    tracing::debug!(rank = ctx.rank(), n, "transform: unaligned, owner computes");
    for seg in local_segments(ctx.rank(), &take(&output, n).segments()) {
        for i in seg.offset()..seg.end() {
            output.put(i, op(input.get(i)));
        }
    }
    ctx.fence();
}

/// Copies `input` into the first `input.len()` elements of `output`.
pub fn copy<T, I, O>(ctx: &Context, input: I, output: O)
where
    I: LocalRange<Item = T> + DistributedRange<Value = T>,
    O: LocalRange + DistributedRangeMut<Value = T>,
    O::Item: DerefMut<Target = T>,
{
    transform(ctx, input, output, |value| value);
}
