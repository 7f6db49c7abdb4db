use num_traits::Zero;

use crate::context::Context;
use crate::range::{aligned, local_segments, DistributedRange, Element, LocalRange};

/// Folds every element of `range` into `init` with `op` and returns the
/// result on `root`; other ranks receive zero.
///
/// `op` must be associative and commutative. Each rank folds its local
/// segments, the partial results travel to `root`, and `root` folds them
/// into `init` in rank order. A range without a usable partition is folded
/// element by element on `root` instead.
///
/// An empty range yields `init` on `root`.
pub fn reduce<T, R, F>(ctx: &Context, root: usize, range: R, init: T, op: F) -> T
where
    T: Element + Zero,
    R: LocalRange<Item = T> + DistributedRange<Value = T>,
    F: Fn(T, T) -> T + Sync + Send,
{
    let is_root = ctx.rank() == root;
    if range.is_empty() {
        return if is_root { init } else { <T as Zero>::zero() };
    }
    if !aligned(&[&range]) {
        tracing::debug!(rank = ctx.rank(), len = range.len(), "reduce: no segments, folding on root");
        let result = if is_root {
            (0..range.len()).fold(init, |acc, i| op(acc, range.get(i)))
        } else {
            <T as Zero>::zero()
        };
        ctx.barrier();
        return result;
    }

    let local = local_segments(ctx.rank(), &range.segments());
    let items = range.into_local(&local);
    let partial = match ctx.accelerator() {
        Some(accelerator) => accelerator.reduce(items, &op),
        None => items.reduce(&op),
    };
    let partial: Vec<T> = partial.into_iter().collect();
    match ctx.comm().gatherv(root, &partial) {
        Some(partials) => partials.into_iter().flatten().fold(init, &op),
        None => <T as Zero>::zero(),
    }
}

/// [`reduce`] with the result delivered to every rank.
pub fn all_reduce<T, R, F>(ctx: &Context, range: R, init: T, op: F) -> T
where
    T: Element + Zero,
    R: LocalRange<Item = T> + DistributedRange<Value = T>,
    F: Fn(T, T) -> T + Sync + Send,
{
    let result = reduce(ctx, 0, range, init, op);
    ctx.comm().broadcast(0, &[result]).into_iter().next().unwrap_or(result)
}
