use crate::context::Context;
use crate::range::{local_segments, LocalRange};
use crate::usage_violation;

/// Applies `op` to every element owned by this rank, then waits for all
/// ranks.
///
/// Pass `&mut container` (or a view over it) to receive `&mut` elements.
/// An empty range returns immediately without synchronizing. A non-empty
/// range without segments, such as a zip of differently partitioned ranges,
/// is a usage violation.
pub fn for_each<R, F>(ctx: &Context, range: R, op: F)
where
    R: LocalRange,
    F: Fn(R::Item) + Sync + Send,
{
    if range.is_empty() {
        return;
    }
    let segments = range.segments();
    if segments.is_empty() {
        usage_violation!("for_each over {} elements without segments; are the zipped ranges aligned?", range.len());
    }
    let local = local_segments(ctx.rank(), &segments);
    let items = range.into_local(&local);
    match ctx.accelerator() {
        Some(accelerator) => {
            tracing::trace!(rank = ctx.rank(), segments = local.len(), "for_each on accelerator");
            accelerator.for_each(items, op);
        }
        None => items.for_each(op),
    }
    ctx.barrier();
}
