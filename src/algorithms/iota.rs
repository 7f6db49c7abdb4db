use core::ops::DerefMut;

use super::for_each;
use crate::context::Context;
use crate::range::views::{self, Step};
use crate::range::LocalRange;

/// Sets element `i` of `range` to `start + i`.
///
/// A value that does not fit the type is a usage violation.
pub fn iota<R, T>(ctx: &Context, range: R, start: T)
where
    R: LocalRange,
    R::Item: DerefMut<Target = T>,
    T: Step + Send + Sync,
{
    for_each(ctx, views::zip(views::iota(start), range), |(value, mut slot)| *slot = value);
}

/// Sets every element of `range` to `value`.
pub fn fill<R, T>(ctx: &Context, range: R, value: T)
where
    R: LocalRange,
    R::Item: DerefMut<Target = T>,
    T: Copy + Send + Sync,
{
    for_each(ctx, range, |mut slot| *slot = value);
}
