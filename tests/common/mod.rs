#![allow(dead_code)]

use dranges::{Context, ContextConfig, Fabric};

/// Runs `body` on `ranks` ranks, each with its own context, and returns the
/// per-rank results in rank order.
pub fn spmd_with<R, F>(ranks: usize, config: ContextConfig, body: F) -> anyhow::Result<Vec<R>>
where
    R: Send,
    F: Fn(&Context) -> anyhow::Result<R> + Sync,
{
    Fabric::run(ranks, |comm| -> anyhow::Result<R> { Context::scope(comm, config, |ctx| body(ctx))? })
        .into_iter()
        .collect()
}

/// [`spmd_with`] in host mode.
pub fn spmd<R, F>(ranks: usize, body: F) -> anyhow::Result<Vec<R>>
where
    R: Send,
    F: Fn(&Context) -> anyhow::Result<R> + Sync,
{
    spmd_with(ranks, ContextConfig::host(), body)
}
