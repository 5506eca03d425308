//! Cache management commands.

use crate::context::Context;
use crate::output;
use anyhow::Result;
use clap::Args;
use console::style;
use graft_interceptor::CacheStore;
use std::process::ExitCode;
use tracing::info;

/// Arguments for the cache clear command.
#[derive(Args, Debug, Clone)]
pub struct CacheClearArgs {}

/// Arguments for the cache status command.
#[derive(Args, Debug, Clone)]
pub struct CacheStatusArgs {
    /// Only print the cache directory
    #[arg(long)]
    pub path_only: bool,
}

fn store(ctx: &Context) -> CacheStore {
    CacheStore::new(&ctx.config.cache_path, ctx.config.mtime_epsilon())
}

/// Run the cache clear command.
pub fn run_clear(ctx: &Context, _args: &CacheClearArgs) -> Result<ExitCode> {
    info!("running cache clear command");
    let store = store(ctx);
    output::header("Clearing cache...");
    store.clear()?;
    output::success(&format!("Cache cleared ({})", store.root().display()));
    Ok(ExitCode::SUCCESS)
}

/// Run the cache status command.
pub fn run_status(ctx: &Context, args: &CacheStatusArgs) -> Result<ExitCode> {
    let store = store(ctx);
    if args.path_only {
        println!("{}", store.root().display());
        return Ok(ExitCode::SUCCESS);
    }

    let status = store.status()?;
    output::header("Cache status");
    println!("  {} {}", style("path:").dim(), store.root().display());
    println!("  {} {}", style("files:").dim(), status.files);
    println!(
        "  {} {}",
        style("size:").dim(),
        output::format_bytes(status.bytes)
    );
    println!(
        "  {} {}",
        style("patchers:").dim(),
        ctx.config.patchers.join(", ")
    );
    Ok(ExitCode::SUCCESS)
}
