//! Warm command implementation.

use crate::context::Context;
use crate::output;
use anyhow::Result;
use clap::Args;
use console::style;
use graft_interceptor::{ClassLoadInterceptor, LoadStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Arguments for the warm command.
#[derive(Args, Debug, Clone)]
pub struct WarmArgs {
    /// Directory to scan for PHP files
    #[arg(default_value = "src")]
    pub dir: PathBuf,

    /// File extension to patch
    #[arg(long, default_value = "php")]
    pub extension: String,
}

#[derive(Debug, Default)]
struct Totals {
    patched: usize,
    cached: usize,
    failed: usize,
}

/// Run the warm command.
pub fn run(ctx: &Context, args: &WarmArgs) -> Result<ExitCode> {
    let dir = ctx.resolve(&args.dir);
    info!(dir = %dir.display(), "running warm command");
    output::header(&format!("Warming cache for {}", dir.display()));

    let mut interceptor = ClassLoadInterceptor::from_config(&ctx.config)?;
    let mut totals = Totals::default();

    let files = WalkDir::new(&dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext == args.extension.as_str())
        });

    for entry in files {
        match interceptor.load_file(entry.path()) {
            Ok((loaded, LoadStatus::CacheHit)) => {
                debug!(file = %loaded.display(), "already cached");
                totals.cached += 1;
            }
            Ok(_) => totals.patched += 1,
            Err(e) => {
                totals.failed += 1;
                eprintln!("  {} {}", style("failed:").red(), e);
            }
        }
    }

    println!(
        "  {} patched, {} cached, {} failed",
        style(totals.patched).green(),
        style(totals.cached).cyan(),
        style(totals.failed).red()
    );

    if totals.failed > 0 {
        return Ok(ExitCode::FAILURE);
    }
    output::success(&format!(
        "Cache warmed in {}",
        interceptor.cache_store().root().display()
    ));
    Ok(ExitCode::SUCCESS)
}
