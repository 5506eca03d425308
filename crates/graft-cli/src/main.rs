//! Graft CLI - patch PHP sources for test-time instrumentation.
//!
//! The `graft` binary drives the same pipeline the class-load interceptor
//! uses: it patches single files, serves class requests through the cache,
//! warms the cache for a source tree and manages the cache directory.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod commands;
mod context;
mod output;

use clap::Parser;
use commands::{CacheCommand, Cli, Commands};
use context::Context;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 if cli.quiet => Level::ERROR,
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    // Patched sources go to stdout; keep logs off it.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let result = Context::new(&cli.to_context_args()).and_then(|ctx| run_command(&cli, &ctx));

    match result {
        Ok(code) => code,
        Err(e) => {
            output::print_error(e);
            ExitCode::FAILURE
        }
    }
}

fn run_command(cli: &Cli, ctx: &Context) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Commands::Patch(args) => commands::patch::run(ctx, args),
        Commands::Load(args) => commands::load::run(ctx, args),
        Commands::Warm(args) => commands::warm::run(ctx, args),
        Commands::Cache { command } => match command {
            CacheCommand::Clear(args) => commands::cache::run_clear(ctx, args),
            CacheCommand::Status(args) => commands::cache::run_status(ctx, args),
        },
    }
}
