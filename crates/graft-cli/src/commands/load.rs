//! Load command implementation.

use crate::context::Context;
use crate::output;
use anyhow::Result;
use clap::Args;
use console::style;
use graft_interceptor::ClassLoadInterceptor;
use std::process::ExitCode;
use tracing::info;

/// Arguments for the load command.
#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// Fully qualified class name (e.g. 'App\Service\Clock')
    pub class: String,

    /// Only print the path of the file to load
    #[arg(long)]
    pub path_only: bool,
}

/// Run the load command.
pub fn run(ctx: &Context, args: &LoadArgs) -> Result<ExitCode> {
    info!(class = %args.class, "running load command");

    let mut interceptor = ClassLoadInterceptor::from_config(&ctx.config)?;
    interceptor.install();

    let Some(outcome) = interceptor.load_class(&args.class)? else {
        output::warning(&format!("Class {} could not be located", args.class));
        return Ok(ExitCode::FAILURE);
    };

    if args.path_only {
        println!("{}", outcome.loaded.display());
        return Ok(ExitCode::SUCCESS);
    }

    output::header(&format!("Loading {}", outcome.class));
    println!("  {} {}", style("source:").dim(), outcome.source.display());
    println!("  {} {}", style("loaded:").dim(), outcome.loaded.display());
    println!("  {} {}", style("status:").dim(), style(outcome.status).green());
    Ok(ExitCode::SUCCESS)
}
