//! Patch command implementation.

use crate::context::Context;
use anyhow::{Context as _, Result};
use clap::Args;
use graft_interceptor::build_patchers;
use graft_jit::{PhpParser, SourceParser};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

/// Arguments for the patch command.
#[derive(Args, Debug, Clone)]
pub struct PatchArgs {
    /// PHP file to patch
    pub file: PathBuf,

    /// Path the file is loaded from at runtime (used for __DIR__ and __FILE__)
    #[arg(long = "as", value_name = "PATH")]
    pub as_path: Option<PathBuf>,

    /// Write the patched source to a file instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Run the patch command.
pub fn run(ctx: &Context, args: &PatchArgs) -> Result<ExitCode> {
    let file = ctx.resolve(&args.file);
    info!(file = %file.display(), "running patch command");

    let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let origin = match &args.as_path {
        Some(path) => path.clone(),
        None => file
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", file.display()))?,
    };

    let parser = PhpParser::new();
    let mut patchers = build_patchers(&ctx.config)?;
    let mut tree = parser.parse_bytes(&bytes, Some(&origin))?;
    patchers.process(&mut tree, Some(&origin))?;
    let patched = parser.unparse(&tree);

    match &args.output {
        Some(out) => {
            let out = ctx.resolve(out);
            std::fs::write(&out, &patched)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            crate::output::success(&format!("Patched source written to {}", out.display()));
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(patched.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
