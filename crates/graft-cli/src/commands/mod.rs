//! CLI commands for Graft.

pub mod cache;
pub mod load;
pub mod patch;
pub mod warm;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Graft - runtime source patching for PHP test suites
///
/// Graft rewrites PHP files before they are loaded so that function calls,
/// static calls and instantiations can be redirected, methods can be hooked
/// and `exit` can be intercepted.
#[derive(Parser, Debug)]
#[command(name = "graft")]
#[command(author = "Graft Contributors")]
#[command(version)]
#[command(about = "Runtime source patching for PHP test suites", long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
#[command(styles = get_styles())]
pub struct Cli {
    /// Only output errors
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Use the specified directory as the project directory
    #[arg(short = 'd', long = "working-dir", global = true, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Configuration file to use instead of graft.json
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding patched files
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_path: Option<PathBuf>,

    /// Clear the cache before running
    #[arg(long, global = true)]
    pub clear_cache: bool,

    /// Prefix for variables introduced by the patchers
    #[arg(long, global = true, value_name = "NAME")]
    pub prefix: Option<String>,

    /// Increase the verbosity of messages: -v for info, -vv for debug, -vvv for trace
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Convert to context args
    pub fn to_context_args(&self) -> crate::context::ContextArgs {
        crate::context::ContextArgs {
            working_dir: self.working_dir.clone(),
            config: self.config.clone(),
            cache_path: self.cache_path.clone(),
            clear_cache: self.clear_cache,
            prefix: self.prefix.clone(),
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the patched source of a PHP file
    Patch(patch::PatchArgs),

    /// Resolve a class through the interceptor and print the file to load
    Load(load::LoadArgs),

    /// Patch every PHP file under a directory into the cache
    Warm(warm::WarmArgs),

    /// Manage the patched file cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Remove every cached file
    Clear(cache::CacheClearArgs),

    /// Show the cache location and size
    Status(cache::CacheStatusArgs),
}

const fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Green.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Green.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default())
        .placeholder(clap::builder::styling::AnsiColor::Yellow.on_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_options_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "graft",
            "cache",
            "status",
            "--cache-path",
            "/tmp/c",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.cache_path, Some(PathBuf::from("/tmp/c")));
        assert!(matches!(
            cli.command,
            Commands::Cache {
                command: CacheCommand::Status(_)
            }
        ));
    }

    #[test]
    fn patch_takes_an_alias_path() {
        let cli = Cli::try_parse_from(["graft", "patch", "a.php", "--as", "/srv/a.php"]).unwrap();
        let Commands::Patch(args) = cli.command else {
            panic!("expected patch");
        };
        assert_eq!(args.file, PathBuf::from("a.php"));
        assert_eq!(args.as_path, Some(PathBuf::from("/srv/a.php")));
    }
}
