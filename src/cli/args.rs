//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Runnel - file-based task pipeline runner.
#[derive(Debug, Parser)]
#[command(name = "runnel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a config file, searched before ./pipeline.yml and ../pipeline.yml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Change to this directory before doing anything
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Show rendered commands
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Bring targets up to date (default if no command specified)
    Make(MakeArgs),

    /// Show the execution order and staleness verdicts without running anything
    Show(ShowArgs),

    /// List declared tasks, their instances and dependencies
    List(ListArgs),
}

/// Arguments for the `make` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct MakeArgs {
    /// Tasks to bring up to date (default: settings.default_target, else terminal tasks)
    pub targets: Vec<String>,

    /// Maximum concurrent jobs (default: settings.max_parallel)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    pub jobs: Option<u32>,

    /// Report what would run without starting any process
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Run these tasks even if up to date (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub force: Vec<String>,
}

/// Arguments for the `show` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ShowArgs {
    /// Tasks to inspect (default: settings.default_target, else terminal tasks)
    pub targets: Vec<String>,

    /// Treat these tasks as stale (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub force: Vec<String>,

    /// Print the run record as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `list` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ListArgs {
    /// Also show resolved inputs and outputs
    #[arg(long)]
    pub paths: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_defaults_to_none() {
        let cli = Cli::parse_from(["runnel"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn make_parses_targets_and_flags() {
        let cli = Cli::parse_from(["runnel", "make", "full", "-j", "8", "--dry-run", "--force", "a,b"]);
        match cli.command {
            Some(Commands::Make(args)) => {
                assert_eq!(args.targets, vec!["full"]);
                assert_eq!(args.jobs, Some(8));
                assert!(args.dry_run);
                assert_eq!(args.force, vec!["a", "b"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn zero_jobs_is_rejected() {
        assert!(Cli::try_parse_from(["runnel", "make", "-j", "0"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["runnel", "show", "--json", "--config", "p.yml", "--debug"]);
        assert_eq!(cli.config, Some(PathBuf::from("p.yml")));
        assert!(cli.debug);
        assert!(matches!(cli.command, Some(Commands::Show(ShowArgs { json: true, .. }))));
    }
}
