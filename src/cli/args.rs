//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--backend <name>`: Metadata store to read with
//! - `--config <path>`: Global config file to use

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// wtrack - repository and worktree branch-state tracker
#[derive(Parser, Debug)]
#[command(name = "wtrack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if wtrack was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Metadata store backend (libgit or files)
    #[arg(long, global = true, value_name = "NAME")]
    pub backend: Option<String>,

    /// Read the global config from this file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show branch, revision and operation state of one or more roots
    #[command(
        name = "status",
        long_about = "Show branch, revision and operation state of one or more roots.\n\n\
            Each root must be the top of a working directory: a primary clone \
            (with a .git directory) or a linked worktree (with a .git file). \
            Without arguments, the roots listed in the config file are used, \
            or the current directory if none are configured.",
        after_help = "\
EXAMPLES:
    # The current directory
    wtrack status

    # A clone and its worktrees side by side
    wtrack status ~/src/app ~/src/app-hotfix

READING THE OUTPUT:
    /src/app          primary   master     3f2a9c1  clean
    /src/app-hotfix   worktree  hotfix     9be01d4  rebase (2/5)"
    )]
    Status {
        /// Roots to report on
        paths: Vec<PathBuf>,

        #[command(flatten)]
        format: FormatArgs,
    },

    /// List branches with their commits
    #[command(
        name = "branches",
        long_about = "List the branches of a root with the commits they point at.\n\n\
            Branches are shared by every worktree of a repository, so the list is \
            the same from any of them. The branch checked out in this root is \
            marked with an asterisk (*).",
        after_help = "\
EXAMPLES:
    # Local branches
    wtrack branches

    # Remote-tracking branches only
    wtrack branches --remote

    # Everything, as JSON
    wtrack branches --all --json"
    )]
    Branches {
        /// Root to list (defaults to the current directory)
        path: Option<PathBuf>,

        /// List remote-tracking branches only
        #[arg(short, long, conflicts_with = "all")]
        remote: bool,

        /// List local and remote-tracking branches
        #[arg(short, long)]
        all: bool,

        #[command(flatten)]
        format: FormatArgs,
    },
}

/// Output format flags shared by commands.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct FormatArgs {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Which branch namespaces to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchScope {
    Local,
    Remote,
    All,
}

impl BranchScope {
    pub fn from_flags(remote: bool, all: bool) -> Self {
        match (remote, all) {
            (_, true) => BranchScope::All,
            (true, false) => BranchScope::Remote,
            (false, false) => BranchScope::Local,
        }
    }

    pub fn includes_local(self) -> bool {
        matches!(self, BranchScope::Local | BranchScope::All)
    }

    pub fn includes_remote(self) -> bool {
        matches!(self, BranchScope::Remote | BranchScope::All)
    }
}
