//! cli
//!
//! Command-line interface layer for wtrack.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and install logging
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It builds a [`Context`] from flags and config, and
//! command handlers drive a [`RepositoryManager`]. Nothing here reads git
//! metadata directly.

pub mod args;
pub mod commands;

pub use args::Cli;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::core::config::Config;
use crate::repo::{ManagerConfig, RepositoryManager};
use crate::store::{StoreKind, StoreRegistry};
use crate::ui::output::Verbosity;

/// Everything a command handler needs.
#[derive(Debug, Clone)]
pub struct Context {
    /// Directory relative paths resolve against
    pub cwd: PathBuf,
    pub verbosity: Verbosity,
    pub config: Config,
    /// Store selected by `--backend` or config
    pub backend: StoreKind,
}

impl Context {
    /// A manager over the default stores with this context's settings.
    pub fn manager(&self) -> RepositoryManager {
        RepositoryManager::new(
            StoreRegistry::with_defaults(),
            ManagerConfig {
                backend: self.backend,
                event_capacity: self.config.event_capacity(),
            },
        )
    }

    /// Resolve a command-line path against the working directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

/// Pick the backend: `--backend` wins over the config file.
fn resolve_backend(flag: Option<&str>, config: &Config) -> Result<StoreKind> {
    let Some(name) = flag else {
        return Ok(config.backend());
    };
    match StoreKind::parse(name) {
        Some(kind) if kind.is_configurable() => Ok(kind),
        _ => bail!(
            "invalid backend '{}', must be one of: {}",
            name,
            StoreKind::configurable_names().join(", ")
        ),
    }
}

/// Install the tracing subscriber.
///
/// `--debug` and `--quiet` override `RUST_LOG`, which overrides the config
/// `log_level`.
fn init_logging(cli: &Cli, config: &Config) {
    let filter = if cli.debug {
        EnvFilter::new("worktrack=debug")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()))
    };

    // A subscriber may already be installed when run from tests
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    init_logging(&cli, &config);
    if let Some(path) = config.loaded_from() {
        tracing::debug!(path = %path.display(), "loaded config");
    }

    let cwd = match &cli.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("failed to read current directory")?,
    };

    let ctx = Context {
        backend: resolve_backend(cli.backend.as_deref(), &config)?,
        verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
        cwd,
        config,
    };

    commands::dispatch(cli.command, &ctx).await
}
