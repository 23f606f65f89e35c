//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! Each command handler:
//! 1. Resolves the roots it was given
//! 2. Registers and refreshes them through a manager
//! 3. Formats and displays the snapshots

mod branches;
mod status;

pub use branches::branches;
pub use status::status;

use crate::cli::args::{BranchScope, Command};
use crate::cli::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub async fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Status { paths, format } => status::status(ctx, &paths, format).await,
        Command::Branches {
            path,
            remote,
            all,
            format,
        } => {
            branches::branches(
                ctx,
                path.as_deref(),
                BranchScope::from_flags(remote, all),
                format,
            )
            .await
        }
    }
}
