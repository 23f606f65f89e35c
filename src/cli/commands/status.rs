//! status command - Show branch, revision and operation state of roots

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use serde::Serialize;

use crate::cli::args::FormatArgs;
use crate::cli::Context;
use crate::core::paths::RepoContext;
use crate::core::types::Oid;
use crate::repo::RepositoryState;
use crate::ui::output::{self, format_revision, format_table};

#[derive(Debug, Serialize)]
struct StatusRow {
    root: PathBuf,
    context: RepoContext,
    branch: Option<String>,
    revision: Option<Oid>,
    state: String,
    branches: usize,
}

impl StatusRow {
    fn from_state(state: &RepositoryState) -> Self {
        Self {
            root: state.root().to_path_buf(),
            context: state.context(),
            branch: state.current_branch_name().map(str::to_string),
            revision: state.current_revision().cloned(),
            state: state.git_state().to_string(),
            branches: state.branches().len(),
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.root.display().to_string(),
            self.context.to_string(),
            self.branch.clone().unwrap_or_else(|| "(detached)".to_string()),
            format_revision(self.revision.as_ref()),
            self.state.clone(),
        ]
    }
}

/// Report on `paths`, or on the configured roots, or on the working directory.
pub async fn status(ctx: &Context, paths: &[PathBuf], format: FormatArgs) -> Result<()> {
    let roots: Vec<PathBuf> = if !paths.is_empty() {
        paths.iter().map(|p| ctx.resolve(p)).collect()
    } else if !ctx.config.roots().is_empty() {
        ctx.config.roots().iter().map(|p| ctx.resolve(p)).collect()
    } else {
        vec![ctx.cwd.clone()]
    };

    let manager = ctx.manager();
    let mut handles = Vec::new();
    for root in &roots {
        let handle = manager
            .register(root)
            .with_context(|| format!("cannot track {}", root.display()))?;
        handles.push(handle);
    }

    let mut results: HashMap<PathBuf, _> = manager.refresh_all().await.into_iter().collect();

    let mut snapshots = Vec::new();
    let mut failures = 0;
    for handle in &handles {
        match results.remove(handle.root()) {
            Some(Ok(state)) => snapshots.push(state),
            Some(Err(e)) => {
                output::error(&e);
                failures += 1;
            }
            // Duplicate roots on the command line share one result
            None => snapshots.push(handle.snapshot()),
        }
    }

    if format.json {
        let rows: Vec<_> = snapshots.iter().map(|s| StatusRow::from_state(s)).collect();
        output::print_json(&rows)?;
    } else {
        let rows: Vec<Vec<String>> = snapshots
            .iter()
            .map(|s| StatusRow::from_state(s).cells())
            .collect();
        if !rows.is_empty() {
            output::print(format_table(&rows), ctx.verbosity);
        }
    }

    if failures > 0 {
        bail!("{} of {} roots could not be read", failures, handles.len());
    }
    Ok(())
}
