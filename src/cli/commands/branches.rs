//! branches command - List branches with their commits

use std::path::Path;

use anyhow::{Context as _, Result};
use serde::Serialize;

use crate::cli::args::{BranchScope, FormatArgs};
use crate::cli::Context;
use crate::repo::{Branch, RepositoryState};
use crate::ui::output::{self, format_table, SHORT_OID_LEN};

#[derive(Debug, Serialize)]
struct BranchRow {
    name: String,
    #[serde(rename = "kind")]
    kind: &'static str,
    hash: String,
    current: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream: Option<String>,
}

fn collect_rows(state: &RepositoryState, scope: BranchScope) -> Vec<BranchRow> {
    let branches = state.branches();
    let current = state.current_branch_name();
    let mut rows = Vec::new();

    if scope.includes_local() {
        let mut local: Vec<_> = branches.local_branches().collect();
        local.sort();
        for branch in local {
            let Some(hash) = branches.hash(&Branch::Local(branch.clone())) else {
                continue;
            };
            rows.push(BranchRow {
                name: branch.name_for_local_operations().to_string(),
                kind: "local",
                hash: hash.to_string(),
                current: current == Some(branch.name_for_local_operations()),
                upstream: branches.tracked_branch(branch).map(|u| u.to_string()),
            });
        }
    }

    if scope.includes_remote() {
        let mut remote: Vec<_> = branches.remote_branches().collect();
        remote.sort();
        for branch in remote {
            let Some(hash) = branches.hash(&Branch::Remote(branch.clone())) else {
                continue;
            };
            rows.push(BranchRow {
                name: branch.name_for_local_operations(),
                kind: "remote",
                hash: hash.to_string(),
                current: false,
                upstream: None,
            });
        }
    }

    rows
}

fn text_cells(row: &BranchRow) -> Vec<String> {
    let marker = if row.current { "* " } else { "  " };
    let mut cells = vec![
        format!("{}{}", marker, row.name),
        row.hash.chars().take(SHORT_OID_LEN).collect(),
    ];
    if let Some(upstream) = &row.upstream {
        cells.push(format!("[{}]", upstream));
    }
    cells
}

/// List the branches of `path` (or the working directory).
pub async fn branches(
    ctx: &Context,
    path: Option<&Path>,
    scope: BranchScope,
    format: FormatArgs,
) -> Result<()> {
    let root = path.map(|p| ctx.resolve(p)).unwrap_or_else(|| ctx.cwd.clone());

    let manager = ctx.manager();
    manager
        .register(&root)
        .with_context(|| format!("cannot track {}", root.display()))?;
    let state = manager.refresh(&root).await?;

    let rows = collect_rows(&state, scope);
    if format.json {
        output::print_json(&rows)?;
    } else if !rows.is_empty() {
        let cells: Vec<_> = rows.iter().map(text_cells).collect();
        output::print(format_table(&cells), ctx.verbosity);
    }
    Ok(())
}
