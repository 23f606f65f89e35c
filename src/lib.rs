//! Worktrack - repository topology and branch-state tracking for git worktrees
//!
//! Worktrack keeps an in-memory picture of a set of git working copies: which
//! roots are primary clones and which are linked worktrees, which branches
//! exist locally and on each remote, and where every root's HEAD points.
//! Linked worktrees share one metadata store with their primary, so a
//! branch created in one is visible from all of them, while each keeps its
//! own HEAD.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, drives the manager)
//! - [`repo`] - Repository manager, snapshots, branch catalog and events
//! - [`store`] - Pluggable metadata stores (libgit2, plain files, in-memory)
//! - [`git`] - Low-level git reading and worktree location
//! - [`core`] - Domain types, paths and configuration
//! - [`ui`] - Terminal output helpers
//!
//! # Invariants
//!
//! 1. Roots sharing a common metadata directory see the same branch set
//! 2. HEAD is always read from the root's own metadata directory
//! 3. A failed refresh never replaces the last good snapshot
//! 4. At most one refresh per root runs at a time

pub mod cli;
pub mod core;
pub mod git;
pub mod repo;
pub mod store;
pub mod ui;
