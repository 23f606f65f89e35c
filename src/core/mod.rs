//! core
//!
//! Core domain types, paths and configuration for worktrack.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RefName, etc.
//! - [`paths`] - Resolved metadata locations for a tracked root
//! - [`config`] - Configuration schema and loading

pub mod config;
pub mod paths;
pub mod types;
