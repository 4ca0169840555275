//! pugls: a Language Server Protocol implementation for Pug templates
//!
//! This crate provides the core functionality for the pugls server: the
//! cross-file engine that resolves `include`/`extends` targets, follows
//! them through the template graph, and indexes mixin definitions across
//! the workspace.
//!
//! # Overview
//!
//! - **Path resolution**: deterministic candidate order for directive targets
//! - **Reference graph**: cycle-safe transitive traversal of includes and extends
//! - **Mixin index**: workspace-wide name to definition map, kept current by file events
//! - **Go to definition**: index first, then the current file, then referenced files
//! - **Editor features**: references, rename, symbols, hover, completion, diagnostics,
//!   signature help, folding, highlights, directive updates on file renames
//!
//! # Architecture
//!
//! - [`workspace`]: the engine (resolver, graph, index, scanner, documents)
//! - [`gotodef`] and the other feature modules: thin consumers of the engine
//! - [`server`]: the tower-lsp backend wiring features to requests
//! - [`config`]: configuration management and settings
//!
//! # Usage
//!
//! ```ignore
//! use pugls::config::Settings;
//! use pugls::workspace::{all_referenced_files, Workspace};
//!
//! let workspace = Workspace::new(Settings::default(), vec![root]);
//! workspace.build_index(&cancel).await?;
//! let deps = all_referenced_files(&workspace, &page, &cancel).await?;
//! ```

// Core engine
pub mod workspace;

// LSP feature modules
pub mod completion;
pub mod diagnostics;
pub mod file_rename;
pub mod folding;
pub mod gotodef;
pub mod highlight;
pub mod hover;
pub mod references;
pub mod rename;
pub mod signature_help;
pub mod symbol;

// Configuration
pub mod config;

// Binary support
pub mod cli;
pub mod logging;
pub mod server;

// Test utilities (only available in test builds)
#[cfg(test)]
pub mod test_utils;
