//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (show, init, path, get, set)
//! - [`diagnostics`] - System diagnostics for bug reports
//! - [`run`] - Main command (drive the press pipeline)
//! - [`status`] - Read-only view of the persisted state

pub mod config;
pub mod diagnostics;
pub mod run;
pub mod status;
