//! OnePress - Coalescing single-flight job pipeline for push-button printing
//!
//! This library turns bursty trigger events (a physical button, a stdin
//! line, a test harness) into at most one in-flight print job at a time.
//! Repeat presses while a job is pending or running merge into it instead
//! of queueing duplicates, and each job walks an ordered chain of output
//! backends until one accepts it.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module provides a simplified facade:
//!
//! ```ignore
//! use onepress::config::ConfigFile;
//! use onepress::service::OnePressService;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ConfigFile::load()?;
//! let service = OnePressService::new(config)?;
//! let trigger = service.trigger();
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(service.run(shutdown.clone()));
//!
//! trigger.press();
//! ```

pub mod backend;
pub mod coalescer;
pub mod config;
pub mod diagnostics;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod persist;
pub mod queue;
pub mod service;
pub mod trigger;
pub mod worker;

/// Version of the OnePress library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
