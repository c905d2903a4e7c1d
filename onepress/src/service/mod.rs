//! Service facade for the OnePress pipeline.
//!
//! [`OnePressService`] hides component wiring behind two entry points:
//! [`OnePressService::new`] builds everything from a [`ConfigFile`]
//! (state load, id seeding, metrics, queue, coalescer, worker, chain),
//! and [`ServiceBuilder`] assembles the same pipeline from parts for
//! tests and embedders.
//!
//! ```text
//! ConfigFile ──> OnePressService::new ──┐
//!                                       ├──> run(shutdown)
//! parts ───────> ServiceBuilder::build ─┘
//! ```
//!
//! [`ConfigFile`]: crate::config::ConfigFile

mod builder;
mod error;
mod facade;

pub use builder::ServiceBuilder;
pub use error::ServiceError;
pub use facade::OnePressService;
