//! backdate-core library.
//!
//! Fills a git repository with a human-paced commit history: a
//! [`schedule::Schedule`] yields backdated instants, and a
//! [`sink::RecordSink`] turns each one into a commit.
//!
//! # Conventions
//!
//! - **Errors**: Use [`error::Result`] (a `thiserror` enum with stable codes) for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod error;
pub mod identity;
pub mod runner;
pub mod schedule;
pub mod sink;
pub mod store;

pub use error::{BackdateError, ErrorCode, Result};
