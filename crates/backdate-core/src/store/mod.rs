//! The versioned store: a git working tree plus the first-run bootstrap.

pub mod bootstrap;
pub mod git;

pub use bootstrap::{Bootstrapped, baseline_instant, ensure_initialized};
pub use git::{GitStore, StoreError};
