//! Commit identity resolution from the process environment.
//!
//! Both values are required. An unset or empty variable is a
//! [`BackdateError::MissingConfiguration`]; there are no defaults.

use std::env;

use serde::Serialize;

use crate::error::{BackdateError, Result};

/// Variable holding the author display name.
pub const NAME_VAR: &str = "GIT_UNAME";
/// Variable holding the author email address.
pub const EMAIL_VAR: &str = "GIT_EMAIL";

/// Environment reader trait for dependency injection in tests.
pub trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvReader for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// Look up `name` through `env`.
///
/// # Errors
///
/// Returns [`BackdateError::MissingConfiguration`] if the value is absent or empty.
pub fn resolve_with(name: &str, env: &dyn EnvReader) -> Result<String> {
    env.get(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BackdateError::MissingConfiguration {
            name: name.to_string(),
        })
}

/// Look up `name` in the process environment.
///
/// # Errors
///
/// Returns [`BackdateError::MissingConfiguration`] if the variable is unset or empty.
pub fn resolve(name: &str) -> Result<String> {
    resolve_with(name, &ProcessEnv)
}

/// Author and committer attached to every commit of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    /// Resolve both identity values from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`BackdateError::MissingConfiguration`] naming the first missing variable.
    pub fn from_env() -> Result<Self> {
        Self::from_reader(&ProcessEnv)
    }

    /// Resolve both identity values through `env`.
    ///
    /// # Errors
    ///
    /// Returns [`BackdateError::MissingConfiguration`] naming the first missing variable.
    pub fn from_reader(env: &dyn EnvReader) -> Result<Self> {
        Ok(Self {
            name: resolve_with(NAME_VAR, env)?,
            email: resolve_with(EMAIL_VAR, env)?,
        })
    }
}
