use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::store::StoreError;

/// Machine-readable error codes for scripts and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingConfiguration,
    InvalidConfiguration,
    StoreNotInitialized,
    StoreAccess,
    HistoryRead,
    RecordWrite,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingConfiguration => "E1001",
            Self::InvalidConfiguration => "E1002",
            Self::StoreNotInitialized => "E2001",
            Self::StoreAccess => "E2002",
            Self::HistoryRead => "E3001",
            Self::RecordWrite => "E4001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingConfiguration => "Required configuration missing",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::StoreNotInitialized => "Repository not initialized",
            Self::StoreAccess => "Repository access failed",
            Self::HistoryRead => "Cannot read last commit",
            Self::RecordWrite => "Commit write failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingConfiguration => {
                Some("Set GIT_UNAME and GIT_EMAIL in the environment or in a .env file.")
            }
            Self::InvalidConfiguration => Some("Fix backdate.toml (or .env) and retry."),
            Self::StoreNotInitialized => Some("Run `backdate run` to bootstrap the repository."),
            Self::StoreAccess => {
                Some("Check that git is installed and the directory is writable.")
            }
            Self::HistoryRead => {
                Some("Make sure HEAD points at a commit with a valid author date.")
            }
            Self::RecordWrite => Some(
                "Check disk space and permissions; the next run resumes from the last commit.",
            ),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Every failure the core can report. Only [`BackdateError::StoreNotInitialized`]
/// changes control flow; the rest abort the run.
#[derive(Debug, thiserror::Error)]
pub enum BackdateError {
    #[error("environment variable {name} is not set")]
    MissingConfiguration { name: String },

    #[error("invalid configuration in {}: {reason}", path.display())]
    InvalidConfiguration { path: PathBuf, reason: String },

    #[error("no git repository at {}", .0.display())]
    StoreNotInitialized(PathBuf),

    #[error("cannot access git repository at {}", path.display())]
    StoreAccess {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("cannot read the last commit instant in {}", path.display())]
    HistoryRead {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("failed to record commit at {}", at.to_rfc3339())]
    RecordWrite {
        at: DateTime<Utc>,
        #[source]
        source: StoreError,
    },
}

impl BackdateError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingConfiguration { .. } => ErrorCode::MissingConfiguration,
            Self::InvalidConfiguration { .. } => ErrorCode::InvalidConfiguration,
            Self::StoreNotInitialized(_) => ErrorCode::StoreNotInitialized,
            Self::StoreAccess { .. } => ErrorCode::StoreAccess,
            Self::HistoryRead { .. } => ErrorCode::HistoryRead,
            Self::RecordWrite { .. } => ErrorCode::RecordWrite,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

pub type Result<T, E = BackdateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 6] = [
        ErrorCode::MissingConfiguration,
        ErrorCode::InvalidConfiguration,
        ErrorCode::StoreNotInitialized,
        ErrorCode::StoreAccess,
        ErrorCode::HistoryRead,
        ErrorCode::RecordWrite,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let code = code.code();
            assert_eq!(code.len(), 5);
            assert!(code.starts_with('E'));
            assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn missing_configuration_names_the_variable() {
        let err = BackdateError::MissingConfiguration {
            name: "GIT_EMAIL".to_string(),
        };
        assert_eq!(err.to_string(), "environment variable GIT_EMAIL is not set");
        assert_eq!(err.code(), ErrorCode::MissingConfiguration);
        assert!(err.hint().is_some_and(|h| h.contains("GIT_UNAME")));
    }

    #[test]
    fn record_write_keeps_the_store_cause() {
        let err = BackdateError::RecordWrite {
            at: DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default(),
            source: StoreError::Failed {
                command: "commit".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "nothing to commit".to_string(),
            },
        };
        assert!(err.to_string().contains("2024-01-01T00:00:00"));
        let cause = std::error::Error::source(&err).map(ToString::to_string);
        assert!(cause.is_some_and(|c| c.contains("nothing to commit")));
    }
}
