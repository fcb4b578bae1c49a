//! First-run repository creation and the fixed baseline commit.
//!
//! The baseline anchors every later schedule: a fresh repository always
//! starts its history at [`BASELINE_INSTANT`], so repeated bootstraps agree on
//! where the history begins.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::git::{GitStore, StoreError};
use crate::error::{BackdateError, Result};
use crate::identity::Identity;

/// RFC 3339 form of the baseline commit date.
pub const BASELINE_INSTANT: &str = "2021-01-01T00:00:00Z";

const BASELINE_UNIX_SECS: i64 = 1_609_459_200;

/// Commit message of the baseline commit.
pub const BASELINE_MESSAGE: &str = "init";

const GITIGNORE: &str = ".gitignore";
const GITIGNORE_CONTENTS: &str = ".env\n";

/// Date of the baseline commit, `2021-01-01T00:00:00Z`.
#[must_use]
pub fn baseline_instant() -> DateTime<Utc> {
    DateTime::from_timestamp(BASELINE_UNIX_SECS, 0).unwrap_or_default()
}

/// Paths staged into the baseline commit, in staging order.
#[must_use]
pub fn baseline_paths(payload_file: &Path) -> Vec<PathBuf> {
    vec![PathBuf::from(GITIGNORE), payload_file.to_path_buf()]
}

/// An open store and whether this call created it.
#[derive(Debug)]
pub struct Bootstrapped {
    pub store: GitStore,
    pub created: bool,
}

/// Open the repository at `root`, creating it with the baseline commit if
/// there is none yet.
///
/// An existing repository is returned untouched.
///
/// # Errors
///
/// [`BackdateError::StoreAccess`] if the repository cannot be opened, or if
/// creating it, writing the baseline files, staging, or committing fails.
pub fn ensure_initialized(
    root: &Path,
    identity: &Identity,
    payload_file: &Path,
) -> Result<Bootstrapped> {
    match GitStore::open(root) {
        Ok(store) => {
            debug!(root = %root.display(), "opened existing repository");
            Ok(Bootstrapped {
                store,
                created: false,
            })
        }
        Err(BackdateError::StoreNotInitialized(_)) => {
            warn!(root = %root.display(), "repository not initialized, creating");
            let store = bootstrap(root, identity, payload_file).map_err(|source| {
                BackdateError::StoreAccess {
                    path: root.to_path_buf(),
                    source,
                }
            })?;
            Ok(Bootstrapped {
                store,
                created: true,
            })
        }
        Err(err) => Err(err),
    }
}

fn bootstrap(
    root: &Path,
    identity: &Identity,
    payload_file: &Path,
) -> Result<GitStore, StoreError> {
    let store = GitStore::init(root)?;
    info!(root = %root.display(), "git init success");

    // Existing files are committed as they are.
    if !root.join(GITIGNORE).exists() {
        store.write_file(Path::new(GITIGNORE), GITIGNORE_CONTENTS.as_bytes())?;
    }
    if !root.join(payload_file).exists() {
        store.write_file(payload_file, &[])?;
    }

    let paths = baseline_paths(payload_file);
    store.stage(&paths)?;
    let id = store.commit(BASELINE_MESSAGE, identity, baseline_instant())?;
    info!(commit = %id, at = BASELINE_INSTANT, "recorded baseline commit");

    Ok(store)
}
