//! Thin wrapper over the `git` executable, scoped to one working tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::error::{BackdateError, Result};
use crate::identity::Identity;

/// Failures of individual git invocations or working-tree writes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to spawn `git {command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`git {command}` failed with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("unexpected output from `git {command}`: {detail}")]
    Output { command: String, detail: String },

    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Handle to a git working tree rooted at `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitStore {
    root: PathBuf,
}

impl GitStore {
    /// Open an existing repository.
    ///
    /// # Errors
    ///
    /// [`BackdateError::StoreNotInitialized`] when `root` has no `.git`
    /// entry, [`BackdateError::StoreAccess`] for anything else.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.join(".git").exists() {
            return Err(BackdateError::StoreNotInitialized(root.to_path_buf()));
        }

        let store = Self {
            root: root.to_path_buf(),
        };
        store
            .run(&["rev-parse", "--git-dir"])
            .map_err(|source| BackdateError::StoreAccess {
                path: root.to_path_buf(),
                source,
            })?;
        Ok(store)
    }

    /// Create an empty repository at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `git init` fails.
    pub fn init(root: &Path) -> Result<Self, StoreError> {
        let store = Self {
            root: root.to_path_buf(),
        };
        store.run(&["init", "--quiet"])?;
        Ok(store)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Overwrite a working-tree file with `contents`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the write fails.
    pub fn write_file(&self, relative: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let path = self.root.join(relative);
        fs::write(&path, contents).map_err(|source| StoreError::Io { path, source })
    }

    /// Stage the given working-tree paths.
    ///
    /// # Errors
    ///
    /// Returns an error if `git add` fails (e.g. a path does not exist).
    pub fn stage(&self, paths: &[PathBuf]) -> Result<(), StoreError> {
        let mut args = vec!["add".to_string(), "--".to_string()];
        args.extend(paths.iter().map(|p| p.to_string_lossy().into_owned()));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&args).map(drop)
    }

    /// Commit the index with `identity` as author and committer, dated `at`.
    ///
    /// Returns the new commit id.
    ///
    /// # Errors
    ///
    /// Returns an error if `git commit` fails or its id cannot be read back.
    pub fn commit(
        &self,
        message: &str,
        identity: &Identity,
        at: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let date = git_date(at);
        let mut cmd = self.command(&[
            "-c",
            "commit.gpgsign=false",
            "commit",
            "--quiet",
            "--no-verify",
            "-m",
            message,
        ]);
        cmd.env("GIT_AUTHOR_NAME", &identity.name)
            .env("GIT_AUTHOR_EMAIL", &identity.email)
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_NAME", &identity.name)
            .env("GIT_COMMITTER_EMAIL", &identity.email)
            .env("GIT_COMMITTER_DATE", &date);
        exec(cmd, "commit")?;

        self.run(&["rev-parse", "HEAD"])
    }

    /// Author timestamp of the commit `HEAD` points at.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no `HEAD` commit or its date does not parse.
    pub fn head_instant(&self) -> Result<DateTime<Utc>, StoreError> {
        let raw = self.run(&["log", "-1", "--format=%aI"])?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|err| StoreError::Output {
                command: "log -1 --format=%aI".to_string(),
                detail: format!("{raw:?}: {err}"),
            })
    }

    /// Number of commits reachable from `HEAD`.
    ///
    /// # Errors
    ///
    /// Returns an error if `git rev-list` fails or prints a non-number.
    pub fn commit_count(&self) -> Result<u64, StoreError> {
        let raw = self.run(&["rev-list", "--count", "HEAD"])?;
        raw.parse().map_err(|_| StoreError::Output {
            command: "rev-list --count HEAD".to_string(),
            detail: raw,
        })
    }

    /// Paths tracked in the `HEAD` tree, sorted by git.
    ///
    /// # Errors
    ///
    /// Returns an error if `git ls-tree` fails.
    pub fn tracked_paths(&self) -> Result<Vec<String>, StoreError> {
        let raw = self.run(&["ls-tree", "-r", "--name-only", "HEAD"])?;
        Ok(raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.root)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<String, StoreError> {
        exec(self.command(args), &args.join(" "))
    }
}

fn exec(mut cmd: Command, label: &str) -> Result<String, StoreError> {
    trace!(command = label, "running git");
    let output = cmd.output().map_err(|source| StoreError::Spawn {
        command: label.to_string(),
        source,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(StoreError::Failed {
            command: label.to_string(),
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Git's raw date form: seconds since the epoch plus a UTC offset.
fn git_date(at: DateTime<Utc>) -> String {
    format!("@{} +0000", at.timestamp())
}
