//! Record events and the sink that turns each one into a commit.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::error::{BackdateError, Result};
use crate::identity::Identity;
use crate::store::GitStore;

/// Payload size in bytes.
pub const PAYLOAD_LEN: usize = 16;

/// One commit to make: when, what bytes, and the message derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub at: DateTime<Utc>,
    pub payload: [u8; PAYLOAD_LEN],
    pub label: String,
}

impl Event {
    #[must_use]
    pub fn new(at: DateTime<Utc>, payload: [u8; PAYLOAD_LEN]) -> Self {
        Self {
            at,
            label: hex_label(&payload),
            payload,
        }
    }

    /// Build an event at `at` with a fresh payload from a cryptographic source.
    pub fn generate<R: RngCore + CryptoRng>(at: DateTime<Utc>, rng: &mut R) -> Self {
        let mut payload = [0_u8; PAYLOAD_LEN];
        rng.fill_bytes(&mut payload);
        Self::new(at, payload)
    }
}

/// Lowercase hex, two digits per byte.
#[must_use]
pub fn hex_label(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

/// Destination for scheduled events.
pub trait RecordSink {
    /// Persist `event` authored by `identity`.
    ///
    /// # Errors
    ///
    /// Any failure is fatal to the run; nothing is retried.
    fn record(&mut self, event: &Event, identity: &Identity) -> Result<()>;
}

/// Writes each payload into the tracked file and commits it.
#[derive(Debug)]
pub struct GitSink<'a> {
    store: &'a GitStore,
    payload_file: PathBuf,
}

impl<'a> GitSink<'a> {
    #[must_use]
    pub fn new(store: &'a GitStore, payload_file: &Path) -> Self {
        Self {
            store,
            payload_file: payload_file.to_path_buf(),
        }
    }
}

impl RecordSink for GitSink<'_> {
    fn record(&mut self, event: &Event, identity: &Identity) -> Result<()> {
        let failed = |source| BackdateError::RecordWrite {
            at: event.at,
            source,
        };

        self.store
            .write_file(&self.payload_file, &event.payload)
            .map_err(failed)?;
        self.store
            .stage(std::slice::from_ref(&self.payload_file))
            .map_err(failed)?;
        let id = self
            .store
            .commit(&event.label, identity, event.at)
            .map_err(failed)?;

        debug!(commit = %id, at = %event.at, "recorded commit");
        Ok(())
    }
}
