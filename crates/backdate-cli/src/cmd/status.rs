//! `backdate status`: how far the history trails today.

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use backdate_core::runner::{self, StatusReport};
use chrono::{DateTime, Utc};

use super::run::stamp;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Execute `backdate status`.
///
/// # Errors
///
/// Fails if an existing repository cannot be opened or read.
pub fn run_status(repo_dir: &Path, now: DateTime<Utc>, output: OutputMode) -> Result<()> {
    let report = runner::status(repo_dir, now)?;
    render_mode(output, &report, render_status_text, render_status_pretty)
}

fn render_status_text(report: &StatusReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "initialized={} commits={} head={} days_behind={}",
        report.initialized,
        report.commits,
        report.head.map_or_else(|| "-".to_string(), stamp),
        report.days_behind,
    )
}

fn render_status_pretty(report: &StatusReport, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "backdate status")?;
    pretty_kv(w, "repo", report.repo.display().to_string())?;
    if !report.initialized {
        pretty_kv(w, "repository", "not initialized")?;
        return pretty_kv(w, "days behind", report.days_behind.to_string());
    }
    pretty_kv(w, "commits", report.commits.to_string())?;
    let head = report.head.map_or_else(|| "-".to_string(), stamp);
    pretty_kv(w, "head", head)?;
    pretty_kv(w, "today", report.stop_day.to_string())?;
    pretty_kv(w, "days behind", report.days_behind.to_string())
}
