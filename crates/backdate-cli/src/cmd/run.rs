//! `backdate run`: bootstrap if needed, then commit up to today.

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use backdate_core::config::{load_config, load_dotenv};
use backdate_core::identity::Identity;
use backdate_core::runner::{self, RunOptions, RunReport};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Args;
use tracing::debug;

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Seed the schedule for a reproducible history.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Execute `backdate run` against `repo_dir`, stopping at the day of `now`.
///
/// # Errors
///
/// Fails on missing identity, invalid configuration, or any store error.
pub fn run_run(
    args: &RunArgs,
    repo_dir: &Path,
    now: DateTime<Utc>,
    output: OutputMode,
) -> Result<()> {
    if let Some(path) = load_dotenv(repo_dir)? {
        debug!(path = %path.display(), "environment pre-loaded");
    }
    let config = load_config(repo_dir)?;
    let identity = Identity::from_env()?;

    let options = RunOptions {
        repo_dir: repo_dir.to_path_buf(),
        now,
        seed: args.seed,
    };
    let report = runner::run(&options, &config, &identity)?;

    render_mode(output, &report, render_report_text, |r, w| {
        pretty_section(w, "backdate run")?;
        render_report_pretty(r, w)
    })
}

pub fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn stamp_or_dash(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), stamp)
}

pub fn render_report_text(report: &RunReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "commits={} first={} last={} bootstrapped={} seed={}",
        report.recorded.count,
        stamp_or_dash(report.recorded.first),
        stamp_or_dash(report.recorded.last),
        report.bootstrapped,
        report.seed,
    )
}

pub fn render_report_pretty(report: &RunReport, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "repo", report.repo.display().to_string())?;
    let origin = match (report.bootstrapped, report.dry_run) {
        (true, true) => "would create baseline commit",
        (true, false) => "created baseline commit",
        (false, _) => "existing history",
    };
    pretty_kv(w, "repository", origin)?;
    pretty_kv(w, "seeded from", stamp(report.seeded_from))?;
    pretty_kv(w, "stop day", report.stop.date_naive().to_string())?;
    let verb = if report.dry_run { "planned" } else { "commits" };
    pretty_kv(w, verb, report.recorded.count.to_string())?;
    pretty_kv(w, "first", stamp_or_dash(report.recorded.first))?;
    pretty_kv(w, "last", stamp_or_dash(report.recorded.last))?;
    pretty_kv(
        w,
        "candidates",
        format!(
            "{} drawn, {} on rest day, {} discarded",
            report.stats.candidates_drawn,
            report.stats.rest_day_candidates,
            report.stats.rest_day_discards
        ),
    )?;
    pretty_kv(w, "seed", report.seed.to_string())
}
