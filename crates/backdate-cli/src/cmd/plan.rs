//! `backdate plan`: preview the schedule without writing anything.

use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;
use backdate_core::config::load_config;
use backdate_core::runner::{self, PlanReport, RunOptions};
use chrono::{DateTime, Utc};
use clap::Args;

use super::run::{render_report_pretty, stamp};
use crate::output::{OutputMode, pretty_rule, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Seed the schedule; `run --seed` with the same value follows this plan.
    #[arg(long)]
    pub seed: Option<u64>,

    /// List at most this many instants (all are still counted).
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Execute `backdate plan`.
///
/// # Errors
///
/// Fails on invalid configuration or if an existing repository cannot be read.
pub fn run_plan(
    args: &PlanArgs,
    repo_dir: &Path,
    now: DateTime<Utc>,
    output: OutputMode,
) -> Result<()> {
    let config = load_config(repo_dir)?;
    let options = RunOptions {
        repo_dir: repo_dir.to_path_buf(),
        now,
        seed: args.seed,
    };
    let plan = runner::plan(&options, &config, args.limit)?;

    render_mode(output, &plan, render_plan_text, render_plan_pretty)
}

fn render_plan_text(plan: &PlanReport, w: &mut dyn Write) -> io::Result<()> {
    for at in &plan.instants {
        writeln!(w, "{}", stamp(*at))?;
    }
    Ok(())
}

fn render_plan_pretty(plan: &PlanReport, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "backdate plan (dry run)")?;
    render_report_pretty(&plan.report, w)?;
    if plan.instants.is_empty() {
        return Ok(());
    }

    pretty_rule(w)?;
    for at in &plan.instants {
        writeln!(w, "  {}  {}", stamp(*at), at.format("%a"))?;
    }
    if plan.truncated {
        let shown = plan.instants.len() as u64;
        let hidden = plan.report.recorded.count.saturating_sub(shown);
        writeln!(w, "  … {hidden} more")?;
    }
    Ok(())
}
