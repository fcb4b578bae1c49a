#![forbid(unsafe_code)]

mod cmd;
mod output;

use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "backdate: backfill a git repository with a human-paced commit history",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Repository directory (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    repo: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Commit backdated history up to today",
        long_about = "Bootstrap the repository on first use, then add commits from the last \
                      commit's date up to today in randomized steps, skipping most Sundays.",
        after_help = "EXAMPLES:\n    # Fill the repository in the current directory\n    backdate run\n\n    # Reproducible schedule\n    backdate run --seed 42\n\n    # Emit machine-readable output\n    backdate run --json"
    )]
    Run(cmd::run::RunArgs),

    #[command(
        about = "Preview the schedule without committing",
        after_help = "EXAMPLES:\n    # Show the first 20 commits a run would make\n    backdate plan --limit 20\n\n    # Preview exactly what `backdate run --seed 7` will do\n    backdate plan --seed 7"
    )]
    Plan(cmd::plan::PlanArgs),

    #[command(
        about = "Show how far the history trails today",
        after_help = "EXAMPLES:\n    backdate status\n    backdate status --json"
    )]
    Status,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("BACKDATE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "backdate=debug,info"
        } else {
            "backdate=info,warn"
        })
    });

    let format = env::var("BACKDATE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(std::io::stderr);
            registry.with(layer).init();
        }
        _ => {
            let layer = fmt::layer().compact().with_writer(std::io::stderr);
            registry.with(layer).init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = output::resolve_output_mode(cli.format, cli.json);
    let repo_dir = match cli.repo {
        Some(dir) => dir,
        None => env::current_dir().context("Failed to resolve the current directory")?,
    };
    // Captured once: every command measures "today" against the same instant.
    let now = Utc::now();

    info!("backdate starting");

    let command_result = match cli.command {
        Commands::Run(args) => cmd::run::run_run(&args, &repo_dir, now, output),
        Commands::Plan(args) => cmd::plan::run_plan(&args, &repo_dir, now, output),
        Commands::Status => cmd::status::run_status(&repo_dir, now, output),
    };

    if let Err(err) = command_result {
        error!("{err:#}");
        output::render_error(output, &output::CliError::from(&err))?;
        std::process::exit(1);
    }

    Ok(())
}
