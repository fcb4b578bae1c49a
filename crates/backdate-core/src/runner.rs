//! End-to-end drivers: open or bootstrap the store, seed the schedule, and
//! hand each instant to a sink.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use rand::rngs::{OsRng, StdRng};
use rand::{CryptoRng, Rng, RngCore, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::{BackdateError, Result};
use crate::identity::Identity;
use crate::schedule::{Schedule, ScheduleRules, ScheduleStats};
use crate::sink::{Event, GitSink, RecordSink};
use crate::store::{GitStore, baseline_instant, ensure_initialized};

/// Inputs shared by [`run`] and [`plan`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub repo_dir: PathBuf,
    /// Stop instant, captured once at process start.
    pub now: DateTime<Utc>,
    /// Schedule seed; drawn from entropy when `None`.
    pub seed: Option<u64>,
}

/// First and last instants handed to a sink, plus how many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordedSpan {
    pub count: u64,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

impl RecordedSpan {
    fn push(&mut self, at: DateTime<Utc>) {
        self.count += 1;
        self.first.get_or_insert(at);
        self.last = Some(at);
    }
}

/// Outcome of a [`run`] or [`plan`].
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub repo: PathBuf,
    pub dry_run: bool,
    pub bootstrapped: bool,
    pub seed: u64,
    pub seeded_from: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub recorded: RecordedSpan,
    pub stats: ScheduleStats,
}

/// Outcome of [`plan`]: the report plus the instants that would be recorded.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    #[serde(flatten)]
    pub report: RunReport,
    pub instants: Vec<DateTime<Utc>>,
    pub truncated: bool,
}

/// Where a repository's history stands relative to today.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub repo: PathBuf,
    pub initialized: bool,
    pub commits: u64,
    pub head: Option<DateTime<Utc>>,
    pub stop_day: NaiveDate,
    pub days_behind: i64,
}

/// Feed every instant of `schedule` to `sink` as a fresh event.
///
/// Stops at the first sink failure; earlier records stay committed.
///
/// # Errors
///
/// Propagates the sink's error unchanged.
pub fn drive<R, P, S>(
    schedule: &mut Schedule<R>,
    sink: &mut S,
    identity: &Identity,
    payload_rng: &mut P,
) -> Result<RecordedSpan>
where
    R: Rng,
    P: RngCore + CryptoRng,
    S: RecordSink + ?Sized,
{
    let mut span = RecordedSpan::default();
    for at in schedule.by_ref() {
        let event = Event::generate(at, payload_rng);
        sink.record(&event, identity)?;
        span.push(at);
    }
    Ok(span)
}

/// Bring the repository's history up to today.
///
/// # Errors
///
/// Any store, history, or record failure aborts the run.
pub fn run(options: &RunOptions, config: &Config, identity: &Identity) -> Result<RunReport> {
    let boot = ensure_initialized(&options.repo_dir, identity, &config.store.payload_file)?;
    let seeded_from = head_instant(&boot.store)?;
    let seed = options.seed.unwrap_or_else(rand::random);

    info!(
        repo = %options.repo_dir.display(),
        %seeded_from,
        stop = %options.now,
        seed,
        "creating commits"
    );

    let mut schedule = Schedule::with_rules(
        ScheduleRules::from(&config.schedule),
        seeded_from,
        options.now,
        StdRng::seed_from_u64(seed),
    );
    let mut sink = GitSink::new(&boot.store, &config.store.payload_file);
    let recorded = drive(&mut schedule, &mut sink, identity, &mut OsRng)?;

    info!(commits = recorded.count, "commits up to date");

    Ok(RunReport {
        repo: options.repo_dir.clone(),
        dry_run: false,
        bootstrapped: boot.created,
        seed,
        seeded_from,
        stop: options.now,
        recorded,
        stats: schedule.stats(),
    })
}

/// Compute the schedule [`run`] would follow without touching the repository.
///
/// A missing repository is planned from the baseline instant. At most
/// `limit` instants are listed; all of them are counted.
///
/// # Errors
///
/// Fails if an existing repository cannot be opened or its head read.
pub fn plan(options: &RunOptions, config: &Config, limit: Option<usize>) -> Result<PlanReport> {
    let (seeded_from, bootstrapped) = match GitStore::open(&options.repo_dir) {
        Ok(store) => (head_instant(&store)?, false),
        Err(BackdateError::StoreNotInitialized(_)) => (baseline_instant(), true),
        Err(err) => return Err(err),
    };
    let seed = options.seed.unwrap_or_else(rand::random);

    let mut schedule = Schedule::with_rules(
        ScheduleRules::from(&config.schedule),
        seeded_from,
        options.now,
        StdRng::seed_from_u64(seed),
    );

    let mut recorded = RecordedSpan::default();
    let mut instants = Vec::new();
    for at in schedule.by_ref() {
        recorded.push(at);
        if limit.is_none_or(|max| instants.len() < max) {
            instants.push(at);
        }
    }
    let truncated = u64::try_from(instants.len()).map_or(true, |n| n < recorded.count);

    Ok(PlanReport {
        report: RunReport {
            repo: options.repo_dir.clone(),
            dry_run: true,
            bootstrapped,
            seed,
            seeded_from,
            stop: options.now,
            recorded,
            stats: schedule.stats(),
        },
        instants,
        truncated,
    })
}

/// Report the head commit and how many days it trails `now`.
///
/// # Errors
///
/// Fails if an existing repository cannot be opened or read.
pub fn status(repo_dir: &Path, now: DateTime<Utc>) -> Result<StatusReport> {
    let stop_day = now.date_naive();
    let store = match GitStore::open(repo_dir) {
        Ok(store) => store,
        Err(BackdateError::StoreNotInitialized(_)) => {
            return Ok(StatusReport {
                repo: repo_dir.to_path_buf(),
                initialized: false,
                commits: 0,
                head: None,
                stop_day,
                days_behind: (stop_day - baseline_instant().date_naive()).num_days(),
            });
        }
        Err(err) => return Err(err),
    };

    let head = head_instant(&store)?;
    let commits = store
        .commit_count()
        .map_err(|source| BackdateError::HistoryRead {
            path: repo_dir.to_path_buf(),
            source,
        })?;

    Ok(StatusReport {
        repo: repo_dir.to_path_buf(),
        initialized: true,
        commits,
        head: Some(head),
        stop_day,
        days_behind: (stop_day - head.date_naive()).num_days().max(0),
    })
}

fn head_instant(store: &GitStore) -> Result<DateTime<Utc>> {
    store
        .head_instant()
        .map_err(|source| BackdateError::HistoryRead {
            path: store.root().to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::PAYLOAD_LEN;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("valid RFC 3339")
            .with_timezone(&Utc)
    }

    fn identity() -> Identity {
        Identity {
            name: "Runner Author".to_string(),
            email: "runner@example.com".to_string(),
        }
    }

    /// Keeps events in memory; optionally fails on the n-th record.
    #[derive(Default)]
    struct MemorySink {
        events: Vec<Event>,
        fail_at: Option<usize>,
    }

    impl RecordSink for MemorySink {
        fn record(&mut self, event: &Event, _identity: &Identity) -> Result<()> {
            if self.fail_at == Some(self.events.len()) {
                return Err(BackdateError::RecordWrite {
                    at: event.at,
                    source: crate::store::StoreError::Output {
                        command: "commit".to_string(),
                        detail: "injected".to_string(),
                    },
                });
            }
            self.events.push(event.clone());
            Ok(())
        }
    }

    #[test]
    fn drive_hands_every_instant_to_the_sink_in_order() {
        let mut schedule = Schedule::seed(
            utc("2024-01-05T00:00:00Z"),
            utc("2024-01-08T00:00:00Z"),
            StdRng::seed_from_u64(5),
        );
        let mut sink = MemorySink::default();
        let span = drive(&mut schedule, &mut sink, &identity(), &mut OsRng).expect("drive");

        assert_eq!(span.count, sink.events.len() as u64);
        assert_eq!(span.first, sink.events.first().map(|e| e.at));
        assert_eq!(span.last, sink.events.last().map(|e| e.at));
        for pair in sink.events.windows(2) {
            assert!(pair[0].at < pair[1].at);
        }
        let payloads: HashSet<[u8; PAYLOAD_LEN]> = sink.events.iter().map(|e| e.payload).collect();
        assert_eq!(payloads.len(), sink.events.len());
    }

    #[test]
    fn drive_stops_at_first_sink_failure() {
        let mut schedule = Schedule::seed(
            utc("2024-01-01T00:00:00Z"),
            utc("2024-02-01T00:00:00Z"),
            StdRng::seed_from_u64(9),
        );
        let mut sink = MemorySink {
            fail_at: Some(3),
            ..MemorySink::default()
        };
        let err = drive(&mut schedule, &mut sink, &identity(), &mut OsRng).expect_err("fails");

        assert!(matches!(err, BackdateError::RecordWrite { .. }));
        assert_eq!(sink.events.len(), 3);
        assert_eq!(schedule.stats().emitted, 4);
    }

    #[test]
    fn run_bootstraps_then_fills_up_to_stop_day() {
        let dir = TempDir::new().expect("temp dir");
        let options = RunOptions {
            repo_dir: dir.path().to_path_buf(),
            now: utc("2021-01-10T12:00:00Z"),
            seed: Some(42),
        };

        let report = run(&options, &Config::default(), &identity()).expect("run");
        assert!(report.bootstrapped);
        assert_eq!(report.seeded_from, baseline_instant());
        assert!(report.recorded.count > 0);
        let last = report.recorded.last.expect("at least one commit");
        assert!(last.date_naive() <= options.now.date_naive());

        let store = GitStore::open(dir.path()).expect("open");
        assert_eq!(
            store.commit_count().expect("count"),
            report.recorded.count + 1
        );
        assert_eq!(store.head_instant().expect("head"), last);
    }

    #[test]
    fn rerun_resumes_from_last_commit_without_rebootstrapping() {
        let dir = TempDir::new().expect("temp dir");
        let first = RunOptions {
            repo_dir: dir.path().to_path_buf(),
            now: utc("2021-01-05T12:00:00Z"),
            seed: Some(1),
        };
        let report = run(&first, &Config::default(), &identity()).expect("first run");
        let resumed_from = report.recorded.last.expect("commits made");

        let second = RunOptions {
            now: utc("2021-01-09T12:00:00Z"),
            seed: Some(2),
            ..first
        };
        let again = run(&second, &Config::default(), &identity()).expect("second run");

        assert!(!again.bootstrapped);
        assert_eq!(again.seeded_from, resumed_from);
        if let Some(first_new) = again.recorded.first {
            assert!(first_new > resumed_from);
        }
    }

    #[test]
    fn run_on_current_repository_records_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let options = RunOptions {
            repo_dir: dir.path().to_path_buf(),
            now: utc("2021-01-01T09:00:00Z"),
            seed: Some(3),
        };
        let report = run(&options, &Config::default(), &identity()).expect("run");

        assert!(report.bootstrapped);
        assert_eq!(report.recorded, RecordedSpan::default());
        assert_eq!(report.stats, ScheduleStats::default());
    }

    #[test]
    fn plan_matches_run_for_the_same_seed() {
        let dir = TempDir::new().expect("temp dir");
        let options = RunOptions {
            repo_dir: dir.path().to_path_buf(),
            now: utc("2021-01-20T00:00:00Z"),
            seed: Some(77),
        };

        let planned = plan(&options, &Config::default(), None).expect("plan");
        assert!(planned.report.dry_run);
        assert!(planned.report.bootstrapped);
        assert!(!planned.truncated);
        assert!(
            !dir.path().join(".git").exists(),
            "plan must not create a repo"
        );

        let report = run(&options, &Config::default(), &identity()).expect("run");
        assert_eq!(report.recorded, planned.report.recorded);
        assert_eq!(report.stats, planned.report.stats);
    }

    #[test]
    fn plan_limit_truncates_the_listing_only() {
        let dir = TempDir::new().expect("temp dir");
        let options = RunOptions {
            repo_dir: dir.path().to_path_buf(),
            now: utc("2021-02-01T00:00:00Z"),
            seed: Some(8),
        };
        let planned = plan(&options, &Config::default(), Some(5)).expect("plan");

        assert_eq!(planned.instants.len(), 5);
        assert!(planned.truncated);
        assert!(planned.report.recorded.count > 5);
    }

    #[test]
    fn status_of_missing_repository() {
        let dir = TempDir::new().expect("temp dir");
        let report = status(dir.path(), utc("2021-01-11T08:00:00Z")).expect("status");
        assert!(!report.initialized);
        assert_eq!(report.commits, 0);
        assert_eq!(report.days_behind, 10);
    }

    #[test]
    fn status_after_run_is_caught_up() {
        let dir = TempDir::new().expect("temp dir");
        let now = utc("2021-01-04T12:00:00Z");
        let options = RunOptions {
            repo_dir: dir.path().to_path_buf(),
            now,
            seed: Some(4),
        };
        let report = run(&options, &Config::default(), &identity()).expect("run");

        let status = status(dir.path(), now).expect("status");
        assert!(status.initialized);
        assert_eq!(status.commits, report.recorded.count + 1);
        assert_eq!(status.head, report.recorded.last);
        assert_eq!(status.days_behind, 0);
    }
}
