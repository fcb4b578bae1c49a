//! Backdated commit schedule generation.
//!
//! A [`Schedule`] walks a cursor forward from the last recorded instant in
//! random steps and yields one instant per commit to make. It stops once the
//! cursor has reached the calendar day of the stop instant.
//!
//! # Rules
//!
//! - Each step is a whole number of minutes drawn uniformly from
//!   `[min_step_minutes, max_step_minutes]` (default `[60, 720]`).
//! - A candidate that lands on the rest day (default Sunday) survives only
//!   with probability `rest_day_keep_percent` (default 10%). A discarded
//!   candidate does not move the cursor; the next draw starts from the same
//!   base.
//! - The stop check runs before every draw and compares UTC calendar days,
//!   so a cursor already on (or past) the stop day ends the schedule without
//!   consuming randomness.
//!
//! Yielded instants are strictly increasing and never fall on a day after
//! the stop day: a step is only drawn while the cursor is on an earlier day,
//! and a step never exceeds twelve hours.

use std::iter::FusedIterator;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::ScheduleConfig;

pub const MIN_STEP_MINUTES: u32 = 60;
pub const MAX_STEP_MINUTES: u32 = 720;
pub const REST_DAY: Weekday = Weekday::Sun;
pub const REST_DAY_KEEP_PERCENT: u8 = 10;

/// Tunables for a [`Schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRules {
    pub min_step_minutes: u32,
    pub max_step_minutes: u32,
    pub rest_day: Weekday,
    pub rest_day_keep_percent: u8,
}

impl Default for ScheduleRules {
    fn default() -> Self {
        Self {
            min_step_minutes: MIN_STEP_MINUTES,
            max_step_minutes: MAX_STEP_MINUTES,
            rest_day: REST_DAY,
            rest_day_keep_percent: REST_DAY_KEEP_PERCENT,
        }
    }
}

impl From<&ScheduleConfig> for ScheduleRules {
    fn from(cfg: &ScheduleConfig) -> Self {
        Self {
            min_step_minutes: cfg.min_step_minutes,
            max_step_minutes: cfg.max_step_minutes,
            rest_day: cfg.rest_day,
            rest_day_keep_percent: cfg.rest_day_keep_percent,
        }
    }
}

/// Where the generator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Cursor set, nothing drawn yet.
    Seeding,
    Advancing,
    /// Terminal: the cursor reached the stop day.
    Done,
}

/// Counters describing how a schedule unfolded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleStats {
    /// Steps drawn, including discarded rest-day candidates.
    pub candidates_drawn: u64,
    /// Candidates that landed on the rest day.
    pub rest_day_candidates: u64,
    /// Rest-day candidates that were thrown away.
    pub rest_day_discards: u64,
    /// Instants yielded.
    pub emitted: u64,
}

/// Iterator over the instants at which commits should be made.
#[derive(Debug, Clone)]
pub struct Schedule<R> {
    rules: ScheduleRules,
    cursor: DateTime<Utc>,
    stop_day: NaiveDate,
    phase: Phase,
    rng: R,
    stats: ScheduleStats,
}

impl<R: Rng> Schedule<R> {
    /// Seed a schedule with the default rules.
    pub fn seed(cursor: DateTime<Utc>, stop: DateTime<Utc>, rng: R) -> Self {
        Self::with_rules(ScheduleRules::default(), cursor, stop, rng)
    }

    /// Seed a schedule at `cursor` that runs until the calendar day of `stop`.
    pub fn with_rules(
        rules: ScheduleRules,
        cursor: DateTime<Utc>,
        stop: DateTime<Utc>,
        rng: R,
    ) -> Self {
        debug_assert!(rules.min_step_minutes >= 1);
        debug_assert!(rules.min_step_minutes <= rules.max_step_minutes);
        Self {
            rules,
            cursor,
            stop_day: stop.date_naive(),
            phase: Phase::Seeding,
            rng,
            stats: ScheduleStats::default(),
        }
    }

    /// Last yielded instant, or the seed if nothing was yielded yet.
    #[must_use]
    pub const fn cursor(&self) -> DateTime<Utc> {
        self.cursor
    }

    #[must_use]
    pub const fn stop_day(&self) -> NaiveDate {
        self.stop_day
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn stats(&self) -> ScheduleStats {
        self.stats
    }

    #[must_use]
    pub const fn rules(&self) -> ScheduleRules {
        self.rules
    }

    fn reached_stop(&self) -> bool {
        self.cursor.date_naive() >= self.stop_day
    }

    fn draw_step(&mut self) -> Duration {
        let minutes = self
            .rng
            .gen_range(self.rules.min_step_minutes..=self.rules.max_step_minutes);
        Duration::minutes(i64::from(minutes))
    }

    /// Roll `[0, 100)` and keep the rest-day candidate if it lands under the
    /// keep percentage.
    fn keep_rest_day_candidate(&mut self) -> bool {
        self.rng.gen_range(0..100_u8) < self.rules.rest_day_keep_percent
    }

    fn finish(&mut self) {
        self.phase = Phase::Done;
        debug!(
            cursor = %self.cursor,
            stop_day = %self.stop_day,
            emitted = self.stats.emitted,
            "schedule reached stop day"
        );
    }
}

impl<R: Rng> Iterator for Schedule<R> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.phase == Phase::Seeding {
            trace!(cursor = %self.cursor, stop_day = %self.stop_day, "schedule seeded");
            self.phase = Phase::Advancing;
        }

        loop {
            if self.phase == Phase::Done {
                return None;
            }
            if self.reached_stop() {
                self.finish();
                return None;
            }

            let step = self.draw_step();
            self.stats.candidates_drawn += 1;
            let Some(candidate) = self.cursor.checked_add_signed(step) else {
                self.finish();
                return None;
            };

            if candidate.weekday() == self.rules.rest_day {
                self.stats.rest_day_candidates += 1;
                if !self.keep_rest_day_candidate() {
                    self.stats.rest_day_discards += 1;
                    trace!(%candidate, "discarded rest-day candidate");
                    continue;
                }
            }

            self.cursor = candidate;
            self.stats.emitted += 1;
            return Some(candidate);
        }
    }
}

impl<R: Rng> FusedIterator for Schedule<R> {}
