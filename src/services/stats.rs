//! Cohort statistics.
//!
//! The active cohort is every student whose `last_active` falls inside the
//! trailing [`ACTIVE_WINDOW_DAYS`] window. All five counts are taken inside
//! one read transaction, so they describe the same snapshot.

use crate::models::{ApplicationStatus, StudentStats, tags};
use crate::storage::{CohortFilter, Database, StudentStore};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use std::time::Instant;
use tracing::instrument;

/// Trailing activity window defining the active cohort.
pub const ACTIVE_WINDOW_DAYS: i64 = 180;

/// Computes [`StudentStats`].
pub struct StatisticsEngine;

impl StatisticsEngine {
    /// Computes statistics as of now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StatsComputationFailed`] if any sub-count fails.
    pub fn compute(db: &Database) -> Result<StudentStats> {
        Self::compute_at(db, Utc::now())
    }

    /// Computes statistics as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StatsComputationFailed`] if any sub-count fails.
    #[instrument(skip(db), fields(now = %now))]
    pub fn compute_at(db: &Database, now: DateTime<Utc>) -> Result<StudentStats> {
        let start = Instant::now();
        let result = db
            .read("compute_stats", |uow| Self::compute_with(uow, now))
            .map_err(|e| match e {
                Error::StatsComputationFailed(_) => e,
                other => Error::StatsComputationFailed(other.to_string()),
            });

        match &result {
            Ok(stats) => tracing::debug!(
                active = stats.active_students,
                elapsed_ms = start.elapsed().as_millis(),
                "Computed student statistics"
            ),
            Err(e) => tracing::error!(error = %e, "Student statistics failed"),
        }
        result
    }

    /// Computes statistics against any [`StudentStore`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::StatsComputationFailed`] naming the first count that
    /// failed. No partial result is returned.
    pub fn compute_with<S: StudentStore + ?Sized>(
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<StudentStats> {
        let since = window_start(now);
        let count = |filter: CohortFilter<'_>| {
            store.count_active(since, filter).map_err(|e| {
                Error::StatsComputationFailed(format!("count {filter:?}: {e}"))
            })
        };

        Ok(StudentStats {
            active_students: count(CohortFilter::All)?,
            applying_stage: count(CohortFilter::Status(ApplicationStatus::Applying))?,
            needs_essay_help: count(CohortFilter::Tag(tags::NEEDS_ESSAY_HELP))?,
            high_intent: count(CohortFilter::Tag(tags::HIGH_INTENT))?,
            not_contacted_recently: count(CohortFilter::Tag(tags::NOT_CONTACTED))?,
        })
    }
}

/// Start of the active window ending at `now` (inclusive).
#[must_use]
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(ACTIVE_WINDOW_DAYS)
}
