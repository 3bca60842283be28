// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Step submission service.
//!
//! Handles the submission workflow:
//! 1. Validate the submission (step bounds, business date)
//! 2. Derive the step record (distance, calories)
//! 3. Store it and update user stats and group totals atomically

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{DailySummary, StepRecord, User};
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Upper bound for a single measurement.
pub const MAX_STEPS_PER_RECORD: u64 = 200_000;
/// Longest history window served in one request.
pub const MAX_HISTORY_DAYS: i64 = 366;

/// A submission that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSubmission {
    pub steps: u64,
    pub date: NaiveDate,
}

impl StepSubmission {
    /// Validate raw input against the current time.
    ///
    /// The business date may be at most one day ahead of `now` (UTC) to
    /// allow for clients in timezones east of UTC.
    pub fn new(steps: u64, date: NaiveDate, now: DateTime<Utc>) -> Result<Self> {
        if steps > MAX_STEPS_PER_RECORD {
            return Err(AppError::BadRequest(format!(
                "steps must be at most {}",
                MAX_STEPS_PER_RECORD
            )));
        }

        let latest = now.date_naive() + Duration::days(1);
        if date > latest {
            return Err(AppError::BadRequest(
                "date cannot be in the future".to_string(),
            ));
        }

        Ok(Self { steps, date })
    }
}

/// Check an inclusive history window.
pub fn validate_history_range(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if to < from {
        return Err(AppError::BadRequest(
            "'to' must not be before 'from'".to_string(),
        ));
    }
    if (to - from).num_days() >= MAX_HISTORY_DAYS {
        return Err(AppError::BadRequest(format!(
            "History range is limited to {} days",
            MAX_HISTORY_DAYS
        )));
    }
    Ok(())
}

/// Records steps and answers per-date queries.
#[derive(Clone)]
pub struct StepService {
    db: FirestoreDb,
}

impl StepService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Store a validated submission for `user`.
    ///
    /// Returns the stored record and the user with updated cumulative stats.
    pub async fn submit(&self, user: &User, submission: StepSubmission) -> Result<(StepRecord, User)> {
        if !user.is_active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }

        let record = StepRecord::new(&user.id, submission.steps, submission.date, Utc::now());

        tracing::info!(
            user_id = %user.id,
            steps = record.steps,
            date = %record.date,
            "Submitting steps"
        );

        let previous_level = user.user_level;
        let updated = self.db.record_steps_atomic(&record).await?;

        if updated.user_level != previous_level {
            tracing::info!(
                user_id = %updated.id,
                from = ?previous_level,
                to = ?updated.user_level,
                total_steps = updated.total_steps,
                "User level changed"
            );
        }

        Ok((record, updated))
    }

    /// Records and totals for one date.
    pub async fn daily_summary(
        &self,
        user: &User,
        date: NaiveDate,
    ) -> Result<(Vec<StepRecord>, DailySummary)> {
        let records = self.db.get_step_records(&user.id, date).await?;
        let summary = DailySummary::from_records(date, user.daily_goal, &records);
        Ok((records, summary))
    }

    /// Daily summaries for every date in an inclusive range, oldest first.
    /// Dates without records are included with zero totals.
    pub async fn history(
        &self,
        user: &User,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySummary>> {
        validate_history_range(from, to)?;
        let records = self.db.get_step_records_in_range(&user.id, from, to).await?;
        Ok(summarize_days(from, to, user.daily_goal, &records))
    }
}

fn summarize_days(
    from: NaiveDate,
    to: NaiveDate,
    daily_goal: u32,
    records: &[StepRecord],
) -> Vec<DailySummary> {
    from.iter_days()
        .take_while(|day| *day <= to)
        .map(|day| DailySummary::from_records(day, daily_goal, records))
        .collect()
}
