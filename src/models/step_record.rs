// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Step measurements and the quantities derived from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Meters covered per step.
pub const METERS_PER_STEP: f64 = 0.762;
/// Calories burned per step.
pub const CALORIES_PER_STEP: f64 = 0.04;

/// One measurement for one user on one calendar date.
///
/// `distance` and `calories` are derived from `steps`; the only way to build
/// a record is [`StepRecord::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// Generated ID (also used as document ID)
    pub id: String,
    pub user_id: String,
    pub steps: u64,
    /// Meters
    pub distance: f64,
    pub calories: u64,
    /// Business date the steps belong to ("YYYY-MM-DD")
    pub date: NaiveDate,
    /// When the measurement was submitted
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(user_id: &str, steps: u64, date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            steps,
            distance: Self::calculate_distance(steps),
            calories: Self::calculate_calories(steps),
            date,
            timestamp: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Distance in meters for a step count.
    pub fn calculate_distance(steps: u64) -> f64 {
        steps as f64 * METERS_PER_STEP
    }

    /// Calories for a step count, rounded to the nearest integer.
    pub fn calculate_calories(steps: u64) -> u64 {
        (steps as f64 * CALORIES_PER_STEP).round() as u64
    }

    pub fn key(&self) -> StepRecordKey {
        StepRecordKey {
            user_id: self.user_id.clone(),
            date: self.date,
        }
    }
}

/// Natural lookup key for step records. Not unique: a user may submit
/// several measurements for the same date.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepRecordKey {
    pub user_id: String,
    pub date: NaiveDate,
}

/// Totals for one user on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub steps: u64,
    pub distance: f64,
    pub calories: u64,
    pub daily_goal: u32,
    pub goal_reached: bool,
}

impl DailySummary {
    /// Sum the records belonging to `date`. Records for other dates are ignored.
    pub fn from_records(date: NaiveDate, daily_goal: u32, records: &[StepRecord]) -> Self {
        let (steps, distance, calories) = records
            .iter()
            .filter(|r| r.date == date)
            .fold((0u64, 0.0f64, 0u64), |(s, d, c), r| {
                (
                    s.saturating_add(r.steps),
                    d + r.distance,
                    c.saturating_add(r.calories),
                )
            });

        Self {
            date,
            steps,
            distance,
            calories,
            daily_goal,
            goal_reached: steps >= u64::from(daily_goal),
        }
    }
}
