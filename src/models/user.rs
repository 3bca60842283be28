// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::models::StepRecord;

/// Daily step goal assigned to new users.
pub const DEFAULT_DAILY_GOAL: u32 = 10_000;

/// Cumulative step thresholds for each tier.
pub const SILVER_THRESHOLD: u64 = 100_000;
pub const GOLD_THRESHOLD: u64 = 500_000;
pub const CHAMPION_THRESHOLD: u64 = 1_000_000;

/// Tier derived from a user's cumulative step count.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum UserLevel {
    #[default]
    Bronze,
    Silver,
    Gold,
    Champion,
}

impl UserLevel {
    /// Map cumulative steps to a tier. Thresholds are checked from the top down.
    pub fn from_total_steps(total_steps: u64) -> Self {
        if total_steps >= CHAMPION_THRESHOLD {
            UserLevel::Champion
        } else if total_steps >= GOLD_THRESHOLD {
            UserLevel::Gold
        } else if total_steps >= SILVER_THRESHOLD {
            UserLevel::Silver
        } else {
            UserLevel::Bronze
        }
    }
}

/// Gender values accepted by the stored schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Gender {
    Homme,
    Femme,
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Generated ID (also used as document ID)
    pub id: String,
    /// External authentication identifier
    pub firebase_uid: String,
    /// Email address (lowercased)
    pub email: String,
    /// Display name
    pub name: String,
    /// Profile picture URL
    #[serde(default)]
    pub photo_url: Option<String>,
    pub age: u32,
    pub gender: Gender,
    pub location: String,
    #[serde(default = "default_daily_goal")]
    pub daily_goal: u32,
    /// Derived from `total_steps`; see [`User::update_level`]
    #[serde(default)]
    pub user_level: UserLevel,

    // ─── Cumulative Stats ────────────────────────────────────────
    #[serde(default)]
    pub total_steps: u64,
    /// Meters
    #[serde(default)]
    pub total_distance: f64,
    #[serde(default)]
    pub total_calories: u64,

    // ─── References ──────────────────────────────────────────────
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub badges: Vec<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_daily_goal() -> u32 {
    DEFAULT_DAILY_GOAL
}

fn default_true() -> bool {
    true
}

/// Profile fields supplied at first authentication.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(url)]
    pub photo_url: Option<String>,
    #[validate(range(min = 1, max = 120))]
    pub age: u32,
    pub gender: Gender,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    #[validate(range(min = 1, max = 100_000))]
    pub daily_goal: Option<u32>,
}

impl NewUser {
    /// Apply the stored schema's normalization rules (trim, lowercase email).
    pub fn normalized(self) -> Self {
        Self {
            email: self.email.trim().to_lowercase(),
            name: self.name.trim().to_string(),
            photo_url: self
                .photo_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            location: self.location.trim().to_string(),
            ..self
        }
    }
}

impl User {
    /// Create a user at first authentication.
    ///
    /// `profile` is expected to be normalized and validated already.
    pub fn new(profile: NewUser, firebase_uid: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            firebase_uid: firebase_uid.to_string(),
            email: profile.email,
            name: profile.name,
            photo_url: profile.photo_url,
            age: profile.age,
            gender: profile.gender,
            location: profile.location,
            daily_goal: profile.daily_goal.unwrap_or(DEFAULT_DAILY_GOAL),
            user_level: UserLevel::Bronze,
            total_steps: 0,
            total_distance: 0.0,
            total_calories: 0,
            group_ids: Vec::new(),
            badges: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recompute the tier from cumulative steps.
    pub fn update_level(&mut self) {
        self.user_level = UserLevel::from_total_steps(self.total_steps);
    }

    /// Fold a new step record into the cumulative stats.
    pub fn apply_step_record(&mut self, record: &StepRecord, now: DateTime<Utc>) {
        self.total_steps = self.total_steps.saturating_add(record.steps);
        self.total_distance += record.distance;
        self.total_calories = self.total_calories.saturating_add(record.calories);
        self.update_level();
        self.updated_at = now;
    }

    /// Record group membership. Returns `false` if already present.
    pub fn join_group(&mut self, group_id: &str, now: DateTime<Utc>) -> bool {
        if self.group_ids.iter().any(|id| id == group_id) {
            return false;
        }
        self.group_ids.push(group_id.to_string());
        self.updated_at = now;
        true
    }

    /// Drop group membership. Returns `false` if the user was not a member.
    pub fn leave_group(&mut self, group_id: &str, now: DateTime<Utc>) -> bool {
        let before = self.group_ids.len();
        self.group_ids.retain(|id| id != group_id);
        let removed = self.group_ids.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }

    /// Soft delete.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }
}
