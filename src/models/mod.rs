// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod group;
pub mod step_record;
pub mod user;

pub use group::{Group, GroupMember, GroupType, NewGroup};
pub use step_record::{DailySummary, StepRecord, StepRecordKey};
pub use user::{Gender, NewUser, User, UserLevel};
