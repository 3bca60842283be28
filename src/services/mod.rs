// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod groups;
pub mod steps;

pub use groups::GroupService;
pub use steps::{StepService, StepSubmission};
