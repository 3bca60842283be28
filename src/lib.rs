// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Step Tracker: daily steps, tiers and groups
//!
//! This crate provides the backend API for recording step counts,
//! deriving distance, calories and user tiers, and managing groups
//! joined by invite code.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{GroupService, StepService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub steps: StepService,
    pub groups: GroupService,
}

impl AppState {
    /// Wire services around a database handle.
    pub fn new(config: Config, db: FirestoreDb) -> Self {
        Self {
            steps: StepService::new(db.clone()),
            groups: GroupService::new(db.clone()),
            config,
            db,
        }
    }
}
