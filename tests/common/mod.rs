// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::Utc;
use std::sync::Arc;
use step_tracker::config::Config;
use step_tracker::db::FirestoreDb;
use step_tracker::middleware::auth::create_jwt;
use step_tracker::models::{Gender, NewUser, User};
use step_tracker::routes::create_router;
use step_tracker::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(Config::test_default(), test_db_offline()));
    (create_router(state.clone()), state)
}

/// Create a session token for the given external auth identifier.
#[allow(dead_code)]
pub fn create_test_jwt(firebase_uid: &str, signing_key: &[u8]) -> String {
    create_jwt(firebase_uid, signing_key).expect("Failed to create JWT")
}

/// Generate a unique identifier for test isolation.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// Build a fresh, not yet stored user with a unique firebase UID and email.
#[allow(dead_code)]
pub fn test_user(tag: &str) -> User {
    let firebase_uid = unique_id(tag);
    let profile = NewUser {
        email: format!("{}@example.com", firebase_uid),
        name: "Test User".to_string(),
        photo_url: None,
        age: 30,
        gender: Gender::Femme,
        location: "Grenoble".to_string(),
        daily_goal: None,
    }
    .normalized();
    User::new(profile, &firebase_uid, Utc::now())
}
