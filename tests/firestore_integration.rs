// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (FIRESTORE_EMULATOR_HOST); they are skipped otherwise.

use chrono::{NaiveDate, Utc};
use step_tracker::error::AppError;
use step_tracker::models::{GroupType, NewGroup, UserLevel};
use step_tracker::services::{GroupService, StepService, StepSubmission};

mod common;
use common::{test_db, test_user};

fn new_group(name: &str) -> NewGroup {
    NewGroup {
        name: name.to_string(),
        description: Some("Integration test group".to_string()),
        logo_url: None,
        group_type: GroupType::Community,
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_and_find_user() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user("create");

    assert!(db
        .find_user_by_firebase_uid(&user.firebase_uid)
        .await
        .unwrap()
        .is_none());

    db.create_user(&user).await.unwrap();

    let by_uid = db
        .find_user_by_firebase_uid(&user.firebase_uid)
        .await
        .unwrap()
        .expect("user should exist");
    assert_eq!(by_uid.id, user.id);
    assert_eq!(by_uid.daily_goal, 10_000);
    assert_eq!(by_uid.user_level, UserLevel::Bronze);

    let by_email = db
        .find_user_by_email(&user.email.to_uppercase())
        .await
        .unwrap()
        .expect("lookup by email should be case-insensitive");
    assert_eq!(by_email.id, user.id);
}

#[tokio::test]
async fn test_duplicate_user_rejected() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user("dup");
    db.create_user(&user).await.unwrap();

    // Same firebase uid, new document
    let mut again = test_user("dup-other");
    again.firebase_uid = user.firebase_uid.clone();
    let err = db.create_user(&again).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Same email, different account
    let mut same_email = test_user("dup-email");
    same_email.email = user.email.clone();
    let err = db.create_user(&same_email).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// STEP TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_submit_steps_updates_user_stats() {
    require_emulator!();

    let db = test_db().await;
    let steps = StepService::new(db.clone());
    let user = test_user("steps");
    db.create_user(&user).await.unwrap();

    let submission = StepSubmission::new(60_000, day(1), Utc::now()).unwrap();
    let (record, user) = steps.submit(&user, submission).await.unwrap();
    assert_eq!(record.calories, 2_400);
    assert_eq!(user.total_steps, 60_000);
    assert_eq!(user.user_level, UserLevel::Bronze);

    let submission = StepSubmission::new(45_000, day(2), Utc::now()).unwrap();
    let (_, user) = steps.submit(&user, submission).await.unwrap();
    assert_eq!(user.total_steps, 105_000);
    assert_eq!(user.user_level, UserLevel::Silver);

    let stored = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.total_steps, 105_000);
    assert_eq!(stored.total_calories, 4_200);
    assert_eq!(stored.user_level, UserLevel::Silver);

    let fetched = db.get_step_record(&record.id).await.unwrap().unwrap();
    assert_eq!(fetched, record);
}

#[tokio::test]
async fn test_records_queried_by_user_and_date() {
    require_emulator!();

    let db = test_db().await;
    let steps = StepService::new(db.clone());
    let user = test_user("query");
    db.create_user(&user).await.unwrap();

    let mut current = user.clone();
    for (count, date) in [(3_000, day(5)), (4_000, day(5)), (9_000, day(6))] {
        let submission = StepSubmission::new(count, date, Utc::now()).unwrap();
        current = steps.submit(&current, submission).await.unwrap().1;
    }

    let (records, summary) = steps.daily_summary(&current, day(5)).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(summary.steps, 7_000);
    assert!(!summary.goal_reached);

    let history = steps.history(&current, day(4), day(6)).await.unwrap();
    let totals: Vec<u64> = history.iter().map(|d| d.steps).collect();
    assert_eq!(totals, vec![0, 7_000, 9_000]);
}

#[tokio::test]
async fn test_inactive_user_cannot_submit() {
    require_emulator!();

    let db = test_db().await;
    let steps = StepService::new(db.clone());
    let user = test_user("inactive");
    db.create_user(&user).await.unwrap();

    let deactivated = db.deactivate_user(&user.id).await.unwrap();
    assert!(!deactivated.is_active);

    let submission = StepSubmission::new(1_000, day(1), Utc::now()).unwrap();
    let err = steps.submit(&deactivated, submission).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // A stale copy of the user still active is refused by the store
    let err = steps.submit(&user, submission).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // Claims outlive the account
    let mut again = test_user("inactive-again");
    again.firebase_uid = user.firebase_uid.clone();
    let err = db.create_user(&again).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

// ═══════════════════════════════════════════════════════════════════════════
// GROUP TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_group_lifecycle() {
    require_emulator!();

    let db = test_db().await;
    let groups = GroupService::new(db.clone());
    let steps = StepService::new(db.clone());

    let admin = test_user("admin");
    let member = test_user("member");
    db.create_user(&admin).await.unwrap();
    db.create_user(&member).await.unwrap();

    // Create: admin is a member and holds the group reference
    let (group, admin) = groups.create(&admin, new_group("Lunch Walkers")).await.unwrap();
    let code = group.invite_code.clone().expect("invite code assigned");
    assert!(group.is_member(&admin.id));
    assert_eq!(admin.group_ids, vec![group.id.clone()]);

    // Join by code (case-insensitive), twice
    let (joined, member) = groups
        .join_by_code(&member, &code.to_lowercase())
        .await
        .unwrap();
    assert_eq!(joined.members.len(), 2);
    let (joined_again, member) = groups.join_by_code(&member, &code).await.unwrap();
    assert_eq!(joined_again.members.len(), 2);
    assert_eq!(member.group_ids, vec![group.id.clone()]);

    // Steps flow into the group total
    let submission = StepSubmission::new(5_000, day(10), Utc::now()).unwrap();
    let (_, member) = steps.submit(&member, submission).await.unwrap();
    let stored = db.get_group(&group.id).await.unwrap().unwrap();
    assert_eq!(stored.total_steps, 5_000);

    // The admin cannot leave; a member can
    let err = groups.leave(&admin, &group.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let member = groups.leave(&member, &group.id).await.unwrap();
    assert!(member.group_ids.is_empty());
    let stored = db.get_group(&group.id).await.unwrap().unwrap();
    assert!(!stored.is_member(&member.id));
    assert!(stored.is_member(&admin.id));

    // Only the admin can regenerate the code or delete the group
    let err = groups
        .regenerate_invite_code(&member, &group.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let regenerated = groups
        .regenerate_invite_code(&admin, &group.id)
        .await
        .unwrap();
    assert_ne!(regenerated.invite_code.as_deref(), Some(code.as_str()));

    // The old code no longer leads anywhere
    let err = groups.join_by_code(&member, &code).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = groups.deactivate(&member, &group.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    groups.deactivate(&admin, &group.id).await.unwrap();
    assert!(groups.list_for_user(&admin).await.unwrap().is_empty());

    // Deactivated groups cannot be joined
    let new_code = regenerated.invite_code.unwrap();
    let err = groups.join_by_code(&member, &new_code).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Leaving a deactivated group prunes the stale reference, once
    let admin = groups.leave(&admin, &group.id).await.unwrap();
    assert!(admin.group_ids.is_empty());
    let stored = db.get_user(&admin.id).await.unwrap().unwrap();
    assert!(stored.group_ids.is_empty());
    let err = groups.leave(&admin, &group.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_unknown_invite_code() {
    require_emulator!();

    let db = test_db().await;
    let groups = GroupService::new(db.clone());
    let user = test_user("unknown-code");
    db.create_user(&user).await.unwrap();

    let err = groups.join_by_code(&user, "ZZZZZZZ0").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
