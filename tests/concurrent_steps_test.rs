// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Concurrent step submissions must each land exactly once in the user's
//! cumulative stats and in the group totals.

use chrono::{NaiveDate, Utc};
use step_tracker::models::{GroupType, NewGroup, UserLevel};
use step_tracker::services::{GroupService, StepService, StepSubmission};

mod common;
use common::{test_db, test_user};

const NUM_CONCURRENT_SUBMISSIONS: u64 = 10;
const STEPS_PER_SUBMISSION: u64 = 11_000;

#[tokio::test]
async fn test_concurrent_submissions_are_all_counted() {
    require_emulator!();

    let db = test_db().await;
    let steps = StepService::new(db.clone());
    let groups = GroupService::new(db.clone());

    let user = test_user("race-steps");
    db.create_user(&user).await.expect("Failed to create test user");

    let (group, user) = groups
        .create(
            &user,
            NewGroup {
                name: "Race Walkers".to_string(),
                description: None,
                logo_url: None,
                group_type: GroupType::Friends,
            },
        )
        .await
        .expect("Failed to create group");

    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut handles = vec![];

    for _ in 0..NUM_CONCURRENT_SUBMISSIONS {
        let steps = steps.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            let submission = StepSubmission::new(STEPS_PER_SUBMISSION, date, Utc::now())?;
            steps.submit(&user, submission).await
        }));
    }

    for handle in handles {
        handle
            .await
            .expect("Task join failed")
            .expect("Step submission failed");
    }

    let expected = NUM_CONCURRENT_SUBMISSIONS * STEPS_PER_SUBMISSION;

    let stored = db
        .get_user(&user.id)
        .await
        .expect("Failed to fetch user")
        .expect("User document not found");
    assert_eq!(
        stored.total_steps, expected,
        "Total steps mismatch due to race condition"
    );
    assert_eq!(stored.total_calories, expected * 4 / 100);
    assert_eq!(stored.user_level, UserLevel::Silver);
    assert_eq!(stored.group_ids, vec![group.id.clone()]);

    let stored_group = db
        .get_group(&group.id)
        .await
        .expect("Failed to fetch group")
        .expect("Group document not found");
    assert_eq!(
        stored_group.total_steps, expected,
        "Group total mismatch due to race condition"
    );

    let (records, summary) = steps.daily_summary(&stored, date).await.unwrap();
    assert_eq!(records.len() as u64, NUM_CONCURRENT_SUBMISSIONS);
    assert_eq!(summary.steps, expected);
}

#[tokio::test]
async fn test_submissions_racing_a_join_keep_membership() {
    require_emulator!();

    let db = test_db().await;
    let steps = StepService::new(db.clone());
    let groups = GroupService::new(db.clone());

    let admin = test_user("race-admin");
    let walker = test_user("race-walker");
    db.create_user(&admin).await.unwrap();
    db.create_user(&walker).await.unwrap();

    let (group, _) = groups
        .create(
            &admin,
            NewGroup {
                name: "Overlap".to_string(),
                description: None,
                logo_url: None,
                group_type: GroupType::Community,
            },
        )
        .await
        .unwrap();
    let code = group.invite_code.clone().unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();

    let mut handles = vec![];
    for _ in 0..5 {
        let steps = steps.clone();
        let walker = walker.clone();
        handles.push(tokio::spawn(async move {
            let submission = StepSubmission::new(1_000, date, Utc::now())?;
            steps.submit(&walker, submission).await.map(|_| ())
        }));
    }
    let joining = {
        let groups = groups.clone();
        let walker = walker.clone();
        tokio::spawn(async move { groups.join_by_code(&walker, &code).await.map(|_| ()) })
    };
    handles.push(joining);

    for handle in handles {
        handle.await.expect("Task join failed").expect("Operation failed");
    }

    // Whatever the interleaving, both sides of the membership survive.
    let stored_walker = db.get_user(&walker.id).await.unwrap().unwrap();
    let stored_group = db.get_group(&group.id).await.unwrap().unwrap();
    assert_eq!(stored_walker.total_steps, 5_000);
    assert_eq!(stored_walker.group_ids, vec![group.id.clone()]);
    assert!(stored_group.is_member(&walker.id));
    assert!(stored_group.total_steps <= 5_000);
}
