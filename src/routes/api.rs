// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    DailySummary, Gender, Group, GroupType, NewGroup, NewUser, StepRecord, User, UserLevel,
};
use crate::services::groups::normalize_invite_code;
use crate::services::steps::validate_history_range;
use crate::services::StepSubmission;
use crate::time_utils::{format_utc_rfc3339, parse_date};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", post(create_profile))
        .route("/api/me", get(get_me).delete(delete_me))
        .route("/api/steps", get(get_steps).post(submit_steps))
        .route("/api/steps/history", get(get_step_history))
        .route("/api/groups", get(list_groups).post(create_group))
        .route("/api/groups/join", post(join_group))
        .route("/api/groups/{id}", delete(delete_group))
        .route("/api/groups/{id}/leave", post(leave_group))
        .route("/api/groups/{id}/invite-code", post(regenerate_invite_code))
}

/// Resolve the authenticated caller to an active profile.
async fn current_user(state: &AppState, auth: &AuthUser) -> Result<User> {
    state
        .db
        .find_user_by_firebase_uid(&auth.firebase_uid)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::NotFound("No profile for this account".to_string()))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub photo_url: Option<String>,
    pub age: u32,
    pub gender: Gender,
    pub location: String,
    pub daily_goal: u32,
    pub user_level: UserLevel,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_steps: u64,
    pub total_distance: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_calories: u64,
    pub group_ids: Vec<String>,
    pub badges: Vec<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            photo_url: user.photo_url,
            age: user.age,
            gender: user.gender,
            location: user.location,
            daily_goal: user.daily_goal,
            user_level: user.user_level,
            total_steps: user.total_steps,
            total_distance: user.total_distance,
            total_calories: user.total_calories,
            group_ids: user.group_ids,
            badges: user.badges,
            created_at: format_utc_rfc3339(user.created_at),
        }
    }
}

/// Create the caller's profile at first authentication.
async fn create_profile(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let profile = body.normalized();
    profile.validate()?;

    let user = User::new(profile, &auth.firebase_uid, Utc::now());
    state.db.create_user(&user).await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let user = current_user(&state, &auth).await?;
    Ok(Json(user.into()))
}

/// Soft-delete the current user.
async fn delete_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<StatusCode> {
    let user = current_user(&state, &auth).await?;

    tracing::info!(user_id = %user.id, "User-initiated account deactivation");

    state.db.deactivate_user(&user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ─── Steps ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct SubmitStepsRequest {
    steps: u64,
    /// Business date (YYYY-MM-DD)
    date: String,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StepRecordSummary {
    pub id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub steps: u64,
    pub distance: f64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub calories: u64,
    pub date: String,
    pub timestamp: String,
}

impl From<StepRecord> for StepRecordSummary {
    fn from(record: StepRecord) -> Self {
        Self {
            id: record.id,
            steps: record.steps,
            distance: record.distance,
            calories: record.calories,
            date: record.date.to_string(),
            timestamp: format_utc_rfc3339(record.timestamp),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubmitStepsResponse {
    pub record: StepRecordSummary,
    pub user: UserResponse,
}

/// Record a step measurement.
async fn submit_steps(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<SubmitStepsRequest>,
) -> Result<(StatusCode, Json<SubmitStepsResponse>)> {
    let date = parse_date(&body.date, "date")?;
    let submission = StepSubmission::new(body.steps, date, Utc::now())?;

    let user = current_user(&state, &auth).await?;
    let (record, user) = state.steps.submit(&user, submission).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitStepsResponse {
            record: record.into(),
            user: user.into(),
        }),
    ))
}

#[derive(Deserialize)]
struct StepsQuery {
    /// Defaults to today (UTC)
    date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStepsResponse {
    pub summary: DailySummary,
    pub records: Vec<StepRecordSummary>,
}

/// Records and totals for one date.
async fn get_steps(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<StepsQuery>,
) -> Result<Json<DailyStepsResponse>> {
    let date = match params.date.as_deref() {
        Some(raw) => parse_date(raw, "date")?,
        None => Utc::now().date_naive(),
    };

    let user = current_user(&state, &auth).await?;
    let (records, summary) = state.steps.daily_summary(&user, date).await?;

    Ok(Json(DailyStepsResponse {
        summary,
        records: records.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Deserialize)]
struct HistoryQuery {
    from: String,
    to: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepHistoryResponse {
    pub days: Vec<DailySummary>,
    pub total_steps: u64,
}

/// Daily summaries for a date range.
async fn get_step_history(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<StepHistoryResponse>> {
    let from = parse_date(&params.from, "from")?;
    let to = parse_date(&params.to, "to")?;
    validate_history_range(from, to)?;

    tracing::debug!(firebase_uid = %auth.firebase_uid, %from, %to, "Fetching step history");

    let user = current_user(&state, &auth).await?;
    let days = state.steps.history(&user, from, to).await?;
    let total_steps = days.iter().map(|d| d.steps).sum();

    Ok(Json(StepHistoryResponse { days, total_steps }))
}

// ─── Groups ──────────────────────────────────────────────────

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub admin_id: String,
    pub member_count: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_steps: u64,
    /// Only shown to the admin
    pub invite_code: Option<String>,
}

impl GroupSummary {
    fn for_viewer(group: Group, viewer_id: &str) -> Self {
        let invite_code = if group.is_admin(viewer_id) {
            group.invite_code
        } else {
            None
        };
        Self {
            member_count: group.members.len() as u32,
            id: group.id,
            name: group.name,
            description: group.description,
            logo_url: group.logo_url,
            group_type: group.group_type,
            admin_id: group.admin_id,
            total_steps: group.total_steps,
            invite_code,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GroupsResponse {
    pub groups: Vec<GroupSummary>,
}

/// Groups the current user belongs to.
async fn list_groups(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<GroupsResponse>> {
    let user = current_user(&state, &auth).await?;
    let groups = state.groups.list_for_user(&user).await?;

    Ok(Json(GroupsResponse {
        groups: groups
            .into_iter()
            .map(|g| GroupSummary::for_viewer(g, &user.id))
            .collect(),
    }))
}

/// Create a group; the caller becomes its admin.
async fn create_group(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<NewGroup>,
) -> Result<(StatusCode, Json<GroupSummary>)> {
    let fields = body.normalized();
    fields.validate()?;

    let user = current_user(&state, &auth).await?;
    let (group, admin) = state.groups.create(&user, fields).await?;

    Ok((
        StatusCode::CREATED,
        Json(GroupSummary::for_viewer(group, &admin.id)),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinGroupRequest {
    invite_code: String,
}

/// Redeem an invite code.
async fn join_group(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<JoinGroupRequest>,
) -> Result<Json<GroupSummary>> {
    let code = normalize_invite_code(&body.invite_code)?;

    let user = current_user(&state, &auth).await?;
    let (group, user) = state.groups.join_by_code(&user, &code).await?;

    Ok(Json(GroupSummary::for_viewer(group, &user.id)))
}

/// Leave a group.
async fn leave_group(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<StatusCode> {
    let user = current_user(&state, &auth).await?;
    state.groups.leave(&user, &group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace a group's invite code (admin only).
async fn regenerate_invite_code(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupSummary>> {
    let user = current_user(&state, &auth).await?;
    let group = state.groups.regenerate_invite_code(&user, &group_id).await?;
    Ok(Json(GroupSummary::for_viewer(group, &user.id)))
}

/// Soft-delete a group (admin only).
async fn delete_group(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<StatusCode> {
    let user = current_user(&state, &auth).await?;
    state.groups.deactivate(&user, &group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
