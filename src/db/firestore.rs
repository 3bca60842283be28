// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profiles and cumulative stats)
//! - Groups (membership and invite codes)
//! - Step records (per-date measurements)
//!
//! Every read-modify-write runs inside `run_transaction`, which re-runs the
//! body with fresh reads when a concurrent commit touched the same documents.
//! Unique values (firebase UID, email, invite code) are claimed with
//! create-only marker documents in the same transaction.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Group, StepRecord, User};
use chrono::{DateTime, NaiveDate, Utc};
use firestore::errors::{BackoffError, FirestoreError};
use firestore::{FirestoreTransaction, FirestoreWritePrecondition};
use futures_util::{stream, FutureExt, StreamExt};
use serde::{Deserialize, Serialize};

const MAX_CONCURRENT_DB_OPS: usize = 20;

/// Result of a transaction body.
///
/// The outer error aborts the attempt (transient errors are retried). Domain
/// rejections are returned as `Ok(Err(_))` before any write is staged.
type TxResult<T> = Result<Result<T, AppError>, BackoffError<FirestoreError>>;

/// Stored format of `StepRecord::date`.
fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Marker document reserving a unique value for its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UniqueClaim {
    owner_id: String,
    claimed_at: DateTime<Utc>,
}

impl UniqueClaim {
    fn new(owner_id: &str, claimed_at: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            claimed_at,
        }
    }
}

/// Document ID for a claimed value (document IDs may not contain '/').
fn claim_id(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by a unique string field.
    async fn find_user_by(&self, field: &'static str, value: &str) -> Result<Option<User>, AppError> {
        let value = value.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field(field).eq(value.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.into_iter().next())
    }

    /// Find a user by their external authentication identifier.
    pub async fn find_user_by_firebase_uid(
        &self,
        firebase_uid: &str,
    ) -> Result<Option<User>, AppError> {
        self.find_user_by("firebaseUid", firebase_uid).await
    }

    /// Find a user by (lowercased) email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.find_user_by("email", &email.trim().to_lowercase()).await
    }

    /// Insert a new user, claiming its `firebaseUid` and `email`.
    ///
    /// Fails with `Conflict` if either value is already claimed, including
    /// by a request racing this one.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        self.get_client()?
            .run_transaction(|db, transaction| {
                create_user_tx(db, transaction, user.clone()).boxed()
            })
            .await
            .map_err(transaction_error)??;

        tracing::info!(user_id = %user.id, "User created");
        Ok(())
    }

    /// Soft-delete a user. Their claims are kept, so the account cannot be
    /// re-created under the same UID or email.
    pub async fn deactivate_user(&self, user_id: &str) -> Result<User, AppError> {
        let user_id = user_id.to_string();
        let now = Utc::now();

        let user = self
            .get_client()?
            .run_transaction(|db, transaction| {
                deactivate_user_tx(db, transaction, user_id.clone(), now).boxed()
            })
            .await
            .map_err(transaction_error)??;

        tracing::info!(user_id = %user.id, "User deactivated");
        Ok(user)
    }

    // ─── Group Operations ────────────────────────────────────────

    /// Get a group by ID.
    pub async fn get_group(&self, group_id: &str) -> Result<Option<Group>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::GROUPS)
            .obj()
            .one(group_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get several groups concurrently. Missing IDs are skipped.
    pub async fn get_groups(&self, group_ids: &[String]) -> Result<Vec<Group>, AppError> {
        let results = stream::iter(group_ids.to_vec())
            .map(|id| async move { self.get_group(&id).await })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<Group>, AppError>>>()
            .await;

        let mut groups = Vec::with_capacity(results.len());
        for result in results {
            if let Some(group) = result? {
                groups.push(group);
            }
        }
        Ok(groups)
    }

    /// Store a new group, claim its invite code and record the membership
    /// on the admin. Returns the updated admin.
    ///
    /// `Conflict` means the invite code was already taken.
    pub async fn create_group(&self, group: &Group) -> Result<User, AppError> {
        let admin = self
            .get_client()?
            .run_transaction(|db, transaction| {
                create_group_tx(db, transaction, group.clone()).boxed()
            })
            .await
            .map_err(transaction_error)??;

        tracing::debug!(
            group_id = %group.id,
            admin_id = %admin.id,
            "Group stored atomically"
        );
        Ok(admin)
    }

    /// Add a user to the active group holding `code`.
    ///
    /// Returns the group, the user, and whether anything changed.
    pub async fn join_group(
        &self,
        user_id: &str,
        code: &str,
    ) -> Result<(Group, User, bool), AppError> {
        let user_id = user_id.to_string();
        let code = code.to_string();
        let now = Utc::now();

        let (group, user, changed) = self
            .get_client()?
            .run_transaction(|db, transaction| {
                join_group_tx(db, transaction, user_id.clone(), code.clone(), now).boxed()
            })
            .await
            .map_err(transaction_error)??;

        tracing::debug!(
            group_id = %group.id,
            user_id = %user.id,
            members = group.members.len(),
            changed,
            "Membership saved atomically"
        );
        Ok((group, user, changed))
    }

    /// Remove a user from a group. A reference to a deactivated or missing
    /// group is pruned from the user instead.
    pub async fn leave_group(&self, user_id: &str, group_id: &str) -> Result<User, AppError> {
        let user_id = user_id.to_string();
        let group_id = group_id.to_string();
        let now = Utc::now();

        self.get_client()?
            .run_transaction(|db, transaction| {
                leave_group_tx(db, transaction, user_id.clone(), group_id.clone(), now).boxed()
            })
            .await
            .map_err(transaction_error)?
    }

    /// Swap a group's invite code for `new_code`, releasing the old one.
    /// Admin only. `Conflict` means `new_code` was already taken.
    pub async fn replace_invite_code(
        &self,
        admin_id: &str,
        group_id: &str,
        new_code: &str,
    ) -> Result<Group, AppError> {
        let admin_id = admin_id.to_string();
        let group_id = group_id.to_string();
        let new_code = new_code.to_string();
        let now = Utc::now();

        self.get_client()?
            .run_transaction(|db, transaction| {
                replace_invite_code_tx(
                    db,
                    transaction,
                    admin_id.clone(),
                    group_id.clone(),
                    new_code.clone(),
                    now,
                )
                .boxed()
            })
            .await
            .map_err(transaction_error)?
    }

    /// Soft-delete a group. Admin only.
    pub async fn deactivate_group(&self, admin_id: &str, group_id: &str) -> Result<Group, AppError> {
        let admin_id = admin_id.to_string();
        let group_id = group_id.to_string();
        let now = Utc::now();

        self.get_client()?
            .run_transaction(|db, transaction| {
                deactivate_group_tx(db, transaction, admin_id.clone(), group_id.clone(), now)
                    .boxed()
            })
            .await
            .map_err(transaction_error)?
    }

    // ─── Step Record Operations ──────────────────────────────────

    /// Get a step record by ID.
    pub async fn get_step_record(&self, record_id: &str) -> Result<Option<StepRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::STEP_RECORDS)
            .obj()
            .one(record_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all records for a user on one date, oldest first.
    pub async fn get_step_records(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<StepRecord>, AppError> {
        let user_id = user_id.to_string();
        let date = date_key(date);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::STEP_RECORDS)
            .filter(move |q| {
                q.for_all([
                    q.field("userId").eq(user_id.clone()),
                    q.field("date").eq(date.clone()),
                ])
            })
            .order_by([("timestamp", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all records for a user between two dates (inclusive), by date.
    pub async fn get_step_records_in_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<StepRecord>, AppError> {
        let user_id = user_id.to_string();
        let from = date_key(from);
        let to = date_key(to);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::STEP_RECORDS)
            .filter(move |q| {
                q.for_all([
                    q.field("userId").eq(user_id.clone()),
                    q.field("date").greater_than_or_equal(from.clone()),
                    q.field("date").less_than_or_equal(to.clone()),
                ])
            })
            .order_by([("date", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Atomic Step Submission ──────────────────────────────────

    /// Atomically store a step record and fold it into the owner's cumulative
    /// stats and into the totals of every active group they belong to.
    ///
    /// The user and the groups are read inside the transaction, so concurrent
    /// submissions or membership changes cause a retry instead of a lost update.
    /// Returns the updated user.
    pub async fn record_steps_atomic(&self, record: &StepRecord) -> Result<User, AppError> {
        let (user, groups) = self
            .get_client()?
            .run_transaction(|db, transaction| {
                record_steps_tx(db, transaction, record.clone()).boxed()
            })
            .await
            .map_err(transaction_error)??;

        tracing::info!(
            user_id = %user.id,
            record_id = %record.id,
            steps = record.steps,
            groups,
            level = ?user.user_level,
            "Step record stored atomically"
        );

        Ok(user)
    }
}

// ─── Transaction Helpers ─────────────────────────────────────────

/// Map a transaction failure to an application error. A failed create-only
/// precondition surfaces as a conflict.
fn transaction_error(err: FirestoreError) -> AppError {
    match err {
        FirestoreError::DataConflictError(_) => {
            AppError::Conflict("Value was claimed by a concurrent request".to_string())
        }
        FirestoreError::DatabaseError(ref db_err) if db_err.public.code == "FailedPrecondition" => {
            AppError::Conflict("Value was claimed by a concurrent request".to_string())
        }
        other => AppError::Database(format!("Transaction failed: {}", other)),
    }
}

/// Retry errors Firestore marks as retryable (contention, unavailability).
fn retryable(err: FirestoreError) -> BackoffError<FirestoreError> {
    let transient =
        matches!(&err, FirestoreError::DatabaseError(db_err) if db_err.retry_possible);
    if transient {
        BackoffError::transient(err)
    } else {
        BackoffError::permanent(err)
    }
}

/// Read a document through the transaction, registering it for conflict detection.
async fn read<T>(
    db: &firestore::FirestoreDb,
    collection: &str,
    id: &str,
) -> Result<Option<T>, BackoffError<FirestoreError>>
where
    T: Send + for<'de> Deserialize<'de>,
{
    db.fluent()
        .select()
        .by_id_in(collection)
        .obj()
        .one(id)
        .await
        .map_err(retryable)
}

/// Stage a full-document write.
fn stage<T>(
    db: &firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    collection: &str,
    id: &str,
    object: &T,
) -> Result<(), BackoffError<FirestoreError>>
where
    T: Serialize + Sync + Send + for<'de> Deserialize<'de>,
{
    db.fluent()
        .update()
        .in_col(collection)
        .document_id(id)
        .object(object)
        .add_to_transaction(transaction)
        .map_err(BackoffError::permanent)?;
    Ok(())
}

/// Stage a write that fails the commit if the document already exists.
fn stage_new<T>(
    db: &firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    collection: &str,
    id: &str,
    object: &T,
) -> Result<(), BackoffError<FirestoreError>>
where
    T: Serialize + Sync + Send + for<'de> Deserialize<'de>,
{
    db.fluent()
        .update()
        .in_col(collection)
        .precondition(FirestoreWritePrecondition::Exists(false))
        .document_id(id)
        .object(object)
        .add_to_transaction(transaction)
        .map_err(BackoffError::permanent)?;
    Ok(())
}

fn stage_delete(
    db: &firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    collection: &str,
    id: &str,
) -> Result<(), BackoffError<FirestoreError>> {
    db.fluent()
        .delete()
        .from(collection)
        .document_id(id)
        .add_to_transaction(transaction)
        .map_err(BackoffError::permanent)?;
    Ok(())
}

/// Read an active user, or the rejection to return.
async fn read_active_user(
    db: &firestore::FirestoreDb,
    user_id: &str,
) -> Result<Result<User, AppError>, BackoffError<FirestoreError>> {
    let user = read::<User>(db, collections::USERS, user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)));
    Ok(user)
}

/// Read an active group, or the rejection to return.
async fn read_active_group(
    db: &firestore::FirestoreDb,
    group_id: &str,
) -> Result<Result<Group, AppError>, BackoffError<FirestoreError>> {
    let group = read::<Group>(db, collections::GROUPS, group_id)
        .await?
        .filter(|g| g.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Group {} not found", group_id)));
    Ok(group)
}

// ─── Transaction Bodies ──────────────────────────────────────────

async fn create_user_tx(
    db: firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    user: User,
) -> TxResult<()> {
    let uid_key = claim_id(&user.firebase_uid);
    let email_key = claim_id(&user.email);

    if read::<UniqueClaim>(&db, collections::USER_UIDS, &uid_key)
        .await?
        .is_some()
    {
        return Ok(Err(AppError::Conflict(
            "A profile already exists for this account".to_string(),
        )));
    }
    if read::<UniqueClaim>(&db, collections::USER_EMAILS, &email_key)
        .await?
        .is_some()
    {
        return Ok(Err(AppError::Conflict(
            "Email is already registered".to_string(),
        )));
    }

    let claim = UniqueClaim::new(&user.id, user.created_at);
    stage_new(&db, transaction, collections::USER_UIDS, &uid_key, &claim)?;
    stage_new(&db, transaction, collections::USER_EMAILS, &email_key, &claim)?;
    stage_new(&db, transaction, collections::USERS, &user.id, &user)?;

    Ok(Ok(()))
}

async fn deactivate_user_tx(
    db: firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    user_id: String,
    now: DateTime<Utc>,
) -> TxResult<User> {
    let mut user = match read_active_user(&db, &user_id).await? {
        Ok(user) => user,
        Err(e) => return Ok(Err(e)),
    };

    user.deactivate(now);
    stage(&db, transaction, collections::USERS, &user.id, &user)?;

    Ok(Ok(user))
}

async fn create_group_tx(
    db: firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    group: Group,
) -> TxResult<User> {
    let mut admin = match read_active_user(&db, &group.admin_id).await? {
        Ok(user) => user,
        Err(e) => return Ok(Err(e)),
    };

    if let Some(code) = group.invite_code.as_deref() {
        if read::<UniqueClaim>(&db, collections::INVITE_CODES, code)
            .await?
            .is_some()
        {
            return Ok(Err(AppError::Conflict(
                "Invite code already in use".to_string(),
            )));
        }
        let claim = UniqueClaim::new(&group.id, group.created_at);
        stage_new(&db, transaction, collections::INVITE_CODES, code, &claim)?;
    }

    admin.join_group(&group.id, group.created_at);
    stage_new(&db, transaction, collections::GROUPS, &group.id, &group)?;
    stage(&db, transaction, collections::USERS, &admin.id, &admin)?;

    Ok(Ok(admin))
}

async fn join_group_tx(
    db: firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    user_id: String,
    code: String,
    now: DateTime<Utc>,
) -> TxResult<(Group, User, bool)> {
    let not_found = || AppError::NotFound("No active group for this invite code".to_string());

    let Some(claim) = read::<UniqueClaim>(&db, collections::INVITE_CODES, &code).await? else {
        return Ok(Err(not_found()));
    };
    let mut group = match read_active_group(&db, &claim.owner_id).await? {
        Ok(group) if group.invite_code.as_deref() == Some(code.as_str()) => group,
        _ => return Ok(Err(not_found())),
    };
    let mut user = match read_active_user(&db, &user_id).await? {
        Ok(user) => user,
        Err(e) => return Ok(Err(e)),
    };

    let added_to_group = group.add_member(&user.id, now);
    let added_to_user = user.join_group(&group.id, now);
    if !added_to_group && !added_to_user {
        return Ok(Ok((group, user, false)));
    }

    stage(&db, transaction, collections::GROUPS, &group.id, &group)?;
    stage(&db, transaction, collections::USERS, &user.id, &user)?;

    Ok(Ok((group, user, true)))
}

async fn leave_group_tx(
    db: firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    user_id: String,
    group_id: String,
    now: DateTime<Utc>,
) -> TxResult<User> {
    let mut user = match read_active_user(&db, &user_id).await? {
        Ok(user) => user,
        Err(e) => return Ok(Err(e)),
    };

    let mut group = match read_active_group(&db, &group_id).await? {
        Ok(group) => group,
        Err(e) => {
            // Inactive or missing group: only the stale reference goes.
            if user.leave_group(&group_id, now) {
                stage(&db, transaction, collections::USERS, &user.id, &user)?;
                return Ok(Ok(user));
            }
            return Ok(Err(e));
        }
    };

    if let Err(e) = group.remove_member(&user.id, now) {
        return Ok(Err(e));
    }
    user.leave_group(&group.id, now);

    stage(&db, transaction, collections::GROUPS, &group.id, &group)?;
    stage(&db, transaction, collections::USERS, &user.id, &user)?;

    Ok(Ok(user))
}

async fn replace_invite_code_tx(
    db: firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    admin_id: String,
    group_id: String,
    new_code: String,
    now: DateTime<Utc>,
) -> TxResult<Group> {
    let mut group = match read_active_group(&db, &group_id).await? {
        Ok(group) => group,
        Err(e) => return Ok(Err(e)),
    };
    if let Err(e) = group.ensure_admin(&admin_id) {
        return Ok(Err(e));
    }
    if read::<UniqueClaim>(&db, collections::INVITE_CODES, &new_code)
        .await?
        .is_some()
    {
        return Ok(Err(AppError::Conflict(
            "Invite code already in use".to_string(),
        )));
    }

    if let Some(old_code) = group.invite_code.replace(new_code.clone()) {
        stage_delete(&db, transaction, collections::INVITE_CODES, &old_code)?;
    }
    group.updated_at = now;

    let claim = UniqueClaim::new(&group.id, now);
    stage_new(&db, transaction, collections::INVITE_CODES, &new_code, &claim)?;
    stage(&db, transaction, collections::GROUPS, &group.id, &group)?;

    Ok(Ok(group))
}

async fn deactivate_group_tx(
    db: firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    admin_id: String,
    group_id: String,
    now: DateTime<Utc>,
) -> TxResult<Group> {
    let mut group = match read_active_group(&db, &group_id).await? {
        Ok(group) => group,
        Err(e) => return Ok(Err(e)),
    };
    if let Err(e) = group.ensure_admin(&admin_id) {
        return Ok(Err(e));
    }

    group.deactivate(now);
    stage(&db, transaction, collections::GROUPS, &group.id, &group)?;

    Ok(Ok(group))
}

/// Returns the updated user and how many group totals were bumped.
async fn record_steps_tx(
    db: firestore::FirestoreDb,
    transaction: &mut FirestoreTransaction<'_>,
    record: StepRecord,
) -> TxResult<(User, usize)> {
    let now = record.timestamp;

    let mut user = match read::<User>(&db, collections::USERS, &record.user_id).await? {
        Some(user) if user.is_active => user,
        Some(_) => {
            return Ok(Err(AppError::Forbidden(
                "Account is deactivated".to_string(),
            )))
        }
        None => {
            return Ok(Err(AppError::NotFound(format!(
                "User {} not found",
                record.user_id
            ))))
        }
    };

    let mut groups = Vec::with_capacity(user.group_ids.len());
    for group_id in &user.group_ids {
        if let Some(group) = read::<Group>(&db, collections::GROUPS, group_id).await? {
            if group.is_active && group.is_member(&user.id) {
                groups.push(group);
            }
        }
    }

    // 1. The record itself
    stage_new(&db, transaction, collections::STEP_RECORDS, &record.id, &record)?;

    // 2. Cumulative stats and level
    user.apply_step_record(&record, now);
    stage(&db, transaction, collections::USERS, &user.id, &user)?;

    // 3. Group totals
    for group in &mut groups {
        group.add_steps(record.steps, now);
        stage(&db, transaction, collections::GROUPS, &group.id, &*group)?;
    }

    Ok(Ok((user, groups.len())))
}
