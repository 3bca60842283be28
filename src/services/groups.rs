// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Group lifecycle: creation, invite-code redemption, leaving, admin actions.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::group::{generate_invite_code, is_valid_invite_code};
use crate::models::{Group, NewGroup, User};
use chrono::Utc;
use validator::Validate;

/// Collisions in a 36^8 space are rare; a handful of retries is plenty.
const MAX_INVITE_CODE_ATTEMPTS: usize = 5;

/// Normalize a user-supplied invite code and check its shape.
pub fn normalize_invite_code(raw: &str) -> Result<String> {
    let code = raw.trim().to_ascii_uppercase();
    if !is_valid_invite_code(&code) {
        return Err(AppError::BadRequest(
            "Invite code must be 8 letters or digits".to_string(),
        ));
    }
    Ok(code)
}

#[derive(Clone)]
pub struct GroupService {
    db: FirestoreDb,
}

impl GroupService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Create a group with `admin` as admin and first member.
    ///
    /// A fresh invite code is drawn whenever the previous one turns out to be
    /// taken.
    pub async fn create(&self, admin: &User, fields: NewGroup) -> Result<(Group, User)> {
        let fields = fields.normalized();
        fields.validate()?;

        let mut group = Group::new(fields, &admin.id, Utc::now());

        for attempt in 1..=MAX_INVITE_CODE_ATTEMPTS {
            group.generate_invite_code();
            match self.db.create_group(&group).await {
                Ok(admin) => {
                    tracing::info!(
                        group_id = %group.id,
                        admin_id = %admin.id,
                        group_type = ?group.group_type,
                        "Group created"
                    );
                    return Ok((group, admin));
                }
                Err(AppError::Conflict(_)) => {
                    tracing::warn!(attempt, "Invite code collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(invite_code_exhausted())
    }

    /// Redeem an invite code. Joining a group twice is a no-op.
    pub async fn join_by_code(&self, user: &User, code: &str) -> Result<(Group, User)> {
        let code = normalize_invite_code(code)?;

        let (group, user, changed) = self.db.join_group(&user.id, &code).await?;

        if changed {
            tracing::info!(
                group_id = %group.id,
                user_id = %user.id,
                members = group.members.len(),
                "User joined group"
            );
        } else {
            tracing::debug!(group_id = %group.id, user_id = %user.id, "Already a member");
        }

        Ok((group, user))
    }

    /// Leave a group. The admin must delete the group instead.
    pub async fn leave(&self, user: &User, group_id: &str) -> Result<User> {
        let user = self.db.leave_group(&user.id, group_id).await?;

        tracing::info!(group_id, user_id = %user.id, "User left group");

        Ok(user)
    }

    /// Replace the invite code. Admin only.
    pub async fn regenerate_invite_code(&self, user: &User, group_id: &str) -> Result<Group> {
        for attempt in 1..=MAX_INVITE_CODE_ATTEMPTS {
            let code = generate_invite_code();
            match self.db.replace_invite_code(&user.id, group_id, &code).await {
                Ok(group) => {
                    tracing::info!(group_id = %group.id, "Invite code regenerated");
                    return Ok(group);
                }
                Err(AppError::Conflict(_)) => {
                    tracing::warn!(attempt, "Invite code collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(invite_code_exhausted())
    }

    /// Soft-delete a group. Admin only.
    pub async fn deactivate(&self, user: &User, group_id: &str) -> Result<()> {
        let group = self.db.deactivate_group(&user.id, group_id).await?;

        tracing::info!(group_id = %group.id, "Group deactivated");
        Ok(())
    }

    /// Active groups the user belongs to.
    pub async fn list_for_user(&self, user: &User) -> Result<Vec<Group>> {
        let mut groups = self.db.get_groups(&user.group_ids).await?;
        groups.retain(|g| g.is_active && g.is_member(&user.id));
        Ok(groups)
    }
}

fn invite_code_exhausted() -> AppError {
    AppError::Internal(anyhow::anyhow!(
        "Could not find an unused invite code after {} attempts",
        MAX_INVITE_CODE_ATTEMPTS
    ))
}
