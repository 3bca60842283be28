// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Group model, membership rules and invite codes.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::error::AppError;

/// Symbols an invite code is drawn from.
pub const INVITE_CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const INVITE_CODE_LEN: usize = 8;

/// Generate an invite code using the thread-local RNG.
///
/// Uniqueness is enforced at the storage layer, so callers retry on collision.
pub fn generate_invite_code() -> String {
    generate_invite_code_with(&mut rand::rng())
}

/// Generate an invite code from the given RNG.
pub fn generate_invite_code_with<R: Rng>(rng: &mut R) -> String {
    (0..INVITE_CODE_LEN)
        .map(|_| {
            let index = rng.random_range(0..INVITE_CODE_ALPHABET.len());
            char::from(INVITE_CODE_ALPHABET[index])
        })
        .collect()
}

/// Check the shape of a user-supplied invite code.
pub fn is_valid_invite_code(code: &str) -> bool {
    code.len() == INVITE_CODE_LEN && code.bytes().all(|b| INVITE_CODE_ALPHABET.contains(&b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum GroupType {
    Friends,
    Community,
    Institution,
}

/// Membership entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub user_id: String,
    pub joined_at: DateTime<Utc>,
}

/// Group stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Generated ID (also used as document ID)
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(rename = "type")]
    pub group_type: GroupType,
    pub admin_id: String,
    #[serde(default)]
    pub members: Vec<GroupMember>,
    #[serde(default)]
    pub total_steps: u64,
    /// Globally unique when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// Fields supplied when creating a group.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(url)]
    pub logo_url: Option<String>,
    #[serde(rename = "type")]
    pub group_type: GroupType,
}

impl NewGroup {
    /// Trim text fields; blank optional fields become `None`.
    pub fn normalized(self) -> Self {
        let trim_opt = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            name: self.name.trim().to_string(),
            description: trim_opt(self.description),
            logo_url: trim_opt(self.logo_url),
            group_type: self.group_type,
        }
    }
}

impl Group {
    /// Create a group. The creator becomes admin and first member.
    pub fn new(fields: NewGroup, admin_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: fields.name,
            description: fields.description,
            logo_url: fields.logo_url,
            group_type: fields.group_type,
            admin_id: admin_id.to_string(),
            members: vec![GroupMember {
                user_id: admin_id.to_string(),
                joined_at: now,
            }],
            total_steps: 0,
            invite_code: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the invite code with a fresh one and return it.
    pub fn generate_invite_code(&mut self) -> String {
        let code = generate_invite_code();
        self.invite_code = Some(code.clone());
        code
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_id == user_id
    }

    /// Reject anyone but the admin.
    pub fn ensure_admin(&self, user_id: &str) -> Result<(), AppError> {
        if self.is_admin(user_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only the group admin can do this".to_string(),
            ))
        }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }

    /// Add a member. Returns `false` if the user already belongs to the group.
    pub fn add_member(&mut self, user_id: &str, now: DateTime<Utc>) -> bool {
        if self.is_member(user_id) {
            return false;
        }
        self.members.push(GroupMember {
            user_id: user_id.to_string(),
            joined_at: now,
        });
        self.updated_at = now;
        true
    }

    /// Remove a member. The admin cannot leave their own group.
    pub fn remove_member(&mut self, user_id: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.is_admin(user_id) {
            return Err(AppError::Forbidden(
                "The group admin cannot leave the group".to_string(),
            ));
        }
        if !self.is_member(user_id) {
            return Err(AppError::NotFound(format!(
                "User {} is not a member of group {}",
                user_id, self.id
            )));
        }
        self.members.retain(|m| m.user_id != user_id);
        self.updated_at = now;
        Ok(())
    }

    pub fn add_steps(&mut self, steps: u64, now: DateTime<Utc>) {
        self.total_steps = self.total_steps.saturating_add(steps);
        self.updated_at = now;
    }

    /// Soft delete.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }
}
