//! User domain model.
//!
//! # Invariants
//! - `roles` holds no two entries with the same id and keeps first-seen order.
//! - The password credential is write-only and never part of this shape.

use crate::model::role::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// Canonical user read model with its role memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub email_hold: bool,
    pub altmail: String,
    pub altmail_hold: bool,
    pub full_name: String,
    pub avatar: String,
    pub roles: Vec<Role>,
    /// Unix epoch milliseconds.
    pub last_login: Option<i64>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    /// Soft-delete tombstone.
    pub deleted_at: Option<i64>,
    pub blocked_at: Option<i64>,
}

impl User {
    /// Returns whether the user has not been soft-deleted.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn role_ids(&self) -> Vec<Uuid> {
        self.roles.iter().map(|role| role.id).collect()
    }
}
