//! Group entity: a shared task scope with one owner and a join password.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, UserId};

/// Minimum length of a group's shared join secret.
pub const MIN_GROUP_PASSWORD_LENGTH: usize = 4;

/// A group of users sharing a set of tasks.
///
/// Exactly one member is the owner at any time, and the owner is always a
/// member. Field names serialize in the stored document format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Unique group identifier (UUID v7, time-ordered).
    pub id: GroupId,
    /// Human-readable group name. Not unique; never used as a key.
    pub name: String,
    /// The single current admin. Always present in `member_ids`.
    pub owner_id: UserId,
    /// All members, owner included.
    pub member_ids: BTreeSet<UserId>,
    /// Shared join secret, checked on join.
    pub password: String,
    /// Immutable creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Creates a group with the creator as owner and sole member.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        password: impl Into<String>,
        owner_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut member_ids = BTreeSet::new();
        member_ids.insert(owner_id.clone());
        Self {
            id: GroupId::new(),
            name: name.into(),
            owner_id,
            member_ids,
            password: password.into(),
            created_at,
        }
    }

    /// Whether the given user is the current owner.
    #[must_use]
    pub fn is_owner(&self, user: &UserId) -> bool {
        self.owner_id == *user
    }

    /// Whether the given user is a member (the owner always is).
    #[must_use]
    pub fn is_member(&self, user: &UserId) -> bool {
        self.member_ids.contains(user)
    }
}
