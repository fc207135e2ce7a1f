//! Group registry: creation, password joins, membership and ownership
//! changes, and the delete cascade.
//!
//! Groups are always addressed by id; the display name is not a key and
//! carries no uniqueness. Deleting a group removes its tasks one by one,
//! best effort, before the group document itself; a failed task delete is
//! logged and the cascade continues (no compensating transaction).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tandem_types::{Group, GroupId, MIN_GROUP_PASSWORD_LENGTH, UserId};
use tracing::{debug, warn};

use crate::Error;
use crate::store::{
    DocumentStore, Fields, Filter, StoreError, collections, from_document, to_fields,
};

/// Service for group lifecycle operations, generic over the store backend.
pub struct GroupService<S> {
    store: Arc<S>,
}

impl<S> Clone for GroupService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value)
        .map_err(|e| Error::Store(StoreError::Codec(e.to_string())))
}

impl<S: DocumentStore> GroupService<S> {
    /// Creates a group service over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates a group with the creator as owner and sole member.
    ///
    /// # Errors
    ///
    /// `Validation` on an empty trimmed name or a password shorter than
    /// [`MIN_GROUP_PASSWORD_LENGTH`]; store failures propagate.
    pub async fn create_group(
        &self,
        name: &str,
        password: &str,
        owner: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Group, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("group name is empty"));
        }
        if password.chars().count() < MIN_GROUP_PASSWORD_LENGTH {
            return Err(Error::validation("group password too short"));
        }
        let group = Group::new(name, password, owner.clone(), now);
        self.store
            .set(collections::GROUPS, &group.id.to_string(), to_fields(&group)?)
            .await?;
        debug!(group = %group.id, owner = %owner, "created group");
        Ok(group)
    }

    /// Looks up a group by id.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent; store failures propagate.
    pub async fn fetch_group(&self, group_id: GroupId) -> Result<Group, Error> {
        let doc = self
            .store
            .get(collections::GROUPS, &group_id.to_string())
            .await?
            .ok_or_else(|| Error::not_found("group", group_id))?;
        Ok(from_document(&doc)?)
    }

    /// Joins a group after checking the shared password. Joining a group
    /// one is already in is a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown group, `Forbidden` on password mismatch;
    /// store failures propagate.
    pub async fn join_group(
        &self,
        group_id: GroupId,
        password: &str,
        user: &UserId,
    ) -> Result<Group, Error> {
        let mut group = self.fetch_group(group_id).await?;
        if group.password != password {
            return Err(Error::forbidden("wrong group password"));
        }
        if group.member_ids.insert(user.clone()) {
            self.write_members(&group).await?;
            debug!(group = %group.id, user = %user, "joined group");
        }
        Ok(group)
    }

    /// Removes a member from the group. Owner-only; the owner themself
    /// cannot be removed.
    ///
    /// # Errors
    ///
    /// `Forbidden` when `acting` is not the owner, `Validation` when the
    /// target is the owner; store failures propagate.
    pub async fn remove_member(
        &self,
        group_id: GroupId,
        acting: &UserId,
        target: &UserId,
    ) -> Result<Group, Error> {
        let mut group = self.fetch_group(group_id).await?;
        if !group.is_owner(acting) {
            return Err(Error::forbidden("only the owner can remove members"));
        }
        if group.is_owner(target) {
            return Err(Error::validation("the owner cannot be removed, transfer ownership first"));
        }
        if group.member_ids.remove(target) {
            self.write_members(&group).await?;
            debug!(group = %group.id, user = %target, "removed member");
        }
        Ok(group)
    }

    /// Hands ownership to another existing member. The old owner stays a
    /// plain member.
    ///
    /// # Errors
    ///
    /// `Forbidden` when `acting` is not the owner, `Validation` when the
    /// new owner is not a member; store failures propagate.
    pub async fn transfer_ownership(
        &self,
        group_id: GroupId,
        acting: &UserId,
        new_owner: &UserId,
    ) -> Result<Group, Error> {
        let mut group = self.fetch_group(group_id).await?;
        if !group.is_owner(acting) {
            return Err(Error::forbidden("only the owner can transfer ownership"));
        }
        if !group.is_member(new_owner) {
            return Err(Error::validation("new owner must already be a member"));
        }
        group.owner_id = new_owner.clone();
        let mut fields = Fields::new();
        fields.insert("ownerId".to_string(), Value::from(new_owner.as_str()));
        self.store
            .update(collections::GROUPS, &group.id.to_string(), fields)
            .await?;
        debug!(group = %group.id, new_owner = %new_owner, "transferred ownership");
        Ok(group)
    }

    /// Leaves the group. The owner must transfer ownership first; there
    /// is no automatic promotion.
    ///
    /// # Errors
    ///
    /// `Forbidden` when the leaving user is the owner; store failures
    /// propagate.
    pub async fn leave_group(&self, group_id: GroupId, user: &UserId) -> Result<Group, Error> {
        let mut group = self.fetch_group(group_id).await?;
        if group.is_owner(user) {
            return Err(Error::forbidden("transfer ownership before leaving"));
        }
        if group.member_ids.remove(user) {
            self.write_members(&group).await?;
            debug!(group = %group.id, user = %user, "left group");
        }
        Ok(group)
    }

    /// Deletes the group and, best effort, every task scoped to it.
    ///
    /// Task deletes that fail are logged and skipped; already-deleted
    /// tasks stay deleted if a later step fails.
    ///
    /// # Errors
    ///
    /// `Forbidden` when `acting` is not the owner; a failure to delete
    /// the group document itself propagates.
    pub async fn delete_group(&self, group_id: GroupId, acting: &UserId) -> Result<(), Error> {
        let group = self.fetch_group(group_id).await?;
        if !group.is_owner(acting) {
            return Err(Error::forbidden("only the owner can delete the group"));
        }

        let tasks = self
            .store
            .query(
                collections::TASKS,
                &[Filter::eq("groupId", group_id.to_string())],
                None,
            )
            .await?;
        for doc in tasks {
            if let Err(e) = self.store.delete(collections::TASKS, &doc.id).await {
                warn!(group = %group_id, task = %doc.id, error = %e, "cascade task delete failed");
            }
        }

        self.store
            .delete(collections::GROUPS, &group_id.to_string())
            .await?;
        debug!(group = %group_id, "deleted group");
        Ok(())
    }

    /// Every group the user is a member of, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates store query failures.
    pub async fn groups_for_user(&self, user: &UserId) -> Result<Vec<Group>, Error> {
        let docs = self
            .store
            .query(
                collections::GROUPS,
                &[Filter::contains("memberIds", user.as_str())],
                None,
            )
            .await?;
        let mut groups: Vec<Group> = docs
            .iter()
            .filter_map(|doc| match from_document::<Group>(doc) {
                Ok(group) => Some(group),
                Err(e) => {
                    warn!(doc = %doc.id, error = %e, "skipping undecodable group document");
                    None
                }
            })
            .collect();
        groups.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn write_members(&self, group: &Group) -> Result<(), Error> {
        let mut fields = Fields::new();
        fields.insert("memberIds".to_string(), encode(&group.member_ids)?);
        self.store
            .update(collections::GROUPS, &group.id.to_string(), fields)
            .await?;
        Ok(())
    }
}
