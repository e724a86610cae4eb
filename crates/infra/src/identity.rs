//! Identity lookup used to attribute predictions to agents.
//!
//! Account management lives elsewhere; this module only answers "who has
//! this email and role?" and "how many approved users are there?".

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use alutrack_core::{Entity, UserId};

use crate::store::{AgentRef, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    /// Field operator submitting predictions.
    Agent,
    /// Team that processes by-product batches.
    ScrapTeam,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Agent, Role::ScrapTeam];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Agent => "agent",
            Role::ScrapTeam => "scrap_team",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Only approved accounts are counted in [`UserCounts`].
    pub approved: bool,
}

impl Identity {
    pub fn agent_ref(&self) -> AgentRef {
        AgentRef {
            user_id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl Entity for Identity {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Approved users, overall and per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounts {
    pub total: usize,
    /// Every role appears, with zero when it has no approved users.
    pub by_role: BTreeMap<Role, usize>,
}

impl Default for UserCounts {
    fn default() -> Self {
        Self {
            total: 0,
            by_role: Role::ALL.into_iter().map(|r| (r, 0)).collect(),
        }
    }
}

pub trait IdentityDirectory: Send + Sync {
    /// User with exactly this email and role, approved or not.
    fn find_by_email(&self, email: &str, role: Role) -> Result<Option<Identity>, StoreError>;

    fn approved_counts(&self) -> Result<UserCounts, StoreError>;
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryIdentityDirectory {
    users: RwLock<HashMap<UserId, Identity>>,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user.
    pub fn insert(&self, identity: Identity) -> Result<(), StoreError> {
        let mut users = self.users.write().map_err(|_| StoreError::poisoned())?;
        users.insert(identity.id, identity);
        Ok(())
    }
}

impl IdentityDirectory for InMemoryIdentityDirectory {
    fn find_by_email(&self, email: &str, role: Role) -> Result<Option<Identity>, StoreError> {
        if email.is_empty() {
            return Ok(None);
        }

        let users = self.users.read().map_err(|_| StoreError::poisoned())?;
        Ok(users
            .values()
            .find(|u| u.role == role && u.email == email)
            .cloned())
    }

    fn approved_counts(&self) -> Result<UserCounts, StoreError> {
        let users = self.users.read().map_err(|_| StoreError::poisoned())?;
        let mut counts = UserCounts::default();
        for user in users.values().filter(|u| u.approved) {
            counts.total += 1;
            *counts.by_role.entry(user.role).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
