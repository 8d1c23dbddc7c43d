use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RouterError};

/// Capabilities the host grants to callers. The core never decides who holds
/// them; `YieldRouter` only checks that the caller presents the right one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Registry, policy, model and strategy administration.
    Admin,
    /// Scheduler that triggers harvest and rebalance.
    Keeper,
    /// Pushes market snapshots, model accuracy and APY estimates.
    Oracle,
}

/// An authenticated caller as seen by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    pub roles: BTreeSet<Role>,
}

impl Caller {
    /// Plain depositor with no privileged capability.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_roles(id: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            id: id.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::with_roles(id, [Role::Admin])
    }

    pub fn keeper(id: impl Into<String>) -> Self {
        Self::with_roles(id, [Role::Keeper])
    }

    pub fn oracle(id: impl Into<String>) -> Self {
        Self::with_roles(id, [Role::Oracle])
    }

    pub fn has(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn require(&self, role: Role) -> Result<()> {
        if self.has(role) {
            Ok(())
        } else {
            Err(RouterError::Unauthorized {
                caller: self.id.clone(),
                required: role,
            })
        }
    }

    /// Acting on `account` is allowed for the account owner or an admin.
    pub fn require_self_or_admin(&self, account: &str) -> Result<()> {
        if self.id == account {
            Ok(())
        } else {
            self.require(Role::Admin)
        }
    }
}
