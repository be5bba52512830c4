//! Capability checks.
//!
//! Every component (controller, each oracle, the registry, the in-memory
//! ledger) is constructed with its own role set. Roles are granted and
//! revoked by a holder of [`Role::SuperAdmin`]; components only ever ask
//! [`AccessControl::has_role`].

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// ROLES
// ═══════════════════════════════════════════════════════════════════════════════

/// Capabilities recognised by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Grants and revokes every other role
    SuperAdmin,
    /// Configuration, pausing, oracle migration, issuer management
    Admin,
    /// Emergency withdrawals
    Emergency,
    /// Allowed to mint/burn on a ledger or account on a registry
    Controller,
}

impl Role {
    /// Role name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "Admin",
            Role::Emergency => "Emergency",
            Role::Controller => "Controller",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCESS CONTROL
// ═══════════════════════════════════════════════════════════════════════════════

/// Single authorization function injected into components
pub trait AccessControl: Send + Sync {
    /// Whether `account` holds `role`
    fn has_role(&self, account: &Address, role: Role) -> bool;

    /// Fail with `Unauthorized` unless `account` holds `role`
    fn require_role(&self, account: &Address, role: Role) -> Result<()> {
        if self.has_role(account, role) {
            Ok(())
        } else {
            Err(Error::Unauthorized(format!(
                "{} lacks {} role",
                account.short(),
                role
            )))
        }
    }
}

/// In-process role registry
#[derive(Debug)]
pub struct RoleRegistry {
    members: RwLock<HashMap<Role, HashSet<Address>>>,
}

impl RoleRegistry {
    /// Create a registry whose only member is `super_admin`
    pub fn new(super_admin: Address) -> Self {
        let mut members: HashMap<Role, HashSet<Address>> = HashMap::new();
        members.entry(Role::SuperAdmin).or_default().insert(super_admin);
        Self {
            members: RwLock::new(members),
        }
    }

    /// Create a registry where `admin` holds SuperAdmin, Admin and Emergency
    pub fn with_admin(admin: Address) -> Self {
        let registry = Self::new(admin);
        {
            let mut members = registry.members.write().unwrap_or_else(|e| e.into_inner());
            members.entry(Role::Admin).or_default().insert(admin);
            members.entry(Role::Emergency).or_default().insert(admin);
        }
        registry
    }

    /// Grant `role` to `account`; `granter` must hold SuperAdmin
    pub fn grant_role(&self, granter: &Address, role: Role, account: Address) -> Result<()> {
        self.require_role(granter, Role::SuperAdmin)?;
        if account.is_zero() {
            return Err(Error::InvalidParameter {
                name: "account".into(),
                reason: "cannot grant a role to the zero address".into(),
            });
        }
        let mut members = self.members.write().unwrap_or_else(|e| e.into_inner());
        if members.entry(role).or_default().insert(account) {
            tracing::info!(role = %role, account = %account.short(), "role granted");
        }
        Ok(())
    }

    /// Revoke `role` from `account`; `revoker` must hold SuperAdmin.
    /// The last SuperAdmin cannot be revoked.
    pub fn revoke_role(&self, revoker: &Address, role: Role, account: &Address) -> Result<()> {
        self.require_role(revoker, Role::SuperAdmin)?;
        let mut members = self.members.write().unwrap_or_else(|e| e.into_inner());
        let set = members.entry(role).or_default();
        if role == Role::SuperAdmin && set.len() == 1 && set.contains(account) {
            return Err(Error::InvalidParameter {
                name: "account".into(),
                reason: "cannot revoke the last SuperAdmin".into(),
            });
        }
        if set.remove(account) {
            tracing::info!(role = %role, account = %account.short(), "role revoked");
        }
        Ok(())
    }

    /// Members of a role
    pub fn members(&self, role: Role) -> Vec<Address> {
        let members = self.members.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<_> = members
            .get(&role)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        list.sort();
        list
    }
}

impl AccessControl for RoleRegistry {
    fn has_role(&self, account: &Address, role: Role) -> bool {
        self.members
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&role)
            .map(|s| s.contains(account))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_super_admin_grants_and_revokes() {
        let root = Address::from_label("root");
        let ops = Address::from_label("ops");
        let roles = RoleRegistry::new(root);

        assert!(!roles.has_role(&ops, Role::Admin));
        roles.grant_role(&root, Role::Admin, ops).unwrap();
        assert!(roles.has_role(&ops, Role::Admin));

        roles.revoke_role(&root, Role::Admin, &ops).unwrap();
        assert!(!roles.has_role(&ops, Role::Admin));
    }

    #[test]
    fn test_non_super_admin_cannot_grant() {
        let root = Address::from_label("root");
        let ops = Address::from_label("ops");
        let roles = RoleRegistry::new(root);
        roles.grant_role(&root, Role::Admin, ops).unwrap();

        let result = roles.grant_role(&ops, Role::Emergency, ops);
        assert!(matches!(result, Err(Error::Unauthorized(_))));
    }

    #[test]
    fn test_last_super_admin_kept() {
        let root = Address::from_label("root");
        let roles = RoleRegistry::new(root);
        assert!(roles.revoke_role(&root, Role::SuperAdmin, &root).is_err());
        assert_eq!(roles.members(Role::SuperAdmin), vec![root]);
    }

    #[test]
    fn test_with_admin() {
        let admin = Address::from_label("admin");
        let roles = RoleRegistry::with_admin(admin);
        assert!(roles.has_role(&admin, Role::Admin));
        assert!(roles.has_role(&admin, Role::Emergency));
        assert!(!roles.has_role(&admin, Role::Controller));
        assert!(roles.require_role(&admin, Role::Controller).is_err());
    }
}
