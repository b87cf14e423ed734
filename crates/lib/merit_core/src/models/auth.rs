//! Authentication and authorization domain models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of roles known to the system.
///
/// Persisted role rows map to these variants by name; handler and service
/// code compares variants, never raw role identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Advisor,
    Admin,
}

impl Role {
    /// Resolve a persisted role name to a variant.
    pub fn from_name(name: &str) -> Option<Role> {
        match name {
            "student" => Some(Role::Student),
            "advisor" => Some(Role::Advisor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Advisor => "advisor",
            Role::Admin => "admin",
        }
    }

    /// Advisors and admins may operate on achievements across owners.
    pub fn is_privileged(&self) -> bool {
        !matches!(self, Role::Student)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission names carried in tokens and checked by the access gate.
///
/// Permission names are not secrets; rejection messages may name them.
pub mod perms {
    pub const VIEW_ALL: &str = "view_all";
    pub const CREATE_ACHIEVEMENT: &str = "create_achievement";
    pub const UPDATE_ACHIEVEMENT: &str = "update_achievement";
    pub const DELETE_ACHIEVEMENT: &str = "delete_achievement";
    pub const VERIFY_ACHIEVEMENT: &str = "verify_achievement";
    pub const MANAGE_USERS: &str = "manage_users";
    pub const MANAGE_ROLES: &str = "manage_roles";
}

/// JWT claims embedded in access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — user ID (standard JWT `sub` claim).
    pub sub: Uuid,
    /// Role name (e.g. `"student"`).
    pub role: String,
    /// Permission names granted at issuance. Empty for refresh tokens.
    pub permissions: Vec<String>,
    /// Token class: `"access"` or `"refresh"`.
    pub token_use: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

impl TokenClaims {
    /// Resolve the role claim to a known variant.
    pub fn role(&self) -> Option<Role> {
        Role::from_name(&self.role)
    }
}

/// User row joined with its role name, as loaded for login and lookups.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub password_hash: Option<String>,
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_name_roundtrip() {
        for role in [Role::Student, Role::Advisor, Role::Admin] {
            assert_eq!(Role::from_name(role.as_str()), Some(role));
        }
    }

    #[test]
    fn unknown_role_name_is_rejected() {
        assert_eq!(Role::from_name("f464ceb1-5481-49cf-99f0-d8f2d66f4506"), None);
        assert_eq!(Role::from_name(""), None);
    }

    #[test]
    fn only_students_are_unprivileged() {
        assert!(!Role::Student.is_privileged());
        assert!(Role::Advisor.is_privileged());
        assert!(Role::Admin.is_privileged());
    }
}
