use std::fmt;

use serde::{Deserialize, Serialize};
use sf_schemas::Role;

/// What a signed-in user may do. Derived once from their `user_roles` rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub admin: bool,
    pub supplier: bool,
    pub finance: bool,
    pub user: bool,
}

impl Capabilities {
    /// A user with no role rows is a plain customer.
    pub fn from_roles(roles: &[Role]) -> Self {
        let mut caps = Capabilities::default();
        for r in roles {
            match r {
                Role::Admin => caps.admin = true,
                Role::Supplier => caps.supplier = true,
                Role::Finance => caps.finance = true,
                Role::User => caps.user = true,
            }
        }
        if roles.is_empty() {
            caps.user = true;
        }
        caps
    }

    pub fn has(&self, role: Role) -> bool {
        match role {
            Role::Admin => self.admin,
            Role::Supplier => self.supplier,
            Role::Finance => self.finance,
            Role::User => self.user,
        }
    }

    pub fn require(&self, role: Role) -> Result<(), AccessDenied> {
        if self.has(role) {
            Ok(())
        } else {
            Err(AccessDenied { required: role })
        }
    }
}

/// The caller lacks the capability an operation is gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDenied {
    pub required: Role,
}

impl fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} capability required", self.required)
    }
}

impl std::error::Error for AccessDenied {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_roles_means_plain_user() {
        let caps = Capabilities::from_roles(&[]);
        assert!(caps.user);
        assert!(!caps.admin && !caps.supplier && !caps.finance);
    }

    #[test]
    fn roles_accumulate() {
        let caps = Capabilities::from_roles(&[Role::Supplier, Role::Finance]);
        assert!(caps.supplier && caps.finance);
        assert!(!caps.user);
        assert_eq!(
            caps.require(Role::Admin),
            Err(AccessDenied {
                required: Role::Admin
            })
        );
        assert_eq!(
            caps.require(Role::Admin).unwrap_err().to_string(),
            "admin capability required"
        );
    }
}
