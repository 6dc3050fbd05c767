use permittree_core::{Caller, Role};

use super::role::Permission;
use crate::error::ServerError;

/// Rich server-side caller identity extracted from authentication.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    /// Username of the caller.
    pub id: String,
    /// The account's current role.
    pub role: Role,
    /// Authentication method (`"jwt"` or `"anonymous"`).
    pub auth_method: String,
}

impl CallerIdentity {
    /// Build an anonymous identity with full admin access (used when auth is disabled).
    pub fn anonymous() -> Self {
        Self {
            id: "anonymous".to_owned(),
            role: Role::Admin,
            auth_method: "anonymous".to_owned(),
        }
    }

    /// Fail with 403 unless the caller's role holds `perm`.
    pub fn require(&self, perm: Permission) -> Result<(), ServerError> {
        if perm.granted_to(self.role) {
            Ok(())
        } else {
            Err(ServerError::Forbidden(format!(
                "role '{}' lacks the '{}' permission",
                self.role,
                perm.as_str()
            )))
        }
    }

    /// Convert to the minimal `Caller` threaded into the workflow.
    pub fn to_caller(&self) -> Caller {
        Caller {
            id: self.id.clone(),
            role: self.role,
            auth_method: self.auth_method.clone(),
        }
    }
}
