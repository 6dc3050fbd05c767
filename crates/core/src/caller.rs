use serde::{Deserialize, Serialize};

use crate::role::Role;

/// Minimal caller identity threaded from the HTTP layer into the workflow.
///
/// The workflow uses it for actor checks, audit attribution and
/// notification routing without depending on the server's auth module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Username of the caller.
    pub id: String,
    /// The caller's role.
    pub role: Role,
    /// How the caller authenticated (`"jwt"` or `"anonymous"`).
    pub auth_method: String,
}

impl Caller {
    /// Build a caller authenticated by JWT.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            auth_method: "jwt".to_owned(),
        }
    }

    /// Whether this caller is the given applicant account.
    pub fn is(&self, username: &str) -> bool {
        self.id == username
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
