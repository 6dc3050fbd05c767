use permittree_core::Role;

/// Permissions that map to endpoint groups.
///
/// Routes check these coarse grants; the workflow then applies the
/// per-transition actor rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Create and edit one's own applications, upload documents, pay.
    Apply,
    /// Act on applications as office personnel.
    Process,
    /// Query the transition trail across applications.
    AuditRead,
    /// Create, re-role and delete accounts.
    UsersManage,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Process => "process",
            Self::AuditRead => "audit_read",
            Self::UsersManage => "users_manage",
        }
    }

    /// Check whether `role` holds this permission.
    pub fn granted_to(self, role: Role) -> bool {
        match self {
            Self::Apply => matches!(role, Role::Applicant | Role::Admin),
            Self::Process | Self::AuditRead => role.is_personnel(),
            Self::UsersManage => role == Role::Admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applicants_only_apply() {
        assert!(Permission::Apply.granted_to(Role::Applicant));
        assert!(!Permission::Process.granted_to(Role::Applicant));
        assert!(!Permission::AuditRead.granted_to(Role::Applicant));
        assert!(!Permission::UsersManage.granted_to(Role::Applicant));
    }

    #[test]
    fn personnel_process_but_only_admins_manage_users() {
        for role in [
            Role::Clerk,
            Role::TechnicalStaff,
            Role::ChiefRps,
            Role::Accountant,
            Role::BillCollector,
            Role::PenrOfficer,
        ] {
            assert!(Permission::Process.granted_to(role));
            assert!(!Permission::Apply.granted_to(role));
            assert!(!Permission::UsersManage.granted_to(role));
        }
        assert!(Permission::UsersManage.granted_to(Role::Admin));
    }
}
