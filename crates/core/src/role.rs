use std::fmt;

use serde::{Deserialize, Serialize};

/// Roles held by PermitTree accounts.
///
/// Every personnel role maps to a dashboard over the same application and
/// order-of-payment documents; applicants only ever see their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A member of the public applying for a permit.
    Applicant,
    /// Receiving/releasing clerk.
    Clerk,
    /// Technical staff (inspection, evaluation, certificate preparation).
    TechnicalStaff,
    /// Chief of the Regulation and Permitting Section / TSD.
    ChiefRps,
    Accountant,
    BillCollector,
    /// PENR/CENR officer (signatory).
    PenrOfficer,
    Admin,
}

impl Role {
    /// All roles, in dashboard display order.
    pub const ALL: [Self; 8] = [
        Self::Applicant,
        Self::Clerk,
        Self::TechnicalStaff,
        Self::ChiefRps,
        Self::Accountant,
        Self::BillCollector,
        Self::PenrOfficer,
        Self::Admin,
    ];

    /// Parse a role from a string, ignoring case and accepting `-` or `_`.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "applicant" => Some(Self::Applicant),
            "clerk" => Some(Self::Clerk),
            "technical_staff" => Some(Self::TechnicalStaff),
            "chief_rps" => Some(Self::ChiefRps),
            "accountant" => Some(Self::Accountant),
            "bill_collector" => Some(Self::BillCollector),
            "penr_officer" => Some(Self::PenrOfficer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// The wire name of this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::Clerk => "clerk",
            Self::TechnicalStaff => "technical_staff",
            Self::ChiefRps => "chief_rps",
            Self::Accountant => "accountant",
            Self::BillCollector => "bill_collector",
            Self::PenrOfficer => "penr_officer",
            Self::Admin => "admin",
        }
    }

    /// Whether this role belongs to office personnel (anyone but applicants).
    pub fn is_personnel(self) -> bool {
        !matches!(self, Self::Applicant)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
