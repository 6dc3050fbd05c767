use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::Applicant;
use crate::permit::{PermitDetails, PermitType};
use crate::state_machine::CertificateStatus;
use crate::types::{ApplicationId, CertificateId};

/// Snapshot of the application taken when the certificate is generated.
///
/// Later edits to the application never change an issued certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CertificateData {
    pub custom_id: String,
    pub owner: String,
    pub applicant: Applicant,
    pub details: PermitDetails,
    #[serde(default)]
    pub or_number: Option<String>,
    #[serde(default)]
    pub amount_paid_centavos: i64,
    pub office: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Certificate {
    pub id: CertificateId,
    pub certificate_number: String,
    pub application_id: ApplicationId,
    pub permit_type: PermitType,
    pub status: CertificateStatus,
    pub data: CertificateData,
    pub issued_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub signed_by: Option<String>,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub released_by: Option<String>,
    #[serde(default)]
    pub released_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
