use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::permit::{PermitDetails, PermitType};
use crate::state_machine::{ApplicationStatus, Stage};
use crate::types::{ApplicationId, BlobId, CertificateId, OopId};

/// Contact details of the person applying.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Applicant {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub contact_number: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Applicant {
    pub fn missing_fields(&self) -> Vec<String> {
        [
            ("applicant.full_name", &self.full_name),
            ("applicant.address", &self.address),
            ("applicant.contact_number", &self.contact_number),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_owned())
        .collect()
    }
}

/// Reference from a document to an uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FileRef {
    pub blob_id: BlobId,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub checksum_sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A permit application and where it sits in the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Application {
    pub id: ApplicationId,
    /// Human-readable number such as `CSAW-2025-0007`, assigned on first
    /// submission.
    #[serde(default)]
    pub custom_id: Option<String>,
    pub permit_type: PermitType,
    /// Username of the applicant account that owns the application.
    pub owner: String,
    pub applicant: Applicant,
    pub details: PermitDetails,
    /// Uploaded documents keyed by document key.
    #[serde(default)]
    pub files: BTreeMap<String, FileRef>,
    pub status: ApplicationStatus,
    pub current_stage: Stage,
    /// Remark from the last return or rejection.
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub oop_id: Option<OopId>,
    #[serde(default)]
    pub certificate_id: Option<CertificateId>,
    /// Storage version, filled in on read.
    #[serde(skip)]
    pub version: u64,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// A fresh draft held by the applicant.
    pub fn draft(
        id: ApplicationId,
        owner: impl Into<String>,
        applicant: Applicant,
        details: PermitDetails,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            custom_id: None,
            permit_type: details.permit_type(),
            owner: owner.into(),
            applicant,
            details,
            files: BTreeMap::new(),
            status: ApplicationStatus::Draft,
            current_stage: Stage::Applicant,
            remarks: None,
            oop_id: None,
            certificate_id: None,
            version: 0,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Required documents that have not been uploaded yet.
    pub fn missing_documents(&self) -> Vec<&'static str> {
        self.permit_type
            .required_documents()
            .iter()
            .copied()
            .filter(|key| !self.files.contains_key(*key))
            .collect()
    }

    /// Everything that blocks submission. Empty when the application is
    /// complete.
    pub fn validate_for_submission(&self) -> Vec<String> {
        let mut problems = self.applicant.missing_fields();
        if self.details.permit_type() == self.permit_type {
            problems.extend(self.details.missing_fields());
        } else {
            problems.push(format!(
                "details are for {} but the application is for {}",
                self.details.permit_type(),
                self.permit_type
            ));
        }
        problems.extend(
            self.missing_documents()
                .into_iter()
                .map(|key| format!("document.{key}")),
        );
        problems
    }

    pub fn is_editable(&self) -> bool {
        self.status.is_editable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permit::ChainsawDetails;

    fn chainsaw() -> PermitDetails {
        PermitDetails::Chainsaw(ChainsawDetails {
            brand: "Husqvarna".into(),
            model: "445".into(),
            serial_number: "H-445-01".into(),
            purpose: "coconut lumber".into(),
            ..ChainsawDetails::default()
        })
    }

    fn file(key: &str) -> FileRef {
        FileRef {
            blob_id: BlobId::new(key),
            filename: format!("{key}.pdf"),
            content_type: "application/pdf".into(),
            size_bytes: 10,
            checksum_sha256: String::new(),
            uploaded_at: Utc::now(),
        }
    }

    fn applicant() -> Applicant {
        Applicant {
            full_name: "Juan dela Cruz".into(),
            address: "Brgy. Poblacion, Bayombong".into(),
            contact_number: "09171234567".into(),
            email: None,
        }
    }

    #[test]
    fn draft_starts_with_the_applicant() {
        let app = Application::draft(
            ApplicationId::generate(),
            "juan",
            applicant(),
            chainsaw(),
            Utc::now(),
        );
        assert_eq!(app.status, ApplicationStatus::Draft);
        assert_eq!(app.current_stage, Stage::Applicant);
        assert_eq!(app.permit_type, PermitType::Csaw);
        assert!(app.is_editable());
    }

    #[test]
    fn validation_lists_missing_documents() {
        let mut app = Application::draft(
            ApplicationId::generate(),
            "juan",
            applicant(),
            chainsaw(),
            Utc::now(),
        );
        let problems = app.validate_for_submission();
        assert_eq!(problems.len(), 4);
        assert!(problems.contains(&"document.business_permit".to_owned()));

        for key in PermitType::Csaw.required_documents() {
            app.files.insert((*key).to_owned(), file(key));
        }
        assert!(app.validate_for_submission().is_empty());
    }

    #[test]
    fn validation_flags_blank_applicant_and_mismatched_details() {
        let mut app = Application::draft(
            ApplicationId::generate(),
            "juan",
            Applicant::default(),
            chainsaw(),
            Utc::now(),
        );
        app.permit_type = PermitType::Tcp;
        let problems = app.validate_for_submission();
        assert!(problems.contains(&"applicant.full_name".to_owned()));
        assert!(problems.iter().any(|p| p.starts_with("details are for CSAW")));
    }

    #[test]
    fn version_is_not_serialized() {
        let mut app = Application::draft(
            ApplicationId::new("a1"),
            "juan",
            applicant(),
            chainsaw(),
            Utc::now(),
        );
        app.version = 7;
        let json = serde_json::to_value(&app).unwrap();
        assert!(json.get("version").is_none());
        assert_eq!(json["status"], "Draft");
        let back: Application = serde_json::from_value(json).unwrap();
        assert_eq!(back.version, 0);
    }
}
