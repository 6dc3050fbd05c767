use std::collections::HashMap;

use serde::Deserialize;

use permittree_core::BillItem;
use permittree_workflow::config::DEFAULT_MAX_FILE_BYTES;

/// Upload limits for application documents and payment proofs.
#[derive(Debug, Deserialize)]
pub struct UploadsConfig {
    /// Largest accepted file in bytes.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Accepted MIME types. An empty list accepts anything.
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            allowed_content_types: default_allowed_content_types(),
        }
    }
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

fn default_allowed_content_types() -> Vec<String> {
    vec![
        "application/pdf".to_owned(),
        "image/jpeg".to_owned(),
        "image/png".to_owned(),
    ]
}

/// Fee schedules keyed by permit code, replacing the built-in defaults.
///
/// ```toml
/// [[fees.CSAW]]
/// description = "Registration fee"
/// legal_basis = "DAO 2003-29"
/// amount_centavos = 50000
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct FeesConfig(pub HashMap<String, Vec<BillItem>>);

/// Certificate rendering and validity.
#[derive(Debug, Deserialize)]
pub struct CertificatesConfig {
    /// Directory with `certificate.html` or `{CODE}.html` template overrides.
    pub template_dir: Option<String>,
    /// Days a certificate stays valid after it is generated.
    #[serde(default = "default_validity_days")]
    pub validity_days: i64,
}

impl Default for CertificatesConfig {
    fn default() -> Self {
        Self {
            template_dir: None,
            validity_days: default_validity_days(),
        }
    }
}

fn default_validity_days() -> i64 {
    365
}

/// Order-of-payment terms.
#[derive(Debug, Deserialize)]
pub struct PaymentsConfig {
    /// Days an applicant has to pay once an order is signed.
    #[serde(default = "default_due_days")]
    pub due_days: i64,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            due_days: default_due_days(),
        }
    }
}

fn default_due_days() -> i64 {
    15
}
