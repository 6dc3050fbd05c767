use std::collections::HashMap;
use std::path::PathBuf;

use permittree_core::{BillItem, PermitType};

/// Default upload limit (10 MiB).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Tunables for a [`Workflow`](crate::Workflow).
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Office code used as the key namespace and printed on certificates.
    pub office: String,
    /// Per-permit fee schedules replacing [`PermitType::default_fees`].
    pub fees: HashMap<PermitType, Vec<BillItem>>,
    /// Largest accepted upload in bytes.
    pub max_file_bytes: u64,
    /// Accepted MIME types for uploads. Empty accepts anything.
    pub allowed_content_types: Vec<String>,
    /// Days an applicant has to pay an order of payment.
    pub payment_due_days: i64,
    /// Days a certificate stays valid after issuance.
    pub certificate_validity_days: i64,
    /// Directory with `{CODE}.html` / `certificate.html` template overrides.
    pub template_dir: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            office: "PENRO".to_owned(),
            fees: HashMap::new(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            allowed_content_types: vec![
                "application/pdf".to_owned(),
                "image/jpeg".to_owned(),
                "image/png".to_owned(),
            ],
            payment_due_days: 15,
            certificate_validity_days: 365,
            template_dir: None,
        }
    }
}

impl WorkflowConfig {
    /// The fee schedule for `permit_type`, honoring overrides.
    pub fn fees_for(&self, permit_type: PermitType) -> Vec<BillItem> {
        self.fees
            .get(&permit_type)
            .cloned()
            .unwrap_or_else(|| permit_type.default_fees())
    }

    /// The media type an upload is stored under, or `None` when
    /// `content_type` is malformed or not allowed.
    ///
    /// Parameters are dropped and the result is lowercased, so it is always
    /// a valid `Content-Type` header value.
    pub fn accepted_content_type(&self, content_type: &str) -> Option<String> {
        let essence = media_type_essence(content_type)?;
        let allowed = self.allowed_content_types.is_empty()
            || self
                .allowed_content_types
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&essence));
        allowed.then_some(essence)
    }
}

/// `type/subtype` of a media type, lowercased, if both halves are tokens.
fn media_type_essence(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim();
    let (kind, subtype) = essence.split_once('/')?;
    let is_token = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
    };
    (is_token(kind) && is_token(subtype)).then(|| essence.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_overrides_replace_defaults() {
        let mut config = WorkflowConfig::default();
        assert_eq!(config.fees_for(PermitType::Csaw), PermitType::Csaw.default_fees());

        config.fees.insert(
            PermitType::Csaw,
            vec![BillItem::new("Registration", "RA 9175", 750_00)],
        );
        let fees = config.fees_for(PermitType::Csaw);
        assert_eq!(fees.len(), 1);
        assert_eq!(fees[0].amount_centavos, 750_00);
        assert_eq!(config.fees_for(PermitType::Tcp), PermitType::Tcp.default_fees());
    }

    #[test]
    fn content_type_matching_ignores_parameters_and_case() {
        let config = WorkflowConfig::default();
        assert_eq!(
            config.accepted_content_type("application/pdf").as_deref(),
            Some("application/pdf")
        );
        assert_eq!(
            config.accepted_content_type("IMAGE/PNG; charset=binary").as_deref(),
            Some("image/png")
        );
        assert!(config.accepted_content_type("text/html").is_none());

        let open = WorkflowConfig {
            allowed_content_types: Vec::new(),
            ..WorkflowConfig::default()
        };
        assert_eq!(
            open.accepted_content_type("text/html").as_deref(),
            Some("text/html")
        );
    }

    #[test]
    fn malformed_content_types_are_refused() {
        let open = WorkflowConfig {
            allowed_content_types: Vec::new(),
            ..WorkflowConfig::default()
        };
        for bad in [
            "",
            "pdf",
            "application/",
            "/pdf",
            "text/ht ml",
            "text/\nhtml",
            "a/b\r\nX-Evil: 1",
        ] {
            assert!(open.accepted_content_type(bad).is_none(), "{bad:?}");
        }
        // Parameters with control characters are dropped, not echoed back.
        assert_eq!(
            WorkflowConfig::default()
                .accepted_content_type("application/pdf;\n")
                .as_deref(),
            Some("application/pdf")
        );
    }
}
