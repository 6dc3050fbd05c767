use serde::Deserialize;

/// Configuration for the transition audit trail.
#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    /// Whether transitions are recorded.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Which backend to use: `"memory"` or `"postgres"`.
    #[serde(default = "default_audit_backend")]
    pub backend: String,
    /// Connection URL for the audit backend (used by `postgres`).
    pub url: Option<String>,
    /// Table prefix for the audit backend.
    #[serde(default = "default_audit_prefix")]
    pub prefix: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            backend: default_audit_backend(),
            url: None,
            prefix: default_audit_prefix(),
        }
    }
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_backend() -> String {
    "memory".to_owned()
}

fn default_audit_prefix() -> String {
    "permittree_".to_owned()
}
