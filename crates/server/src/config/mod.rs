mod audit;
mod auth;
mod background;
mod server;
mod state;
mod workflow;

#[cfg(test)]
mod tests;

pub use audit::*;
pub use auth::*;
pub use background::*;
pub use server::*;
pub use state::*;
pub use workflow::*;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use permittree_core::PermitType;
use permittree_workflow::WorkflowConfig;

use crate::error::ServerError;

/// Top-level configuration for the PermitTree server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct PermitTreeConfig {
    /// HTTP server bind configuration and office code.
    #[serde(default)]
    pub server: ServerConfig,
    /// State backend configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Audit trail configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthRefConfig,
    /// Upload limits.
    #[serde(default)]
    pub uploads: UploadsConfig,
    /// Per-permit fee schedule overrides.
    #[serde(default)]
    pub fees: FeesConfig,
    /// Certificate templates and validity.
    #[serde(default)]
    pub certificates: CertificatesConfig,
    /// Payment terms.
    #[serde(default)]
    pub payments: PaymentsConfig,
    /// Background processing configuration.
    #[serde(default)]
    pub background: BackgroundProcessingConfig,
}

/// Resolve `path` against the directory holding the main config file.
pub fn resolve_path(config_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_dir.join(path)
    }
}

impl PermitTreeConfig {
    /// Build the workflow tunables, rejecting unknown permit codes and
    /// non-positive day counts.
    pub fn workflow_config(&self, config_dir: &Path) -> Result<WorkflowConfig, ServerError> {
        let mut fees = HashMap::new();
        for (code, items) in &self.fees.0 {
            let permit_type = PermitType::from_code(code).ok_or_else(|| {
                ServerError::Config(format!("[fees]: unknown permit code '{code}'"))
            })?;
            if items.is_empty() {
                return Err(ServerError::Config(format!(
                    "[fees]: schedule for {code} has no items"
                )));
            }
            if let Some(item) = items.iter().find(|i| i.amount_centavos <= 0) {
                return Err(ServerError::Config(format!(
                    "[fees]: '{}' for {code} must have a positive amount",
                    item.description
                )));
            }
            fees.insert(permit_type, items.clone());
        }

        if self.payments.due_days <= 0 {
            return Err(ServerError::Config(
                "[payments] due_days must be positive".into(),
            ));
        }
        if self.certificates.validity_days <= 0 {
            return Err(ServerError::Config(
                "[certificates] validity_days must be positive".into(),
            ));
        }
        let office = self.server.office.trim();
        if office.is_empty() {
            return Err(ServerError::Config("[server] office must not be empty".into()));
        }

        Ok(WorkflowConfig {
            office: office.to_owned(),
            fees,
            max_file_bytes: self.uploads.max_file_bytes,
            allowed_content_types: self.uploads.allowed_content_types.clone(),
            payment_due_days: self.payments.due_days,
            certificate_validity_days: self.certificates.validity_days,
            template_dir: self
                .certificates
                .template_dir
                .as_deref()
                .map(|dir| resolve_path(config_dir, dir)),
        })
    }
}
