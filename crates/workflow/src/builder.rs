use std::sync::Arc;

use permittree_audit::AuditStore;
use permittree_blob::BlobStore;
use permittree_state::StateStore;

use crate::certificates::CertificateTemplates;
use crate::config::WorkflowConfig;
use crate::error::WorkflowError;
use crate::workflow::Workflow;

/// Fluent builder for constructing a [`Workflow`].
///
/// A [`StateStore`] and a [`BlobStore`] must be supplied. Without an audit
/// store transitions are applied but not recorded.
#[derive(Default)]
pub struct WorkflowBuilder {
    state: Option<Arc<dyn StateStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    audit: Option<Arc<dyn AuditStore>>,
    config: WorkflowConfig,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the document store.
    #[must_use]
    pub fn state(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state = Some(store);
        self
    }

    /// Set the store for uploaded files.
    #[must_use]
    pub fn blobs(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(store);
        self
    }

    /// Set the audit store for recording transitions.
    #[must_use]
    pub fn audit(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.audit = Some(store);
        self
    }

    #[must_use]
    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the office code documents are stored under.
    #[must_use]
    pub fn office(mut self, office: impl Into<String>) -> Self {
        self.config.office = office.into();
        self
    }

    /// Consume the builder and produce a [`Workflow`].
    ///
    /// Fails when a required store is missing, the office code is empty or a
    /// certificate template does not parse.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        let state = self
            .state
            .ok_or_else(|| WorkflowError::Configuration("state store is required".into()))?;
        let blobs = self
            .blobs
            .ok_or_else(|| WorkflowError::Configuration("blob store is required".into()))?;

        if self.config.office.trim().is_empty() {
            return Err(WorkflowError::Configuration(
                "office code must not be empty".into(),
            ));
        }
        if self.config.payment_due_days <= 0 || self.config.certificate_validity_days <= 0 {
            return Err(WorkflowError::Configuration(
                "payment due days and certificate validity days must be positive".into(),
            ));
        }

        let templates = CertificateTemplates::load(self.config.template_dir.as_deref())?;

        Ok(Workflow {
            state,
            blobs,
            audit: self.audit,
            config: self.config,
            templates,
        })
    }
}
