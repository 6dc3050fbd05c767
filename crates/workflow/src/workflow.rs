use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use permittree_audit::{AuditStore, AuditSubject, TransitionRecord};
use permittree_blob::{BlobStore, ResolvedBlob};
use permittree_core::state_machine::application_transition;
use permittree_core::{
    Applicant, Application, ApplicationEvent, ApplicationId, ApplicationStatus, Caller, FileRef,
    PermitDetails, PermitType, Role, Stage,
};
use permittree_state::StateStore;

use crate::certificates::CertificateTemplates;
use crate::config::WorkflowConfig;
use crate::documents::MAX_CAS_ATTEMPTS;
use crate::error::WorkflowError;
use crate::machine::authorize;

/// The permit engine. Every document mutation goes through here.
///
/// Built with [`WorkflowBuilder`](crate::WorkflowBuilder). Cheap to share
/// behind an `Arc`; it holds no locks of its own.
pub struct Workflow {
    pub(crate) state: Arc<dyn StateStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) audit: Option<Arc<dyn AuditStore>>,
    pub(crate) config: WorkflowConfig,
    pub(crate) templates: CertificateTemplates,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("config", &self.config)
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

/// Filters for [`Workflow::list_applications`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema, utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ListFilter {
    pub status: Option<ApplicationStatus>,
    pub stage: Option<Stage>,
    pub permit_type: Option<PermitType>,
    /// Owner username. Ignored for applicants, who only see their own.
    pub owner: Option<String>,
}

impl ListFilter {
    fn matches(&self, app: &Application) -> bool {
        self.status.is_none_or(|s| s == app.status)
            && self.stage.is_none_or(|s| s == app.current_stage)
            && self.permit_type.is_none_or(|p| p == app.permit_type)
            && self.owner.as_ref().is_none_or(|o| *o == app.owner)
    }
}

/// A role's work queue plus per-status totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Dashboard {
    pub role: Role,
    /// Stages whose applications wait on this role.
    pub stages: Vec<Stage>,
    /// Applications waiting on the caller, oldest first.
    pub queue: Vec<Application>,
    /// Count of visible applications per status wire string.
    pub counts: BTreeMap<String, usize>,
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Personnel see every document; applicants only their own. Anything else
/// is reported as missing rather than forbidden.
pub(crate) fn ensure_visible(
    caller: &Caller,
    owner: &str,
    what: &str,
) -> Result<(), WorkflowError> {
    if caller.role.is_personnel() || caller.is(owner) {
        Ok(())
    } else {
        Err(WorkflowError::NotFound(what.to_owned()))
    }
}

fn ensure_owner(caller: &Caller, app: &Application) -> Result<(), WorkflowError> {
    if caller.is(&app.owner) {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden(
            "only the applicant may change this application".into(),
        ))
    }
}

fn ensure_editable(app: &Application, action: &str) -> Result<(), WorkflowError> {
    if app.is_editable() {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition {
            from: app.status.as_str().to_owned(),
            event: action.to_owned(),
        })
    }
}

/// Trimmed remarks, required for events that must explain themselves.
pub(crate) fn checked_remarks(
    event: ApplicationEvent,
    remarks: Option<&str>,
) -> Result<Option<String>, WorkflowError> {
    let remarks = remarks.map(str::trim).filter(|r| !r.is_empty());
    if event.requires_remarks() && remarks.is_none() {
        return Err(WorkflowError::validation(format!(
            "remarks are required to {event} an application"
        )));
    }
    Ok(remarks.map(str::to_owned))
}

impl Workflow {
    pub fn office(&self) -> &str {
        &self.config.office
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Write a transition record. Failures are logged and swallowed.
    pub(crate) async fn record(&self, record: TransitionRecord) {
        if let Some(ref audit) = self.audit
            && let Err(e) = audit.record(record).await
        {
            warn!(error = %e, "audit recording failed");
        }
    }

    pub(crate) async fn visible_application(
        &self,
        caller: &Caller,
        id: &ApplicationId,
    ) -> Result<Application, WorkflowError> {
        let app: Application = self.fetch(id).await?;
        ensure_visible(caller, &app.owner, &format!("application {id}"))?;
        Ok(app)
    }

    /// Fire `event` on an application under CAS, then record it.
    ///
    /// `extra` runs on the document after the move is validated and may set
    /// fields that belong to the event (order of payment, certificate id) or
    /// veto the move.
    pub(crate) async fn fire<F>(
        &self,
        caller: &Caller,
        id: &ApplicationId,
        event: ApplicationEvent,
        remarks: Option<String>,
        mut extra: F,
    ) -> Result<Application, WorkflowError>
    where
        F: FnMut(&mut Application) -> Result<(), WorkflowError> + Send,
    {
        let now = Utc::now();
        let (app, (from_status, from_stage)) = self
            .modify::<Application, _, _>(id, |app| {
                let t = application_transition(app.status, app.current_stage, event)?;
                authorize(&t.actor, caller, &app.owner, event.as_str())?;
                extra(app)?;
                let from = (app.status, app.current_stage);
                app.status = t.to_status;
                app.current_stage = t.to_stage;
                if event.requires_remarks() {
                    app.remarks.clone_from(&remarks);
                }
                app.updated_at = now;
                Ok(from)
            })
            .await?;

        info!(
            application = %app.id,
            event = %event,
            from = %from_status,
            to = %app.status,
            actor = %caller.id,
            "transition applied"
        );

        self.record(
            TransitionRecord::new(
                self.office(),
                AuditSubject::Application,
                app.id.as_str(),
                app.id.as_str(),
                event.as_str(),
                from_status.as_str(),
                app.status.as_str(),
                caller.id.as_str(),
                caller.role.as_str(),
            )
            .with_stages(from_stage.as_str(), app.current_stage.as_str())
            .with_remarks(remarks),
        )
        .await;

        Ok(app)
    }

    /// Validate an upload against the configured limits. Returns the media
    /// type to store it under.
    pub(crate) fn check_upload(&self, file: &UploadedFile) -> Result<String, WorkflowError> {
        let size = file.data.len() as u64;
        if size > self.config.max_file_bytes {
            return Err(WorkflowError::TooLarge {
                size,
                limit: self.config.max_file_bytes,
            });
        }
        let Some(content_type) = self.config.accepted_content_type(&file.content_type) else {
            return Err(WorkflowError::UnsupportedContentType(
                file.content_type.escape_debug().to_string(),
            ));
        };
        if file.filename.trim().is_empty() {
            return Err(WorkflowError::validation("filename is required"));
        }
        Ok(content_type)
    }

    /// Store an upload and return the reference to keep on a document.
    pub(crate) async fn store_upload(
        &self,
        owner: &str,
        file: UploadedFile,
    ) -> Result<FileRef, WorkflowError> {
        let content_type = self.check_upload(&file)?;
        let meta = self
            .blobs
            .put(
                self.office(),
                owner,
                &file.filename,
                &content_type,
                file.data,
            )
            .await?;
        Ok(FileRef {
            blob_id: meta.id.into(),
            filename: meta.filename,
            content_type: meta.content_type,
            size_bytes: meta.size_bytes,
            checksum_sha256: meta.checksum_sha256,
            uploaded_at: meta.created_at,
        })
    }

    /// Best-effort blob removal for files no document refers to any more.
    pub(crate) async fn discard_blob(&self, file: &FileRef) {
        if let Err(e) = self.blobs.delete(&file.blob_id).await {
            warn!(blob = %file.blob_id, error = %e, "failed to delete blob");
        }
    }

    /// Start a new draft application owned by the caller.
    #[instrument(
        skip(self, caller, applicant, details),
        fields(caller = %caller.id, permit_type = %permit_type)
    )]
    pub async fn create_application(
        &self,
        caller: &Caller,
        permit_type: PermitType,
        applicant: Applicant,
        details: Option<PermitDetails>,
    ) -> Result<Application, WorkflowError> {
        if caller.role != Role::Applicant {
            return Err(WorkflowError::Forbidden(
                "only applicants may file applications".into(),
            ));
        }
        let details = details.unwrap_or_else(|| PermitDetails::empty(permit_type));
        if details.permit_type() != permit_type {
            return Err(WorkflowError::validation(format!(
                "details are for {} but the application is for {permit_type}",
                details.permit_type()
            )));
        }

        let mut app = Application::draft(
            ApplicationId::generate(),
            caller.id.clone(),
            applicant,
            details,
            Utc::now(),
        );
        self.insert(&mut app).await?;
        info!(application = %app.id, "application created");
        Ok(app)
    }

    /// Replace the applicant block and/or permit details of an editable
    /// application.
    #[instrument(
        skip(self, caller, applicant, details),
        fields(caller = %caller.id, application = %id)
    )]
    pub async fn update_application(
        &self,
        caller: &Caller,
        id: &ApplicationId,
        applicant: Option<Applicant>,
        details: Option<PermitDetails>,
    ) -> Result<Application, WorkflowError> {
        self.visible_application(caller, id).await?;
        let (app, ()) = self
            .modify::<Application, _, _>(id, |app| {
                ensure_owner(caller, app)?;
                ensure_editable(app, "update")?;
                if let Some(ref details) = details {
                    if details.permit_type() != app.permit_type {
                        return Err(WorkflowError::validation(format!(
                            "details are for {} but the application is for {}",
                            details.permit_type(),
                            app.permit_type
                        )));
                    }
                    app.details = details.clone();
                }
                if let Some(ref applicant) = applicant {
                    app.applicant = applicant.clone();
                }
                app.updated_at = Utc::now();
                Ok(())
            })
            .await?;
        Ok(app)
    }

    /// Delete a draft and its uploads.
    #[instrument(skip(self, caller), fields(caller = %caller.id, application = %id))]
    pub async fn delete_application(
        &self,
        caller: &Caller,
        id: &ApplicationId,
    ) -> Result<(), WorkflowError> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let app = self.visible_application(caller, id).await?;
            ensure_owner(caller, &app)?;
            if app.status != ApplicationStatus::Draft {
                return Err(WorkflowError::InvalidTransition {
                    from: app.status.as_str().to_owned(),
                    event: "delete".into(),
                });
            }
            // Only the version checked above may be deleted.
            if self.remove_if_version::<Application>(id, app.version).await? {
                for file in app.files.values() {
                    self.discard_blob(file).await;
                }
                info!(application = %id, "draft deleted");
                return Ok(());
            }
            debug!(application = %id, attempt, "draft changed before delete, re-checking");
        }
        Err(WorkflowError::Conflict(format!(
            "application {id} was modified concurrently, try again"
        )))
    }

    pub async fn get_application(
        &self,
        caller: &Caller,
        id: &ApplicationId,
    ) -> Result<Application, WorkflowError> {
        self.visible_application(caller, id).await
    }

    /// Applications visible to the caller, newest first.
    pub async fn list_applications(
        &self,
        caller: &Caller,
        filter: &ListFilter,
    ) -> Result<Vec<Application>, WorkflowError> {
        let mut apps: Vec<Application> = self
            .scan::<Application>()
            .await?
            .into_iter()
            .filter(|app| caller.role.is_personnel() || caller.is(&app.owner))
            .filter(|app| filter.matches(app))
            .collect();
        apps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apps)
    }

    /// The caller's work queue.
    ///
    /// Personnel get the applications sitting at the stages their role is
    /// responsible for. Applicants get their own applications that wait on
    /// them: drafts, returns and unpaid bills.
    pub async fn dashboard(&self, caller: &Caller) -> Result<Dashboard, WorkflowError> {
        let visible = self.list_applications(caller, &ListFilter::default()).await?;

        let stages = if caller.role.is_personnel() {
            Stage::queue_for(caller.role)
        } else {
            vec![Stage::Applicant, Stage::Payment]
        };

        let mut counts: BTreeMap<String, usize> = ApplicationStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_owned(), 0))
            .collect();
        for app in &visible {
            *counts.entry(app.status.as_str().to_owned()).or_default() += 1;
        }

        let mut queue: Vec<Application> = visible
            .into_iter()
            .filter(|app| stages.contains(&app.current_stage))
            .collect();
        queue.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));

        Ok(Dashboard {
            role: caller.role,
            stages,
            queue,
            counts,
        })
    }

    /// Attach a document to an editable application, replacing any file
    /// already stored under `key`.
    #[instrument(
        skip(self, caller, file),
        fields(caller = %caller.id, application = %id, key = %key)
    )]
    pub async fn upload_file(
        &self,
        caller: &Caller,
        id: &ApplicationId,
        key: &str,
        file: UploadedFile,
    ) -> Result<Application, WorkflowError> {
        let app = self.visible_application(caller, id).await?;
        ensure_owner(caller, &app)?;
        ensure_editable(&app, "upload")?;
        if !app.permit_type.accepts_document(key) {
            return Err(WorkflowError::validation(format!(
                "{} applications have no document '{key}'",
                app.permit_type
            )));
        }

        let file_ref = self.store_upload(&app.owner, file).await?;
        let result = self
            .modify::<Application, _, _>(id, |app| {
                ensure_editable(app, "upload")?;
                app.updated_at = Utc::now();
                Ok(app.files.insert(key.to_owned(), file_ref.clone()))
            })
            .await;

        match result {
            Ok((app, replaced)) => {
                if let Some(old) = replaced {
                    self.discard_blob(&old).await;
                }
                info!(blob = %file_ref.blob_id, size = file_ref.size_bytes, "file attached");
                Ok(app)
            }
            Err(e) => {
                self.discard_blob(&file_ref).await;
                Err(e)
            }
        }
    }

    /// The bytes stored under `key`, exactly as uploaded.
    pub async fn download_file(
        &self,
        caller: &Caller,
        id: &ApplicationId,
        key: &str,
    ) -> Result<ResolvedBlob, WorkflowError> {
        let app = self.visible_application(caller, id).await?;
        let file = app
            .files
            .get(key)
            .ok_or_else(|| WorkflowError::NotFound(format!("document '{key}'")))?;
        self.blobs
            .get(&file.blob_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("blob {}", file.blob_id)))
    }

    #[instrument(skip(self, caller), fields(caller = %caller.id, application = %id, key = %key))]
    pub async fn remove_file(
        &self,
        caller: &Caller,
        id: &ApplicationId,
        key: &str,
    ) -> Result<Application, WorkflowError> {
        self.visible_application(caller, id).await?;
        let (app, removed) = self
            .modify::<Application, _, _>(id, |app| {
                ensure_owner(caller, app)?;
                ensure_editable(app, "remove files from")?;
                let removed = app
                    .files
                    .remove(key)
                    .ok_or_else(|| WorkflowError::NotFound(format!("document '{key}'")))?;
                app.updated_at = Utc::now();
                Ok(removed)
            })
            .await?;
        self.discard_blob(&removed).await;
        Ok(app)
    }

    /// Submit a draft, or resubmit a returned application.
    ///
    /// The first submission assigns the application number.
    #[instrument(skip(self, caller), fields(caller = %caller.id, application = %id))]
    pub async fn submit(
        &self,
        caller: &Caller,
        id: &ApplicationId,
    ) -> Result<Application, WorkflowError> {
        let app = self.visible_application(caller, id).await?;
        let event = if app.status == ApplicationStatus::Returned {
            ApplicationEvent::Resubmit
        } else {
            ApplicationEvent::Submit
        };
        let t = application_transition(app.status, app.current_stage, event)?;
        authorize(&t.actor, caller, &app.owner, event.as_str())?;

        let problems = app.validate_for_submission();
        if !problems.is_empty() {
            return Err(WorkflowError::Validation(problems));
        }

        let now = Utc::now();
        let custom_id = match app.custom_id {
            Some(ref existing) => existing.clone(),
            None => self.allocate_custom_id(app.permit_type, now).await?,
        };

        let app = self
            .fire(caller, id, event, None, |app| {
                let problems = app.validate_for_submission();
                if !problems.is_empty() {
                    return Err(WorkflowError::Validation(problems));
                }
                if app.custom_id.is_none() {
                    app.custom_id = Some(custom_id.clone());
                }
                app.submitted_at = Some(now);
                Ok(())
            })
            .await?;

        self.notify_transition(caller, &app, event).await;
        Ok(app)
    }

    /// Fire a workflow event by name.
    ///
    /// Events that carry more than a status change are routed to their
    /// dedicated operation; payment confirmation only happens by issuing an
    /// official receipt.
    #[instrument(
        skip(self, caller, remarks),
        fields(caller = %caller.id, application = %id, event = %event)
    )]
    pub async fn transition(
        &self,
        caller: &Caller,
        id: &ApplicationId,
        event: ApplicationEvent,
        remarks: Option<&str>,
    ) -> Result<Application, WorkflowError> {
        match event {
            ApplicationEvent::Submit | ApplicationEvent::Resubmit => {
                return self.submit(caller, id).await;
            }
            ApplicationEvent::IssueOop => {
                self.issue_order_of_payment(caller, id, None).await?;
                return self.fetch(id).await;
            }
            ApplicationEvent::GenerateCertificate => {
                self.generate_certificate(caller, id).await?;
                return self.fetch(id).await;
            }
            ApplicationEvent::SignCertificate => {
                self.sign_certificate(caller, id).await?;
                return self.fetch(id).await;
            }
            ApplicationEvent::Release => return self.release(caller, id).await,
            ApplicationEvent::ConfirmPayment => {
                return Err(WorkflowError::validation(
                    "payment is confirmed by issuing an official receipt",
                ));
            }
            ApplicationEvent::Return
            | ApplicationEvent::Accept
            | ApplicationEvent::Endorse
            | ApplicationEvent::Reject
            | ApplicationEvent::Withdraw => {}
        }

        self.visible_application(caller, id).await?;
        let remarks = checked_remarks(event, remarks)?;
        let app = self.fire(caller, id, event, remarks, |_| Ok(())).await?;
        self.notify_transition(caller, &app, event).await;
        Ok(app)
    }

    /// Transition records for an application, oldest first.
    pub async fn history(
        &self,
        caller: &Caller,
        id: &ApplicationId,
    ) -> Result<Vec<TransitionRecord>, WorkflowError> {
        self.visible_application(caller, id).await?;
        match self.audit {
            Some(ref audit) => Ok(audit.history(id).await?),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use permittree_core::{PermitDetails, PermitType, Role};
    use permittree_state::{CasResult, KeyKind, StateError, StateKey, Versioned};
    use permittree_state_memory::MemoryStateStore;
    use tokio::sync::Notify;

    use crate::testing::{Harness, applicant, complete_csaw, pdf};

    use super::*;

    #[tokio::test]
    async fn only_applicants_create_applications() {
        let h = Harness::new();
        let clerk = h.personnel(Role::Clerk);
        let err = h
            .workflow
            .create_application(&clerk, PermitType::Csaw, applicant(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }

    #[tokio::test]
    async fn details_must_match_permit_type() {
        let h = Harness::new();
        let err = h
            .workflow
            .create_application(
                &h.owner,
                PermitType::Csaw,
                applicant(),
                Some(PermitDetails::empty(PermitType::Tcp)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn complete_submission_assigns_custom_id() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;

        let submitted = h.workflow.submit(&h.owner, &app.id).await.unwrap();
        assert_eq!(submitted.status, ApplicationStatus::Submitted);
        assert_eq!(submitted.current_stage, Stage::Receiving);
        let year = Utc::now().format("%Y").to_string();
        assert_eq!(
            submitted.custom_id.as_deref(),
            Some(format!("CSAW-{year}-0001").as_str())
        );
        assert!(submitted.submitted_at.is_some());

        let stored = h.workflow.get_application(&h.owner, &app.id).await.unwrap();
        assert_eq!(stored.status, ApplicationStatus::Submitted);
        assert_eq!(stored.custom_id, submitted.custom_id);
    }

    #[tokio::test]
    async fn incomplete_submission_lists_missing_items() {
        let h = Harness::new();
        let app = h
            .workflow
            .create_application(&h.owner, PermitType::Csaw, Applicant::default(), None)
            .await
            .unwrap();

        let err = h.workflow.submit(&h.owner, &app.id).await.unwrap_err();
        let WorkflowError::Validation(problems) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(problems.contains(&"applicant.full_name".to_owned()));
        assert!(problems.contains(&"document.chainsaw_receipt".to_owned()));

        let stored = h.workflow.get_application(&h.owner, &app.id).await.unwrap();
        assert_eq!(stored.status, ApplicationStatus::Draft);
        assert!(stored.custom_id.is_none());
    }

    #[tokio::test]
    async fn resubmission_keeps_custom_id() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        let first = h.workflow.submit(&h.owner, &app.id).await.unwrap();

        let clerk = h.personnel(Role::Clerk);
        let returned = h
            .workflow
            .transition(&clerk, &app.id, ApplicationEvent::Return, Some("blurry receipt"))
            .await
            .unwrap();
        assert_eq!(returned.status, ApplicationStatus::Returned);
        assert_eq!(returned.remarks.as_deref(), Some("blurry receipt"));

        let again = h.workflow.submit(&h.owner, &app.id).await.unwrap();
        assert_eq!(again.status, ApplicationStatus::Submitted);
        assert_eq!(again.custom_id, first.custom_id);
    }

    #[tokio::test]
    async fn return_requires_remarks() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        h.workflow.submit(&h.owner, &app.id).await.unwrap();

        let clerk = h.personnel(Role::Clerk);
        let err = h
            .workflow
            .transition(&clerk, &app.id, ApplicationEvent::Return, Some("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn wrong_role_is_forbidden_and_wrong_state_is_invalid() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        h.workflow.submit(&h.owner, &app.id).await.unwrap();

        let accountant = h.personnel(Role::Accountant);
        let err = h
            .workflow
            .transition(&accountant, &app.id, ApplicationEvent::Accept, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));

        let clerk = h.personnel(Role::Clerk);
        let err = h
            .workflow
            .transition(&clerk, &app.id, ApplicationEvent::Endorse, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidTransition { ref from, ref event }
                if from == "Submitted" && event == "endorse"
        ));
    }

    #[tokio::test]
    async fn concurrent_duplicate_accepts_succeed_once() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        h.workflow.submit(&h.owner, &app.id).await.unwrap();

        let workflow = Arc::new(h.workflow);
        let mut tasks = Vec::new();
        for i in 0..8 {
            let workflow = Arc::clone(&workflow);
            let id = app.id.clone();
            tasks.push(tokio::spawn(async move {
                let clerk = Caller::new(format!("clerk-{i}"), Role::Clerk);
                workflow
                    .transition(&clerk, &id, ApplicationEvent::Accept, None)
                    .await
            }));
        }

        let mut accepted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(WorkflowError::InvalidTransition { .. } | WorkflowError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(accepted, 1);

        let stored: Application = workflow.fetch(&app.id).await.unwrap();
        assert_eq!(stored.status, ApplicationStatus::Accepted);
        assert_eq!(stored.current_stage, Stage::TechnicalReview);
    }

    #[tokio::test]
    async fn applicants_only_see_their_own() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        let stranger = Caller::new("pedro", Role::Applicant);

        let err = h
            .workflow
            .get_application(&stranger, &app.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
        let listed = h
            .workflow
            .list_applications(&stranger, &ListFilter::default())
            .await
            .unwrap();
        assert!(listed.is_empty());

        let clerk = h.personnel(Role::Clerk);
        let listed = h
            .workflow
            .list_applications(
                &clerk,
                &ListFilter {
                    status: Some(ApplicationStatus::Draft),
                    ..ListFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn dashboards_list_only_role_stages() {
        let h = Harness::new();
        let draft = complete_csaw(&h).await;
        let submitted = complete_csaw(&h).await;
        h.workflow.submit(&h.owner, &submitted.id).await.unwrap();

        let clerk = h.personnel(Role::Clerk);
        let dash = h.workflow.dashboard(&clerk).await.unwrap();
        assert_eq!(dash.stages, vec![Stage::Receiving, Stage::Releasing]);
        assert_eq!(dash.queue.len(), 1);
        assert_eq!(dash.queue[0].id, submitted.id);
        assert_eq!(dash.counts["Draft"], 1);
        assert_eq!(dash.counts["Submitted"], 1);
        assert_eq!(dash.counts["Released"], 0);

        let technical = h.personnel(Role::TechnicalStaff);
        assert!(h.workflow.dashboard(&technical).await.unwrap().queue.is_empty());

        let mine = h.workflow.dashboard(&h.owner).await.unwrap();
        assert_eq!(mine.queue.len(), 1);
        assert_eq!(mine.queue[0].id, draft.id);
    }

    #[tokio::test]
    async fn uploads_round_trip_and_replace() {
        let h = Harness::new();
        let app = h
            .workflow
            .create_application(&h.owner, PermitType::Csaw, applicant(), None)
            .await
            .unwrap();

        let original = Bytes::from_static(b"%PDF-1.7 receipt \x00\xff");
        let app = h
            .workflow
            .upload_file(
                &h.owner,
                &app.id,
                "chainsaw_receipt",
                pdf("receipt.pdf", original.clone()),
            )
            .await
            .unwrap();
        let first = app.files["chainsaw_receipt"].clone();

        let blob = h
            .workflow
            .download_file(&h.owner, &app.id, "chainsaw_receipt")
            .await
            .unwrap();
        assert_eq!(blob.data, original);
        assert_eq!(blob.metadata.content_type, "application/pdf");

        let replacement = Bytes::from_static(b"%PDF-1.7 corrected");
        let messy = UploadedFile {
            filename: "receipt2.pdf".into(),
            content_type: "Application/PDF;\n name=receipt2".into(),
            data: replacement.clone(),
        };
        let app = h
            .workflow
            .upload_file(&h.owner, &app.id, "chainsaw_receipt", messy)
            .await
            .unwrap();
        assert_eq!(app.files["chainsaw_receipt"].content_type, "application/pdf");
        let blob = h
            .workflow
            .download_file(&h.owner, &app.id, "chainsaw_receipt")
            .await
            .unwrap();
        assert_eq!(blob.data, replacement);
        assert_eq!(blob.metadata.content_type, "application/pdf");
        assert!(h.blobs.get(&first.blob_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upload_limits_are_enforced() {
        let h = Harness::new();
        let app = h
            .workflow
            .create_application(&h.owner, PermitType::Csaw, applicant(), None)
            .await
            .unwrap();

        let limit = usize::try_from(h.workflow.config().max_file_bytes).unwrap();
        let huge = Bytes::from(vec![0_u8; limit + 1]);
        let err = h
            .workflow
            .upload_file(&h.owner, &app.id, "chainsaw_receipt", pdf("big.pdf", huge))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::TooLarge { .. }));

        let html = UploadedFile {
            filename: "x.html".into(),
            content_type: "text/html".into(),
            data: Bytes::from_static(b"<p>"),
        };
        let err = h
            .workflow
            .upload_file(&h.owner, &app.id, "chainsaw_receipt", html)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::UnsupportedContentType(_)));

        let err = h
            .workflow
            .upload_file(
                &h.owner,
                &app.id,
                "tree_inventory",
                pdf("inv.pdf", Bytes::from_static(b"x")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn submitted_applications_are_frozen() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        h.workflow.submit(&h.owner, &app.id).await.unwrap();

        let err = h
            .workflow
            .remove_file(&h.owner, &app.id, "chainsaw_receipt")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        let err = h
            .workflow
            .update_application(&h.owner, &app.id, Some(applicant()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        let err = h
            .workflow
            .delete_application(&h.owner, &app.id)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    }

    /// Memory store that parks the first versioned delete of an application
    /// until released, so another call can run in between.
    struct PausingStore {
        inner: MemoryStateStore,
        armed: AtomicBool,
        reached: Notify,
        release: Notify,
    }

    impl PausingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStateStore::new(),
                armed: AtomicBool::new(false),
                reached: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl StateStore for PausingStore {
        async fn check_and_set(
            &self,
            key: &StateKey,
            value: &str,
            ttl: Option<Duration>,
        ) -> Result<bool, StateError> {
            self.inner.check_and_set(key, value, ttl).await
        }

        async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
            self.inner.get(key).await
        }

        async fn get_versioned(&self, key: &StateKey) -> Result<Option<Versioned>, StateError> {
            self.inner.get_versioned(key).await
        }

        async fn set(
            &self,
            key: &StateKey,
            value: &str,
            ttl: Option<Duration>,
        ) -> Result<(), StateError> {
            self.inner.set(key, value, ttl).await
        }

        async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
            self.inner.delete(key).await
        }

        async fn increment(
            &self,
            key: &StateKey,
            delta: i64,
            ttl: Option<Duration>,
        ) -> Result<i64, StateError> {
            self.inner.increment(key, delta, ttl).await
        }

        async fn compare_and_swap(
            &self,
            key: &StateKey,
            expected_version: u64,
            new_value: &str,
            ttl: Option<Duration>,
        ) -> Result<CasResult, StateError> {
            self.inner
                .compare_and_swap(key, expected_version, new_value, ttl)
                .await
        }

        async fn delete_if_version(
            &self,
            key: &StateKey,
            expected_version: u64,
        ) -> Result<bool, StateError> {
            if matches!(key.kind, KeyKind::Application) && self.armed.swap(false, Ordering::SeqCst)
            {
                self.reached.notify_one();
                self.release.notified().await;
            }
            self.inner.delete_if_version(key, expected_version).await
        }

        async fn scan_keys(
            &self,
            office: &str,
            kind: KeyKind,
        ) -> Result<Vec<(String, String)>, StateError> {
            self.inner.scan_keys(office, kind).await
        }
    }

    #[tokio::test]
    async fn submit_racing_a_delete_survives() {
        let store = Arc::new(PausingStore::new());
        let h = Harness::with_state(Arc::clone(&store) as Arc<dyn StateStore>);
        let app = complete_csaw(&h).await;
        store.armed.store(true, Ordering::SeqCst);

        // The delete has checked Draft and is about to remove the key when
        // the owner submits.
        let (deleted, submitted) = tokio::join!(
            h.workflow.delete_application(&h.owner, &app.id),
            async {
                store.reached.notified().await;
                let submitted = h.workflow.submit(&h.owner, &app.id).await;
                store.release.notify_one();
                submitted
            }
        );

        let submitted = submitted.unwrap();
        assert_eq!(submitted.status, ApplicationStatus::Submitted);
        assert!(matches!(
            deleted,
            Err(WorkflowError::InvalidTransition { .. })
        ));

        let stored = h.workflow.get_application(&h.owner, &app.id).await.unwrap();
        assert_eq!(stored.status, ApplicationStatus::Submitted);
        assert_eq!(stored.custom_id, submitted.custom_id);
        for file in stored.files.values() {
            assert!(h.blobs.get(&file.blob_id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn deleting_a_draft_removes_its_blobs() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        let blob_ids: Vec<String> = app.files.values().map(|f| f.blob_id.to_string()).collect();

        h.workflow.delete_application(&h.owner, &app.id).await.unwrap();
        assert!(matches!(
            h.workflow.get_application(&h.owner, &app.id).await,
            Err(WorkflowError::NotFound(_))
        ));
        for id in blob_ids {
            assert!(h.blobs.get(&id).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn history_records_each_transition() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        h.workflow.submit(&h.owner, &app.id).await.unwrap();
        let clerk = h.personnel(Role::Clerk);
        h.workflow
            .transition(&clerk, &app.id, ApplicationEvent::Accept, None)
            .await
            .unwrap();

        let history = h.workflow.history(&h.owner, &app.id).await.unwrap();
        let events: Vec<&str> = history.iter().map(|r| r.event.as_str()).collect();
        assert_eq!(events, vec!["submit", "accept"]);
        assert_eq!(history[1].actor, clerk.id);
        assert_eq!(history[1].from_stage.as_deref(), Some("receiving"));
        assert_eq!(history[1].to_stage.as_deref(), Some("technical_review"));
    }

    #[tokio::test]
    async fn confirm_payment_is_not_a_manual_transition() {
        let h = Harness::new();
        let app = complete_csaw(&h).await;
        let collector = h.personnel(Role::BillCollector);
        let err = h
            .workflow
            .transition(&collector, &app.id, ApplicationEvent::ConfirmPayment, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }
}
