//! Certificate generation, signing, release and HTML rendering.
//!
//! Certificates are rendered with `MiniJinja`. Built-in templates cover every
//! permit type; a template directory may override `certificate.html` (the
//! generic layout) or `{CODE}.html` for a single permit type.

use std::path::Path;

use chrono::{Duration, Utc};
use minijinja::{Environment, ErrorKind, Value};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use permittree_audit::{AuditSubject, TransitionRecord};
use permittree_core::state_machine::application_transition;
use permittree_core::{
    Application, ApplicationEvent, ApplicationId, Caller, Certificate, CertificateData,
    CertificateEvent, CertificateId, CertificateStatus, OrderOfPayment, PermitType,
    format_pesos,
};

use crate::error::WorkflowError;
use crate::machine::{authorize, next_certificate_status};
use crate::workflow::Workflow;

/// Fuel limit for template evaluation.
const FUEL_LIMIT: u64 = 100_000;

/// Maximum rendered certificate size (1 MB).
const MAX_RENDERED_BYTES: usize = 1_024 * 1_024;

const GENERIC_TEMPLATE: &str = "certificate.html";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (GENERIC_TEMPLATE, include_str!("templates/certificate.html")),
    ("CSAW.html", include_str!("templates/csaw.html")),
];

fn template_name(permit_type: PermitType) -> String {
    format!("{}.html", permit_type.code())
}

/// Compiled certificate templates.
pub(crate) struct CertificateTemplates {
    env: Environment<'static>,
}

impl CertificateTemplates {
    /// Compile the built-in templates, then any overrides found in `dir`.
    pub(crate) fn load(dir: Option<&Path>) -> Result<Self, WorkflowError> {
        let mut env = Environment::new();
        env.set_fuel(Some(FUEL_LIMIT));

        for (name, source) in BUILTIN_TEMPLATES {
            env.add_template(name, source).map_err(|e| {
                WorkflowError::Configuration(format!("built-in template '{name}': {e}"))
            })?;
        }

        if let Some(dir) = dir {
            let names = std::iter::once(GENERIC_TEMPLATE.to_owned())
                .chain(PermitType::ALL.into_iter().map(template_name));
            for name in names {
                let path = dir.join(&name);
                let source = match std::fs::read_to_string(&path) {
                    Ok(source) => source,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        return Err(WorkflowError::Configuration(format!(
                            "failed to read {}: {e}",
                            path.display()
                        )));
                    }
                };
                env.add_template_owned(name.clone(), source).map_err(|e| {
                    WorkflowError::Configuration(format!("syntax error in {}: {e}", path.display()))
                })?;
                debug!(template = %name, "loaded certificate template override");
            }
        }

        Ok(Self { env })
    }

    pub(crate) fn render(
        &self,
        certificate: &Certificate,
        office: &str,
    ) -> Result<String, WorkflowError> {
        let name = template_name(certificate.permit_type);
        let template = match self.env.get_template(&name) {
            Ok(template) => template,
            Err(e) if e.kind() == ErrorKind::TemplateNotFound => {
                self.env.get_template(GENERIC_TEMPLATE)?
            }
            Err(e) => return Err(e.into()),
        };

        let context = RenderContext {
            certificate,
            office,
            permit_name: certificate.permit_type.name(),
            fields: detail_fields(certificate)?,
            amount_paid: format_pesos(certificate.data.amount_paid_centavos),
            issued_on: certificate.issued_at.format("%B %-d, %Y").to_string(),
            valid_until: certificate.valid_until.format("%B %-d, %Y").to_string(),
            signed_on: certificate
                .signed_at
                .map(|at| at.format("%B %-d, %Y").to_string()),
            draft: certificate.status == CertificateStatus::Generated,
        };
        let rendered = template
            .render(Value::from_serialize(&context))
            .map_err(|e| WorkflowError::Template(format!("error rendering {name}: {e}")))?;

        if rendered.len() > MAX_RENDERED_BYTES {
            return Err(WorkflowError::Template(format!(
                "rendered certificate exceeds maximum size of {MAX_RENDERED_BYTES} bytes"
            )));
        }
        Ok(rendered)
    }
}

#[derive(Serialize)]
struct RenderContext<'a> {
    certificate: &'a Certificate,
    office: &'a str,
    permit_name: &'static str,
    fields: Vec<Field>,
    amount_paid: String,
    issued_on: String,
    valid_until: String,
    signed_on: Option<String>,
    draft: bool,
}

#[derive(Serialize)]
struct Field {
    label: String,
    value: String,
}

/// Permit details flattened into label/value rows for the generic layout.
fn detail_fields(certificate: &Certificate) -> Result<Vec<Field>, WorkflowError> {
    let serde_json::Value::Object(map) = serde_json::to_value(&certificate.data.details)? else {
        return Ok(Vec::new());
    };
    Ok(map
        .into_iter()
        .filter(|(key, _)| key != "permit_type")
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) if !s.trim().is_empty() => s,
                serde_json::Value::Number(n) if n.as_f64().is_some_and(|v| v > 0.0) => {
                    n.to_string()
                }
                serde_json::Value::Array(items) if !items.is_empty() => items
                    .iter()
                    .map(|item| item.as_str().map_or_else(|| item.to_string(), str::to_owned))
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => return None,
            };
            let mut label = key.replace('_', " ");
            if let Some(first) = label.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            Some(Field { label, value })
        })
        .collect())
}

fn certificate_record(
    office: &str,
    cert: &Certificate,
    event: CertificateEvent,
    from: CertificateStatus,
    caller: &Caller,
) -> TransitionRecord {
    TransitionRecord::new(
        office,
        AuditSubject::Certificate,
        cert.id.as_str(),
        cert.application_id.as_str(),
        event.as_str(),
        from.as_str(),
        cert.status.as_str(),
        caller.id.as_str(),
        caller.role.as_str(),
    )
}

impl Workflow {
    async fn certificate_of(&self, app: &Application) -> Result<Certificate, WorkflowError> {
        let id = app.certificate_id.as_ref().ok_or_else(|| {
            WorkflowError::NotFound(format!("certificate for application {}", app.id))
        })?;
        self.fetch(id).await
    }

    /// Move the certificate and then the application for `event`.
    ///
    /// Both moves are checked up front. The certificate update tolerates a
    /// repeat, so two concurrent callers may both pass it; the application
    /// transition in `fire` is what admits only one of them.
    async fn advance_certificate(
        &self,
        caller: &Caller,
        id: &ApplicationId,
        event: ApplicationEvent,
        cert_event: CertificateEvent,
    ) -> Result<(Application, Certificate), WorkflowError> {
        let app = self.visible_application(caller, id).await?;
        let t = application_transition(app.status, app.current_stage, event)?;
        authorize(&t.actor, caller, &app.owner, event.as_str())?;
        let cert = self.certificate_of(&app).await?;

        let now = Utc::now();
        let (cert, from) = self
            .modify::<Certificate, _, _>(&cert.id, |cert| {
                let from = cert.status;
                // A certificate already moved by an earlier attempt whose
                // application transition failed.
                if matches!(
                    (from, cert_event),
                    (CertificateStatus::Signed, CertificateEvent::Sign)
                        | (CertificateStatus::Released, CertificateEvent::Release)
                ) {
                    return Ok(from);
                }
                cert.status = next_certificate_status(from, cert_event)?;
                match cert_event {
                    CertificateEvent::Sign => {
                        cert.signed_by = Some(caller.id.clone());
                        cert.signed_at = Some(now);
                    }
                    CertificateEvent::Release => {
                        cert.released_by = Some(caller.id.clone());
                        cert.released_at = Some(now);
                    }
                }
                cert.updated_at = now;
                Ok(from)
            })
            .await?;
        if from != cert.status {
            self.record(certificate_record(self.office(), &cert, cert_event, from, caller))
                .await;
        }

        let app = self.fire(caller, id, event, None, |_| Ok(())).await?;
        self.notify_transition(caller, &app, event).await;
        Ok((app, cert))
    }

    /// Prepare the certificate for a paid application and send it for
    /// signature.
    #[instrument(skip(self, caller), fields(caller = %caller.id, application = %id))]
    pub async fn generate_certificate(
        &self,
        caller: &Caller,
        id: &ApplicationId,
    ) -> Result<Certificate, WorkflowError> {
        let app = self.visible_application(caller, id).await?;
        let event = ApplicationEvent::GenerateCertificate;
        let t = application_transition(app.status, app.current_stage, event)?;
        authorize(&t.actor, caller, &app.owner, event.as_str())?;

        let receipt = match app.oop_id {
            Some(ref oop_id) => self
                .load::<OrderOfPayment>(oop_id)
                .await?
                .and_then(|oop| oop.official_receipt),
            None => None,
        };

        let now = Utc::now();
        let mut cert = Certificate {
            id: CertificateId::generate(),
            certificate_number: self.allocate_certificate_number(app.permit_type, now).await?,
            application_id: app.id.clone(),
            permit_type: app.permit_type,
            status: CertificateStatus::Generated,
            data: CertificateData {
                custom_id: app.custom_id.clone().unwrap_or_else(|| app.id.to_string()),
                owner: app.owner.clone(),
                applicant: app.applicant.clone(),
                details: app.details.clone(),
                or_number: receipt.as_ref().map(|r| r.or_number.clone()),
                amount_paid_centavos: receipt.as_ref().map_or(0, |r| r.amount_centavos),
                office: self.office().to_owned(),
            },
            issued_at: now,
            valid_until: now + Duration::days(self.config.certificate_validity_days),
            signed_by: None,
            signed_at: None,
            released_by: None,
            released_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.insert(&mut cert).await?;

        let cert_id = cert.id.clone();
        let app = match self
            .fire(caller, id, event, None, |app| {
                app.certificate_id = Some(cert_id.clone());
                Ok(())
            })
            .await
        {
            Ok(app) => app,
            Err(e) => {
                if let Err(cleanup) = self.remove::<Certificate>(&cert.id).await {
                    warn!(
                        certificate = %cert.id,
                        error = %cleanup,
                        "failed to remove orphaned certificate"
                    );
                }
                return Err(e);
            }
        };

        info!(
            certificate = %cert.id,
            number = %cert.certificate_number,
            "certificate generated"
        );
        self.notify_transition(caller, &app, event).await;
        Ok(cert)
    }

    /// PENR officer signature; the permit is then ready for release.
    #[instrument(skip(self, caller), fields(caller = %caller.id, application = %id))]
    pub async fn sign_certificate(
        &self,
        caller: &Caller,
        id: &ApplicationId,
    ) -> Result<Certificate, WorkflowError> {
        let (_, cert) = self
            .advance_certificate(
                caller,
                id,
                ApplicationEvent::SignCertificate,
                CertificateEvent::Sign,
            )
            .await?;
        Ok(cert)
    }

    /// Hand the signed permit to the applicant and close the application.
    #[instrument(skip(self, caller), fields(caller = %caller.id, application = %id))]
    pub async fn release(
        &self,
        caller: &Caller,
        id: &ApplicationId,
    ) -> Result<Application, WorkflowError> {
        let (app, _) = self
            .advance_certificate(
                caller,
                id,
                ApplicationEvent::Release,
                CertificateEvent::Release,
            )
            .await?;
        Ok(app)
    }

    pub async fn get_certificate(
        &self,
        caller: &Caller,
        id: &ApplicationId,
    ) -> Result<Certificate, WorkflowError> {
        let app = self.visible_application(caller, id).await?;
        self.certificate_of(&app).await
    }

    /// The certificate as a standalone HTML document.
    pub async fn render_certificate(
        &self,
        caller: &Caller,
        id: &ApplicationId,
    ) -> Result<String, WorkflowError> {
        let cert = self.get_certificate(caller, id).await?;
        self.templates.render(&cert, self.office())
    }
}
