//! Orders of payment: issuing, signing, proof of payment and receipts.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use permittree_audit::{AuditSubject, TransitionRecord};
use permittree_core::state_machine::{application_transition, oop_transition};
use permittree_core::{
    Application, ApplicationEvent, ApplicationId, BillItem, Caller, Notification,
    NotificationKind, OfficialReceipt, OopEvent, OopId, OopSignatures, OopStatus,
    OrderOfPayment, PaymentMethod, PaymentProof, Recipient, Role, format_pesos, total_centavos,
};
use permittree_state::KeyKind;

use crate::error::WorkflowError;
use crate::machine::{authorize, next_oop_status};
use crate::workflow::{UploadedFile, Workflow, ensure_visible};

/// Filters for [`Workflow::list_orders_of_payment`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema, utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct OopFilter {
    pub status: Option<OopStatus>,
    pub application_id: Option<String>,
    /// Owner username. Ignored for applicants.
    pub owner: Option<String>,
}

impl OopFilter {
    fn matches(&self, oop: &OrderOfPayment) -> bool {
        self.status.is_none_or(|s| s == oop.status)
            && self
                .application_id
                .as_ref()
                .is_none_or(|id| *id == oop.application_id.as_str())
            && self.owner.as_ref().is_none_or(|o| *o == oop.owner)
    }
}

/// Evidence of payment as submitted by the applicant.
#[derive(Debug, Clone)]
pub struct ProofSubmission {
    pub method: PaymentMethod,
    pub reference_number: String,
    pub amount_centavos: i64,
    pub file: Option<UploadedFile>,
}

fn validate_bill_items(items: &[BillItem]) -> Result<(), WorkflowError> {
    let mut problems = Vec::new();
    if items.is_empty() {
        problems.push("at least one bill item is required".to_owned());
    }
    for (i, item) in items.iter().enumerate() {
        if item.description.trim().is_empty() {
            problems.push(format!("bill_items[{i}].description"));
        }
        if item.amount_centavos <= 0 {
            problems.push(format!("bill_items[{i}].amount_centavos must be positive"));
        }
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation(problems))
    }
}

fn oop_record(
    office: &str,
    oop: &OrderOfPayment,
    event: OopEvent,
    from: OopStatus,
    caller: &Caller,
) -> TransitionRecord {
    TransitionRecord::new(
        office,
        AuditSubject::OrderOfPayment,
        oop.id.as_str(),
        oop.application_id.as_str(),
        event.as_str(),
        from.as_str(),
        oop.status.as_str(),
        caller.id.as_str(),
        caller.role.as_str(),
    )
}

fn oop_notification(
    oop: &OrderOfPayment,
    recipient: Recipient,
    kind: NotificationKind,
    message: String,
) -> Notification {
    Notification::new(
        recipient,
        kind,
        Some(oop.application_id.clone()),
        message,
        Utc::now(),
    )
    .with_metadata(json!({
        "oop_id": oop.id,
        "control_number": oop.control_number,
        "status": oop.status,
        "total_centavos": oop.total_centavos,
    }))
}

impl Workflow {
    async fn visible_oop(
        &self,
        caller: &Caller,
        id: &OopId,
    ) -> Result<OrderOfPayment, WorkflowError> {
        let oop: OrderOfPayment = self.fetch(id).await?;
        ensure_visible(caller, &oop.owner, &format!("order of payment {id}"))?;
        Ok(oop)
    }

    /// Bill an application sitting at accounting.
    ///
    /// Without explicit items the configured fee schedule for the permit type
    /// is used. The order starts unsigned and the application moves to
    /// payment.
    #[instrument(skip(self, caller, bill_items), fields(caller = %caller.id, application = %id))]
    pub async fn issue_order_of_payment(
        &self,
        caller: &Caller,
        id: &ApplicationId,
        bill_items: Option<Vec<BillItem>>,
    ) -> Result<OrderOfPayment, WorkflowError> {
        let app = self.visible_application(caller, id).await?;
        let event = ApplicationEvent::IssueOop;
        let t = application_transition(app.status, app.current_stage, event)?;
        authorize(&t.actor, caller, &app.owner, event.as_str())?;

        let items = bill_items.unwrap_or_else(|| self.config.fees_for(app.permit_type));
        validate_bill_items(&items)?;

        let now = Utc::now();
        let mut oop = OrderOfPayment {
            id: OopId::generate(),
            control_number: self.allocate_control_number(now).await?,
            application_id: app.id.clone(),
            custom_id: app.custom_id.clone().unwrap_or_else(|| app.id.to_string()),
            applicant_name: app.applicant.full_name.clone(),
            owner: app.owner.clone(),
            total_centavos: total_centavos(&items),
            bill_items: items,
            status: OopStatus::PendingSignature,
            signatures: OopSignatures::default(),
            payment_proof: None,
            official_receipt: None,
            due_at: now + Duration::days(self.config.payment_due_days),
            reminder_sent: false,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.insert(&mut oop).await?;

        let oop_id = oop.id.clone();
        let app = match self
            .fire(caller, id, event, None, |app| {
                app.oop_id = Some(oop_id.clone());
                Ok(())
            })
            .await
        {
            Ok(app) => app,
            Err(e) => {
                if let Err(cleanup) = self.remove::<OrderOfPayment>(&oop.id).await {
                    warn!(
                        oop = %oop.id,
                        error = %cleanup,
                        "failed to remove orphaned order of payment"
                    );
                }
                return Err(e);
            }
        };

        info!(
            oop = %oop.id,
            control_number = %oop.control_number,
            total = %format_pesos(oop.total_centavos),
            "order of payment issued"
        );
        self.notify_transition(caller, &app, event).await;
        Ok(oop)
    }

    /// Orders of payment visible to the caller, newest first.
    pub async fn list_orders_of_payment(
        &self,
        caller: &Caller,
        filter: &OopFilter,
    ) -> Result<Vec<OrderOfPayment>, WorkflowError> {
        let mut oops: Vec<OrderOfPayment> = self
            .scan::<OrderOfPayment>()
            .await?
            .into_iter()
            .filter(|oop| caller.role.is_personnel() || caller.is(&oop.owner))
            .filter(|oop| filter.matches(oop))
            .collect();
        oops.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(oops)
    }

    pub async fn get_order_of_payment(
        &self,
        caller: &Caller,
        id: &OopId,
    ) -> Result<OrderOfPayment, WorkflowError> {
        self.visible_oop(caller, id).await
    }

    /// Add the caller's signature. The order becomes payable once both the
    /// Chief RPS and the PENR officer have signed, in either order.
    #[instrument(skip(self, caller), fields(caller = %caller.id, oop = %id))]
    pub async fn sign_order_of_payment(
        &self,
        caller: &Caller,
        id: &OopId,
    ) -> Result<OrderOfPayment, WorkflowError> {
        self.visible_oop(caller, id).await?;
        let now = Utc::now();
        let (oop, from) = self
            .modify::<OrderOfPayment, _, _>(id, |oop| {
                let t = oop_transition(oop.status, OopEvent::Sign)?;
                authorize(&t.actor, caller, &oop.owner, OopEvent::Sign.as_str())?;
                if !oop.signatures.sign(caller.role, &caller.id, now) {
                    return Err(WorkflowError::validation(format!(
                        "order of payment {} already carries the {} signature",
                        oop.control_number, caller.role
                    )));
                }
                let from = oop.status;
                oop.status = next_oop_status(from, OopEvent::Sign, oop.signatures.is_complete())?;
                oop.updated_at = now;
                Ok(from)
            })
            .await?;

        self.record(oop_record(self.office(), &oop, OopEvent::Sign, from, caller))
            .await;

        if oop.status == OopStatus::AwaitingPayment {
            info!(oop = %oop.id, "order of payment fully signed");
            let message = format!(
                "Order of payment {} for application {} is ready: please pay {} on or before {}",
                oop.control_number,
                oop.custom_id,
                format_pesos(oop.total_centavos),
                oop.due_at.format("%B %-d, %Y")
            );
            self.notify(
                &caller.id,
                oop_notification(
                    &oop,
                    Recipient::user(oop.owner.clone()),
                    NotificationKind::OrderOfPaymentSigned,
                    message,
                ),
            )
            .await;
        }
        Ok(oop)
    }

    /// Record the applicant's proof of payment for the bill collector to
    /// review. A rejected proof may be replaced by a new one.
    #[instrument(skip(self, caller, submission), fields(caller = %caller.id, oop = %id))]
    pub async fn submit_payment_proof(
        &self,
        caller: &Caller,
        id: &OopId,
        submission: ProofSubmission,
    ) -> Result<OrderOfPayment, WorkflowError> {
        let oop = self.visible_oop(caller, id).await?;
        let event = OopEvent::SubmitProof;
        let t = oop_transition(oop.status, event)?;
        authorize(&t.actor, caller, &oop.owner, event.as_str())?;

        let reference_number = submission.reference_number.trim().to_owned();
        let mut problems = Vec::new();
        if reference_number.is_empty() {
            problems.push("reference_number".to_owned());
        }
        if submission.amount_centavos <= 0 {
            problems.push("amount_centavos must be positive".to_owned());
        }
        if !problems.is_empty() {
            return Err(WorkflowError::Validation(problems));
        }

        let blob = match submission.file {
            Some(file) => Some(self.store_upload(&oop.owner, file).await?),
            None => None,
        };

        let now = Utc::now();
        let result = self
            .modify::<OrderOfPayment, _, _>(id, |oop| {
                let t = oop_transition(oop.status, event)?;
                authorize(&t.actor, caller, &oop.owner, event.as_str())?;
                let from = oop.status;
                let previous = oop.payment_proof.replace(PaymentProof {
                    method: submission.method,
                    reference_number: reference_number.clone(),
                    amount_centavos: submission.amount_centavos,
                    blob: blob.clone(),
                    submitted_at: now,
                    review_remarks: None,
                });
                oop.status = t.to;
                oop.updated_at = now;
                Ok((from, previous))
            })
            .await;

        let (oop, (from, previous)) = match result {
            Ok(done) => done,
            Err(e) => {
                if let Some(ref file) = blob {
                    self.discard_blob(file).await;
                }
                return Err(e);
            }
        };
        if let Some(old) = previous.and_then(|p| p.blob) {
            self.discard_blob(&old).await;
        }

        self.record(oop_record(self.office(), &oop, event, from, caller))
            .await;
        let message = format!(
            "Proof of payment for order {} ({}) was submitted for review",
            oop.control_number, oop.custom_id
        );
        self.notify(
            &caller.id,
            oop_notification(
                &oop,
                Recipient::Role(Role::BillCollector),
                NotificationKind::PaymentProofSubmitted,
                message,
            ),
        )
        .await;
        Ok(oop)
    }

    /// Approve or reject the submitted proof. Rejections need remarks.
    #[instrument(skip(self, caller, remarks), fields(caller = %caller.id, oop = %id, approve))]
    pub async fn review_payment_proof(
        &self,
        caller: &Caller,
        id: &OopId,
        approve: bool,
        remarks: Option<&str>,
    ) -> Result<OrderOfPayment, WorkflowError> {
        self.visible_oop(caller, id).await?;
        let remarks = remarks.map(str::trim).filter(|r| !r.is_empty()).map(str::to_owned);
        let (event, kind) = if approve {
            (OopEvent::ApproveProof, NotificationKind::PaymentProofApproved)
        } else {
            (OopEvent::RejectProof, NotificationKind::PaymentProofRejected)
        };
        if !approve && remarks.is_none() {
            return Err(WorkflowError::validation(
                "remarks are required to reject a payment proof",
            ));
        }

        let now = Utc::now();
        let (oop, from) = self
            .modify::<OrderOfPayment, _, _>(id, |oop| {
                let t = oop_transition(oop.status, event)?;
                authorize(&t.actor, caller, &oop.owner, event.as_str())?;
                let from = oop.status;
                if let Some(ref mut proof) = oop.payment_proof {
                    proof.review_remarks.clone_from(&remarks);
                }
                oop.status = t.to;
                oop.updated_at = now;
                Ok(from)
            })
            .await?;

        self.record(
            oop_record(self.office(), &oop, event, from, caller).with_remarks(remarks.clone()),
        )
        .await;

        let message = if approve {
            format!(
                "Your payment for order {} was verified; the official receipt will follow",
                oop.control_number
            )
        } else {
            format!(
                "Your proof of payment for order {} was rejected: {}",
                oop.control_number,
                remarks.as_deref().unwrap_or_default()
            )
        };
        self.notify(
            &caller.id,
            oop_notification(&oop, Recipient::user(oop.owner.clone()), kind, message),
        )
        .await;
        Ok(oop)
    }

    /// Issue the official receipt for an approved proof. This completes the
    /// order and confirms payment on the application.
    #[instrument(skip(self, caller), fields(caller = %caller.id, oop = %id))]
    pub async fn issue_official_receipt(
        &self,
        caller: &Caller,
        id: &OopId,
        or_number: &str,
    ) -> Result<OrderOfPayment, WorkflowError> {
        let or_number = or_number.trim();
        if or_number.is_empty() {
            return Err(WorkflowError::validation("or_number is required"));
        }

        let oop = self.visible_oop(caller, id).await?;
        let event = OopEvent::IssueReceipt;
        let t = oop_transition(oop.status, event)?;
        authorize(&t.actor, caller, &oop.owner, event.as_str())?;
        let app: Application = self.fetch(&oop.application_id).await?;
        application_transition(app.status, app.current_stage, ApplicationEvent::ConfirmPayment)?;

        // Receipt numbers are unique across the office.
        let receipt_key = self.key(KeyKind::Custom("official_receipt".into()), or_number);
        if !self
            .state
            .check_and_set(&receipt_key, oop.id.as_str(), None)
            .await?
        {
            return Err(WorkflowError::Conflict(format!(
                "official receipt {or_number} was already issued"
            )));
        }

        let now = Utc::now();
        let result = self
            .modify::<OrderOfPayment, _, _>(id, |oop| {
                let t = oop_transition(oop.status, event)?;
                authorize(&t.actor, caller, &oop.owner, event.as_str())?;
                let from = oop.status;
                let amount = oop
                    .payment_proof
                    .as_ref()
                    .map_or(oop.total_centavos, |p| p.amount_centavos);
                oop.official_receipt = Some(OfficialReceipt {
                    or_number: or_number.to_owned(),
                    issued_by: caller.id.clone(),
                    issued_at: now,
                    amount_centavos: amount,
                });
                oop.status = t.to;
                oop.updated_at = now;
                Ok(from)
            })
            .await;
        let (oop, from) = match result {
            Ok(done) => done,
            Err(e) => {
                if let Err(cleanup) = self.state.delete(&receipt_key).await {
                    warn!(error = %cleanup, "failed to release receipt number");
                }
                return Err(e);
            }
        };

        self.record(oop_record(self.office(), &oop, event, from, caller))
            .await;
        info!(oop = %oop.id, or_number, "official receipt issued");

        let app = self
            .fire(
                caller,
                &oop.application_id,
                ApplicationEvent::ConfirmPayment,
                None,
                |_| Ok(()),
            )
            .await?;
        self.notify_transition(caller, &app, ApplicationEvent::ConfirmPayment)
            .await;
        Ok(oop)
    }
}
