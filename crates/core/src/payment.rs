use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::FileRef;
use crate::role::Role;
use crate::state_machine::OopStatus;
use crate::types::{ApplicationId, OopId};

/// A single line on an order of payment. Amounts are in centavos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BillItem {
    pub description: String,
    #[serde(default)]
    pub legal_basis: String,
    pub amount_centavos: i64,
}

impl BillItem {
    pub fn new(
        description: impl Into<String>,
        legal_basis: impl Into<String>,
        amount_centavos: i64,
    ) -> Self {
        Self {
            description: description.into(),
            legal_basis: legal_basis.into(),
            amount_centavos,
        }
    }
}

/// Sum of the line amounts.
pub fn total_centavos(items: &[BillItem]) -> i64 {
    items.iter().map(|item| item.amount_centavos).sum()
}

/// Render centavos as pesos, e.g. `₱1,250.00`.
pub fn format_pesos(centavos: i64) -> String {
    let sign = if centavos < 0 { "-" } else { "" };
    let abs = centavos.unsigned_abs();
    let pesos = (abs / 100).to_string();
    let mut grouped = String::with_capacity(pesos.len() + pesos.len() / 3);
    for (i, ch) in pesos.chars().enumerate() {
        if i > 0 && (pesos.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}₱{grouped}.{:02}", abs % 100)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Signature {
    pub signed_by: String,
    pub signed_at: DateTime<Utc>,
}

/// The two signatures an order of payment needs before it can be paid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OopSignatures {
    /// Chief RPS/TSD.
    #[serde(default)]
    pub chief_rps: Option<Signature>,
    #[serde(default)]
    pub penr_officer: Option<Signature>,
}

impl OopSignatures {
    pub fn is_complete(&self) -> bool {
        self.chief_rps.is_some() && self.penr_officer.is_some()
    }

    /// Record a signature in the slot belonging to `role`.
    ///
    /// Admins fill whichever slot is still empty. Returns `false` when the
    /// slot is already signed or the role is not a signatory.
    pub fn sign(&mut self, role: Role, signed_by: &str, at: DateTime<Utc>) -> bool {
        let slot = match role {
            Role::ChiefRps => &mut self.chief_rps,
            Role::PenrOfficer => &mut self.penr_officer,
            Role::Admin if self.chief_rps.is_none() => &mut self.chief_rps,
            Role::Admin => &mut self.penr_officer,
            _ => return false,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(Signature {
            signed_by: signed_by.to_owned(),
            signed_at: at,
        });
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankDeposit,
    OnlineTransfer,
    EWallet,
    Check,
}

/// What the applicant submitted as evidence of payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PaymentProof {
    pub method: PaymentMethod,
    pub reference_number: String,
    pub amount_centavos: i64,
    /// Scanned deposit slip or screenshot, if attached.
    #[serde(default)]
    pub blob: Option<FileRef>,
    pub submitted_at: DateTime<Utc>,
    /// Bill collector remarks from the last review.
    #[serde(default)]
    pub review_remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OfficialReceipt {
    pub or_number: String,
    pub issued_by: String,
    pub issued_at: DateTime<Utc>,
    pub amount_centavos: i64,
}

/// An order of payment (OOP) billing an accepted application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrderOfPayment {
    pub id: OopId,
    pub control_number: String,
    pub application_id: ApplicationId,
    pub custom_id: String,
    pub applicant_name: String,
    pub owner: String,
    pub bill_items: Vec<BillItem>,
    pub total_centavos: i64,
    pub status: OopStatus,
    #[serde(default)]
    pub signatures: OopSignatures,
    #[serde(default)]
    pub payment_proof: Option<PaymentProof>,
    #[serde(default)]
    pub official_receipt: Option<OfficialReceipt>,
    pub due_at: DateTime<Utc>,
    #[serde(default)]
    pub reminder_sent: bool,
    /// Storage version, filled in on read.
    #[serde(skip)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderOfPayment {
    /// Whether the payment is past due and the applicant has not yet paid.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_unpaid() && now > self.due_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pesos_formatting() {
        assert_eq!(format_pesos(0), "₱0.00");
        assert_eq!(format_pesos(5), "₱0.05");
        assert_eq!(format_pesos(536_00), "₱536.00");
        assert_eq!(format_pesos(1_250_50), "₱1,250.50");
        assert_eq!(format_pesos(1_234_567_89), "₱1,234,567.89");
        assert_eq!(format_pesos(-100), "-₱1.00");
    }

    #[test]
    fn total_sums_items() {
        let items = vec![
            BillItem::new("Permit fee", "", 100_00),
            BillItem::new("Inventory fee", "", 360_00),
        ];
        assert_eq!(total_centavos(&items), 460_00);
        assert_eq!(total_centavos(&[]), 0);
    }

    #[test]
    fn signatures_need_both_signatories() {
        let now = Utc::now();
        let mut sigs = OopSignatures::default();
        assert!(!sigs.sign(Role::Accountant, "acct", now));
        assert!(sigs.sign(Role::PenrOfficer, "penro", now));
        assert!(!sigs.is_complete());
        assert!(!sigs.sign(Role::PenrOfficer, "penro", now));
        assert!(sigs.sign(Role::ChiefRps, "chief", now));
        assert!(sigs.is_complete());
    }

    #[test]
    fn admin_fills_the_empty_slot() {
        let now = Utc::now();
        let mut sigs = OopSignatures::default();
        assert!(sigs.sign(Role::ChiefRps, "chief", now));
        assert!(sigs.sign(Role::Admin, "root", now));
        assert_eq!(
            sigs.penr_officer.as_ref().map(|s| s.signed_by.as_str()),
            Some("root")
        );
        assert!(!sigs.sign(Role::Admin, "root", now));
    }
}
