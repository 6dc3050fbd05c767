//! Human-readable document numbers.
//!
//! Each number comes from a per-prefix, per-year counter in the state store,
//! so numbers are unique by construction and restart at 1 every January.

use chrono::{DateTime, Datelike, Utc};

use permittree_core::PermitType;

use crate::error::WorkflowError;
use crate::workflow::Workflow;

fn format_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{prefix}-{year}-{sequence:04}")
}

impl Workflow {
    async fn allocate(&self, prefix: &str, at: DateTime<Utc>) -> Result<String, WorkflowError> {
        let year = at.year();
        let sequence = self.next_sequence(&format!("{prefix}-{year}")).await?;
        Ok(format_number(prefix, year, sequence))
    }

    /// Application number, e.g. `CSAW-2025-0007`.
    pub(crate) async fn allocate_custom_id(
        &self,
        permit_type: PermitType,
        at: DateTime<Utc>,
    ) -> Result<String, WorkflowError> {
        self.allocate(permit_type.code(), at).await
    }

    /// Order-of-payment control number, e.g. `OOP-2025-0012`.
    pub(crate) async fn allocate_control_number(
        &self,
        at: DateTime<Utc>,
    ) -> Result<String, WorkflowError> {
        self.allocate("OOP", at).await
    }

    /// Certificate number, e.g. `CSAW-CERT-2025-0003`.
    pub(crate) async fn allocate_certificate_number(
        &self,
        permit_type: PermitType,
        at: DateTime<Utc>,
    ) -> Result<String, WorkflowError> {
        self.allocate(&format!("{}-CERT", permit_type.code()), at)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(format_number("CSAW", 2025, 7), "CSAW-2025-0007");
        assert_eq!(format_number("OOP", 2025, 12_345), "OOP-2025-12345");
        assert_eq!(format_number("TCP-CERT", 2026, 1), "TCP-CERT-2026-0001");
    }
}
