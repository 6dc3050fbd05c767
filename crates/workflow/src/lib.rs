//! The permit application workflow: applications and their attachments,
//! orders of payment, certificates, notifications and payment reminders.
//!
//! Every mutation is a compare-and-swap on a versioned document in the
//! [`StateStore`](permittree_state::StateStore), so concurrent reviewers
//! acting on the same application cannot both win.

pub mod background;
pub mod builder;
mod certificates;
pub mod config;
mod counters;
mod documents;
pub mod error;
pub mod machine;
mod notifications;
pub mod payments;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use background::ReminderTask;
pub use builder::WorkflowBuilder;
pub use config::WorkflowConfig;
pub use documents::MAX_CAS_ATTEMPTS;
pub use error::WorkflowError;
pub use machine::{next_application_state, next_certificate_status, next_oop_status};
pub use payments::{OopFilter, ProofSubmission};
pub use workflow::{Dashboard, ListFilter, UploadedFile, Workflow};
