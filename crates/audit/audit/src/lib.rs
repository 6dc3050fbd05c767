pub mod error;
pub mod record;
pub mod store;

pub use error::AuditError;
pub use record::{AuditPage, AuditQuery, AuditSubject, TransitionRecord};
pub use store::AuditStore;
