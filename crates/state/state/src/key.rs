use serde::{Deserialize, Serialize};

/// The kind of document being stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Application,
    OrderOfPayment,
    Certificate,
    Notification,
    User,
    /// Uploaded file contents.
    Blob,
    /// Sequence counters for human-readable numbers.
    Counter,
    /// Issued JWT ids, kept until the token expires or is revoked.
    Token,
    Custom(String),
}

impl KeyKind {
    /// Return a string representation of the key kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Application => "application",
            Self::OrderOfPayment => "order_of_payment",
            Self::Certificate => "certificate",
            Self::Notification => "notification",
            Self::User => "user",
            Self::Blob => "blob",
            Self::Counter => "counter",
            Self::Token => "token",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key used to address documents in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    /// Office code (e.g. `PENRO-NV`), one per deployment.
    pub office: String,
    pub kind: KeyKind,
    pub id: String,
}

impl StateKey {
    /// Create a new state key.
    #[must_use]
    pub fn new(office: impl Into<String>, kind: KeyKind, id: impl Into<String>) -> Self {
        Self {
            office: office.into(),
            kind,
            id: id.into(),
        }
    }

    /// Return a canonical string representation: `office:kind:id`
    #[must_use]
    pub fn canonical(&self) -> String {
        format!("{}:{}:{}", self.office, self.kind, self.id)
    }

    /// The prefix shared by every canonical key of `kind` in `office`.
    #[must_use]
    pub fn scan_prefix(office: &str, kind: &KeyKind) -> String {
        format!("{office}:{kind}:")
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}
