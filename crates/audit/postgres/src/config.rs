/// Configuration for the Postgres audit store.
pub struct PostgresAuditConfig {
    /// Postgres connection URL.
    pub url: String,
    /// Table name prefix (e.g. "permittree_").
    pub prefix: String,
}

impl PostgresAuditConfig {
    /// Create a new configuration with the given URL and defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prefix: "permittree_".to_owned(),
        }
    }

    /// Set the table prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}
