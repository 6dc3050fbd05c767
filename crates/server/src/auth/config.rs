use secrecy::SecretString;
use serde::Deserialize;

/// Top-level schema for `auth.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct AuthFileConfig {
    #[serde(default)]
    pub settings: AuthSettings,
    /// Accounts created (or reset) at startup, typically office personnel.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// Global auth settings.
#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    /// JWT signing secret. `PERMITTREE_JWT_SECRET` takes precedence.
    ///
    /// Wrapped in [`SecretString`] so it is redacted in logs.
    #[serde(default)]
    pub jwt_secret: Option<SecretString>,
    /// JWT token lifetime in seconds.
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_seconds: u64,
    /// Whether members of the public may create applicant accounts.
    #[serde(default = "default_allow_registration")]
    pub allow_registration: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiry_seconds: default_jwt_expiry(),
            allow_registration: default_allow_registration(),
        }
    }
}

fn default_jwt_expiry() -> u64 {
    3600
}

fn default_allow_registration() -> bool {
    true
}

/// A seeded account.
#[derive(Debug, Deserialize)]
pub struct UserConfig {
    pub username: String,
    /// Argon2 PHC string, as printed by `permittree-server hash-password`.
    ///
    /// Wrapped in [`SecretString`] so it is redacted in logs.
    pub password_hash: SecretString,
    /// Role: `"clerk"`, `"technical_staff"`, `"chief_rps"`, `"accountant"`,
    /// `"bill_collector"`, `"penr_officer"`, `"admin"` or `"applicant"`.
    pub role: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn parses_seeded_users() {
        let config: AuthFileConfig = toml::from_str(
            r#"
            [settings]
            jwt_secret = "change-me"
            jwt_expiry_seconds = 600

            [[users]]
            username = "clerk1"
            password_hash = "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
            role = "clerk"
            full_name = "Maria Santos"
            "#,
        )
        .unwrap();

        assert_eq!(config.settings.jwt_expiry_seconds, 600);
        assert!(config.settings.allow_registration);
        assert_eq!(
            config.settings.jwt_secret.as_ref().map(|s| s.expose_secret().as_str()),
            Some("change-me")
        );
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.users[0].role, "clerk");
        assert!(config.users[0].email.is_none());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: AuthFileConfig = toml::from_str("").unwrap();
        assert!(config.settings.jwt_secret.is_none());
        assert_eq!(config.settings.jwt_expiry_seconds, 3600);
        assert!(config.users.is_empty());
    }
}
