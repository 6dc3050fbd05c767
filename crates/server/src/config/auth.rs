use serde::Deserialize;

/// Reference to the auth config file from `permittree.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct AuthRefConfig {
    /// Whether JWT authentication is enforced.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the auth config file (`auth.toml`), relative to
    /// `permittree.toml` or absolute.
    pub config_path: Option<String>,
    /// Overrides `[settings] jwt_expiry_seconds` from `auth.toml`.
    pub jwt_expiry_seconds: Option<u64>,
    /// Overrides `[settings] allow_registration` from `auth.toml`.
    pub allow_registration: Option<bool>,
}
