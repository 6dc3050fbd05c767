pub mod config;
pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod role;
pub mod users;

use std::sync::Arc;

use chrono::Utc;
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{info, warn};

use permittree_core::Role;
use permittree_state::{StateError, StateStore};

use self::config::AuthFileConfig;
use self::identity::CallerIdentity;
use self::jwt::JwtManager;
use self::users::{User, UserStore, validate_password, validate_username};

/// State-store namespace for accounts and issued tokens.
pub const AUTH_NAMESPACE: &str = "auth";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has been revoked")]
    Revoked,

    #[error("registration is closed")]
    RegistrationClosed,

    #[error("user '{0}' already exists")]
    UserExists(String),

    #[error("user '{0}' not found")]
    UnknownUser(String),

    #[error("{0}")]
    Invalid(String),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("state error: {0}")]
    Store(#[from] StateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(e: argon2::password_hash::Error) -> Self {
        Self::Hash(e.to_string())
    }
}

/// Fields of a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub full_name: String,
    pub email: Option<String>,
    pub notify_email: bool,
}

/// Central auth provider built once at startup.
///
/// Accounts live in the state store, so applicants who register on one
/// instance can log in on any other sharing the same backend.
pub struct AuthProvider {
    jwt_manager: JwtManager,
    state_store: Arc<dyn StateStore>,
    users: UserStore,
    allow_registration: bool,
}

impl AuthProvider {
    /// Build the provider. `jwt_secret` comes from the environment or
    /// `auth.toml`.
    pub fn new(
        jwt_secret: &str,
        jwt_expiry_seconds: u64,
        allow_registration: bool,
        state_store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            jwt_manager: JwtManager::new(jwt_secret, jwt_expiry_seconds),
            users: UserStore::new(Arc::clone(&state_store)),
            state_store,
            allow_registration,
        }
    }

    /// Build the provider from a parsed `auth.toml`. The environment secret
    /// wins over the file's.
    pub fn from_config(
        config: &AuthFileConfig,
        env_secret: Option<&str>,
        state_store: Arc<dyn StateStore>,
    ) -> Result<Self, AuthError> {
        let secret = env_secret
            .map(str::to_owned)
            .or_else(|| {
                config
                    .settings
                    .jwt_secret
                    .as_ref()
                    .map(|s| s.expose_secret().clone())
            })
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AuthError::Invalid(
                    "PERMITTREE_JWT_SECRET (or [settings] jwt_secret in auth.toml) is required \
                     when auth is enabled"
                        .into(),
                )
            })?;
        Ok(Self::new(
            &secret,
            config.settings.jwt_expiry_seconds,
            config.settings.allow_registration,
            state_store,
        ))
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    /// Create or reset the accounts listed in `auth.toml`. The file decides
    /// their role and password; profile fields left blank keep stored values.
    pub async fn seed(&self, config: &AuthFileConfig) -> Result<usize, AuthError> {
        for entry in &config.users {
            validate_username(&entry.username)?;
            let role = Role::from_str_loose(&entry.role).ok_or_else(|| {
                AuthError::Invalid(format!(
                    "invalid role '{}' for user '{}'",
                    entry.role, entry.username
                ))
            })?;
            let existing = self.users.get(&entry.username).await?;
            let user = User {
                username: entry.username.clone(),
                password_hash: entry.password_hash.expose_secret().clone(),
                role,
                full_name: if entry.full_name.is_empty() {
                    existing.as_ref().map(|u| u.full_name.clone()).unwrap_or_default()
                } else {
                    entry.full_name.clone()
                },
                email: entry
                    .email
                    .clone()
                    .or_else(|| existing.as_ref().and_then(|u| u.email.clone())),
                notify_email: existing.as_ref().is_some_and(|u| u.notify_email),
                created_at: existing.as_ref().map_or_else(Utc::now, |u| u.created_at),
            };
            self.users.put(&user).await?;
        }
        info!(users = config.users.len(), "seeded accounts from auth config");
        Ok(config.users.len())
    }

    /// Create an account with a freshly hashed password.
    pub async fn create_user(&self, new: NewUser) -> Result<User, AuthError> {
        validate_username(&new.username)?;
        validate_password(&new.password)?;
        let user = User {
            username: new.username,
            password_hash: password::hash_password(&new.password)?,
            role: new.role,
            full_name: new.full_name.trim().to_owned(),
            email: new.email.filter(|e| !e.trim().is_empty()),
            notify_email: new.notify_email,
            created_at: Utc::now(),
        };
        self.users.create(&user).await?;
        info!(username = %user.username, role = %user.role, "account created");
        Ok(user)
    }

    /// Self-service signup. Always creates an applicant.
    pub async fn register(&self, mut new: NewUser) -> Result<User, AuthError> {
        if !self.allow_registration {
            return Err(AuthError::RegistrationClosed);
        }
        new.role = Role::Applicant;
        self.create_user(new).await
    }

    /// Authenticate a user by username/password and issue a JWT.
    ///
    /// Returns the token, its lifetime in seconds and the account.
    pub async fn login(
        &self,
        username: &str,
        password_candidate: &str,
    ) -> Result<(String, u64, User), AuthError> {
        let Some(user) = self.users.get(username).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !password::verify_password(&user.password_hash, password_candidate) {
            warn!(username, "failed login");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self
            .jwt_manager
            .issue_token(&user.username, user.role, &self.state_store)
            .await?;
        Ok((token, self.jwt_manager.expiry_seconds(), user))
    }

    /// Validate a JWT and return the caller identity.
    ///
    /// The role is re-read from the account so role changes and deletions
    /// take effect on existing sessions.
    pub async fn validate_jwt(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        let claims = self
            .jwt_manager
            .validate_token(token, &self.state_store)
            .await?;
        let user = self
            .users
            .get(&claims.sub)
            .await?
            .ok_or_else(|| AuthError::InvalidToken("account no longer exists".into()))?;
        Ok(CallerIdentity {
            id: user.username,
            role: user.role,
            auth_method: "jwt".to_owned(),
        })
    }

    /// Revoke a JWT token (logout).
    pub async fn revoke_jwt(&self, token: &str) -> Result<(), AuthError> {
        self.jwt_manager
            .revoke_token(token, &self.state_store)
            .await?;
        Ok(())
    }

    pub async fn set_role(&self, username: &str, role: Role) -> Result<User, AuthError> {
        let mut user = self
            .users
            .get(username)
            .await?
            .ok_or_else(|| AuthError::UnknownUser(username.to_owned()))?;
        user.role = role;
        self.users.put(&user).await?;
        info!(username, role = %role, "role changed");
        Ok(user)
    }

    pub async fn delete_user(&self, username: &str) -> Result<(), AuthError> {
        if self.users.delete(username).await? {
            info!(username, "account deleted");
            Ok(())
        } else {
            Err(AuthError::UnknownUser(username.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use permittree_state_memory::MemoryStateStore;

    use super::*;

    fn provider(allow_registration: bool) -> AuthProvider {
        AuthProvider::new(
            "test-secret",
            60,
            allow_registration,
            Arc::new(MemoryStateStore::new()),
        )
    }

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_owned(),
            password: "kalikasan-2025".to_owned(),
            role: Role::Admin,
            full_name: "Juan Dela Cruz".to_owned(),
            email: None,
            notify_email: false,
        }
    }

    #[tokio::test]
    async fn registration_always_yields_applicants() {
        let auth = provider(true);
        let user = auth.register(new_user("juan")).await.unwrap();
        assert_eq!(user.role, Role::Applicant);

        let err = provider(false).register(new_user("juan")).await.unwrap_err();
        assert!(matches!(err, AuthError::RegistrationClosed));
    }

    #[tokio::test]
    async fn login_follows_role_changes_and_deletion() {
        let auth = provider(true);
        auth.register(new_user("juan")).await.unwrap();

        assert!(matches!(
            auth.login("juan", "wrong-password").await.unwrap_err(),
            AuthError::InvalidCredentials
        ));
        let (token, expires_in, _) = auth.login("juan", "kalikasan-2025").await.unwrap();
        assert_eq!(expires_in, 60);
        assert_eq!(auth.validate_jwt(&token).await.unwrap().role, Role::Applicant);

        auth.set_role("juan", Role::Clerk).await.unwrap();
        assert_eq!(auth.validate_jwt(&token).await.unwrap().role, Role::Clerk);

        auth.delete_user("juan").await.unwrap();
        assert!(auth.validate_jwt(&token).await.is_err());
    }

    #[tokio::test]
    async fn seeding_overwrites_role_and_keeps_profile() {
        let auth = provider(true);
        auth.register(new_user("maria")).await.unwrap();

        let config: AuthFileConfig = toml::from_str(&format!(
            r#"
            [[users]]
            username = "maria"
            password_hash = "{}"
            role = "chief_rps"
            "#,
            password::hash_password("another-password").unwrap()
        ))
        .unwrap();
        assert_eq!(auth.seed(&config).await.unwrap(), 1);

        let user = auth.users().get("maria").await.unwrap().unwrap();
        assert_eq!(user.role, Role::ChiefRps);
        assert_eq!(user.full_name, "Juan Dela Cruz");
        assert!(auth.login("maria", "another-password").await.is_ok());
    }

    #[test]
    fn env_secret_is_required_without_file_secret() {
        let state: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let config = AuthFileConfig::default();
        assert!(AuthProvider::from_config(&config, None, Arc::clone(&state)).is_err());
        assert!(AuthProvider::from_config(&config, Some("s3cret"), state).is_ok());
    }
}
