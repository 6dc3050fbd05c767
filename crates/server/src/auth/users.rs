//! Accounts stored as JSON documents in the state store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use permittree_core::Role;
use permittree_state::{KeyKind, StateKey, StateStore};

use super::AUTH_NAMESPACE;
use super::AuthError;

/// A stored account. Never returned over the API; see [`UserProfile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Whether the user asked for email copies of notifications. Stored only.
    #[serde(default)]
    pub notify_email: bool,
    pub created_at: DateTime<Utc>,
}

/// Public view of an account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    #[schema(example = "juan")]
    pub username: String,
    pub role: Role,
    #[schema(example = "Juan Dela Cruz")]
    pub full_name: String,
    pub email: Option<String>,
    pub notify_email: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            role: user.role,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            notify_email: user.notify_email,
            created_at: user.created_at,
        }
    }
}

/// Usernames are 3 to 32 characters of lowercase letters, digits, `.`, `_`
/// or `-`.
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    let ok_len = (3..=32).contains(&username.len());
    let ok_chars = username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    if ok_len && ok_chars {
        Ok(())
    } else {
        Err(AuthError::Invalid(format!(
            "invalid username '{username}': use 3-32 lowercase letters, digits, '.', '_' or '-'"
        )))
    }
}

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Account persistence on top of a [`StateStore`].
pub struct UserStore {
    state: Arc<dyn StateStore>,
}

impl UserStore {
    pub fn new(state: Arc<dyn StateStore>) -> Self {
        Self { state }
    }

    fn key(username: &str) -> StateKey {
        StateKey::new(AUTH_NAMESPACE, KeyKind::User, username)
    }

    pub async fn get(&self, username: &str) -> Result<Option<User>, AuthError> {
        match self.state.get(&Self::key(username)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Store a new account. Fails if the username is taken.
    pub async fn create(&self, user: &User) -> Result<(), AuthError> {
        let json = serde_json::to_string(user)?;
        if self
            .state
            .check_and_set(&Self::key(&user.username), &json, None)
            .await?
        {
            Ok(())
        } else {
            Err(AuthError::UserExists(user.username.clone()))
        }
    }

    /// Create or overwrite an account.
    pub async fn put(&self, user: &User) -> Result<(), AuthError> {
        let json = serde_json::to_string(user)?;
        self.state.set(&Self::key(&user.username), &json, None).await?;
        Ok(())
    }

    pub async fn delete(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.state.delete(&Self::key(username)).await?)
    }

    /// Every account, ordered by username.
    pub async fn list(&self) -> Result<Vec<User>, AuthError> {
        self.state
            .scan_keys(AUTH_NAMESPACE, KeyKind::User)
            .await?
            .into_iter()
            .map(|(_, json)| serde_json::from_str(&json).map_err(AuthError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use permittree_state_memory::MemoryStateStore;

    use super::*;

    fn user(username: &str, role: Role) -> User {
        User {
            username: username.to_owned(),
            password_hash: "hash".to_owned(),
            role,
            full_name: String::new(),
            email: None,
            notify_email: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_is_exclusive() {
        let store = UserStore::new(Arc::new(MemoryStateStore::new()));
        store.create(&user("juan", Role::Applicant)).await.unwrap();
        let err = store.create(&user("juan", Role::Admin)).await.unwrap_err();
        assert!(matches!(err, AuthError::UserExists(_)));
        assert_eq!(
            store.get("juan").await.unwrap().map(|u| u.role),
            Some(Role::Applicant)
        );
    }

    #[tokio::test]
    async fn list_put_and_delete() {
        let store = UserStore::new(Arc::new(MemoryStateStore::new()));
        store.create(&user("maria", Role::Clerk)).await.unwrap();
        store.create(&user("ana", Role::Accountant)).await.unwrap();

        let mut promoted = store.get("maria").await.unwrap().unwrap();
        promoted.role = Role::ChiefRps;
        store.put(&promoted).await.unwrap();

        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|u| (u.username, u.role))
            .collect();
        assert_eq!(
            names,
            vec![
                ("ana".to_owned(), Role::Accountant),
                ("maria".to_owned(), Role::ChiefRps)
            ]
        );

        assert!(store.delete("ana").await.unwrap());
        assert!(!store.delete("ana").await.unwrap());
    }

    #[test]
    fn username_and_password_rules() {
        assert!(validate_username("juan.dela-cruz_2").is_ok());
        assert!(validate_username("Juan").is_err());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("juan cruz").is_err());
        assert!(validate_password("short").is_err());
        assert!(validate_password("long-enough").is_ok());
    }
}
