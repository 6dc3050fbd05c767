use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use permittree_core::Role;
use permittree_state::{KeyKind, StateKey, StateStore};

use super::AUTH_NAMESPACE;
use super::AuthError;

/// JWT claims embedded in issued tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username).
    pub sub: String,
    /// Unique token ID for revocation tracking.
    pub jti: String,
    /// Role name at issuance.
    pub role: String,
    /// Expiry (seconds since epoch).
    pub exp: usize,
}

fn token_key(jti: &str) -> StateKey {
    StateKey::new(AUTH_NAMESPACE, KeyKind::Token, jti)
}

/// Manages JWT issuance and validation with state-store-backed revocation.
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: u64,
}

impl JwtManager {
    pub fn new(secret: &str, expiry_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        }
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }

    /// Issue a JWT for `username`, storing the `jti` in the state store.
    pub async fn issue_token(
        &self,
        username: &str,
        role: Role,
        state_store: &Arc<dyn StateStore>,
    ) -> Result<String, AuthError> {
        let jti = uuid::Uuid::new_v4().to_string();
        #[allow(clippy::cast_possible_truncation)]
        let exp = jsonwebtoken::get_current_timestamp() as usize + self.expiry_seconds as usize;

        let claims = Claims {
            sub: username.to_owned(),
            jti: jti.clone(),
            role: role.to_string(),
            exp,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(format!("JWT encoding failed: {e}")))?;

        // Store jti with a TTL so expired tokens clean themselves up.
        state_store
            .set(
                &token_key(&jti),
                username,
                Some(Duration::from_secs(self.expiry_seconds)),
            )
            .await?;

        Ok(token)
    }

    /// Validate a JWT: check signature, expiry, and that the `jti` still exists
    /// in the state store (not revoked). Returns the claims.
    pub async fn validate_token(
        &self,
        token: &str,
        state_store: &Arc<dyn StateStore>,
    ) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;

        if state_store.get(&token_key(&claims.jti)).await?.is_none() {
            return Err(AuthError::Revoked);
        }
        Ok(claims)
    }

    /// Revoke a token by deleting its `jti` from the state store.
    pub async fn revoke_token(
        &self,
        token: &str,
        state_store: &Arc<dyn StateStore>,
    ) -> Result<String, AuthError> {
        let jti = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims
            .jti;
        state_store.delete(&token_key(&jti)).await?;
        Ok(jti)
    }
}

#[cfg(test)]
mod tests {
    use permittree_state_memory::MemoryStateStore;

    use super::*;

    fn store() -> Arc<dyn StateStore> {
        Arc::new(MemoryStateStore::new())
    }

    #[tokio::test]
    async fn issued_tokens_validate_until_revoked() {
        let state = store();
        let jwt = JwtManager::new("test-secret", 60);

        let token = jwt.issue_token("juan", Role::Applicant, &state).await.unwrap();
        let claims = jwt.validate_token(&token, &state).await.unwrap();
        assert_eq!(claims.sub, "juan");
        assert_eq!(claims.role, "applicant");

        jwt.revoke_token(&token, &state).await.unwrap();
        let err = jwt.validate_token(&token, &state).await.unwrap_err();
        assert!(matches!(err, AuthError::Revoked));
    }

    #[tokio::test]
    async fn foreign_signatures_are_rejected() {
        let state = store();
        let token = JwtManager::new("one", 60)
            .issue_token("juan", Role::Applicant, &state)
            .await
            .unwrap();
        let err = JwtManager::new("two", 60)
            .validate_token(&token, &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }
}
