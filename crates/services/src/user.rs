//! User accounts and bearer-token auth.
//!
//! Passwords are stored as `salt$hash` where both halves are base64 and the
//! hash is SHA-256 over salt bytes followed by the password. Access tokens
//! are HS256 JWTs with a finite lifetime.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use simsvc_domain::{ServiceError, ServiceResult, User, UserRepository};
use tracing::{info, instrument};
use uuid::Uuid;

const SALT_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_secret: String,
    pub token_ttl_secs: u64,
}

impl AuthConfig {
    pub fn new(token_secret: impl Into<String>, token_ttl_secs: u64) -> Self {
        Self {
            token_secret: token_secret.into(),
            token_ttl_secs,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String,
    email: String,
    exp: i64,
    iat: i64,
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    auth: AuthConfig,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, auth: AuthConfig) -> Self {
        Self { users, auth }
    }

    /// Creates an account; a duplicate email surfaces as `EmailTaken`.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        email: String,
        password: &str,
        full_name: String,
    ) -> ServiceResult<User> {
        let user = User::new(email, hash_password(password), full_name);
        let user = self.users.create(&user).await?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Verifies credentials. Unknown email and wrong password produce the
    /// same error; a disabled account is rejected after the password check.
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<User> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated("invalid credentials".into()))?;
        if !verify_password(password, &user.password_hash) {
            return Err(ServiceError::Unauthenticated("invalid credentials".into()));
        }
        if !user.is_active {
            return Err(ServiceError::AccountDisabled);
        }
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> ServiceResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::UserNotFound { id })
    }

    pub fn token_ttl_secs(&self) -> u64 {
        self.auth.token_ttl_secs
    }

    pub fn create_access_token(&self, user: &User) -> ServiceResult<String> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            exp: now + self.auth.token_ttl_secs as i64,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.auth.token_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::internal(format!("failed to sign access token: {e}")))
    }

    /// Resolves a bearer token to its active user. Invalid or expired
    /// tokens and deleted users all read as `Unauthenticated`.
    pub async fn verify_token(&self, token: &str) -> ServiceResult<User> {
        let data = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.auth.token_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ServiceError::Unauthenticated(format!("invalid token: {e}")))?;

        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServiceError::Unauthenticated("malformed token subject".into()))?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated("unknown user".into()))?;
        if !user.is_active {
            return Err(ServiceError::AccountDisabled);
        }
        Ok(user)
    }
}

pub(crate) fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let digest = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize();
    format!("{}${}", BASE64.encode(salt), BASE64.encode(digest))
}

pub(crate) fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_b64, hash_b64)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (BASE64.decode(salt_b64), BASE64.decode(hash_b64)) else {
        return false;
    };
    let digest = Sha256::new()
        .chain_update(&salt)
        .chain_update(password.as_bytes())
        .finalize();
    digest.as_slice() == expected.as_slice()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simsvc_infrastructure::InMemoryUserRepository;

    fn service() -> (UserService, Arc<InMemoryUserRepository>) {
        let repo = Arc::new(InMemoryUserRepository::new());
        let svc = UserService::new(repo.clone(), AuthConfig::new("test-secret", 1800));
        (svc, repo)
    }

    #[test]
    fn password_hash_roundtrip() {
        let stored = hash_password("hunter2");
        assert!(stored.contains('$'));
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
        assert!(!verify_password("hunter2", "garbage"));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let (svc, _) = service();
        let user = svc
            .register("a@b.c".into(), "pw", "Ada".into())
            .await
            .unwrap();
        assert_ne!(user.password_hash, "pw");

        let back = svc.authenticate("a@b.c", "pw").await.unwrap();
        assert_eq!(back.id, user.id);

        let err = svc.authenticate("a@b.c", "wrong").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
        let err = svc.authenticate("missing@b.c", "pw").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let (svc, _) = service();
        svc.register("a@b.c".into(), "pw", "Ada".into())
            .await
            .unwrap();
        let err = svc
            .register("a@b.c".into(), "pw2", "Bob".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::EmailTaken { .. }));
    }

    #[tokio::test]
    async fn token_roundtrip() {
        let (svc, _) = service();
        let user = svc
            .register("a@b.c".into(), "pw", "Ada".into())
            .await
            .unwrap();

        let token = svc.create_access_token(&user).unwrap();
        let back = svc.verify_token(&token).await.unwrap();
        assert_eq!(back.id, user.id);

        assert!(svc.verify_token("not-a-jwt").await.is_err());
    }

    #[tokio::test]
    async fn disabled_account_is_forbidden() {
        let (svc, repo) = service();
        let mut user = User::new("a@b.c".into(), hash_password("pw"), "Ada".into());
        user.is_active = false;
        repo.create(&user).await.unwrap();

        let err = svc.authenticate("a@b.c", "pw").await.unwrap_err();
        assert!(matches!(err, ServiceError::AccountDisabled));

        let token = svc.create_access_token(&user).unwrap();
        let err = svc.verify_token(&token).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccountDisabled));
    }
}
