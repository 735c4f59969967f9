//! Presigned download URLs.
//!
//! A presigned URL embeds an HS256 token scoped to one blob key with an
//! absolute expiry. The URL points at the configured public base (which may
//! differ from the endpoint the core uses internally), where the API's
//! download route redeems the token.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use simsvc_domain::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DownloadClaims {
    /// Blob key the token grants read access to.
    sub: String,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Clone)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies single-object download tokens.
#[derive(Clone)]
pub struct DownloadTokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_base_url: String,
}

impl DownloadTokenSigner {
    pub fn new(secret: &str, public_base_url: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn presign(&self, key: &str, ttl_seconds: u64) -> ServiceResult<PresignedUrl> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(ttl_seconds as i64);
        let claims = DownloadClaims {
            sub: key.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::storage(format!("Failed to sign download token: {e}")))?;
        Ok(PresignedUrl {
            url: format!("{}/files/{key}?token={token}", self.public_base_url),
            expires_at,
        })
    }

    /// Verifies a token and returns the blob key it grants access to.
    /// Expired or tampered tokens are rejected as `Unauthenticated`.
    pub fn verify(&self, token: &str) -> ServiceResult<String> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<DownloadClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| ServiceError::Unauthenticated(format!("Invalid download token: {e}")))?;
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presign_and_verify_roundtrip() {
        let signer = DownloadTokenSigner::new("test-secret", "http://localhost:9000/");
        let presigned = signer
            .presign("reports/u/r/report.pdf", 3600)
            .expect("presign");

        assert!(presigned
            .url
            .starts_with("http://localhost:9000/files/reports/u/r/report.pdf?token="));

        let token = presigned.url.split("token=").nth(1).unwrap();
        let key = signer.verify(token).expect("verify");
        assert_eq!(key, "reports/u/r/report.pdf");
    }

    #[test]
    fn expiry_matches_requested_ttl() {
        let signer = DownloadTokenSigner::new("test-secret", "http://localhost:9000");
        let before = Utc::now();
        let presigned = signer.presign("k", 3600).unwrap();
        let delta = presigned.expires_at - before;
        assert!(delta.num_seconds() >= 3599 && delta.num_seconds() <= 3601);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let signer = DownloadTokenSigner::new("test-secret", "http://localhost:9000");
        let other = DownloadTokenSigner::new("other-secret", "http://localhost:9000");
        let presigned = signer.presign("k", 60).unwrap();
        let token = presigned.url.split("token=").nth(1).unwrap();
        assert!(other.verify(token).is_err());
    }
}
