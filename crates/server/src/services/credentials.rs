//! Bearer token issuance and verification.
//!
//! Tokens are `base64url(claims JSON) . base64url(HMAC-SHA256 tag)`,
//! signed with the server's token secret. Verification is pure and
//! synchronous; no store lookup is needed to resolve a caller.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use shopmate_core::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Claims carried inside a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The authenticated user.
    pub subject: UserId,
    /// Coarse authorization role, e.g. `"customer"`.
    pub role: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Authentication failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No credential was presented where one is required.
    #[error("authentication required")]
    Missing,

    /// The token is malformed or its signature does not verify.
    #[error("invalid credentials")]
    Invalid,

    /// The token verified but has expired.
    #[error("credentials expired")]
    Expired,
}

/// Resolves a presented bearer token into claims.
pub trait CredentialVerifier: Send + Sync {
    /// Verify a token's signature and expiry.
    ///
    /// # Errors
    ///
    /// [`AuthError::Invalid`] on malformed input or signature mismatch,
    /// [`AuthError::Expired`] when the token has lapsed.
    fn verify(&self, token: &str) -> Result<TokenClaims, AuthError>;
}

/// HMAC-SHA256 token issuer and verifier.
pub struct HmacCredentialService {
    secret: SecretString,
    ttl: Duration,
}

impl HmacCredentialService {
    /// Create a service signing with `secret`; issued tokens live for
    /// `ttl`.
    #[must_use]
    pub const fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    // HMAC accepts keys of any length, so construction cannot fail.
    #[allow(clippy::expect_used)]
    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC key of any length is valid")
    }

    /// Issue a signed token for a user.
    #[must_use]
    pub fn issue(&self, subject: UserId, role: impl Into<String>) -> String {
        let now = Utc::now();
        let claims = TokenClaims {
            subject,
            role: role.into(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        // TokenClaims serialization cannot fail: all fields are strings
        // or timestamps.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let encoded = URL_SAFE_NO_PAD.encode(&payload);

        let mut mac = self.mac();
        mac.update(encoded.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{encoded}.{tag}")
    }
}

impl CredentialVerifier for HmacCredentialService {
    fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let (encoded, tag) = token.split_once('.').ok_or(AuthError::Invalid)?;

        let tag_bytes = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| AuthError::Invalid)?;
        let mut mac = self.mac();
        mac.update(encoded.as_bytes());
        // Constant-time comparison via the Mac trait.
        mac.verify_slice(&tag_bytes).map_err(|_| AuthError::Invalid)?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| AuthError::Invalid)?;
        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::Invalid)?;

        if claims.expires_at <= Utc::now() {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }
}
