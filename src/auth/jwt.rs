//! JWT Token Handler
//! Mission: Issue and verify signed, time-limited session tokens
//!
//! Sessions are stateless. There is no revocation list: logout only drops the
//! client's copy, and a leaked token stays usable until it expires. Anyone
//! holding the signing secret can mint sessions for any account.

use crate::auth::models::Claims;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use tracing::debug;
use uuid::Uuid;

/// Why a presented session token was not accepted
#[derive(Debug)]
pub enum SessionError {
    /// Signature checks out but the token is past `exp`
    Expired,
    /// Bad signature, malformed payload, wrong algorithm
    Invalid,
    /// Encoding failed while issuing
    Signing(jsonwebtoken::errors::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Expired => write!(f, "session token expired"),
            SessionError::Invalid => write!(f, "session token invalid"),
            SessionError::Signing(e) => write!(f, "failed to sign session token: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtHandler {
    /// Create a handler. The secret is loaded once at process start and must
    /// stay server-side.
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a session for `account_id`, valid for the configured TTL
    pub fn issue(&self, account_id: &Uuid) -> Result<String, SessionError> {
        self.issue_at(account_id, Utc::now())
    }

    pub fn issue_at(&self, account_id: &Uuid, now: DateTime<Utc>) -> Result<String, SessionError> {
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        debug!(
            account_id = %account_id,
            ttl_hours = self.ttl.num_hours(),
            "Issuing session token"
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(SessionError::Signing)
    }

    /// Check signature and expiry and return the account id the token binds to
    pub fn verify(&self, token: &str) -> Result<Uuid, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let decoded = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            }
        })?;

        Uuid::parse_str(&decoded.claims.sub).map_err(|_| SessionError::Invalid)
    }
}
