//! Authentication Models
//! Mission: Define account, token and wire data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored account
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String, // bcrypt hash - never serialize
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email_verified: bool,
    pub is_active: bool,
}

/// Password reset ledger row
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub id: i64,
    pub account_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl ResetToken {
    /// Consumable right now: unused and strictly before its expiry
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account id
    pub iat: i64,
    pub exp: i64,
}

/// Register request body. Every field is optional on the wire so that a
/// missing field surfaces as our own 400 rather than a deserializer rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub new_password: Option<String>,
}

/// Public profile (sanitized)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_account(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            email_verified: account.email_verified,
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

/// Register / login response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub message: String,
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_account() -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            email_verified: false,
            is_active: true,
        }
    }

    #[test]
    fn test_user_response_hides_hash_and_uses_camel_case() {
        let account = sample_account();
        let json = serde_json::to_value(UserResponse::from_account(&account)).unwrap();

        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["firstName"], "Alice");
        assert_eq!(json["lastName"], "Liddell");
        assert_eq!(json["emailVerified"], false);
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_request_fields_are_optional() {
        let req: RegisterRequest = serde_json::from_str(r#"{"email":"a@b.co"}"#).unwrap();
        assert_eq!(req.email.as_deref(), Some("a@b.co"));
        assert!(req.password.is_none());

        let req: ResetPasswordRequest =
            serde_json::from_str(r#"{"token":"abc","newPassword":"NewPass1"}"#).unwrap();
        assert_eq!(req.new_password.as_deref(), Some("NewPass1"));
    }

    #[test]
    fn test_reset_token_liveness_boundary() {
        let now = Utc::now();
        let token = ResetToken {
            id: 1,
            account_id: Uuid::new_v4(),
            token: "t".to_string(),
            expires_at: now,
            used: false,
            created_at: now - Duration::minutes(60),
        };

        assert!(token.is_live_at(now - Duration::seconds(1)));
        assert!(!token.is_live_at(now));
        assert!(!token.is_live_at(now + Duration::seconds(1)));

        let used = ResetToken { used: true, ..token };
        assert!(!used.is_live_at(now - Duration::seconds(1)));
    }
}
