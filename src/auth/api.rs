//! Authentication API Endpoints
//! Mission: Register, sign in, and recover accounts without leaking who has one
//!
//! Validation and password policy are checked before any store mutation.
//! Login and forgot-password answer identically whether or not the account
//! exists. Notifications are queued and never affect the response.

use crate::auth::{
    db::{AuthDb, StoreError},
    jwt::JwtHandler,
    middleware::{cleared_session_cookie, session_cookie},
    models::{
        Account, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MessageResponse,
        ProfileResponse, RegisterRequest, ResetPasswordRequest, SessionResponse,
        UpdateProfileRequest, UserResponse,
    },
    password::PasswordHasher,
    reset_ledger::ResetLedger,
    user_store::UserStore,
    validation::{
        is_valid_email, normalize_email, sanitize_name, validate_password, PasswordPolicyError,
    },
};
use crate::config::AuthConfig;
use crate::email::Notifier;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists with that email, a reset link has been sent";

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub users: UserStore,
    pub resets: ResetLedger,
    pub sessions: Arc<JwtHandler>,
    pub hasher: PasswordHasher,
    pub notifier: Notifier,
    pub cookie_secure: bool,
}

impl AuthState {
    pub fn new(config: &AuthConfig, db: AuthDb, notifier: Notifier) -> anyhow::Result<Self> {
        Ok(Self {
            users: UserStore::new(db.clone()),
            resets: ResetLedger::new(db, config.reset_ttl),
            sessions: Arc::new(JwtHandler::new(&config.jwt_secret, config.session_ttl)),
            hasher: PasswordHasher::new(config.bcrypt_cost)?,
            notifier,
            cookie_secure: config.cookie_secure,
        })
    }

    fn start_session(
        &self,
        jar: CookieJar,
        account: &Account,
    ) -> Result<(CookieJar, String), AuthApiError> {
        let token = self
            .sessions
            .issue(&account.id)
            .map_err(|e| AuthApiError::Internal(e.to_string()))?;
        let jar = jar.add(session_cookie(
            token.clone(),
            self.cookie_secure,
            self.sessions.ttl(),
        ));
        Ok((jar, token))
    }
}

/// Register endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AuthState>,
    jar: CookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>), AuthApiError> {
    let payload = json_body(payload)?;

    let email = payload.email.unwrap_or_default();
    if !is_valid_email(&email) {
        return Err(AuthApiError::Validation(
            "Please enter a valid email address".to_string(),
        ));
    }
    let password = payload.password.unwrap_or_default();
    validate_password(&password)?;

    let email = normalize_email(&email);
    let first_name = sanitize_name(payload.first_name.as_deref());
    let last_name = sanitize_name(payload.last_name.as_deref());

    // Cheap rejection before bcrypt; the UNIQUE constraint stays authoritative
    if state.users.email_taken(&email)? {
        info!("Registration rejected, email already registered");
        return Err(AuthApiError::Conflict);
    }

    let password_hash = state.hasher.hash(&password).await?;
    let account = state
        .users
        .create_account(&email, &password_hash, &first_name, &last_name)
        .map_err(|e| {
            if matches!(e, StoreError::Conflict) {
                info!("Registration rejected, email already registered");
            }
            AuthApiError::from(e)
        })?;

    let (jar, token) = state.start_session(jar, &account)?;
    state
        .notifier
        .send_welcome_email(&account.email, &account.first_name);

    metrics::increment_counter!("auth_register_total");
    info!(account_id = %account.id, "✅ Account registered");

    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse {
            message: "Account created successfully".to_string(),
            token,
            user: UserResponse::from_account(&account),
        }),
    ))
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<SessionResponse>), AuthApiError> {
    let payload = json_body(payload)?;

    let (email, password) = match (payload.email, payload.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            (email, password)
        }
        _ => {
            return Err(AuthApiError::Validation(
                "Email and password are required".to_string(),
            ))
        }
    };

    let account = match state.users.find_active_by_email(&email)? {
        Some(account) => account,
        None => {
            // Same bcrypt work as a real check, same answer as a wrong password
            state.hasher.verify_dummy(&password).await;
            metrics::increment_counter!("auth_login_total", "outcome" => "invalid");
            return Err(AuthApiError::InvalidCredentials);
        }
    };

    if !state.hasher.verify(&password, &account.password_hash).await? {
        warn!(account_id = %account.id, "❌ Failed login attempt");
        metrics::increment_counter!("auth_login_total", "outcome" => "invalid");
        return Err(AuthApiError::InvalidCredentials);
    }

    let (jar, token) = state.start_session(jar, &account)?;

    metrics::increment_counter!("auth_login_total", "outcome" => "success");
    info!(account_id = %account.id, "✅ Login successful");

    Ok((
        jar,
        Json(SessionResponse {
            message: "Logged in successfully".to_string(),
            token,
            user: UserResponse::from_account(&account),
        }),
    ))
}

/// Logout endpoint - POST /api/auth/logout
///
/// Drops the cookie only. The token itself stays valid until it expires.
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.add(cleared_session_cookie()),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

/// Get current user info - GET /api/auth/me
pub async fn get_me(Extension(account): Extension<Account>) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        message: None,
        user: UserResponse::from_account(&account),
    })
}

/// Update profile - PUT /api/auth/me
pub async fn update_me(
    State(state): State<AuthState>,
    Extension(account): Extension<Account>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>, AuthApiError> {
    let payload = json_body(payload)?;
    let first_name = sanitize_name(payload.first_name.as_deref());
    let last_name = sanitize_name(payload.last_name.as_deref());

    if !state
        .users
        .update_profile(&account.id, &first_name, &last_name)?
    {
        return Err(AuthApiError::AccountUnavailable);
    }

    let updated = state
        .users
        .find_active_by_id(&account.id)?
        .ok_or(AuthApiError::AccountUnavailable)?;

    Ok(Json(ProfileResponse {
        message: Some("Profile updated".to_string()),
        user: UserResponse::from_account(&updated),
    }))
}

/// Change password - PUT /api/auth/change-password
pub async fn change_password(
    State(state): State<AuthState>,
    Extension(account): Extension<Account>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthApiError> {
    let payload = json_body(payload)?;

    let (current, new) = match (payload.current_password, payload.new_password) {
        (Some(current), Some(new)) if !current.is_empty() && !new.is_empty() => (current, new),
        _ => {
            return Err(AuthApiError::Validation(
                "Current and new password are required".to_string(),
            ))
        }
    };
    validate_password(&new)?;

    if !state.hasher.verify(&current, &account.password_hash).await? {
        warn!(account_id = %account.id, "❌ Change password with wrong current password");
        return Err(AuthApiError::WrongCurrentPassword);
    }

    let new_hash = state.hasher.hash(&new).await?;
    if !state.users.update_password_hash(&account.id, &new_hash)? {
        return Err(AuthApiError::AccountUnavailable);
    }

    info!(account_id = %account.id, "🔑 Password changed");
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// Request a reset link - POST /api/auth/forgot-password
///
/// The response is the same whether or not the email belongs to an account.
pub async fn forgot_password(
    State(state): State<AuthState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthApiError> {
    let payload = json_body(payload)?;

    let email = payload.email.unwrap_or_default();
    if !is_valid_email(&email) {
        return Err(AuthApiError::Validation(
            "Please enter a valid email address".to_string(),
        ));
    }

    metrics::increment_counter!("auth_password_reset_requested_total");

    if let Some(account) = state.users.find_active_by_email(&email)? {
        let reset = state.resets.issue(&account.id)?;
        state
            .notifier
            .send_password_reset_email(&account.email, &reset.token);
        info!(
            account_id = %account.id,
            expires_at = %reset.expires_at.to_rfc3339(),
            "🔑 Password reset issued"
        );
    }

    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)))
}

/// Complete a reset - POST /api/auth/reset-password
///
/// No session is issued; the user signs in again with the new password.
pub async fn reset_password(
    State(state): State<AuthState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AuthApiError> {
    let payload = json_body(payload)?;

    let token = payload
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AuthApiError::Validation("Reset token is required".to_string()))?;
    let new_password = payload.new_password.unwrap_or_default();
    validate_password(&new_password)?;

    let token = token.trim();
    if !state.resets.is_live(token)? {
        metrics::increment_counter!("auth_password_reset_total", "outcome" => "invalid");
        return Err(AuthApiError::InvalidOrExpired);
    }

    let new_hash = state.hasher.hash(&new_password).await?;
    match state.resets.consume(token, &new_hash) {
        Ok(account_id) => {
            metrics::increment_counter!("auth_password_reset_total", "outcome" => "success");
            info!(account_id = %account_id, "🔑 Password reset completed");
            Ok(Json(MessageResponse::new(
                "Password reset successfully. You can now log in with your new password.",
            )))
        }
        Err(StoreError::InvalidOrExpired) => {
            metrics::increment_counter!("auth_password_reset_total", "outcome" => "invalid");
            Err(AuthApiError::InvalidOrExpired)
        }
        Err(e) => Err(e.into()),
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        AuthApiError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    })
}

/// Auth API error types
#[derive(Debug)]
pub enum AuthApiError {
    /// Malformed, missing, or policy-violating input
    Validation(String),
    Conflict,
    InvalidCredentials,
    WrongCurrentPassword,
    MissingSession,
    SessionExpired,
    InvalidSession,
    /// Session names an account that is gone or deactivated
    AccountUnavailable,
    /// Reset token unknown, used, superseded, or past expiry
    InvalidOrExpired,
    /// Detail is logged, never returned
    Internal(String),
}

impl AuthApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthApiError::Validation(_) | AuthApiError::InvalidOrExpired => {
                StatusCode::BAD_REQUEST
            }
            AuthApiError::Conflict => StatusCode::CONFLICT,
            AuthApiError::InvalidCredentials
            | AuthApiError::WrongCurrentPassword
            | AuthApiError::MissingSession
            | AuthApiError::SessionExpired
            | AuthApiError::InvalidSession
            | AuthApiError::AccountUnavailable => StatusCode::UNAUTHORIZED,
            AuthApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AuthApiError::Validation(msg) => msg,
            AuthApiError::Conflict => "An account with this email already exists",
            AuthApiError::InvalidCredentials => "Invalid email or password",
            AuthApiError::WrongCurrentPassword => "Current password is incorrect",
            AuthApiError::MissingSession => "Authentication required",
            AuthApiError::SessionExpired => "Session expired, please log in again",
            AuthApiError::InvalidSession => "Invalid session",
            AuthApiError::AccountUnavailable => "Account not found or deactivated",
            AuthApiError::InvalidOrExpired => {
                "This reset link is invalid or has expired. Please request a new one."
            }
            AuthApiError::Internal(_) => "Something went wrong, please try again",
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        if let AuthApiError::Internal(detail) = &self {
            error!("Auth request failed: {}", detail);
        }

        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<StoreError> for AuthApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AuthApiError::Conflict,
            StoreError::InvalidOrExpired => AuthApiError::InvalidOrExpired,
            other => AuthApiError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordPolicyError> for AuthApiError {
    fn from(err: PasswordPolicyError) -> Self {
        AuthApiError::Validation(err.message().to_string())
    }
}

impl From<anyhow::Error> for AuthApiError {
    fn from(err: anyhow::Error) -> Self {
        AuthApiError::Internal(format!("{:#}", err))
    }
}
