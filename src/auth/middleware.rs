//! Authentication Middleware
//! Mission: Protect account endpoints with session validation
//!
//! The token is accepted from `Authorization: Bearer ...` first and the
//! `helyx_token` cookie second. Every request re-reads the account, so a
//! deactivation takes effect on the very next call even though the token
//! itself is still valid.

use crate::auth::{api::AuthApiError, jwt::SessionError, AuthState};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;

pub const SESSION_COOKIE: &str = "helyx_token";

/// Auth middleware that validates the session and loads the account
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthApiError> {
    let token = session_token(req.headers()).ok_or(AuthApiError::MissingSession)?;

    let account_id = state.sessions.verify(&token).map_err(|e| {
        debug!(path = %req.uri().path(), "Session rejected: {}", e);
        match e {
            SessionError::Expired => AuthApiError::SessionExpired,
            _ => AuthApiError::InvalidSession,
        }
    })?;

    let account = state
        .users
        .find_active_by_id(&account_id)?
        .ok_or_else(|| {
            debug!(account_id = %account_id, "Session for missing or deactivated account");
            AuthApiError::AccountUnavailable
        })?;

    // Handlers pick this up with `Extension<Account>`
    req.extensions_mut().insert(account);

    Ok(next.run(req).await)
}

/// Extract the raw session token from the request headers
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string());

    from_header.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// httpOnly, SameSite=Lax, path "/", max-age equal to the session lifetime
pub fn session_cookie(token: String, secure: bool, ttl: chrono::Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(ttl.num_seconds()))
        .build()
}

/// Expired, empty cookie that makes the browser drop its copy
pub fn cleared_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    cookie.make_removal();
    cookie
}
