//! Authentication HTTP Handlers
//!
//! REST endpoints for the session lifecycle. Access tokens travel in the
//! JSON body; the refresh token only ever travels in an http-only cookie.

use crate::authenticator::authenticate_request;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::extractors::CurrentUser;
use crate::models::*;
use crate::service::SessionService;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Shared session service state
pub type AuthState = Arc<SessionService>;

/// Name of the cookie carrying the raw refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

// ============================================
// Route Builder
// ============================================

/// Create authentication routes under `AUTH_PATH`.
///
/// The request authenticator is layered over every route, so handlers
/// merged into this router can use the identity extractors.
pub fn create_routes(service: AuthState) -> Router {
    let routes = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(current_user));

    Router::new()
        .nest(&service.config().auth_path, routes)
        .layer(axum_middleware::from_fn_with_state(
            service.signer().clone(),
            authenticate_request,
        ))
        .with_state(service)
}

// ============================================
// Cookies
// ============================================

fn refresh_cookie(config: &AuthConfig, value: String, max_age_seconds: i64) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, value))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Strict)
        .path(config.auth_path.clone())
        .max_age(time::Duration::seconds(max_age_seconds))
        .build()
}

/// Body plus rotated cookie for every token-issuing endpoint
fn issue(
    auth: &SessionService,
    jar: CookieJar,
    tokens: FullTokenInformation,
) -> (CookieJar, Json<AccessTokenResponse>) {
    let body = AccessTokenResponse::from(&tokens);
    let cookie = refresh_cookie(
        auth.config(),
        tokens.refresh_token,
        auth.refresh_token_expiration().num_seconds(),
    );

    (jar.add(cookie), Json(body))
}

fn presented_refresh_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================
// Registration
// ============================================

/// POST /auth/register
///
/// Create a student account and open its first session
pub async fn register(
    State(auth): State<AuthState>,
    jar: CookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(req) = payload?;
    req.validate()?;

    let tokens = auth.register(req).await?;
    let (jar, body) = issue(&auth, jar, tokens);

    Ok((StatusCode::CREATED, jar, body))
}

// ============================================
// Login / Logout
// ============================================

/// POST /auth/login
pub async fn login(
    State(auth): State<AuthState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthError> {
    let Json(req) = payload?;
    req.validate()?;

    let tokens = auth.login(req).await?;

    Ok(issue(&auth, jar, tokens))
}

/// POST /auth/logout
///
/// Revoke the cookie's refresh token, if any, and clear the cookie.
/// Always succeeds with 204.
pub async fn logout(
    State(auth): State<AuthState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    if let Some(token) = presented_refresh_token(&jar) {
        auth.logout(&token).await?;
    }

    let cleared = refresh_cookie(auth.config(), String::new(), 0);

    Ok((StatusCode::NO_CONTENT, jar.add(cleared)))
}

// ============================================
// Token Refresh
// ============================================

/// POST /auth/refresh
///
/// Rotate the refresh token from the cookie into a new pair
pub async fn refresh(
    State(auth): State<AuthState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let token = presented_refresh_token(&jar).ok_or(AuthError::InvalidRefreshToken)?;

    let tokens = auth.refresh(&token).await?;

    Ok(issue(&auth, jar, tokens))
}

// ============================================
// Introspection
// ============================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserResponse {
    pub username: String,
    pub user_id: Uuid,
    pub roles: Vec<Role>,
}

/// GET /auth/me
pub async fn current_user(CurrentUser(identity): CurrentUser) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        username: identity.username,
        user_id: identity.user_id,
        roles: identity.roles.into_iter().collect(),
    })
}
