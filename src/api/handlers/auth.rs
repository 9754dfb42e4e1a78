use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::instrument;

use super::{
    cookie::{clear_refresh_cookie, extract_bearer_token, extract_refresh_token, refresh_cookie},
    require_credentials,
    types::{
        AccessTokenRequest, ErrorResponse, LoginRequest, LogoutResponse, RefreshResponse,
        RegisterRequest, SessionResponse, ValidateResponse,
    },
    valid_email, ApiError,
};
use crate::{api::state::AppState, auth::TokenPair};

#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, refresh token set as cookie", body = SessionResponse),
        (status = 400, description = "Missing or malformed input", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    require_credentials(&request.username, &request.password)?;

    let email = request
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty());
    if email.as_deref().is_some_and(|email| !valid_email(email)) {
        return Err(ApiError::BadRequest("invalid email".to_string()));
    }

    let session = state
        .auth()
        .register(request.username.trim(), &request.password, email)
        .await?;

    let headers = cookie_headers(&state, &session.tokens)?;
    let body = SessionResponse {
        id: session.account_id,
        access_token: session.tokens.access_token,
    };
    Ok((StatusCode::CREATED, headers, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, refresh token set as cookie", body = SessionResponse),
        (status = 400, description = "Missing or malformed input", body = ErrorResponse),
        (status = 401, description = "Wrong credentials", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    require_credentials(&request.username, &request.password)?;

    let session = state
        .auth()
        .login(request.username.trim(), &request.password)
        .await?;

    let headers = cookie_headers(&state, &session.tokens)?;
    let body = SessionResponse {
        id: session.account_id,
        access_token: session.tokens.access_token,
    };
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/refresh-tokens",
    params(
        ("refreshToken" = String, Cookie, description = "Current refresh token")
    ),
    responses(
        (status = 200, description = "New pair issued, cookie rotated", body = RefreshResponse),
        (status = 400, description = "No refresh token cookie", body = ErrorResponse),
        (status = 401, description = "Refresh token invalid, expired or already used", body = ErrorResponse),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn refresh_tokens(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let refresh_token = extract_refresh_token(&headers).unwrap_or_default();
    let tokens = state.auth().refresh_tokens(&refresh_token).await?;

    let headers = cookie_headers(&state, &tokens)?;
    let body = RefreshResponse {
        access_token: tokens.access_token,
    };
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/logout",
    request_body = AccessTokenRequest,
    responses(
        (status = 200, description = "Session revoked, cookie cleared", body = LogoutResponse),
        (status = 400, description = "No access token", body = ErrorResponse),
        (status = 401, description = "Access token invalid or superseded", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<AccessTokenRequest>>,
) -> Result<Response, ApiError> {
    let access_token = access_token(&headers, payload);
    let ok = state.auth().logout(&access_token).await?;

    let mut response_headers = HeaderMap::new();
    let cookie = clear_refresh_cookie(state.cookies())
        .map_err(|_| ApiError::Internal("failed to build refresh cookie"))?;
    response_headers.insert(SET_COOKIE, cookie);

    Ok((StatusCode::OK, response_headers, Json(LogoutResponse { ok })).into_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/validate-token",
    request_body = AccessTokenRequest,
    responses(
        (status = 200, description = "Token belongs to the active session", body = ValidateResponse),
        (status = 400, description = "No access token", body = ErrorResponse),
        (status = 401, description = "Access token invalid, expired or superseded", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn validate_token(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<AccessTokenRequest>>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let access_token = access_token(&headers, payload);
    let id = state.auth().validate_token(&access_token).await?;
    Ok(Json(ValidateResponse { id }))
}

/// Body wins over the `Authorization` header.
fn access_token(headers: &HeaderMap, payload: Option<Json<AccessTokenRequest>>) -> String {
    payload
        .map(|Json(request)| request.access_token)
        .filter(|token| !token.is_empty())
        .or_else(|| extract_bearer_token(headers))
        .unwrap_or_default()
}

fn cookie_headers(state: &AppState, tokens: &TokenPair) -> Result<HeaderMap, ApiError> {
    let max_age = tokens.refresh_expires_at - state.auth().codec().now();
    let cookie = refresh_cookie(state.cookies(), &tokens.refresh_token, max_age)
        .map_err(|_| ApiError::Internal("failed to build refresh cookie"))?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok(headers)
}
