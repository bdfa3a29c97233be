use axum_extra::extract::cookie::CookieJar;
use service_core::{
    axum::{
        extract::State,
        http::{header, StatusCode},
        response::IntoResponse,
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::{
        auth::{LoginRequest, LoginResponse, RefreshResponse},
        ErrorResponse,
    },
    models::ClientContext,
    services::IssuedTokens,
    utils::{clear_refresh_cookie, refresh_cookie, refresh_token_from, ValidatedJson},
    AppState,
};

fn issue_cookie(state: &AppState, jar: CookieJar, tokens: &IssuedTokens) -> CookieJar {
    jar.add(refresh_cookie(
        tokens.refresh_token.clone(),
        state.config.is_prod(),
        state.jwt.refresh_token_max_age_seconds(),
    ))
}

fn bearer_header(tokens: &IssuedTokens) -> [(header::HeaderName, String); 1] {
    [(
        header::AUTHORIZATION,
        format!("Bearer {}", tokens.access_token),
    )]
}

/// Log in with email or username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; access token in Authorization header, refresh token in cookie", body = LoginResponse),
        (status = 400, description = "Missing fields", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    client: ClientContext,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.auth_service.login(req.into(), &client).await?;

    let jar = issue_cookie(&state, jar, &outcome.tokens);
    Ok((
        StatusCode::OK,
        jar,
        bearer_header(&outcome.tokens),
        Json(LoginResponse::new(&outcome.user)),
    ))
}

/// Exchange the refresh cookie for a new access token, rotating the cookie
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Token refreshed", body = RefreshResponse),
        (status = 401, description = "Missing, invalid or revoked refresh token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let token = refresh_token_from(&jar);
    let tokens = state.auth_service.refresh(token.as_deref(), &client).await?;

    let jar = issue_cookie(&state, jar, &tokens);
    Ok((
        StatusCode::OK,
        jar,
        bearer_header(&tokens),
        Json(RefreshResponse {
            access: tokens.access_token.clone(),
        }),
    ))
}

/// Log out this device
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out (also when no session was found)", body = String),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    client: ClientContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let token = refresh_token_from(&jar);
    state
        .auth_service
        .logout_current(token.as_deref(), &client)
        .await?;

    Ok((StatusCode::OK, clear_refresh_cookie(jar), "OK"))
}

/// Log out every device except this one
#[utoipa::path(
    post,
    path = "/auth/logout/other",
    responses(
        (status = 200, description = "Other devices logged out", body = String),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn logout_other(
    State(state): State<AppState>,
    client: ClientContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let token = refresh_token_from(&jar);
    state
        .auth_service
        .logout_other(token.as_deref(), &client)
        .await?;

    Ok((StatusCode::OK, "OK"))
}

/// Log out every device, including this one
#[utoipa::path(
    post,
    path = "/auth/logout/all",
    responses(
        (status = 200, description = "All devices logged out", body = String),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn logout_all(
    State(state): State<AppState>,
    client: ClientContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let token = refresh_token_from(&jar);
    state
        .auth_service
        .logout_all(token.as_deref(), &client)
        .await?;

    Ok((StatusCode::OK, clear_refresh_cookie(jar), "OK"))
}
