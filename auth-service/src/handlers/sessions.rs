//! Device list and per-device revocation.

use axum_extra::extract::cookie::CookieJar;
use service_core::{
    axum::{
        extract::{Path, State},
        response::IntoResponse,
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::{session::RevokeSessionResponse, ErrorResponse},
    models::{ClientContext, SessionSummary},
    utils::{clear_refresh_cookie, refresh_token_from},
    AppState,
};

/// Active sessions of the signed-in user, most recently used first
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Active sessions", body = [SessionSummary]),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Sessions"
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    let token = refresh_token_from(&jar);
    let sessions = state.auth_service.list_sessions(token.as_deref()).await?;
    Ok(Json(sessions))
}

/// Revoke one of the signed-in user's sessions
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session revoked", body = RevokeSessionResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "No such session for this user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Sessions"
)]
pub async fn revoke_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    client: ClientContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let token = refresh_token_from(&jar);
    let outcome = state
        .auth_service
        .revoke_session(&id, token.as_deref(), &client)
        .await?;

    let jar = if outcome.revoked_current {
        clear_refresh_cookie(jar)
    } else {
        jar
    };

    Ok((
        jar,
        Json(RevokeSessionResponse {
            ok: true,
            revoked_current: outcome.revoked_current,
        }),
    ))
}
