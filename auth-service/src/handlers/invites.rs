//! Household invites.

use axum_extra::extract::cookie::CookieJar;
use service_core::{
    axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::{
        invite::{CreateInviteRequest, CreateInviteResponse},
        ErrorResponse,
    },
    handlers::context::bearer_token,
    utils::{refresh_token_from, ValidatedJson},
    AppState,
};

/// Invite someone into the caller's household (admins only)
#[utoipa::path(
    post,
    path = "/invites",
    request_body = CreateInviteRequest,
    responses(
        (status = 201, description = "Invite created", body = CreateInviteResponse),
        (status = 400, description = "Missing or invalid email or role", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
        (status = 409, description = "Email already registered or already invited", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Invites",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_invite(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<CreateInviteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let refresh = refresh_token_from(&jar);
    let invite = state
        .auth_service
        .create_invite(bearer_token(&headers), refresh.as_deref(), req.into())
        .await?;

    Ok((StatusCode::CREATED, Json(CreateInviteResponse::new(invite))))
}
