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
    dtos::{auth::MeResponse, ErrorResponse},
    handlers::context::bearer_token,
    utils::refresh_token_from,
    AppState,
};

/// Current user, from the access token or else the refresh cookie
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Signed-in user", body = MeResponse),
        (status = 404, description = "Not signed in; user is null", body = MeResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let refresh = refresh_token_from(&jar);
    let user = state
        .auth_service
        .current_user(bearer_token(&headers), refresh.as_deref())
        .await?;

    let status = if user.is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((status, Json(MeResponse::from(user))))
}
