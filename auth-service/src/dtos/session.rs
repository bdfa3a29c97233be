use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RevokeSessionResponse {
    pub ok: bool,
    /// The revoked session was the caller's own; its cookie has been cleared
    pub revoked_current: bool,
}
