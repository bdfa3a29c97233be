use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::Invite;
use crate::services::InviteCommand;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInviteRequest {
    #[serde(default)]
    #[validate(length(max = 254))]
    #[schema(example = "bob@example.com")]
    pub email: String,

    /// `Member` joins as a regular user, `Admin` as an admin
    #[serde(default)]
    #[validate(length(max = 16))]
    #[schema(example = "Member")]
    pub role: String,
}

impl From<CreateInviteRequest> for InviteCommand {
    fn from(req: CreateInviteRequest) -> Self {
        Self {
            email: req.email,
            role: req.role,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteSummary {
    pub id: Uuid,
    /// Single-use code the invitee passes as `inviteCode` when registering
    pub code: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateInviteResponse {
    #[schema(example = "Invite created successfully")]
    pub message: String,
    pub invite: InviteSummary,
}

impl CreateInviteResponse {
    pub fn new(invite: Invite) -> Self {
        Self {
            message: "Invite created successfully".to_string(),
            invite: InviteSummary {
                id: invite.invite_id,
                code: invite.invite_code,
                email: invite.email,
                expires_at: invite.expiry_utc,
            },
        }
    }
}
