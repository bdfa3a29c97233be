//! Per-device login sessions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Client-reported device details captured at login. Informational only.
#[derive(Debug, Clone, Default)]
pub struct DeviceMetadata {
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub browser: Option<String>,
    pub ip_address: Option<String>,
}

/// Session entity. Holds the hash of the current refresh token, never the token.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub refresh_token_hash: String,
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub browser: Option<String>,
    pub ip_address: Option<String>,
    pub revoked_flag: bool,
    pub created_utc: DateTime<Utc>,
    pub last_used_utc: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Uuid, device_id: String, refresh_token: &str, device: DeviceMetadata) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            device_id,
            refresh_token_hash: Self::hash_token(refresh_token),
            user_agent: device.user_agent,
            platform: device.platform,
            browser: device.browser,
            ip_address: device.ip_address,
            revoked_flag: false,
            created_utc: now,
            last_used_utc: now,
        }
    }

    /// Hash a token using SHA-256
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_active(&self) -> bool {
        !self.revoked_flag
    }
}

/// Session info for API responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub device_id: String,
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub browser: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    /// True for the device that made the request
    pub current: bool,
}

impl SessionSummary {
    pub fn from_session(session: Session, current_device_id: &str) -> Self {
        Self {
            current: session.device_id == current_device_id,
            id: session.session_id,
            device_id: session.device_id,
            user_agent: session.user_agent,
            platform: session.platform,
            browser: session.browser,
            ip_address: session.ip_address,
            created_at: session.created_utc,
            last_used: session.last_used_utc,
        }
    }
}
