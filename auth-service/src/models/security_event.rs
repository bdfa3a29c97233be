//! Append-only security event trail.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Security event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventType {
    Login,
    Refresh,
    LogoutCurrent,
    LogoutOther,
    LogoutAll,
    RevokeDevice,
}

impl SecurityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventType::Login => "login",
            SecurityEventType::Refresh => "refresh",
            SecurityEventType::LogoutCurrent => "logout_current",
            SecurityEventType::LogoutOther => "logout_other",
            SecurityEventType::LogoutAll => "logout_all",
            SecurityEventType::RevokeDevice => "revoke_device",
        }
    }
}

/// Security event entity.
#[derive(Debug, Clone, FromRow)]
pub struct SecurityEvent {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub event_type_code: String,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(user_id: Uuid, event_type: SecurityEventType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            user_id,
            event_type_code: event_type.as_str().to_string(),
            device_id: None,
            ip_address: None,
            user_agent: None,
            created_utc: Utc::now(),
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }
}
