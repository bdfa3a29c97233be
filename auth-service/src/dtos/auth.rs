use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{DeviceMetadata, User, UserRole};
use crate::services::{LoginCommand, RegisterCommand};
use crate::utils::Password;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email or username
    #[serde(default)]
    #[schema(example = "alice@example.com")]
    pub identifier: String,

    #[serde(default)]
    #[schema(example = "correct horse battery")]
    pub password: String,

    /// Stable per-browser identifier generated by the client
    #[serde(default)]
    #[validate(length(max = 128, message = "deviceId is too long"))]
    #[schema(example = "7f1c9a52-3a5e-4bd0-9f55-0d1b1b7e2c11")]
    pub device_id: String,

    #[validate(length(max = 512))]
    pub user_agent: Option<String>,
    #[validate(length(max = 64))]
    #[schema(example = "MacIntel")]
    pub platform: Option<String>,
    #[validate(length(max = 64))]
    #[schema(example = "Firefox")]
    pub browser: Option<String>,
}

impl From<LoginRequest> for LoginCommand {
    fn from(req: LoginRequest) -> Self {
        Self {
            identifier: req.identifier,
            password: Password::new(req.password),
            device_id: req.device_id,
            device: DeviceMetadata {
                user_agent: req.user_agent,
                platform: req.platform,
                browser: req.browser,
                ip_address: None,
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginUser {
    pub id: Uuid,
    #[schema(example = "alice@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = "Login successful")]
    pub message: String,
    pub user: LoginUser,
}

impl LoginResponse {
    pub fn new(user: &User) -> Self {
        Self {
            message: "Login successful".to_string(),
            user: LoginUser {
                id: user.user_id,
                email: user.email.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    /// New access token, also sent in the `Authorization` header
    pub access: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    #[schema(example = "Alice")]
    pub name: String,

    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "alice@example.com")]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 64, message = "Username is required"))]
    #[schema(example = "alice")]
    pub username: String,

    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "correct horse battery", min_length = 8)]
    pub password: String,

    /// Joins the inviter's household instead of founding one
    pub invite_code: Option<String>,
}

impl From<RegisterRequest> for RegisterCommand {
    fn from(req: RegisterRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            username: req.username,
            password: Password::new(req.password),
            invite_code: req.invite_code,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    #[schema(example = "Registration successful")]
    pub message: String,
    pub user: RegisteredUser,
}

impl RegisterResponse {
    pub fn new(user: &User) -> Self {
        Self {
            message: "Registration successful".to_string(),
            user: RegisteredUser {
                id: user.user_id,
                email: user.email.clone(),
                role: user.role(),
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeUser {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub email: String,
}

/// `user` is `null` when the caller is not signed in.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: Option<MeUser>,
}

impl From<Option<User>> for MeResponse {
    fn from(user: Option<User>) -> Self {
        Self {
            user: user.map(|u| MeUser {
                id: u.user_id,
                username: u.username,
                name: u.display_name,
                email: u.email,
            }),
        }
    }
}
