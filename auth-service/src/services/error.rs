use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    /// Unknown identifier, wrong password and disabled account all look alike.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, unverifiable, or session-less refresh token.
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("Not found")]
    SessionNotFound,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("{0}")]
    InvalidInvite(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    /// The invitee already has an account or an open invite.
    #[error("{0}")]
    InviteConflict(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::Unauthenticated => AppError::Unauthorized(anyhow::anyhow!("Unauthorized")),
            ServiceError::SessionNotFound => AppError::NotFound(anyhow::anyhow!("Not found")),
            ServiceError::UserAlreadyExists => {
                AppError::Conflict(anyhow::anyhow!("User already exists"))
            }
            ServiceError::InvalidInvite(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::InviteConflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ServiceError::ValidationError(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}
