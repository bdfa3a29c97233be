//! Services layer: session lifecycle, token codec and storage backends.

mod auth;
mod database;
pub mod error;
mod jwt;
mod mock;
mod security_events;
mod store;

pub use auth::{
    AuthService, InviteCommand, IssuedTokens, LoginCommand, LoginOutcome, RegisterCommand, RevokeOutcome,
};
pub use database::Database;
pub use error::ServiceError;
pub use jwt::{AccessTokenClaims, JwtService, RefreshTokenClaims};
pub use mock::MockStore;
pub use security_events::SecurityEventRecorder;
pub use store::{SecurityEventLog, SessionStore, UserStore};
