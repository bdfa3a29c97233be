//! HTTP handlers.

pub mod auth;
pub mod context;
pub mod invites;
pub mod sessions;

pub use auth::*;
pub use invites::*;
pub use sessions::*;
