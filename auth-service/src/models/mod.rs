pub mod client_context;
pub mod family;
pub mod security_event;
pub mod session;
pub mod user;

pub use client_context::ClientContext;
pub use family::{Enrollment, FamilyGroup, Invite, INVITE_TTL_DAYS};
pub use security_event::{SecurityEvent, SecurityEventType};
pub use session::{DeviceMetadata, Session, SessionSummary};
pub use user::{User, UserRole};
