//! Storage seams. `Database` implements them on PostgreSQL, `MockStore` in memory.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Enrollment, FamilyGroup, Invite, SecurityEvent, Session, User};
use crate::services::ServiceError;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact match on email or username.
    async fn find_user_by_identifier(&self, identifier: &str)
        -> Result<Option<User>, ServiceError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError>;

    async fn user_exists(&self, email: &str, username: &str) -> Result<bool, ServiceError>;

    async fn email_registered(&self, email: &str) -> Result<bool, ServiceError>;

    async fn find_invite_by_code(&self, code: &str) -> Result<Option<Invite>, ServiceError>;

    /// An unused, unexpired invite exists for `email`.
    async fn has_pending_invite(&self, email: &str) -> Result<bool, ServiceError>;

    /// Stores a new invite, first dropping expired unused invites for the same
    /// email. Another unused invite for the email yields `InviteConflict`.
    async fn create_invite(&self, invite: &Invite) -> Result<(), ServiceError>;

    /// The household `user_id` founded, if any.
    async fn find_family_group_created_by(
        &self,
        user_id: Uuid,
    ) -> Result<Option<FamilyGroup>, ServiceError>;

    /// Inserts the user and applies the enrollment atomically. A consumed invite
    /// yields `InvalidInvite`, a duplicate email or username `UserAlreadyExists`.
    async fn create_user(&self, user: &User, enrollment: &Enrollment) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Revokes any active session for the same user and device, then inserts
    /// `session`, as one unit.
    async fn create_session(&self, session: &Session) -> Result<(), ServiceError>;

    async fn find_active_session(
        &self,
        user_id: Uuid,
        device_id: &str,
        refresh_token_hash: &str,
    ) -> Result<Option<Session>, ServiceError>;

    async fn find_session_by_id(&self, session_id: Uuid) -> Result<Option<Session>, ServiceError>;

    /// Swaps the stored hash only if it still equals `current_hash` and the
    /// session is active. `false` means another request rotated or revoked it first.
    async fn rotate_session(
        &self,
        session_id: Uuid,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<bool, ServiceError>;

    async fn revoke_session(&self, session_id: Uuid) -> Result<u64, ServiceError>;

    async fn revoke_session_by_token(
        &self,
        user_id: Uuid,
        device_id: &str,
        refresh_token_hash: &str,
    ) -> Result<u64, ServiceError>;

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, ServiceError>;

    async fn revoke_all_except_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<u64, ServiceError>;

    /// Active sessions, most recently used first.
    async fn list_active_sessions(&self, user_id: Uuid) -> Result<Vec<Session>, ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait SecurityEventLog: Send + Sync {
    async fn append_event(&self, event: &SecurityEvent) -> Result<(), ServiceError>;
}
