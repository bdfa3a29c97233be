use async_trait::async_trait;
use chrono::Utc;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex, MutexGuard,
};
use tokio::sync::Barrier;
use uuid::Uuid;

use crate::models::{Enrollment, FamilyGroup, Invite, SecurityEvent, Session, User};
use crate::services::{SecurityEventLog, ServiceError, SessionStore, UserStore};

#[derive(Default)]
struct MockState {
    users: Vec<User>,
    invites: Vec<Invite>,
    family_groups: Vec<FamilyGroup>,
    memberships: Vec<(Uuid, Uuid)>,
    sessions: Vec<Session>,
    events: Vec<SecurityEvent>,
}

/// Holds the next `remaining` session lookups at a shared barrier.
struct LookupPause {
    barrier: Arc<Barrier>,
    remaining: usize,
}

/// In-memory implementation of every store trait. One mutex guards all
/// tables, so each operation is atomic like its SQL counterpart.
#[derive(Default)]
pub struct MockStore {
    state: Mutex<MockState>,
    fail_event_log: AtomicBool,
    lookup_pause: Mutex<Option<LookupPause>>,
    rejected_rotations: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, ServiceError> {
        self.state
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock store mutex poisoned: {}", e)))
    }

    pub fn insert_user(&self, user: User) -> Result<(), ServiceError> {
        self.lock()?.users.push(user);
        Ok(())
    }

    pub fn insert_invite(&self, invite: Invite) -> Result<(), ServiceError> {
        self.lock()?.invites.push(invite);
        Ok(())
    }

    pub fn sessions(&self) -> Result<Vec<Session>, ServiceError> {
        Ok(self.lock()?.sessions.clone())
    }

    pub fn security_events(&self) -> Result<Vec<SecurityEvent>, ServiceError> {
        Ok(self.lock()?.events.clone())
    }

    pub fn family_groups(&self) -> Result<Vec<FamilyGroup>, ServiceError> {
        Ok(self.lock()?.family_groups.clone())
    }

    /// (family_group_id, user_id) pairs
    pub fn memberships(&self) -> Result<Vec<(Uuid, Uuid)>, ServiceError> {
        Ok(self.lock()?.memberships.clone())
    }

    pub fn invite(&self, code: &str) -> Result<Option<Invite>, ServiceError> {
        Ok(self
            .lock()?
            .invites
            .iter()
            .find(|i| i.invite_code == code)
            .cloned())
    }

    /// Makes every subsequent `append_event` fail.
    pub fn fail_security_events(&self, fail: bool) {
        self.fail_event_log.store(fail, Ordering::SeqCst);
    }

    /// The next `parties` calls to `find_active_session` each wait until all of
    /// them have finished their lookup. Lets concurrent requests interleave
    /// between reading a session and rotating it.
    pub fn pause_after_session_lookup(&self, parties: usize) -> Result<(), ServiceError> {
        let mut pause = self.lookup_pause.lock().map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Mock store mutex poisoned: {}", e))
        })?;
        *pause = (parties > 0).then(|| LookupPause {
            barrier: Arc::new(Barrier::new(parties)),
            remaining: parties,
        });
        Ok(())
    }

    /// Number of `rotate_session` calls that lost the compare-and-swap.
    pub fn rejected_rotations(&self) -> usize {
        self.rejected_rotations.load(Ordering::SeqCst)
    }

    fn take_lookup_pause(&self) -> Result<Option<Arc<Barrier>>, ServiceError> {
        let mut guard = self.lookup_pause.lock().map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Mock store mutex poisoned: {}", e))
        })?;
        let Some(pause) = guard.as_mut() else {
            return Ok(None);
        };
        let barrier = pause.barrier.clone();
        pause.remaining -= 1;
        if pause.remaining == 0 {
            *guard = None;
        }
        Ok(Some(barrier))
    }
}

fn revoke_where(state: &mut MockState, predicate: impl Fn(&Session) -> bool) -> u64 {
    let mut affected = 0;
    for session in state.sessions.iter_mut().filter(|s| predicate(s)) {
        session.revoked_flag = true;
        affected += 1;
    }
    affected
}

#[async_trait]
impl UserStore for MockStore {
    async fn find_user_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, ServiceError> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.email == identifier || u.username == identifier)
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .cloned())
    }

    async fn user_exists(&self, email: &str, username: &str) -> Result<bool, ServiceError> {
        Ok(self
            .lock()?
            .users
            .iter()
            .any(|u| u.email == email || u.username == username))
    }

    async fn email_registered(&self, email: &str) -> Result<bool, ServiceError> {
        Ok(self.lock()?.users.iter().any(|u| u.email == email))
    }

    async fn find_invite_by_code(&self, code: &str) -> Result<Option<Invite>, ServiceError> {
        self.invite(code)
    }

    async fn has_pending_invite(&self, email: &str) -> Result<bool, ServiceError> {
        Ok(self
            .lock()?
            .invites
            .iter()
            .any(|i| i.email == email && i.is_pending()))
    }

    async fn create_invite(&self, invite: &Invite) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        state
            .invites
            .retain(|i| !(i.email == invite.email && !i.used_flag && i.is_expired()));

        if state
            .invites
            .iter()
            .any(|i| i.email == invite.email && !i.used_flag)
        {
            return Err(ServiceError::InviteConflict(
                "Invite already sent to this email",
            ));
        }
        state.invites.push(invite.clone());
        Ok(())
    }

    async fn find_family_group_created_by(
        &self,
        user_id: Uuid,
    ) -> Result<Option<FamilyGroup>, ServiceError> {
        Ok(self
            .lock()?
            .family_groups
            .iter()
            .filter(|g| g.created_by_user_id == user_id)
            .min_by_key(|g| g.created_utc)
            .cloned())
    }

    async fn create_user(&self, user: &User, enrollment: &Enrollment) -> Result<(), ServiceError> {
        let mut state = self.lock()?;

        if state
            .users
            .iter()
            .any(|u| u.email == user.email || u.username == user.username)
        {
            return Err(ServiceError::UserAlreadyExists);
        }

        match enrollment {
            Enrollment::FoundFamily(group) => {
                state.users.push(user.clone());
                state.family_groups.push(group.clone());
            }
            Enrollment::JoinFamily {
                invite_id,
                family_group_id,
            } => {
                let invite = state
                    .invites
                    .iter_mut()
                    .find(|i| i.invite_id == *invite_id && !i.used_flag)
                    .ok_or(ServiceError::InvalidInvite("Invite code already used"))?;
                invite.used_flag = true;

                state.users.push(user.clone());
                if let Some(group_id) = family_group_id {
                    state.memberships.push((*group_id, user.user_id));
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SessionStore for MockStore {
    async fn create_session(&self, session: &Session) -> Result<(), ServiceError> {
        let mut state = self.lock()?;
        revoke_where(&mut state, |s| {
            s.user_id == session.user_id && s.device_id == session.device_id && !s.revoked_flag
        });
        state.sessions.push(session.clone());
        Ok(())
    }

    async fn find_active_session(
        &self,
        user_id: Uuid,
        device_id: &str,
        refresh_token_hash: &str,
    ) -> Result<Option<Session>, ServiceError> {
        let session = self
            .lock()?
            .sessions
            .iter()
            .find(|s| {
                s.user_id == user_id
                    && s.device_id == device_id
                    && s.refresh_token_hash == refresh_token_hash
                    && !s.revoked_flag
            })
            .cloned();

        if let Some(barrier) = self.take_lookup_pause()? {
            barrier.wait().await;
        }
        Ok(session)
    }

    async fn find_session_by_id(&self, session_id: Uuid) -> Result<Option<Session>, ServiceError> {
        Ok(self
            .lock()?
            .sessions
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned())
    }

    async fn rotate_session(
        &self,
        session_id: Uuid,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<bool, ServiceError> {
        let mut state = self.lock()?;
        match state.sessions.iter_mut().find(|s| {
            s.session_id == session_id && s.refresh_token_hash == current_hash && !s.revoked_flag
        }) {
            Some(session) => {
                session.refresh_token_hash = new_hash.to_string();
                session.last_used_utc = Utc::now();
                Ok(true)
            }
            None => {
                self.rejected_rotations.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }
        }
    }

    async fn revoke_session(&self, session_id: Uuid) -> Result<u64, ServiceError> {
        let mut state = self.lock()?;
        Ok(revoke_where(&mut state, |s| {
            s.session_id == session_id && !s.revoked_flag
        }))
    }

    async fn revoke_session_by_token(
        &self,
        user_id: Uuid,
        device_id: &str,
        refresh_token_hash: &str,
    ) -> Result<u64, ServiceError> {
        let mut state = self.lock()?;
        Ok(revoke_where(&mut state, |s| {
            s.user_id == user_id
                && s.device_id == device_id
                && s.refresh_token_hash == refresh_token_hash
                && !s.revoked_flag
        }))
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let mut state = self.lock()?;
        Ok(revoke_where(&mut state, |s| {
            s.user_id == user_id && !s.revoked_flag
        }))
    }

    async fn revoke_all_except_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<u64, ServiceError> {
        let mut state = self.lock()?;
        Ok(revoke_where(&mut state, |s| {
            s.user_id == user_id && s.device_id != device_id && !s.revoked_flag
        }))
    }

    async fn list_active_sessions(&self, user_id: Uuid) -> Result<Vec<Session>, ServiceError> {
        let mut sessions: Vec<Session> = self
            .lock()?
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && !s.revoked_flag)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_used_utc.cmp(&a.last_used_utc));
        Ok(sessions)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[async_trait]
impl SecurityEventLog for MockStore {
    async fn append_event(&self, event: &SecurityEvent) -> Result<(), ServiceError> {
        if self.fail_event_log.load(Ordering::SeqCst) {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "security event log unavailable"
            )));
        }
        self.lock()?.events.push(event.clone());
        Ok(())
    }
}
