use std::sync::Arc;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::{
    models::{
        ClientContext, DeviceMetadata, Enrollment, FamilyGroup, Invite, SecurityEvent,
        SecurityEventType, Session, SessionSummary, User, UserRole,
    },
    services::{
        JwtService, RefreshTokenClaims, SecurityEventLog, SecurityEventRecorder, ServiceError,
        SessionStore, UserStore,
    },
    utils::{hash_password, verify_dummy_password, verify_password, Password, PasswordHashString},
};

#[derive(Debug, Clone)]
pub struct LoginCommand {
    /// Email or username
    pub identifier: String,
    pub password: Password,
    pub device_id: String,
    pub device: DeviceMetadata,
}

#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub name: String,
    pub email: String,
    pub username: String,
    pub password: Password,
    pub invite_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InviteCommand {
    pub email: String,
    /// `member`/`user` or `admin`, any case
    pub role: String,
}

pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct LoginOutcome {
    pub user: User,
    pub tokens: IssuedTokens,
}

pub struct RevokeOutcome {
    /// The caller revoked the session its own cookie belongs to.
    pub revoked_current: bool,
}

/// A refresh token that verified and still matches an active session.
struct AuthenticatedSession {
    user_id: Uuid,
    claims: RefreshTokenClaims,
    session: Session,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    events: SecurityEventRecorder,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        events: Arc<dyn SecurityEventLog>,
        jwt: JwtService,
    ) -> Self {
        Self {
            users,
            sessions,
            events: SecurityEventRecorder::new(events),
            jwt,
        }
    }

    pub async fn login(
        &self,
        cmd: LoginCommand,
        client: &ClientContext,
    ) -> Result<LoginOutcome, ServiceError> {
        if cmd.identifier.trim().is_empty() || cmd.password.as_str().is_empty() {
            return Err(ServiceError::ValidationError(
                "Email/Username and password are required".to_string(),
            ));
        }
        if cmd.device_id.trim().is_empty() {
            return Err(ServiceError::ValidationError("deviceId is required".to_string()));
        }

        let Some(user) = self
            .users
            .find_user_by_identifier(cmd.identifier.trim())
            .await?
        else {
            verify_dummy_password(&cmd.password);
            return Err(ServiceError::InvalidCredentials);
        };

        let stored_hash = PasswordHashString::new(user.password_hash.clone());
        if !verify_password(&cmd.password, &stored_hash) || !user.is_active() {
            tracing::info!(user_id = %user.user_id, "Login rejected");
            return Err(ServiceError::InvalidCredentials);
        }

        let user_id = user.user_id.to_string();
        let refresh_token = self.jwt.create_refresh_token(&user_id, &cmd.device_id)?;

        let mut device = cmd.device;
        if device.ip_address.is_none() {
            device.ip_address = client.ip_address.clone();
        }
        if device.user_agent.is_none() {
            device.user_agent = client.user_agent.clone();
        }

        let session = Session::new(user.user_id, cmd.device_id.clone(), &refresh_token, device);
        self.sessions.create_session(&session).await?;

        self.events
            .record(
                SecurityEvent::new(user.user_id, SecurityEventType::Login)
                    .with_device(cmd.device_id.as_str())
                    .with_ip(session.ip_address.clone())
                    .with_user_agent(session.user_agent.clone()),
            )
            .await;

        let access_token = self.jwt.create_access_token(&user_id)?;

        tracing::info!(user_id = %user.user_id, device_id = %cmd.device_id, "User logged in");

        Ok(LoginOutcome {
            user,
            tokens: IssuedTokens {
                access_token,
                refresh_token,
            },
        })
    }

    /// Rotates the refresh token. The presented token stops working the moment
    /// this succeeds.
    pub async fn refresh(
        &self,
        refresh_token: Option<&str>,
        client: &ClientContext,
    ) -> Result<IssuedTokens, ServiceError> {
        let auth = self.authenticate(refresh_token).await?;

        let new_refresh_token = self
            .jwt
            .create_refresh_token(&auth.claims.sub, &auth.claims.device_id)?;

        let rotated = self
            .sessions
            .rotate_session(
                auth.session.session_id,
                &auth.session.refresh_token_hash,
                &Session::hash_token(&new_refresh_token),
            )
            .await?;

        if !rotated {
            tracing::warn!(
                user_id = %auth.user_id,
                session_id = %auth.session.session_id,
                "Refresh lost a concurrent rotation"
            );
            return Err(ServiceError::Unauthenticated);
        }

        self.events
            .record(
                SecurityEvent::new(auth.user_id, SecurityEventType::Refresh)
                    .with_device(auth.claims.device_id.as_str())
                    .with_ip(client.ip_address.clone())
                    .with_user_agent(client.user_agent.clone()),
            )
            .await;

        let access_token = self.jwt.create_access_token(&auth.claims.sub)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token: new_refresh_token,
        })
    }

    /// Revokes only the session the presented token belongs to. Anything that
    /// cannot identify a session is a successful no-op.
    pub async fn logout_current(
        &self,
        refresh_token: Option<&str>,
        client: &ClientContext,
    ) -> Result<(), ServiceError> {
        let Some((user_id, claims, token)) = self.decode_for_cleanup(refresh_token) else {
            return Ok(());
        };

        let revoked = self
            .sessions
            .revoke_session_by_token(user_id, &claims.device_id, &Session::hash_token(token))
            .await?;

        self.events
            .record(
                SecurityEvent::new(user_id, SecurityEventType::LogoutCurrent)
                    .with_device(claims.device_id.as_str())
                    .with_ip(client.ip_address.clone())
                    .with_user_agent(client.user_agent.clone()),
            )
            .await;

        tracing::info!(user_id = %user_id, device_id = %claims.device_id, revoked, "Logged out current device");
        Ok(())
    }

    pub async fn logout_other(
        &self,
        refresh_token: Option<&str>,
        client: &ClientContext,
    ) -> Result<(), ServiceError> {
        let auth = self.authenticate(refresh_token).await?;

        let revoked = self
            .sessions
            .revoke_all_except_device(auth.user_id, &auth.claims.device_id)
            .await?;

        self.events
            .record(
                SecurityEvent::new(auth.user_id, SecurityEventType::LogoutOther)
                    .with_device(auth.claims.device_id.as_str())
                    .with_ip(client.ip_address.clone())
                    .with_user_agent(client.user_agent.clone()),
            )
            .await;

        tracing::info!(user_id = %auth.user_id, revoked, "Logged out other devices");
        Ok(())
    }

    /// Revokes every session of the token's user. A missing or undecodable
    /// token is a successful no-op.
    pub async fn logout_all(
        &self,
        refresh_token: Option<&str>,
        client: &ClientContext,
    ) -> Result<(), ServiceError> {
        let Some((user_id, claims, _)) = self.decode_for_cleanup(refresh_token) else {
            return Ok(());
        };

        let revoked = self.sessions.revoke_all_for_user(user_id).await?;

        self.events
            .record(
                SecurityEvent::new(user_id, SecurityEventType::LogoutAll)
                    .with_device(claims.device_id.as_str())
                    .with_ip(client.ip_address.clone())
                    .with_user_agent(client.user_agent.clone()),
            )
            .await;

        tracing::info!(user_id = %user_id, revoked, "Logged out all devices");
        Ok(())
    }

    pub async fn list_sessions(
        &self,
        refresh_token: Option<&str>,
    ) -> Result<Vec<SessionSummary>, ServiceError> {
        let auth = self.authenticate(refresh_token).await?;

        let sessions = self.sessions.list_active_sessions(auth.user_id).await?;
        Ok(sessions
            .into_iter()
            .map(|s| SessionSummary::from_session(s, &auth.claims.device_id))
            .collect())
    }

    /// Revokes one of the caller's own sessions. A session that does not exist
    /// and one owned by someone else are reported the same way.
    pub async fn revoke_session(
        &self,
        session_id: &str,
        refresh_token: Option<&str>,
        client: &ClientContext,
    ) -> Result<RevokeOutcome, ServiceError> {
        let auth = self.authenticate(refresh_token).await?;

        // A malformed id cannot name a session, same as an unknown one.
        let session_id = Uuid::parse_str(session_id).map_err(|_| ServiceError::SessionNotFound)?;
        let target = self
            .sessions
            .find_session_by_id(session_id)
            .await?
            .filter(|s| s.user_id == auth.user_id)
            .ok_or(ServiceError::SessionNotFound)?;

        self.sessions.revoke_session(target.session_id).await?;

        self.events
            .record(
                SecurityEvent::new(auth.user_id, SecurityEventType::RevokeDevice)
                    .with_device(target.device_id.as_str())
                    .with_ip(client.ip_address.clone())
                    .with_user_agent(target.user_agent.clone()),
            )
            .await;

        let revoked_current = target.session_id == auth.session.session_id;
        tracing::info!(
            user_id = %auth.user_id,
            session_id = %target.session_id,
            revoked_current,
            "Session revoked"
        );

        Ok(RevokeOutcome { revoked_current })
    }

    /// Resolves the caller from a live access token, falling back to a refresh
    /// token that still backs an active session.
    pub async fn current_user(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<Option<User>, ServiceError> {
        if let Some(user_id) = access_token
            .and_then(|t| self.jwt.verify_access_token(t))
            .and_then(|claims| claims.user_id())
        {
            if let Some(user) = self.users.find_user_by_id(user_id).await? {
                return Ok(Some(user));
            }
        }

        match self.authenticate(refresh_token).await {
            Ok(auth) => self.users.find_user_by_id(auth.user_id).await,
            Err(ServiceError::Unauthenticated) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn register(&self, cmd: RegisterCommand) -> Result<User, ServiceError> {
        let name = cmd.name.trim();
        let email = cmd.email.trim();
        let username = cmd.username.trim();
        if name.is_empty() || email.is_empty() || username.is_empty() || cmd.password.as_str().is_empty()
        {
            return Err(ServiceError::ValidationError(
                "All fields are required".to_string(),
            ));
        }

        if self.users.user_exists(email, username).await? {
            return Err(ServiceError::UserAlreadyExists);
        }

        let invite_code = cmd
            .invite_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let invite = match invite_code {
            Some(code) => {
                let invite = self
                    .users
                    .find_invite_by_code(code)
                    .await?
                    .ok_or(ServiceError::InvalidInvite("Invalid invite code"))?;
                if invite.used_flag {
                    return Err(ServiceError::InvalidInvite("Invite code already used"));
                }
                if invite.is_expired() {
                    return Err(ServiceError::InvalidInvite("Invite code has expired"));
                }
                if !invite.email.eq_ignore_ascii_case(email) {
                    return Err(ServiceError::InvalidInvite(
                        "Email does not match invite",
                    ));
                }
                Some(invite)
            }
            None => None,
        };

        let password_hash = hash_password(&cmd.password).map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;

        let role = if invite.is_some() {
            UserRole::User
        } else {
            UserRole::Admin
        };

        let user = User::new(
            username.to_string(),
            email.to_string(),
            Some(name.to_string()),
            password_hash.into_string(),
            role,
        );

        let enrollment = match invite {
            Some(invite) => Enrollment::JoinFamily {
                invite_id: invite.invite_id,
                family_group_id: invite.family_group_id,
            },
            None => Enrollment::FoundFamily(FamilyGroup::founded_by(user.user_id, name)),
        };

        self.users.create_user(&user, &enrollment).await?;

        tracing::info!(user_id = %user.user_id, role = %user.role_code, "User registered");

        Ok(user)
    }

    /// Lets a household admin invite someone into the household they founded.
    /// The caller is resolved the same way as `current_user`.
    pub async fn create_invite(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
        cmd: InviteCommand,
    ) -> Result<Invite, ServiceError> {
        let caller = self
            .current_user(access_token, refresh_token)
            .await?
            .ok_or(ServiceError::Unauthenticated)?;

        let email = cmd.email.trim();
        let role = cmd.role.trim();
        if email.is_empty() || role.is_empty() {
            return Err(ServiceError::ValidationError(
                "Email and role are required".to_string(),
            ));
        }
        if !email.validate_email() {
            return Err(ServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }
        let role = invite_role(role)?;

        if caller.role() != UserRole::Admin || !caller.is_active() {
            return Err(ServiceError::Forbidden("Only admins can send invites"));
        }

        if self.users.email_registered(email).await? {
            return Err(ServiceError::InviteConflict(
                "User with this email already exists",
            ));
        }
        if self.users.has_pending_invite(email).await? {
            return Err(ServiceError::InviteConflict(
                "Invite already sent to this email",
            ));
        }

        let group = self
            .users
            .find_family_group_created_by(caller.user_id)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError("Admin must have a family group".to_string())
            })?;

        let invite = Invite::issue(
            email.to_string(),
            role,
            caller.user_id,
            group.family_group_id,
        );
        self.users.create_invite(&invite).await?;

        tracing::info!(
            invited_by = %caller.user_id,
            family_group_id = %group.family_group_id,
            invite_id = %invite.invite_id,
            "Invite created"
        );

        Ok(invite)
    }

    pub async fn health_check(&self) -> Result<(), ServiceError> {
        self.sessions.health_check().await
    }

    /// Missing token, failed verification and no matching active session all
    /// collapse into `Unauthenticated`.
    async fn authenticate(
        &self,
        refresh_token: Option<&str>,
    ) -> Result<AuthenticatedSession, ServiceError> {
        let token = refresh_token.ok_or(ServiceError::Unauthenticated)?;
        let claims = self
            .jwt
            .verify_refresh_token(token)
            .ok_or(ServiceError::Unauthenticated)?;
        let user_id = claims.user_id().ok_or(ServiceError::Unauthenticated)?;

        let session = self
            .sessions
            .find_active_session(user_id, &claims.device_id, &Session::hash_token(token))
            .await?
            .ok_or(ServiceError::Unauthenticated)?;

        Ok(AuthenticatedSession {
            user_id,
            claims,
            session,
        })
    }

    fn decode_for_cleanup<'t>(
        &self,
        refresh_token: Option<&'t str>,
    ) -> Option<(Uuid, RefreshTokenClaims, &'t str)> {
        let token = refresh_token?;
        let claims = self.jwt.decode_refresh_token_for_cleanup(token)?;
        let user_id = claims.user_id()?;
        Some((user_id, claims, token))
    }
}

fn invite_role(label: &str) -> Result<UserRole, ServiceError> {
    match label.to_lowercase().as_str() {
        "member" | "user" => Ok(UserRole::User),
        "admin" => Ok(UserRole::Admin),
        _ => Err(ServiceError::ValidationError(format!("Invalid role: {}", label))),
    }
}
