//! PostgreSQL implementation of the store traits.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{Enrollment, FamilyGroup, Invite, SecurityEvent, Session, User};
use crate::services::{SecurityEventLog, ServiceError, SessionStore, UserStore};

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl UserStore for Database {
    async fn find_user_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = $1 OR username = $1 LIMIT 1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn user_exists(&self, email: &str, username: &str) -> Result<bool, ServiceError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 OR username = $2)",
        )
        .bind(email)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn email_registered(&self, email: &str) -> Result<bool, ServiceError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn find_invite_by_code(&self, code: &str) -> Result<Option<Invite>, ServiceError> {
        let invite = sqlx::query_as::<_, Invite>("SELECT * FROM invites WHERE invite_code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invite)
    }

    async fn has_pending_invite(&self, email: &str) -> Result<bool, ServiceError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM invites
                WHERE email = $1 AND used_flag = FALSE AND expiry_utc > NOW()
            )
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create_invite(&self, invite: &Invite) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM invites WHERE email = $1 AND used_flag = FALSE AND expiry_utc <= NOW()",
        )
        .bind(&invite.email)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO invites (invite_id, invite_code, email, role_code, invited_by_user_id, family_group_id, used_flag, expiry_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(invite.invite_id)
        .bind(&invite.invite_code)
        .bind(&invite.email)
        .bind(&invite.role_code)
        .bind(invite.invited_by_user_id)
        .bind(invite.family_group_id)
        .bind(invite.used_flag)
        .bind(invite.expiry_utc)
        .bind(invite.created_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::InviteConflict("Invite already sent to this email")
            } else {
                ServiceError::Database(e)
            }
        })?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_family_group_created_by(
        &self,
        user_id: Uuid,
    ) -> Result<Option<FamilyGroup>, ServiceError> {
        let group = sqlx::query_as::<_, FamilyGroup>(
            r#"
            SELECT * FROM family_groups
            WHERE created_by_user_id = $1
            ORDER BY created_utc
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn create_user(&self, user: &User, enrollment: &Enrollment) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (user_id, username, email, display_name, password_hash, role_code, active_flag, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(&user.role_code)
        .bind(user.active_flag)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::UserAlreadyExists
            } else {
                ServiceError::Database(e)
            }
        })?;

        match enrollment {
            Enrollment::FoundFamily(group) => {
                sqlx::query(
                    r#"
                    INSERT INTO family_groups (family_group_id, group_name, created_by_user_id, created_utc)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(group.family_group_id)
                .bind(&group.group_name)
                .bind(group.created_by_user_id)
                .bind(group.created_utc)
                .execute(&mut *tx)
                .await?;
            }
            Enrollment::JoinFamily {
                invite_id,
                family_group_id,
            } => {
                let consumed = sqlx::query(
                    "UPDATE invites SET used_flag = TRUE WHERE invite_id = $1 AND used_flag = FALSE",
                )
                .bind(invite_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

                if consumed == 0 {
                    return Err(ServiceError::InvalidInvite("Invite code already used"));
                }

                if let Some(group_id) = family_group_id {
                    sqlx::query(
                        r#"
                        INSERT INTO family_group_members (family_group_id, user_id, joined_utc)
                        VALUES ($1, $2, NOW())
                        "#,
                    )
                    .bind(group_id)
                    .bind(user.user_id)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn create_session(&self, session: &Session) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent logins of one user
        sqlx::query("SELECT user_id FROM users WHERE user_id = $1 FOR UPDATE")
            .bind(session.user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE sessions SET revoked_flag = TRUE WHERE user_id = $1 AND device_id = $2 AND revoked_flag = FALSE",
        )
        .bind(session.user_id)
        .bind(&session.device_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, device_id, refresh_token_hash, user_agent, platform, browser, ip_address, revoked_flag, created_utc, last_used_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(&session.device_id)
        .bind(&session.refresh_token_hash)
        .bind(&session.user_agent)
        .bind(&session.platform)
        .bind(&session.browser)
        .bind(&session.ip_address)
        .bind(session.revoked_flag)
        .bind(session.created_utc)
        .bind(session.last_used_utc)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_active_session(
        &self,
        user_id: Uuid,
        device_id: &str,
        refresh_token_hash: &str,
    ) -> Result<Option<Session>, ServiceError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE user_id = $1 AND device_id = $2 AND refresh_token_hash = $3 AND revoked_flag = FALSE
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .bind(refresh_token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find_session_by_id(&self, session_id: Uuid) -> Result<Option<Session>, ServiceError> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    async fn rotate_session(
        &self,
        session_id: Uuid,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET refresh_token_hash = $3, last_used_utc = NOW()
            WHERE session_id = $1 AND refresh_token_hash = $2 AND revoked_flag = FALSE
            "#,
        )
        .bind(session_id)
        .bind(current_hash)
        .bind(new_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_session(&self, session_id: Uuid) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_flag = TRUE WHERE session_id = $1 AND revoked_flag = FALSE",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_session_by_token(
        &self,
        user_id: Uuid,
        device_id: &str,
        refresh_token_hash: &str,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET revoked_flag = TRUE
            WHERE user_id = $1 AND device_id = $2 AND refresh_token_hash = $3 AND revoked_flag = FALSE
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .bind(refresh_token_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_flag = TRUE WHERE user_id = $1 AND revoked_flag = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_all_except_device(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<u64, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET revoked_flag = TRUE
            WHERE user_id = $1 AND device_id <> $2 AND revoked_flag = FALSE
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_active_sessions(&self, user_id: Uuid) -> Result<Vec<Session>, ServiceError> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE user_id = $1 AND revoked_flag = FALSE
            ORDER BY last_used_utc DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                ServiceError::Database(e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl SecurityEventLog for Database {
    async fn append_event(&self, event: &SecurityEvent) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO security_events (event_id, user_id, event_type_code, device_id, ip_address, user_agent, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.event_id)
        .bind(event.user_id)
        .bind(&event.event_type_code)
        .bind(&event.device_id)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(event.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
