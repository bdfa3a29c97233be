//! Households and the invites that let new members join them.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::UserRole;

/// How long an invite stays redeemable.
pub const INVITE_TTL_DAYS: i64 = 7;

/// Family group entity.
#[derive(Debug, Clone, FromRow)]
pub struct FamilyGroup {
    pub family_group_id: Uuid,
    pub group_name: String,
    pub created_by_user_id: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl FamilyGroup {
    /// Household founded by a newly registered admin.
    pub fn founded_by(user_id: Uuid, founder_name: &str) -> Self {
        Self {
            family_group_id: Uuid::new_v4(),
            group_name: format!("{}'s Family", founder_name),
            created_by_user_id: user_id,
            created_utc: Utc::now(),
        }
    }
}

/// Invite entity.
#[derive(Debug, Clone, FromRow)]
pub struct Invite {
    pub invite_id: Uuid,
    pub invite_code: String,
    pub email: String,
    pub role_code: String,
    pub invited_by_user_id: Uuid,
    pub family_group_id: Option<Uuid>,
    pub used_flag: bool,
    pub expiry_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl Invite {
    /// Fresh single-use invite into `family_group_id`, valid for `INVITE_TTL_DAYS`.
    pub fn issue(
        email: String,
        role: UserRole,
        invited_by_user_id: Uuid,
        family_group_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            invite_id: Uuid::new_v4(),
            invite_code: Uuid::new_v4().simple().to_string(),
            email,
            role_code: role.as_str().to_string(),
            invited_by_user_id,
            family_group_id: Some(family_group_id),
            used_flag: false,
            expiry_utc: now + Duration::days(INVITE_TTL_DAYS),
            created_utc: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_utc <= Utc::now()
    }

    /// Unused and not yet expired.
    pub fn is_pending(&self) -> bool {
        !self.used_flag && !self.is_expired()
    }
}

/// How a newly registered user is attached to a household.
#[derive(Debug, Clone)]
pub enum Enrollment {
    /// Registration without an invite founds a new household.
    FoundFamily(FamilyGroup),
    /// Registration with an invite consumes it and joins its household, if any.
    JoinFamily {
        invite_id: Uuid,
        family_group_id: Option<Uuid>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_founded_group_is_named_after_founder() {
        let user_id = Uuid::new_v4();
        let group = FamilyGroup::founded_by(user_id, "Alice");
        assert_eq!(group.group_name, "Alice's Family");
        assert_eq!(group.created_by_user_id, user_id);
    }

    #[test]
    fn test_invite_expiry() {
        let invite = Invite {
            invite_id: Uuid::new_v4(),
            invite_code: "code".to_string(),
            email: "bob@example.com".to_string(),
            role_code: UserRole::User.as_str().to_string(),
            invited_by_user_id: Uuid::new_v4(),
            family_group_id: None,
            used_flag: false,
            expiry_utc: Utc::now() - Duration::minutes(1),
            created_utc: Utc::now() - Duration::days(1),
        };
        assert!(invite.is_expired());
        assert!(!invite.is_pending());
    }

    #[test]
    fn test_issued_invite_lasts_a_week() {
        let admin = Uuid::new_v4();
        let group = Uuid::new_v4();
        let invite = Invite::issue("bob@example.com".to_string(), UserRole::User, admin, group);

        assert!(invite.is_pending());
        assert_eq!(invite.role_code, "user");
        assert_eq!(invite.invited_by_user_id, admin);
        assert_eq!(invite.family_group_id, Some(group));
        assert_eq!(invite.expiry_utc - invite.created_utc, Duration::days(INVITE_TTL_DAYS));

        let other = Invite::issue("carol@example.com".to_string(), UserRole::User, admin, group);
        assert_ne!(invite.invite_code, other.invite_code);
    }
}
