//! Store tests against a real PostgreSQL. Run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

use chrono::{Duration, Utc};
use shoplist_auth::{
    config::DatabaseConfig,
    db,
    models::{DeviceMetadata, Enrollment, FamilyGroup, Invite, Session, User, UserRole},
    services::{Database, ServiceError, SessionStore, UserStore},
};
use sqlx::PgPool;
use uuid::Uuid;

async fn database() -> (Database, PgPool) {
    let config = DatabaseConfig {
        url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/shoplist_auth_test".to_string()),
        max_connections: 5,
        min_connections: 1,
    };
    let pool = db::connect(&config)
        .await
        .expect("Failed to connect to PostgreSQL");
    (Database::new(pool.clone()), pool)
}

fn new_user(role: UserRole) -> User {
    let tag = Uuid::new_v4().simple().to_string();
    User::new(
        format!("user-{}", tag),
        format!("{}@example.com", tag),
        Some("Test".to_string()),
        "not-a-real-hash".to_string(),
        role,
    )
}

/// Registers an admin together with the household they found.
async fn seed_admin(db: &Database) -> (User, FamilyGroup) {
    let admin = new_user(UserRole::Admin);
    let group = FamilyGroup::founded_by(admin.user_id, "Test");
    db.create_user(&admin, &Enrollment::FoundFamily(group.clone()))
        .await
        .expect("Failed to seed admin");
    (admin, group)
}

fn session(user_id: Uuid, device_id: &str, token: &str) -> Session {
    Session::new(
        user_id,
        device_id.to_string(),
        token,
        DeviceMetadata::default(),
    )
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn rotate_from_stale_hash_returns_false() {
    // Arrange
    let (db, _) = database().await;
    let (user, _) = seed_admin(&db).await;
    let created = session(user.user_id, "device-a", "r1");
    db.create_session(&created).await.unwrap();
    let r1 = Session::hash_token("r1");
    let r2 = Session::hash_token("r2");

    // Act
    let first = db.rotate_session(created.session_id, &r1, &r2).await.unwrap();
    let stale = db
        .rotate_session(created.session_id, &r1, &Session::hash_token("r2-other"))
        .await
        .unwrap();

    // Assert
    assert!(first);
    assert!(!stale);
    let stored = db.find_session_by_id(created.session_id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token_hash, r2);
    assert!(stored.last_used_utc >= stored.created_utc);
    assert!(db
        .find_active_session(user.user_id, "device-a", &r1)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn concurrent_rotations_have_one_winner() {
    // Arrange
    let (db, _) = database().await;
    let (user, _) = seed_admin(&db).await;
    let created = session(user.user_id, "device-a", "r1");
    db.create_session(&created).await.unwrap();
    let current = Session::hash_token("r1");
    let left = Session::hash_token("left");
    let right = Session::hash_token("right");

    // Act
    let (a, b) = tokio::join!(
        db.rotate_session(created.session_id, &current, &left),
        db.rotate_session(created.session_id, &current, &right),
    );

    // Assert
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a ^ b, "exactly one rotation must win");
    let stored = db.find_session_by_id(created.session_id).await.unwrap().unwrap();
    let expected = if a { &left } else { &right };
    assert_eq!(&stored.refresh_token_hash, expected);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn revoked_session_never_rotates() {
    // Arrange
    let (db, _) = database().await;
    let (user, _) = seed_admin(&db).await;
    let created = session(user.user_id, "device-a", "r1");
    db.create_session(&created).await.unwrap();

    // Act
    let revoked = db.revoke_session(created.session_id).await.unwrap();
    let again = db.revoke_session(created.session_id).await.unwrap();
    let rotated = db
        .rotate_session(
            created.session_id,
            &Session::hash_token("r1"),
            &Session::hash_token("r2"),
        )
        .await
        .unwrap();

    // Assert
    assert_eq!(revoked, 1);
    assert_eq!(again, 0);
    assert!(!rotated);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn relogin_replaces_active_device_session() {
    // Arrange
    let (db, pool) = database().await;
    let (user, _) = seed_admin(&db).await;
    let first = session(user.user_id, "device-a", "t1");
    let second = session(user.user_id, "device-a", "t2");
    let other = session(user.user_id, "device-b", "t3");

    // Act
    db.create_session(&first).await.unwrap();
    db.create_session(&second).await.unwrap();
    db.create_session(&other).await.unwrap();

    // Assert
    let active = db.list_active_sessions(user.user_id).await.unwrap();
    assert_eq!(active.len(), 2);
    assert!(active.iter().any(|s| s.session_id == second.session_id));
    assert!(active.iter().any(|s| s.session_id == other.session_id));

    let replaced = db.find_session_by_id(first.session_id).await.unwrap().unwrap();
    assert!(replaced.revoked_flag);

    // A second active row for the device is refused by the partial unique index.
    let duplicate = sqlx::query(
        r#"
        INSERT INTO sessions (session_id, user_id, device_id, refresh_token_hash, revoked_flag)
        VALUES ($1, $2, 'device-a', 'bypass', FALSE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .execute(&pool)
    .await;
    match duplicate {
        Err(sqlx::Error::Database(e)) => assert!(e.is_unique_violation()),
        other => panic!("expected a unique violation, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn concurrent_logins_leave_one_active_session() {
    // Arrange
    let (db, _) = database().await;
    let (user, _) = seed_admin(&db).await;
    let left = session(user.user_id, "device-a", "left");
    let right = session(user.user_id, "device-a", "right");

    // Act
    let (a, b) = tokio::join!(db.create_session(&left), db.create_session(&right));

    // Assert
    a.unwrap();
    b.unwrap();
    let active = db.list_active_sessions(user.user_id).await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn invite_is_consumed_once() {
    // Arrange
    let (db, pool) = database().await;
    let (admin, group) = seed_admin(&db).await;
    let invitee = new_user(UserRole::User);
    let invite = Invite::issue(
        invitee.email.clone(),
        UserRole::User,
        admin.user_id,
        group.family_group_id,
    );
    db.create_invite(&invite).await.unwrap();
    let enrollment = Enrollment::JoinFamily {
        invite_id: invite.invite_id,
        family_group_id: invite.family_group_id,
    };
    let latecomer = new_user(UserRole::User);

    // Act
    let joined = db.create_user(&invitee, &enrollment).await;
    let reused = db.create_user(&latecomer, &enrollment).await;

    // Assert
    joined.unwrap();
    assert!(matches!(reused, Err(ServiceError::InvalidInvite(_))));

    let stored = db.find_invite_by_code(&invite.invite_code).await.unwrap().unwrap();
    assert!(stored.used_flag);
    assert!(db.find_user_by_id(latecomer.user_id).await.unwrap().is_none());

    let members: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM family_group_members WHERE family_group_id = $1",
    )
    .bind(group.family_group_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(members, 1);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn duplicate_user_is_a_conflict() {
    // Arrange
    let (db, _) = database().await;
    let (admin, _) = seed_admin(&db).await;
    let mut twin = new_user(UserRole::Admin);
    twin.email = admin.email.clone();

    // Act
    let result = db
        .create_user(
            &twin,
            &Enrollment::FoundFamily(FamilyGroup::founded_by(twin.user_id, "Twin")),
        )
        .await;

    // Assert
    assert!(matches!(result, Err(ServiceError::UserAlreadyExists)));
    assert!(db.email_registered(&admin.email).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn pending_invite_blocks_second_until_expired() {
    // Arrange
    let (db, _) = database().await;
    let (admin, group) = seed_admin(&db).await;
    let email = format!("{}@example.com", Uuid::new_v4().simple());
    let issue = || {
        Invite::issue(
            email.clone(),
            UserRole::User,
            admin.user_id,
            group.family_group_id,
        )
    };

    let mut stale = issue();
    stale.expiry_utc = Utc::now() - Duration::minutes(1);
    db.create_invite(&stale).await.unwrap();
    assert!(!db.has_pending_invite(&email).await.unwrap());

    // Act
    let fresh = issue();
    let replaced = db.create_invite(&fresh).await;
    let duplicate = db.create_invite(&issue()).await;

    // Assert
    replaced.unwrap();
    assert!(matches!(duplicate, Err(ServiceError::InviteConflict(_))));
    assert!(db.has_pending_invite(&email).await.unwrap());
    assert!(db.find_invite_by_code(&stale.invite_code).await.unwrap().is_none());
    assert_eq!(
        db.find_family_group_created_by(admin.user_id)
            .await
            .unwrap()
            .map(|g| g.family_group_id),
        Some(group.family_group_id)
    );
}
