mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{body_json, json_request, TestApp};
use shoplist_auth::models::{Invite, UserRole};
use uuid::Uuid;

fn registration(name: &str, email: &str, username: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "email": email,
        "username": username,
        "password": "correct horse battery",
    })
}

fn invite(code: &str, email: &str, family_group_id: Option<Uuid>, expires_in: Duration) -> Invite {
    Invite {
        invite_id: Uuid::new_v4(),
        invite_code: code.to_string(),
        email: email.to_string(),
        role_code: UserRole::User.as_str().to_string(),
        invited_by_user_id: Uuid::new_v4(),
        family_group_id,
        used_flag: false,
        expiry_utc: Utc::now() + expires_in,
        created_utc: Utc::now(),
    }
}

#[tokio::test]
async fn test_register_without_invite_founds_household() {
    let app = TestApp::spawn();

    let response = app
        .send(json_request(
            "POST",
            "/auth/register",
            &registration("Alice", "alice@example.com", "alice"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Registration successful");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["role"], "ADMIN");

    let groups = app.store.family_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].group_name, "Alice's Family");
    assert_eq!(groups[0].created_by_user_id.to_string(), body["user"]["id"]);

    // The new account can sign in straight away.
    let login = app.login("alice", "device-a").await;
    assert_eq!(login.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_with_invite_joins_household() {
    let app = TestApp::spawn();
    let group_id = Uuid::new_v4();
    app.store
        .insert_invite(invite("JOIN-ME", "bob@example.com", Some(group_id), Duration::days(1)))
        .unwrap();

    let mut request = registration("Bob", "BOB@example.com", "bob");
    request["inviteCode"] = serde_json::json!("JOIN-ME");
    let response = app.send(json_request("POST", "/auth/register", &request)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["user"]["role"], "USER");

    let memberships = app.store.memberships().unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].0, group_id);
    assert_eq!(memberships[0].1.to_string(), body["user"]["id"]);
    assert!(app.store.invite("JOIN-ME").unwrap().unwrap().used_flag);
    assert!(app.store.family_groups().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_rejects_bad_invites() {
    let app = TestApp::spawn();
    app.store
        .insert_invite(invite("EXPIRED", "bob@example.com", None, Duration::days(-1)))
        .unwrap();
    app.store
        .insert_invite(invite("FOR-CAROL", "carol@example.com", None, Duration::days(1)))
        .unwrap();

    let cases = [
        ("NOPE", "Invalid invite code"),
        ("EXPIRED", "Invite code has expired"),
        ("FOR-CAROL", "Email does not match invite"),
    ];
    for (code, message) in cases {
        let mut request = registration("Bob", "bob@example.com", "bob");
        request["inviteCode"] = serde_json::json!(code);
        let response = app.send(json_request("POST", "/auth/register", &request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "invite {}", code);
        assert_eq!(body_json(response).await["error"], message);
    }
}

#[tokio::test]
async fn test_invite_is_single_use() {
    let app = TestApp::spawn();
    app.store
        .insert_invite(invite("ONCE", "bob@example.com", None, Duration::days(1)))
        .unwrap();

    let mut first = registration("Bob", "bob@example.com", "bob");
    first["inviteCode"] = serde_json::json!("ONCE");
    let response = app.send(json_request("POST", "/auth/register", &first)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let mut second = registration("Bob Again", "bob2@example.com", "bob2");
    second["inviteCode"] = serde_json::json!("ONCE");
    let response = app.send(json_request("POST", "/auth/register", &second)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invite code already used");
}

#[tokio::test]
async fn test_register_duplicate_email_or_username_conflicts() {
    let app = TestApp::spawn();
    app.seed_user("alice", "alice@example.com");

    let same_email = app
        .send(json_request(
            "POST",
            "/auth/register",
            &registration("Alice", "alice@example.com", "alice2"),
        ))
        .await;
    assert_eq!(same_email.status(), StatusCode::CONFLICT);

    let same_username = app
        .send(json_request(
            "POST",
            "/auth/register",
            &registration("Alice", "alice2@example.com", "alice"),
        ))
        .await;
    assert_eq!(same_username.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_validates_fields() {
    let app = TestApp::spawn();

    let bad_email = app
        .send(json_request(
            "POST",
            "/auth/register",
            &registration("Alice", "not-an-email", "alice"),
        ))
        .await;
    assert_eq!(bad_email.status(), StatusCode::BAD_REQUEST);

    let mut short_password = registration("Alice", "alice@example.com", "alice");
    short_password["password"] = serde_json::json!("short");
    let response = app
        .send(json_request("POST", "/auth/register", &short_password))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let missing_name = app
        .send(json_request(
            "POST",
            "/auth/register",
            &serde_json::json!({ "email": "alice@example.com", "username": "alice", "password": "correct horse battery" }),
        ))
        .await;
    assert_eq!(missing_name.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.family_groups().unwrap().is_empty());
}
