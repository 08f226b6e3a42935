mod common;

use access_service::models::{ActivityLog, Role};
use access_service::store::ActivityLogStore;
use axum::http::{Method, StatusCode};
use common::{TestApp, TEST_PASSWORD};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn registration_creates_inactive_account() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/users",
            None,
            json!({
                "email": "Reg@Example.com",
                "first_name": "Reg",
                "last_name": "Istered",
                "password": "password123",
                "role": "vendor"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    let data = &body["data"];
    assert_eq!(data["email"], "reg@example.com");
    assert_eq!(data["role"], "vendor");
    assert_eq!(data["vendor_status"], "pending");
    assert_eq!(data["is_active"], false);
    assert!(data.get("password").is_none());
    assert!(data.get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = TestApp::new();
    app.seed_user("taken@example.com", Role::User, true).await;

    let (status, body) = app
        .post(
            "/users",
            None,
            json!({
                "email": "taken@example.com",
                "first_name": "Second",
                "last_name": "Comer",
                "password": "password123"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn registration_rejects_short_password_and_admin_role() {
    let app = TestApp::new();

    let (short, body) = app
        .post(
            "/users",
            None,
            json!({ "email": "s@example.com", "first_name": "S", "last_name": "P", "password": "short" }),
        )
        .await;
    assert_eq!(short, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (admin, _) = app
        .post(
            "/users",
            None,
            json!({
                "email": "boss@example.com",
                "first_name": "B",
                "last_name": "O",
                "password": "password123",
                "role": "admin"
            }),
        )
        .await;
    assert_eq!(admin, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn registration_rejects_malformed_emails() {
    let app = TestApp::new();

    for email in ["x@y..com", "a@b_c.com", "a@-b.com", "\"<script>\"@example.com"] {
        let (status, body) = app
            .post(
                "/users",
                None,
                json!({
                    "email": email,
                    "first_name": "Bad",
                    "last_name": "Address",
                    "password": "password123"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", email);
        assert_eq!(body["code"], "validation_error");
    }
}

#[tokio::test]
async fn owner_deletes_own_account_with_own_password() {
    let app = TestApp::new();
    let user = app.seed_user("leaving@example.com", Role::User, true).await;
    let (access, _) = app.login("leaving@example.com", TEST_PASSWORD).await;

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/users/{}", user.user_id),
            Some(&access),
            Some(json!({ "current_password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (login, _) = app
        .post(
            "/auth/login",
            None,
            json!({ "email": "leaving@example.com", "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(login, StatusCode::UNAUTHORIZED);

    // The old access token no longer resolves to a live account.
    let (me, _) = app
        .request(Method::GET, "/users/me/activity", Some(&access), None)
        .await;
    assert_eq!(me, StatusCode::UNAUTHORIZED);

    assert_eq!(app.activity_of(user.user_id).await, vec!["account deleted by self"]);
}

#[tokio::test]
async fn admin_deletes_account_with_admin_password() {
    let app = TestApp::new();
    let admin = app.seed_admin("root@example.com", &[], &[]).await;
    let target = app.seed_user("victim@example.com", Role::User, true).await;
    let (access, _) = app.login("root@example.com", TEST_PASSWORD).await;

    // Seeded accounts share a password, so give the target a different one
    // by going through registration.
    let (_, body) = app
        .post(
            "/users",
            None,
            json!({
                "email": "other@example.com",
                "first_name": "O",
                "last_name": "T",
                "password": "a-different-password"
            }),
        )
        .await;
    let other_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/users/{}", other_id),
            Some(&access),
            Some(json!({ "current_password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.activity_of(admin.user_id).await,
        vec![format!("deleted account with id {}", other_id)]
    );

    // The target's own password is accepted from an admin too and is audited
    // against the target.
    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/users/{}", target.user_id),
            Some(&access),
            Some(json!({ "current_password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.activity_of(target.user_id).await, vec!["account deleted by self"]);
}

#[tokio::test]
async fn non_admin_cannot_delete_someone_else() {
    let app = TestApp::new();
    app.seed_user("nosy@example.com", Role::User, true).await;
    let target = app.seed_user("safe@example.com", Role::User, true).await;
    let (access, _) = app.login("nosy@example.com", TEST_PASSWORD).await;

    // Same password as the target, but the caller is neither owner nor admin.
    let (status, body) = app
        .request(
            Method::DELETE,
            &format!("/users/{}", target.user_id),
            Some(&access),
            Some(json!({ "current_password": TEST_PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "incorrect password");
    app.login("safe@example.com", TEST_PASSWORD).await;
}

#[tokio::test]
async fn delete_with_wrong_password_or_missing_target() {
    let app = TestApp::new();
    let user = app.seed_user("careful@example.com", Role::User, true).await;
    let (access, _) = app.login("careful@example.com", TEST_PASSWORD).await;

    let (wrong, _) = app
        .request(
            Method::DELETE,
            &format!("/users/{}", user.user_id),
            Some(&access),
            Some(json!({ "current_password": "guess" })),
        )
        .await;
    assert_eq!(wrong, StatusCode::UNAUTHORIZED);

    let (missing, _) = app
        .request(
            Method::DELETE,
            &format!("/users/{}", Uuid::new_v4()),
            Some(&access),
            Some(json!({ "current_password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(missing, StatusCode::NOT_FOUND);
    assert!(app.activity_of(user.user_id).await.is_empty());
}

#[tokio::test]
async fn recent_activity_is_capped_and_newest_first() {
    let app = TestApp::new();
    let user = app.seed_user("busy@example.com", Role::User, true).await;
    let other = app.seed_user("quiet@example.com", Role::User, true).await;
    for i in 0..12 {
        app.storage
            .activity
            .append_activity(&ActivityLog::new(user.user_id, format!("action {}", i)))
            .await
            .unwrap();
    }
    app.storage
        .activity
        .append_activity(&ActivityLog::new(other.user_id, "someone else"))
        .await
        .unwrap();
    let (access, _) = app.login("busy@example.com", TEST_PASSWORD).await;

    let (status, body) = app
        .request(Method::GET, "/users/me/activity", Some(&access), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions.len(), 10);
    assert_eq!(actions[0], "action 11");
    assert_eq!(actions[9], "action 2");
    assert!(!actions.contains(&"someone else"));
}
