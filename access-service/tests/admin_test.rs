mod common;

use access_service::models::{Identifier, Role};
use access_service::store::UserStore;
use axum::http::{Method, StatusCode};
use common::{TestApp, TEST_PASSWORD};
use serde_json::json;
use uuid::Uuid;

fn new_admin(email: &str) -> serde_json::Value {
    json!({
        "email": email,
        "first_name": "New",
        "last_name": "Admin",
        "module_access": ["user_management"]
    })
}

#[tokio::test]
async fn superuser_creates_admin_without_echoing_password() {
    let app = TestApp::new();
    let root = app.seed_superuser("root@example.com").await;
    let (access, _) = app.login("root@example.com", TEST_PASSWORD).await;

    let (status, body) = app
        .post("/admins", Some(&access), new_admin("fresh.admin@example.com"))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "success");
    let data = &body["data"];
    assert_eq!(data["role"], "admin");
    assert_eq!(data["is_admin"], true);
    assert_eq!(data["is_active"], true);
    assert_eq!(data["modules"], json!(["user_management"]));

    let new_id = Uuid::parse_str(data["id"].as_str().unwrap()).unwrap();
    let initial = app.notifier.initial_password_for(new_id).unwrap();
    assert!(!body.to_string().contains(&initial));
    assert!(data.get("password").is_none());

    app.login("fresh.admin@example.com", &initial).await;
    assert_eq!(
        app.activity_of(root.user_id).await,
        vec!["created admin with email fresh.admin@example.com"]
    );
}

#[tokio::test]
async fn admin_with_capability_and_module_can_create_admins() {
    let app = TestApp::new();
    app.seed_admin("lead@example.com", &["add_user"], &["user_management"])
        .await;
    let (access, _) = app.login("lead@example.com", TEST_PASSWORD).await;

    let (status, _) = app
        .post("/admins", Some(&access), new_admin("second@example.com"))
        .await;

    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn create_admin_requires_capability_and_module() {
    let app = TestApp::new();
    app.seed_admin("nomodule@example.com", &["add_user"], &[]).await;
    app.seed_admin("noperm@example.com", &[], &["user_management"]).await;
    app.seed_user("plain@example.com", Role::User, true).await;

    for email in ["nomodule@example.com", "noperm@example.com", "plain@example.com"] {
        let (access, _) = app.login(email, TEST_PASSWORD).await;
        let (status, body) = app
            .post("/admins", Some(&access), new_admin(&format!("x.{}", email)))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", email);
        assert_eq!(body["code"], "forbidden");
    }
}

#[tokio::test]
async fn duplicate_admin_email_is_a_validation_error() {
    let app = TestApp::new();
    app.seed_superuser("root@example.com").await;
    app.seed_user("exists@example.com", Role::User, true).await;
    let (access, _) = app.login("root@example.com", TEST_PASSWORD).await;

    let (status, body) = app
        .post("/admins", Some(&access), new_admin("exists@example.com"))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    assert_eq!(body["error"], "email already registered");
}

#[tokio::test]
async fn assign_role_adds_groups_to_admin() {
    let app = TestApp::new();
    let root = app.seed_superuser("root@example.com").await;
    let target = app.seed_admin("junior@example.com", &[], &["user_management"]).await;
    let group = app.seed_group("creators", &["add_user"]).await;
    let (access, _) = app.login("root@example.com", TEST_PASSWORD).await;

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/admins/{}/roles", target.user_id),
            Some(&access),
            Some(json!({ "roles": [group.group_id] })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "success" }));
    assert_eq!(
        app.activity_of(root.user_id).await,
        vec!["updated roles for junior@example.com"]
    );

    // The new group grants the capability.
    let (junior_access, _) = app.login("junior@example.com", TEST_PASSWORD).await;
    let (created, _) = app
        .post("/admins", Some(&junior_access), new_admin("third@example.com"))
        .await;
    assert_eq!(created, StatusCode::CREATED);
}

#[tokio::test]
async fn assign_role_rejects_non_admin_target() {
    let app = TestApp::new();
    app.seed_superuser("root@example.com").await;
    let target = app.seed_user("customer@example.com", Role::User, true).await;
    let group = app.seed_group("creators", &["add_user"]).await;
    let (access, _) = app.login("root@example.com", TEST_PASSWORD).await;

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/admins/{}/roles", target.user_id),
            Some(&access),
            Some(json!({ "roles": [group.group_id] })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "this is not an admin user");
}

#[tokio::test]
async fn assign_role_for_unknown_admin_is_not_found() {
    let app = TestApp::new();
    app.seed_superuser("root@example.com").await;
    let group = app.seed_group("creators", &["add_user"]).await;
    let (access, _) = app.login("root@example.com", TEST_PASSWORD).await;

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/admins/{}/roles", Uuid::new_v4()),
            Some(&access),
            Some(json!({ "roles": [group.group_id] })),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn assign_role_requires_capability() {
    let app = TestApp::new();
    app.seed_admin("weak@example.com", &["add_user"], &["user_management"])
        .await;
    let target = app.seed_admin("peer@example.com", &[], &[]).await;
    let group = app.seed_group("creators", &["add_user"]).await;
    let (access, _) = app.login("weak@example.com", TEST_PASSWORD).await;

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/admins/{}/roles", target.user_id),
            Some(&access),
            Some(json!({ "roles": [group.group_id] })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn list_admins_returns_live_admins_newest_first() {
    let app = TestApp::new();
    app.seed_superuser("root@example.com").await;
    let (access, _) = app.login("root@example.com", TEST_PASSWORD).await;

    for email in ["first@example.com", "second@example.com", "gone@example.com"] {
        let (status, _) = app.post("/admins", Some(&access), new_admin(email)).await;
        assert_eq!(status, StatusCode::CREATED);
        // Keep creation timestamps distinct.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    app.seed_user("customer@example.com", Role::User, true).await;
    let dormant = app.seed_admin("dormant@example.com", &[], &[]).await;
    app.storage
        .users
        .set_user_active(dormant.user_id, false)
        .await
        .unwrap();
    let gone = app
        .storage
        .users
        .find_user_by_identifier(&Identifier::email("gone@example.com").unwrap())
        .await
        .unwrap()
        .unwrap();
    app.storage.users.soft_delete_user(gone.user_id).await.unwrap();

    let (status, body) = app.request(Method::GET, "/admins", Some(&access), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "success");
    let emails: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["email"].as_str().unwrap())
        .collect();
    assert_eq!(
        emails,
        vec!["second@example.com", "first@example.com", "root@example.com"]
    );
    assert!(!body.to_string().contains("password"));
}

#[tokio::test]
async fn list_admins_requires_view_capability_in_module() {
    let app = TestApp::new();
    app.seed_admin("viewer@example.com", &["view_user"], &["user_management"])
        .await;
    app.seed_admin("outsider@example.com", &["view_user"], &[]).await;
    app.seed_admin("creator@example.com", &["add_user"], &["user_management"])
        .await;

    let (access, _) = app.login("viewer@example.com", TEST_PASSWORD).await;
    let (status, _) = app.request(Method::GET, "/admins", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);

    for email in ["outsider@example.com", "creator@example.com"] {
        let (access, _) = app.login(email, TEST_PASSWORD).await;
        let (status, body) = app.request(Method::GET, "/admins", Some(&access), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", email);
        assert_eq!(body["code"], "forbidden");
    }

    let (status, _) = app.request(Method::GET, "/admins", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
