#![cfg(test)]

use axum::{
    body::Body,
    http::{header, StatusCode},
};
use serde_json::json;

use super::support::*;
use crate::middleware::session::SESSION_COOKIE;

#[tokio::test]
async fn test_first_admin_can_be_created_without_session() {
    let app = spawn_app().await;
    let csrf = app.csrf_token().await;

    let res = app
        .send(mutation("POST", "/api/admin/users", Some(&csrf), None, json!({"username": " ada ", "password": "pw-1"})))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = body_json(res).await;
    assert_eq!(body["user"]["username"], "ada");
    assert!(body["user"].get("password_hash").is_none());

    // Only while the table is empty
    let res = app
        .send(mutation("POST", "/api/admin/users", Some(&csrf), None, json!({"username": "eve", "password": "pw-2"})))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // And the created account can log in
    let res = app
        .send(mutation("POST", "/api/admin/login", Some(&csrf), None, json!({"username": "ada", "password": "pw-1"})))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_user_with_session_and_duplicates() {
    let app = spawn_app().await;
    let id = app.create_user("ada", "pw").await;
    let session = app.session_for(&id, "ada");
    let csrf = app.csrf_token().await;

    let res = app
        .send(mutation("POST", "/api/admin/users", Some(&csrf), Some(&session), json!({"username": "grace", "password": "pw"})))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = app
        .send(mutation("POST", "/api/admin/users", Some(&csrf), Some(&session), json!({"username": "grace", "password": "other"})))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["error"]["message"], "Username already exists");
}

#[tokio::test]
async fn test_create_user_validation() {
    let app = spawn_app().await;
    let id = app.create_user("ada", "pw").await;
    let session = app.session_for(&id, "ada");
    let csrf = app.csrf_token().await;

    let res = app
        .send(mutation("POST", "/api/admin/users", Some(&csrf), Some(&session), json!({"username": "grace"})))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"]["message"], "Missing fields");

    let long_name = "x".repeat(65);
    let res = app
        .send(mutation("POST", "/api/admin/users", Some(&csrf), Some(&session), json!({"username": long_name, "password": "pw"})))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"]["field"], "username");
}

#[tokio::test]
async fn test_list_users_requires_session_and_hides_hashes() {
    let app = spawn_app().await;
    let res = app.send(get("/api/admin/users").body(Body::empty()).unwrap()).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let id = app.create_user("grace", "pw").await;
    app.create_user("ada", "pw").await;
    let session = app.session_for(&id, "grace");
    let req = get("/api/admin/users")
        .header(header::COOKIE, format!("{}={}", SESSION_COOKIE, session))
        .body(Body::empty())
        .unwrap();
    let res = app.send(req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "ada");
    assert_eq!(users[1]["username"], "grace");
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));
}

#[tokio::test]
async fn test_update_password() {
    let app = spawn_app().await;
    let id = app.create_user("ada", "old-pw").await;
    let session = app.session_for(&id, "ada");
    let csrf = app.csrf_token().await;

    let uri = format!("/api/admin/users/{}", id);
    let res = app
        .send(mutation("PATCH", &uri, Some(&csrf), Some(&session), json!({"password": "new-pw"})))
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let old = app
        .send(mutation("POST", "/api/admin/login", Some(&csrf), None, json!({"username": "ada", "password": "old-pw"})))
        .await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);
    let new = app
        .send(mutation("POST", "/api/admin/login", Some(&csrf), None, json!({"username": "ada", "password": "new-pw"})))
        .await;
    assert_eq!(new.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_password_errors() {
    let app = spawn_app().await;
    let id = app.create_user("ada", "pw").await;
    let session = app.session_for(&id, "ada");
    let csrf = app.csrf_token().await;

    let res = app
        .send(mutation("PATCH", "/api/admin/users/does-not-exist", Some(&csrf), Some(&session), json!({"password": "x"})))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let uri = format!("/api/admin/users/{}", id);
    let res = app.send(mutation("PATCH", &uri, Some(&csrf), Some(&session), json!({}))).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"]["message"], "Missing password");

    // CSRF is checked before the session
    let res = app.send(mutation("PATCH", &uri, None, None, json!({"password": "x"}))).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app.send(mutation("PATCH", &uri, Some(&csrf), None, json!({"password": "x"}))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delete_user() {
    let app = spawn_app().await;
    let ada = app.create_user("ada", "pw").await;
    let grace = app.create_user("grace", "pw").await;
    let session = app.session_for(&ada, "ada");
    let csrf = app.csrf_token().await;

    let uri = format!("/api/admin/users/{}", grace);
    let res = app.send(mutation("DELETE", &uri, Some(&csrf), Some(&session), json!({}))).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(crate::db::count_users(&app.state.db).await.unwrap(), 1);

    let res = app.send(mutation("DELETE", &uri, Some(&csrf), Some(&session), json!({}))).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_user_rate_limited_per_action() {
    let app = spawn_app_with(|cfg| {
        cfg.rate_limits.user_delete.limit = 2;
    })
    .await;
    let ada = app.create_user("ada", "pw").await;
    let session = app.session_for(&ada, "ada");
    let csrf = app.csrf_token().await;

    for _ in 0..2 {
        let res = app
            .send(mutation("DELETE", "/api/admin/users/missing", Some(&csrf), Some(&session), json!({})))
            .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
    let res = app
        .send(mutation("DELETE", "/api/admin/users/missing", Some(&csrf), Some(&session), json!({})))
        .await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    // A different action keeps its own budget
    let res = app
        .send(mutation("PATCH", "/api/admin/users/missing", Some(&csrf), Some(&session), json!({"password": "x"})))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_bootstrap_creates_one_account() {
    let app = spawn_app().await;
    let csrf = app.csrf_token().await;

    let first = mutation("POST", "/api/admin/users", Some(&csrf), None, json!({"username": "ada", "password": "pw-1"}));
    let second = mutation("POST", "/api/admin/users", Some(&csrf), None, json!({"username": "eve", "password": "pw-2"}));
    let (a, b) = tokio::join!(app.send(first), app.send(second));

    let mut statuses = vec![a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::UNAUTHORIZED]);
    assert_eq!(crate::db::count_users(&app.state.db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_last_account_cannot_be_deleted() {
    let app = spawn_app().await;
    let ada = app.create_user("ada", "pw").await;
    let session = app.session_for(&ada, "ada");
    let csrf = app.csrf_token().await;

    let uri = format!("/api/admin/users/{}", ada);
    let res = app.send(mutation("DELETE", &uri, Some(&csrf), Some(&session), json!({}))).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(res).await["error"]["message"], "Cannot delete the last admin account");
    assert_eq!(crate::db::count_users(&app.state.db).await.unwrap(), 1);

    // Bootstrap stays closed
    let res = app
        .send(mutation("POST", "/api/admin/users", Some(&csrf), None, json!({"username": "eve", "password": "pw"})))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
