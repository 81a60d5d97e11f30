/// Integration tests for the Cofound API
///
/// These tests drive the full router:
/// - Session handling on public and protected routes
/// - Magic-link sign-in end to end
/// - Startup creation and the participation request workflow
/// - Directory listing

mod common;

use axum::http::StatusCode;
use cofound_shared::auth::jwt::issue_token_pair;
use common::{get, query_param, send_json, TestContext};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

fn offline_token(ctx: &TestContext) -> String {
    issue_token_pair(Uuid::new_v4(), &ctx.config.jwt.secret)
        .unwrap()
        .access_token
}

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let ctx = TestContext::offline();

    let (status, body) = ctx.send(get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let ctx = TestContext::offline();

    let response = ctx.app.clone().oneshot(get("/health", None)).await.unwrap();
    let headers = response.headers();

    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let ctx = TestContext::offline();

    for uri in ["/api/users/me", "/api/requests"] {
        let (status, body) = ctx.send(get(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"], "unauthorized");
    }

    let (status, _) = ctx
        .send(send_json("POST", "/api/startups", None, json!({ "name": "Acme" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_tokens_are_rejected() {
    let ctx = TestContext::offline();

    let (status, _) = ctx.send(get("/api/users/me", Some("not-a-jwt"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A refresh token is not a session
    let refresh = issue_token_pair(Uuid::new_v4(), &ctx.config.jwt.secret)
        .unwrap()
        .refresh_token;
    let (status, _) = ctx.send(get("/api/users/me", Some(&refresh))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = axum::http::Request::builder()
        .uri("/api/users/me")
        .header("authorization", "Basic abc")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = ctx.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_validation_runs_before_database() {
    let ctx = TestContext::offline();
    let token = offline_token(&ctx);

    let (status, body) = ctx
        .send(send_json(
            "POST",
            "/api/startups",
            Some(&token),
            json!({ "name": "", "description": "short" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = ctx
        .send(send_json(
            "POST",
            "/api/auth/magic-link",
            None,
            json!({ "email": "nope" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = ctx.send(get("/api/startups?tags=1,abc", None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_magic_link_sign_in() {
    let Some(ctx) = TestContext::with_database().await else { return };
    let email = format!("founder-{}@example.com", Uuid::new_v4().simple());

    let (status, body) = ctx
        .send(send_json(
            "POST",
            "/api/auth/magic-link",
            None,
            json!({ "email": email }),
        ))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["sent"], true);

    let link = ctx.email.last().unwrap().url;
    let token = query_param(&link, "token").unwrap();
    let verify = format!(
        "/api/auth/magic-link/verify?token={}&email={}",
        token,
        email.replace('@', "%40")
    );

    let (status, body) = ctx.send(get(&verify, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    let access = body["access_token"].as_str().unwrap().to_string();
    let refresh = body["refresh_token"].as_str().unwrap().to_string();

    let (status, me) = ctx.send(get("/api/users/me", Some(&access))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], email);
    assert_eq!(me["id"], body["user_id"]);

    // The link works once
    let (status, _) = ctx.send(get(&verify, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, refreshed) = ctx
        .send(send_json(
            "POST",
            "/api/auth/refresh",
            None,
            json!({ "refresh_token": refresh }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(refreshed["access_token"].is_string());
}

#[tokio::test]
async fn test_participation_workflow() {
    let Some(ctx) = TestContext::with_database().await else { return };
    let (creator, creator_token) = ctx.signed_in_user("creator").await;
    let (applicant, applicant_token) = ctx.signed_in_user("applicant").await;
    let (_, outsider_token) = ctx.signed_in_user("outsider").await;
    let marker = format!("Workflow {}", Uuid::new_v4().simple());

    let (status, startup) = ctx
        .send(send_json(
            "POST",
            "/api/startups",
            Some(&creator_token),
            json!({
                "name": marker,
                "description": "Tooling for indie hardware makers",
                "tags": [{ "name": "Hardware" }, { "name": "hardware" }],
                "images": ["https://cdn.example.com/a.png"]
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(startup["creator"]["id"], json!(creator.id));
    assert_eq!(startup["participants"].as_array().unwrap().len(), 1);
    assert_eq!(startup["tags"].as_array().unwrap().len(), 1);
    let startup_id = startup["id"].as_str().unwrap().to_string();

    let (status, _) = ctx
        .send(send_json(
            "POST",
            &format!("/api/startups/{}/requests", startup_id),
            Some(&creator_token),
            json!({ "message": "me too" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, request) = ctx
        .send(send_json(
            "POST",
            &format!("/api/startups/{}/requests", startup_id),
            Some(&applicant_token),
            json!({ "message": "I can lead firmware" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["user_id"], json!(applicant.id));
    let request_id = request["id"].as_str().unwrap().to_string();

    let (_, state) = ctx
        .send(get(
            &format!("/api/startups/{}/participation", startup_id),
            Some(&applicant_token),
        ))
        .await;
    assert_eq!(state["state"], "requested");

    let (_, lists) = ctx.send(get("/api/requests", Some(&creator_token))).await;
    assert!(lists["incoming"]
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["id"] == request_id));

    let accept = format!("/api/startups/{}/requests/{}/accept", startup_id, request_id);

    let (status, body) = ctx
        .send(send_json("POST", &accept, Some(&outsider_token), json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = ctx
        .send(send_json("POST", &accept, Some(&creator_token), json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, body) = ctx
        .send(send_json("POST", &accept, Some(&creator_token), json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (_, state) = ctx
        .send(get(
            &format!("/api/startups/{}/participation", startup_id),
            Some(&applicant_token),
        ))
        .await;
    assert_eq!(state["state"], "participant");

    let (status, page) = ctx
        .send(get(
            &format!("/api/startups?search={}", marker.replace(' ', "%20")),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total_items"], 1);
    assert_eq!(page["items"][0]["participants"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_only_creator_edits_startup() {
    let Some(ctx) = TestContext::with_database().await else { return };
    let (_, creator_token) = ctx.signed_in_user("creator").await;
    let (_, other_token) = ctx.signed_in_user("other").await;

    let (_, startup) = ctx
        .send(send_json(
            "POST",
            "/api/startups",
            Some(&creator_token),
            json!({ "name": "Editable", "description": "A startup that changes its name" }),
        ))
        .await;
    let uri = format!("/api/startups/{}", startup["id"].as_str().unwrap());

    let (status, _) = ctx
        .send(send_json("PATCH", &uri, Some(&other_token), json!({ "name": "Hijacked" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .send(send_json("PATCH", &uri, Some(&creator_token), json!({ "name": "Renamed" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");

    let (status, _) = ctx
        .send(get(&format!("/api/startups/{}", Uuid::new_v4()), None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
