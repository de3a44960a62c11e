//! Integration tests for the Frontdesk HTTP API.
//!
//! Covers the public visitor routes, the staff routes behind bearer
//! authentication, JSON error bodies and rate limiting. Each test builds its
//! own in-memory state.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use frontdesk_api::create_router;
use frontdesk_api::handlers::HealthResponse;
use frontdesk_api::state::AppState;
use frontdesk_core::auth::StaticCredentialVerifier;
use frontdesk_core::config::{FrontdeskConfig, StaffCredential};
use frontdesk_core::types::{NewSession, SessionStatus};
use frontdesk_storage::Database;

// =============================================================================
// Helpers
// =============================================================================

const TEST_TOKEN: &str = "staff-token-12345";

fn make_state_with(config: FrontdeskConfig) -> AppState {
    let staff = vec![StaffCredential {
        token: TEST_TOKEN.to_string(),
        agent_id: "agent-1".to_string(),
        name: "Ada".to_string(),
    }];
    let verifier = Arc::new(StaticCredentialVerifier::new(&staff));
    let db = Arc::new(Database::in_memory().unwrap());
    AppState::new(config, db, verifier, None)
}

/// Fresh state with an in-memory DB and one staff credential.
fn make_state() -> AppState {
    make_state_with(FrontdeskConfig::default())
}

fn authed_get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .body(Body::empty())
        .unwrap()
}

fn authed_post_empty(uri: &str) -> Request<Body> {
    Request::post(uri)
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .body(Body::empty())
        .unwrap()
}

fn authed_post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

/// Read full response body bytes.
async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

fn open_session(state: &AppState) -> Uuid {
    state.sessions().create(&NewSession::default()).unwrap().id
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.connections, 0);
    assert!(!health.version.is_empty());
}

// =============================================================================
// Public session routes
// =============================================================================

#[tokio::test]
async fn test_create_session_captures_headers() {
    let state = make_state();
    let app = create_router(state.clone());

    let req = Request::post("/sessions")
        .header("content-type", "application/json")
        .header("origin", "https://shop.example")
        .header("user-agent", "widget/1.0")
        .body(Body::from(
            r#"{"name":"Sam","contact":"sam@example.com","metadata":{"page":"/checkout"}}"#,
        ))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let json = body_json(resp).await;
    assert_eq!(json["status"], "open");
    let id: Uuid = json["sessionId"].as_str().unwrap().parse().unwrap();

    let session = state.sessions().get(id).unwrap().unwrap();
    assert_eq!(session.visitor_name.as_deref(), Some("Sam"));
    assert_eq!(session.visitor_contact.as_deref(), Some("sam@example.com"));
    assert_eq!(session.metadata.origin.as_deref(), Some("https://shop.example"));
    assert_eq!(session.metadata.user_agent.as_deref(), Some("widget/1.0"));
    assert_eq!(session.metadata.extra["page"], "/checkout");
}

#[tokio::test]
async fn test_create_session_with_empty_body_object() {
    let app = create_router(make_state());
    let resp = app.oneshot(post_json("/sessions", "{}")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_create_session_malformed_json() {
    let app = create_router(make_state());
    let resp = app.oneshot(post_json("/sessions", "{nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json = body_json(resp).await;
    assert_eq!(json["error"], "bad_request");
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_session_messages_in_order() {
    let state = make_state();
    let sid = open_session(&state);
    state.gateway.visitor_message(sid, "first").await.unwrap();
    state.gateway.visitor_message(sid, "second").await.unwrap();

    let app = create_router(state);
    let resp = app
        .oneshot(
            Request::get(format!("/sessions/{}/messages", sid))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    let contents: Vec<&str> = json["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["first", "second"]);
    assert_eq!(json["messages"][0]["senderKind"], "visitor");
}

#[tokio::test]
async fn test_session_messages_unknown_session() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(
            Request::get(format!("/sessions/{}/messages", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "not_found");
}

#[tokio::test]
async fn test_session_messages_invalid_id() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(
            Request::get("/sessions/not-a-uuid/messages")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Staff authentication
// =============================================================================

#[tokio::test]
async fn test_staff_routes_require_token() {
    let app = create_router(make_state());

    let resp = app
        .clone()
        .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "unauthorized");

    let resp = app
        .clone()
        .oneshot(
            Request::get("/knowledge")
                .header("authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app.oneshot(authed_get("/sessions")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_public_post_sessions_does_not_need_token() {
    // GET /sessions is staff-only but POST on the same path stays public.
    let app = create_router(make_state());
    let resp = app.oneshot(post_json("/sessions", "{}")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
}

// =============================================================================
// Staff session routes
// =============================================================================

#[tokio::test]
async fn test_list_sessions_with_unread_counts() {
    let state = make_state();
    let quiet = open_session(&state);
    let busy = open_session(&state);
    state.gateway.visitor_message(busy, "one").await.unwrap();
    state.gateway.visitor_message(busy, "two").await.unwrap();

    let app = create_router(state);
    let resp = app.oneshot(authed_get("/sessions?limit=10")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["total"], 2);
    let sessions = json["sessions"].as_array().unwrap();
    assert_eq!(sessions[0]["id"], busy.to_string());
    assert_eq!(sessions[0]["messageCount"], 2);
    assert_eq!(sessions[0]["unreadCount"], 2);
    assert_eq!(sessions[1]["id"], quiet.to_string());
}

#[tokio::test]
async fn test_list_sessions_status_filter() {
    let state = make_state();
    let open = open_session(&state);
    let closed = open_session(&state);
    state.gateway.close_session(closed).await.unwrap();

    let app = create_router(state);
    let resp = app
        .clone()
        .oneshot(authed_get("/sessions?status=closed"))
        .await
        .unwrap();
    let json = body_json(resp).await;
    let ids: Vec<&str> = json["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![closed.to_string().as_str()]);

    let resp = app
        .clone()
        .oneshot(authed_get("/sessions?status=open"))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["sessions"][0]["id"], open.to_string());
    assert_eq!(json["total"], 1);

    let resp = app
        .oneshot(authed_get("/sessions?status=archived"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_close_session_twice_conflicts() {
    let state = make_state();
    let sid = open_session(&state);
    let app = create_router(state.clone());

    let uri = format!("/sessions/{}/close", sid);
    let resp = app.clone().oneshot(authed_post_empty(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "closed");
    assert_eq!(
        state.sessions().get(sid).unwrap().unwrap().status,
        SessionStatus::Closed
    );

    let resp = app.oneshot(authed_post_empty(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["error"], "conflict");
}

#[tokio::test]
async fn test_close_unknown_session() {
    let app = create_router(make_state());
    let uri = format!("/sessions/{}/close", Uuid::new_v4());
    let resp = app.oneshot(authed_post_empty(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mark_read_counts_visitor_messages() {
    let state = make_state();
    let sid = open_session(&state);
    state.gateway.visitor_message(sid, "hello").await.unwrap();
    state.gateway.visitor_message(sid, "anyone?").await.unwrap();

    let app = create_router(state);
    let uri = format!("/sessions/{}/read", sid);
    let resp = app.clone().oneshot(authed_post_empty(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["marked"], 2);

    let resp = app.oneshot(authed_post_empty(&uri)).await.unwrap();
    assert_eq!(body_json(resp).await["marked"], 0);
}

// =============================================================================
// Knowledge
// =============================================================================

#[tokio::test]
async fn test_knowledge_create_and_list() {
    let app = create_router(make_state());

    let resp = app
        .clone()
        .oneshot(authed_post_json(
            "/knowledge",
            r#"{"title":"Shipping","content":"Standard shipping takes 3-5 business days.","tags":["orders"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    assert_eq!(created["title"], "Shipping");
    assert_eq!(created["tags"][0], "orders");

    let resp = app.oneshot(authed_get("/knowledge")).await.unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["documents"][0]["id"], created["id"]);
}

#[tokio::test]
async fn test_knowledge_rejects_blank_title() {
    let app = create_router(make_state());
    let resp = app
        .oneshot(authed_post_json(
            "/knowledge",
            r#"{"title":"  ","content":"something"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "bad_request");
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_rate_limit_applies_to_http_routes() {
    let mut config = FrontdeskConfig::default();
    config.api.rate_limit_per_sec = 1;
    let app = create_router(make_state_with(config));

    let mut limited = 0;
    for _ in 0..3 {
        let resp = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            assert_eq!(body_json(resp).await["error"], "too_many_requests");
            limited += 1;
        }
    }
    assert!(limited >= 1);

    // The socket route sits outside the limiter. Without upgrade headers the
    // request is rejected, but never with 429.
    let resp = app
        .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_ne!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
}
