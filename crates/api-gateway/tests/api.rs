//! End-to-end route tests against an in-memory store.

use api_gateway::{build_router, AppState, GatewayConfig};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use storage::Store;
use tower::ServiceExt;

const BOT_SECRET: &str = "test-issuer-secret";
const CREATOR_ID: i64 = 42;

fn router() -> axum::Router {
    let config = GatewayConfig {
        bot_secret: BOT_SECRET.into(),
        admin_ids: vec![CREATOR_ID],
        ..GatewayConfig::default()
    };
    let store = Store::open_in_memory().unwrap();
    build_router(AppState::new(store, config, None))
}

fn router_with_store() -> (axum::Router, std::sync::Arc<Store>) {
    let config = GatewayConfig {
        bot_secret: BOT_SECRET.into(),
        admin_ids: vec![CREATOR_ID],
        ..GatewayConfig::default()
    };
    let state = AppState::new(Store::open_in_memory().unwrap(), config, None);
    let store = state.store.clone();
    (build_router(state), store)
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> Vec<u8> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).unwrap();
    mac.update(msg);
    mac.finalize().into_bytes().to_vec()
}

/// Produce a signed header value the verifier accepts.
fn signed_init_data(user_id: i64, username: Option<&str>) -> String {
    let user_json = match username {
        Some(name) => format!(r#"{{"id":{user_id},"username":"{name}"}}"#),
        None => format!(r#"{{"id":{user_id}}}"#),
    };
    let auth_date = chrono::Utc::now().timestamp().to_string();
    let mut pairs = vec![
        ("auth_date".to_string(), auth_date),
        ("user".to_string(), user_json),
    ];
    pairs.sort();
    let check_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");
    let secret = hmac_sha256(BOT_SECRET.as_bytes(), b"WebAppData");
    let hash = hex::encode(hmac_sha256(&secret, check_string.as_bytes()));

    let mut raw = pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    raw.push_str(&format!("&hash={hash}"));
    raw
}

fn json_request(method: &str, uri: &str, init_data: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(data) = init_data {
        builder = builder.header("X-Init-Data", data);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, init_data: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(data) = init_data {
        builder = builder.header("X-Init-Data", data);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn sample_test_body(slug: &str, public: bool) -> Value {
    json!({
        "slug": slug,
        "title": "Which hero are you?",
        "type": "single",
        "is_public": public,
        "questions": [
            { "text": "Pick a color", "answers": [
                { "text": "Red", "result_index": 0 },
                { "text": "Blue", "result_index": 1 }
            ]}
        ],
        "results": [ { "title": "Fire" }, { "title": "Water" } ]
    })
}

#[tokio::test]
async fn health_answers_ok() {
    let response = router()
        .oneshot(get_request("/api/v1/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn authoring_requires_signed_session_and_allow_list() {
    let app = router();

    let anonymous = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests",
            None,
            sample_test_body("a", false),
        ))
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let outsider = signed_init_data(7, None);
    let forbidden = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests",
            Some(&outsider),
            sample_test_body("a", false),
        ))
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let tampered = format!("{}x", signed_init_data(CREATOR_ID, None));
    let rejected = app
        .oneshot(json_request(
            "POST",
            "/api/v1/tests",
            Some(&tampered),
            sample_test_body("a", false),
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_list_and_slug_conflict() {
    let app = router();
    let creator = signed_init_data(CREATOR_ID, Some("ann"));

    let created = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests",
            Some(&creator),
            sample_test_body("hero-quiz", true),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = body_json(created).await;
    assert_eq!(body["slug"], "hero-quiz");
    assert_eq!(body["created_by"], CREATOR_ID);
    assert_eq!(body["created_by_username"], "ann");

    let conflict = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests",
            Some(&creator),
            sample_test_body("hero-quiz", true),
        ))
        .await
        .unwrap();
    assert_eq!(conflict.status(), StatusCode::CONFLICT);

    let taken = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests/slug/check",
            Some(&creator),
            json!({ "slug": "hero-quiz" }),
        ))
        .await
        .unwrap();
    assert_eq!(taken.status(), StatusCode::CONFLICT);

    let listed = app
        .oneshot(get_request("/api/v1/tests", Some(&creator)))
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    let list = body_json(listed).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn public_view_hides_unpublished_tests() {
    let app = router();
    let creator = signed_init_data(CREATOR_ID, None);

    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests",
            Some(&creator),
            sample_test_body("draft", false),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests",
            Some(&creator),
            sample_test_body("live", true),
        ))
        .await
        .unwrap();

    let hidden = app
        .clone()
        .oneshot(get_request("/api/v1/tests/slug/draft/public", None))
        .await
        .unwrap();
    assert_eq!(hidden.status(), StatusCode::NOT_FOUND);

    let visible = app
        .oneshot(get_request("/api/v1/tests/slug/live/public", None))
        .await
        .unwrap();
    assert_eq!(visible.status(), StatusCode::OK);
}

#[tokio::test]
async fn telemetry_accepts_anonymous_writers() {
    let app = router();
    let creator = signed_init_data(CREATOR_ID, None);
    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests",
            Some(&creator),
            sample_test_body("quiz", true),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests/slug/quiz/responses",
            None,
            json!({ "result_title": "Fire", "answers": { "1": "Red" } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["user_id"], 0);

    let event = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests/slug/quiz/events",
            None,
            json!({ "event_type": "screen_open" }),
        ))
        .await
        .unwrap();
    assert_eq!(event.status(), StatusCode::CREATED);

    // Open run logs never fail the request, even for unknown slugs.
    let run = app
        .oneshot(json_request(
            "POST",
            "/api/v1/tests/slug/gone/runs",
            None,
            json!({ "event_type": "open", "source_chat_id": -100123 }),
        ))
        .await
        .unwrap();
    assert_eq!(run.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn admin_login_report_and_export() {
    let (app, store) = router_with_store();
    let creator = signed_init_data(CREATOR_ID, Some("ann"));

    let created = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests",
            Some(&creator),
            sample_test_body("quiz", true),
        ))
        .await
        .unwrap();
    let test = body_json(created).await;
    let test_id = test["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/tests/slug/quiz/responses",
            None,
            json!({ "user_id": 9, "result_title": "Fire", "answers": { "1": "Red" } }),
        ))
        .await
        .unwrap();

    store
        .create_admin(
            "admin",
            &session_auth::hash_password("hunter2"),
            shared_types::AdminScope::All,
            None,
        )
        .unwrap();

    let bad = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admin/login",
            None,
            json!({ "username": "admin", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);

    let login = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/admin/login",
            None,
            json!({ "username": "admin", "password": "hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::OK);
    let token = body_json(login).await["token"].as_str().unwrap().to_string();

    let report = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/admin/tests/{test_id}/report"))
                .header("X-Admin-Token", &token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(report.status(), StatusCode::OK);
    let report = body_json(report).await;
    assert_eq!(report["responses"].as_array().unwrap().len(), 1);

    let export = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/admin/tests/{test_id}/export"))
                .header("X-Admin-Token", &token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(export.status(), StatusCode::OK);
    let content_type = export
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/csv"));
    let csv = axum::body::to_bytes(export.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(csv.to_vec()).unwrap();
    assert!(csv.starts_with("telegram_id,result_title,Pick a color"));
    assert!(csv.contains("9,Fire,Red"));
}
