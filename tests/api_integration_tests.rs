//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint, plus one test
//! against a live server.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use capture_cache::{api::create_router, AppState, Config};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app(config: Config) -> (Router, AppState) {
    let state = AppState::from_config(&config).unwrap();
    (create_router(state.clone()), state)
}

/// Parses a response body; axum's extractor rejections are plain text.
async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Reports an exchange and waits for the background write to land.
async fn capture(app: &Router, state: &AppState, url: &str, payload: Value) {
    let before = state.engine.count().await;
    let (status, json) = send(
        app,
        post_json(
            "/capture",
            json!({
                "url": url,
                "method": "GET",
                "status": 200,
                "contentType": "application/json",
                "payload": payload
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["scheduled"], true);
    settle(state, before + 1).await;
}

async fn settle(state: &AppState, expected: usize) {
    for _ in 0..100 {
        if state.engine.count().await == expected {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("cache never reached {} records", expected);
}

// == Capture Endpoint Tests ==

#[tokio::test]
async fn test_capture_endpoint_stores_eligible_exchange() {
    let (app, state) = create_test_app(Config::default());

    let url = "https://shop.example/api/orders?page=2#top";
    capture(&app, &state, url, json!({ "orders": [] })).await;

    let (status, keys) = send(&app, get("/records/keys")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(keys, json!(["/api/orders?page=2"]));
}

#[tokio::test]
async fn test_capture_endpoint_skips_ineligible_exchanges() {
    let (app, state) = create_test_app(Config::default());

    let rejected = [
        json!({ "url": "/api/login/", "contentType": "application/json", "payload": {} }),
        json!({ "url": "/assets/app.js", "contentType": "application/json", "payload": {} }),
        json!({ "url": "/api/x", "method": "DELETE", "contentType": "application/json", "payload": {} }),
        json!({ "url": "/api/x", "status": 500, "contentType": "application/json", "payload": {} }),
        json!({ "url": "/api/x", "contentType": "text/html", "payload": "<p>" }),
        json!({ "url": "/api/x", "contentType": "application/json", "error": "timeout" }),
    ];

    for body in rejected {
        let (status, json) = send(&app, post_json("/capture", body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["scheduled"], false);
    }
    assert_eq!(state.engine.count().await, 0);
}

#[tokio::test]
async fn test_capture_without_payload_is_not_cached() {
    let (app, state) = create_test_app(Config::default());

    let (status, json) = send(
        &app,
        post_json(
            "/capture",
            json!({ "url": "/api/empty", "contentType": "application/json" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["scheduled"], false);

    tokio::task::yield_now().await;
    assert!(state.engine.get("/api/empty").await.is_none());
    assert_eq!(state.engine.count().await, 0);
}

// == Protocol Endpoint Tests ==

#[tokio::test]
async fn test_protocol_ping() {
    let (app, _) = create_test_app(Config::default());

    let (status, json) = send(&app, post_json("/protocol", json!({ "type": "ping" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "type": "pong" }));
}

#[tokio::test]
async fn test_protocol_ping_echoes_request_id() {
    let (app, _) = create_test_app(Config::default());

    let (status, json) = send(
        &app,
        post_json("/protocol", json!({ "type": "ping", "requestId": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "type": "pong", "requestId": "abc" }));
}

#[tokio::test]
async fn test_protocol_available_data() {
    let (app, state) = create_test_app(Config::default());
    capture(&app, &state, "http://localhost/api/users", json!([{ "id": 1 }])).await;

    let (status, json) = send(
        &app,
        post_json("/protocol", json!({ "type": "request_available_data", "requestId": "req-1" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["type"], "available_data");
    assert_eq!(json["requestId"], "req-1");
    let entry = &json["data"][0];
    assert_eq!(entry["key"], "/api/users");
    assert_eq!(entry["description"], "GET http://localhost/api/users");
    assert_eq!(entry["size"], 10);
    assert_eq!(entry["scope"], "/");
    assert!(entry["timestamp"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_protocol_request_api_inline() {
    let (app, state) = create_test_app(Config::default());
    capture(&app, &state, "/api/users/7", json!({ "id": 7, "name": "Ada" })).await;

    let (_, json) = send(
        &app,
        post_json(
            "/protocol",
            json!({ "type": "request_api", "requestId": "req-2", "dataKey": "/api/users/7" }),
        ),
    )
    .await;

    assert_eq!(
        json,
        json!({
            "type": "api_result",
            "requestId": "req-2",
            "success": true,
            "data": { "id": 7, "name": "Ada" }
        })
    );
}

#[tokio::test]
async fn test_protocol_request_api_large_data_by_reference() {
    let config = Config {
        large_data_threshold_bytes: 16,
        ..Config::default()
    };
    let (app, state) = create_test_app(config);
    let payload = json!({ "rows": [1, 2, 3, 4, 5, 6, 7, 8] });
    capture(&app, &state, "/api/report", payload.clone()).await;

    let (_, json) = send(
        &app,
        post_json(
            "/protocol",
            json!({ "type": "request_api", "requestId": "req-3", "dataKey": "/api/report" }),
        ),
    )
    .await;
    assert_eq!(json["success"], true);
    assert_eq!(json["isLargeData"], true);
    assert_eq!(json["cacheKey"], "/api/report");
    assert!(json["data"].is_null());

    // The peer then fetches the payload by reference
    let (status, record) = send(&app, get("/records?key=%2Fapi%2Freport")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["payload"], payload);
    assert_eq!(record["sourceUrl"], "/api/report");
}

#[tokio::test]
async fn test_protocol_request_api_not_found() {
    let (app, _) = create_test_app(Config::default());

    let (status, json) = send(
        &app,
        post_json(
            "/protocol",
            json!({ "type": "request_api", "requestId": "req-4", "dataKey": "/api/none" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["requestId"], "req-4");
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_protocol_execute_code_unsupported() {
    let (app, _) = create_test_app(Config::default());

    let (_, json) = send(
        &app,
        post_json(
            "/protocol",
            json!({ "type": "execute_code", "requestId": "req-5", "code": "return 1" }),
        ),
    )
    .await;

    assert_eq!(json["type"], "code_result");
    assert_eq!(json["requestId"], "req-5");
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "UNSUPPORTED");
}

#[tokio::test]
async fn test_protocol_unknown_type_rejected() {
    let (app, _) = create_test_app(Config::default());

    let (status, body) =
        send(&app, post_json("/protocol", json!({ "type": "connected" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.is_string());
}

// == Scope Endpoint Tests ==

#[tokio::test]
async fn test_scope_change_invalidates_previous_scope() {
    let (app, state) = create_test_app(Config::default());
    capture(&app, &state, "/api/home/feed", json!([1])).await;

    let (status, json) = send(&app, post_json("/scope", json!({ "scope": "/orders" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["previous"], "/");
    assert_eq!(json["current"], "/orders");
    assert_eq!(json["purge_scheduled"], true);
    settle(&state, 0).await;

    capture(&app, &state, "/api/orders", json!([2])).await;
    let record = state.engine.get("/api/orders").await.unwrap();
    assert_eq!(record.scope, "/orders");

    // Same scope again is a no-op
    let (_, json) = send(&app, post_json("/scope", json!({ "scope": "/orders" }))).await;
    assert_eq!(json["purge_scheduled"], false);
    assert_eq!(state.engine.count().await, 1);
}

#[tokio::test]
async fn test_scope_empty_rejected() {
    let (app, _) = create_test_app(Config::default());

    let (status, json) = send(&app, post_json("/scope", json!({ "scope": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_REQUEST");
}

// == Records Endpoint Tests ==

#[tokio::test]
async fn test_record_not_found() {
    let (app, _) = create_test_app(Config::default());

    let (status, json) = send(&app, get("/records?key=%2Fapi%2Fmissing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_clear_records() {
    let (app, state) = create_test_app(Config::default());
    capture(&app, &state, "/api/a", json!(1)).await;

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri("/records")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, keys) = send(&app, get("/records/keys")).await;
    assert_eq!(keys, json!([]));
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let (app, state) = create_test_app(Config::default());
    capture(&app, &state, "/api/a", json!(1)).await;

    // Duplicate within the dedup window
    state
        .adapter
        .capture(capture_cache::Exchange::json("/api/a", "GET", json!(2)))
        .unwrap()
        .await
        .unwrap();

    send(&app, get("/records?key=%2Fapi%2Fa")).await;
    send(&app, get("/records?key=%2Fapi%2Fb")).await;

    let (status, json) = send(&app, get("/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["stored"], 1);
    assert_eq!(json["duplicates_skipped"], 1);
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 1);
    assert!((json["hit_rate"].as_f64().unwrap() - 0.5).abs() < 0.001);
    assert_eq!(json["captures_timed"], 2);
    assert!(json["avg_capture_ms"].as_f64().unwrap() >= 0.0);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app(Config::default());

    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let (app, _) = create_test_app(Config::default());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/capture")
                .header("content-type", "application/json")
                .body(Body::from("not valid json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// == Live Server Tests ==

#[tokio::test]
async fn test_live_server_round_trip() {
    let (app, _) = create_test_app(Config::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let capture = client
        .post(format!("{}/capture", base))
        .json(&json!({
            "url": "/api/live",
            "contentType": "application/json",
            "payload": { "live": true }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(capture.status(), reqwest::StatusCode::ACCEPTED);

    let mut answer = Value::Null;
    for _ in 0..50 {
        answer = client
            .post(format!("{}/protocol", base))
            .json(&json!({ "type": "request_api", "requestId": "live-1", "dataKey": "/api/live" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if answer["success"] == true {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(answer["requestId"], "live-1");
    assert_eq!(answer["data"], json!({ "live": true }));

    server.abort();
}
