use avatar_stage::http::{create_router, AppState, SESSION_TOKEN_PATH};
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn request_token(state: AppState) -> (StatusCode, Value) {
    let response = create_router(state)
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(SESSION_TOKEN_PATH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn upstream(headers: HeaderMap) -> Response {
    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok());

    match (key, content_type) {
        (Some("sk-test"), Some("application/json")) => {
            Json(json!({ "data": { "token": "session-tok" } })).into_response()
        }
        _ => (StatusCode::UNAUTHORIZED, "invalid api key").into_response(),
    }
}

async fn upstream_url() -> String {
    let router = Router::new().route("/create_token", post(upstream));
    format!("{}/create_token", serve(router).await)
}

#[tokio::test]
async fn test_missing_secret_refused() {
    let state = AppState::new(None, "HEYGEN_API_KEY", "http://127.0.0.1:9/unused");

    let (status, body) = request_token(state).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "HEYGEN_API_KEY not configured" }));
}

#[tokio::test]
async fn test_empty_secret_treated_as_missing() {
    let state = AppState::new(Some(String::new()), "AVATAR_KEY", "http://127.0.0.1:9/unused");

    let (status, body) = request_token(state).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "AVATAR_KEY not configured");
}

#[tokio::test]
async fn test_token_issued_from_upstream() {
    let state = AppState::new(Some("sk-test".to_string()), "HEYGEN_API_KEY", &upstream_url().await);

    let (status, body) = request_token(state).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "token": "session-tok" }));
}

#[tokio::test]
async fn test_upstream_rejection_relayed() {
    let state = AppState::new(Some("sk-wrong".to_string()), "HEYGEN_API_KEY", &upstream_url().await);

    let (status, body) = request_token(state).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "HeyGen API error: invalid api key");
}

#[tokio::test]
async fn test_upstream_unexpected_body() {
    let router = Router::new().route(
        "/create_token",
        post(|| async { Json(json!({ "token": "wrong-shape" })) }),
    );
    let url = format!("{}/create_token", serve(router).await);
    let state = AppState::new(Some("sk-test".to_string()), "HEYGEN_API_KEY", &url);

    let (status, body) = request_token(state).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to generate token");
}

#[tokio::test]
async fn test_upstream_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{}/create_token", addr);
    let state = AppState::new(Some("sk-test".to_string()), "HEYGEN_API_KEY", &url);

    let (status, body) = request_token(state).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to generate token");
}

#[tokio::test]
async fn test_health_check() {
    let state = AppState::new(None, "HEYGEN_API_KEY", "http://127.0.0.1:9/unused");

    let response = create_router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_token_route_requires_post() {
    let state = AppState::new(Some("sk-test".to_string()), "HEYGEN_API_KEY", "http://127.0.0.1:9/unused");

    let response = create_router(state)
        .oneshot(
            Request::builder()
                .uri(SESSION_TOKEN_PATH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
