use avatar_stage::credential::CredentialClient;
use avatar_stage::error::CredentialError;
use avatar_stage::http::{create_router, AppState, SESSION_TOKEN_PATH};
use avatar_stage::remote::LoopbackAvatarService;
use avatar_stage::session::{SessionConfig, SessionController, SessionState};
use avatar_stage::EventLog;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

/// Serve `router` on an ephemeral port and return its base URL
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn endpoint(status: StatusCode, body: &'static str) -> String {
    let router = Router::new().route(
        "/token",
        post(move || async move { (status, body).into_response() }),
    );
    format!("{}/token", serve(router).await)
}

#[tokio::test]
async fn test_fetch_token_success() {
    let url = endpoint(StatusCode::OK, r#"{"token":"tok-abc"}"#).await;
    let client = CredentialClient::new(url);

    assert_eq!(client.fetch_token().await.unwrap(), "tok-abc");
}

#[tokio::test]
async fn test_error_field_surfaced_verbatim() {
    let url = endpoint(StatusCode::INTERNAL_SERVER_ERROR, r#"{"error":"no key"}"#).await;
    let client = CredentialClient::new(url);

    let err = client.fetch_token().await.unwrap_err();

    assert_eq!(
        err,
        CredentialError::Rejected {
            status: 500,
            message: "no key".to_string(),
        }
    );
    assert_eq!(err.to_string(), "no key");
}

#[tokio::test]
async fn test_error_without_message_uses_generic_text() {
    let url = endpoint(StatusCode::FORBIDDEN, "<html>denied</html>").await;
    let client = CredentialClient::new(url);

    let err = client.fetch_token().await.unwrap_err();

    assert_eq!(err.to_string(), "Failed to get access token");
    assert!(matches!(err, CredentialError::Rejected { status: 403, .. }));
}

#[tokio::test]
async fn test_malformed_success_body() {
    let url = endpoint(StatusCode::OK, "not json").await;
    let client = CredentialClient::new(url);
    assert!(matches!(
        client.fetch_token().await,
        Err(CredentialError::Malformed(_))
    ));

    let url = endpoint(StatusCode::OK, r#"{"token":""}"#).await;
    let client = CredentialClient::new(url);
    assert!(matches!(
        client.fetch_token().await,
        Err(CredentialError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = CredentialClient::new(format!("http://{}/token", addr));

    assert!(matches!(
        client.fetch_token().await,
        Err(CredentialError::Transport(_))
    ));
}

async fn upstream(headers: HeaderMap) -> Response {
    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if key != Some("sk-test") {
        return (StatusCode::UNAUTHORIZED, "invalid api key").into_response();
    }
    Json(json!({ "data": { "token": "session-tok" } })).into_response()
}

#[tokio::test]
async fn test_client_through_boundary_endpoint() {
    let upstream_url = format!(
        "{}/v1/streaming.create_token",
        serve(Router::new().route("/v1/streaming.create_token", post(upstream))).await
    );
    let state = AppState::new(Some("sk-test".to_string()), "HEYGEN_API_KEY", &upstream_url);
    let boundary = serve(create_router(state)).await;

    let client = CredentialClient::new(format!("{}{}", boundary, SESSION_TOKEN_PATH));

    assert_eq!(client.fetch_token().await.unwrap(), "session-tok");
}

#[tokio::test]
async fn test_session_fails_when_boundary_has_no_secret() {
    let state = AppState::new(None, "HEYGEN_API_KEY", "http://127.0.0.1:9/unused");
    let boundary = serve(create_router(state)).await;
    let client = CredentialClient::new(format!("{}{}", boundary, SESSION_TOKEN_PATH));

    let log = EventLog::default();
    let (controller, handle) = SessionController::new(
        SessionConfig::default(),
        Arc::new(client),
        Arc::new(LoopbackAvatarService::default()),
        log.clone(),
    );
    controller.spawn();

    handle.start(None).await.unwrap();
    let snapshot = handle
        .wait_for(|s| s.state == SessionState::Idle && s.last_error.is_some())
        .await
        .unwrap();

    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("HEYGEN_API_KEY not configured")
    );
    assert!(log
        .messages()
        .contains(&"Error: HEYGEN_API_KEY not configured".to_string()));
}
