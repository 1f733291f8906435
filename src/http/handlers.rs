use super::state::AppState;
use crate::credential::{ErrorResponse, TokenResponse};
use crate::error::ConfigurationError;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

// ============================================================================
// Upstream Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct UpstreamTokenResponse {
    data: UpstreamTokenData,
}

#[derive(Debug, Deserialize)]
struct UpstreamTokenData {
    token: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/session-token
/// Exchange the server-side secret for a short-lived session token
pub async fn create_session_token(State(state): State<AppState>) -> Response {
    let Some(secret) = state.secret.as_deref() else {
        let err = ConfigurationError::MissingSecret(state.secret_name.to_string());
        error!("Token request refused: {}", err);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
    };

    let response = match state
        .client
        .post(state.upstream_url.as_ref())
        .header("x-api-key", secret)
        .header(header::CONTENT_TYPE, "application/json")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!("Token generation error: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate token");
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!("Upstream token API returned {}: {}", status, body);
        let status =
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return error_response(status, format!("HeyGen API error: {}", body));
    }

    match response.json::<UpstreamTokenResponse>().await {
        Ok(upstream) => {
            info!("Issued session token");
            (
                StatusCode::OK,
                Json(TokenResponse {
                    token: upstream.data.token,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Token generation error: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate token")
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
