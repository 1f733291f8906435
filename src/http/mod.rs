//! Credential boundary endpoint
//!
//! Keeps the API secret on the server and hands out short-lived session tokens:
//! - POST /api/session-token - Exchange the secret for a token
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::{create_router, SESSION_TOKEN_PATH};
pub use state::AppState;
