//! Session token authentication middleware.
//!
//! `POST /api/v1/login` hands out a token; every other `/api/v1` route
//! expects it as `Authorization: Bearer <token>`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;
use uuid::Uuid;

use crate::routes::ErrorResponse;
use crate::state::{AppState, SessionHandle};

/// The caller's session, inserted into request extensions by [`session_auth`].
#[derive(Clone)]
pub struct CurrentSession(pub SessionHandle);

/// Extract bearer token from Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub async fn session_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(request.headers()) else {
        warn!("Missing Authorization header");
        return unauthorized(
            "Missing or invalid Authorization header. Use: Authorization: Bearer <token>",
            "MISSING_TOKEN",
        );
    };

    let session = Uuid::parse_str(token.trim())
        .ok()
        .and_then(|token| state.session(&token));

    match session {
        Some(session) => {
            request.extensions_mut().insert(CurrentSession(session));
            next.run(request).await
        }
        None => {
            warn!("Unknown session token");
            unauthorized("Please login to start", "INVALID_TOKEN")
        }
    }
}

fn unauthorized(message: &str, code: &'static str) -> Response {
    ErrorResponse::new(StatusCode::UNAUTHORIZED, message, code).into_response()
}
