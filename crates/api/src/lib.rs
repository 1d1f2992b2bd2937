//! REST/WebSocket shell for the medical history assistant.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check (no login)
//! - `POST /api/v1/login` - Exchange credentials for a session token
//! - `POST /api/v1/patient` - Select the session's patient
//! - `POST /api/v1/profile/generate` - Generate a synthetic profile
//! - `GET /api/v1/profile` - View the patient profile
//! - `POST /api/v1/chat` - Ask a question about the patient
//! - `GET /api/v1/transcript` - Session transcript
//! - `WS /api/v1/ws` - Chat with typewriter-style replies
//!
//! Everything except `/health` and login needs `Authorization: Bearer <token>`.
//!
//! # Architecture
//!
//! ```text
//! Client (browser, curl)
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   API Shell     │ ◄── This crate
//! │     (Axum)      │
//! └────────┬────────┘
//!          │ Session (per token)
//!          ▼
//! ┌─────────────────┐
//! │    Assistant    │
//! └───┬─────────┬───┘
//!     ▼         ▼
//!   [LLM]    [Memory]
//! ```

pub mod auth;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use auth::CurrentSession;
pub use routes::WsFrame;
pub use state::{AppState, SessionHandle, SessionLimits};

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/v1/patient", post(routes::select_patient))
        .route("/api/v1/profile", get(routes::view_profile))
        .route("/api/v1/profile/generate", post(routes::generate_profile))
        .route("/api/v1/chat", post(routes::chat))
        .route("/api/v1/transcript", get(routes::transcript))
        .route("/api/v1/ws", get(routes::websocket_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_auth,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/login", post(routes::login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given address.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let router = create_router(state);

    info!(%addr, "Starting medical history assistant API");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
