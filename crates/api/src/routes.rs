//! HTTP route handlers for the API.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Extension, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use medhist_assistant::{Assistant, ProfileView, ReplyStatus};
use medhist_common::{MedHistError, Turn};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::CurrentSession;
use crate::state::{AppState, SessionHandle};

/// Shown when no LLM credential is configured.
pub const CHAT_DISABLED_MESSAGE: &str = "Please set the OpenAI API key in your environment.";

/// Shown when a patient ID is not in canonical form.
pub const PATIENT_FORMAT_HINT: &str = "Please use format PAT-XXXXX (e.g., PAT-12345)";

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub chat_enabled: bool,
    pub active_sessions: usize,
    /// Completion model, absent when chat is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_backend: Option<&'static str>,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let assistant = state.assistant.as_deref();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        chat_enabled: state.chat_enabled(),
        active_sessions: state.session_count(),
        model: assistant.map(|a| a.model_name().to_string()),
        memory_backend: assistant.map(Assistant::memory_backend),
    })
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
    pub code: &'static str,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, error: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            error: error.into(),
            code,
        }
    }

    fn chat_disabled() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            CHAT_DISABLED_MESSAGE,
            "CHAT_DISABLED",
        )
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<MedHistError> for ErrorResponse {
    fn from(e: MedHistError) -> Self {
        let (status, code) = match &e {
            e if e.is_gateway() => (StatusCode::BAD_GATEWAY, "GATEWAY_ERROR"),
            MedHistError::Validation(_) => (StatusCode::BAD_REQUEST, "INVALID_PATIENT_ID"),
            MedHistError::NoPatientSelected | MedHistError::NoPatientForProfile => {
                (StatusCode::BAD_REQUEST, "NO_PATIENT_SELECTED")
            }
            MedHistError::EmptyQuery => (StatusCode::BAD_REQUEST, "EMPTY_QUERY"),
            MedHistError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            MedHistError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        if status.is_server_error() {
            error!(error = %e, code, "Request failed");
        }
        Self::new(status, e.to_string(), code)
    }
}

fn require_assistant(state: &AppState) -> Result<Arc<Assistant>, ErrorResponse> {
    state.assistant.clone().ok_or_else(ErrorResponse::chat_disabled)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ErrorResponse> {
    let token = state.login(&request.username, &request.password)?;
    Ok(Json(LoginResponse {
        token: token.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct PatientRequest {
    pub patient_id: String,
}

#[derive(Debug, Serialize)]
pub struct PatientResponse {
    /// `None` when the request cleared the selection.
    pub patient_id: Option<String>,
}

/// Select the patient the session talks about.
pub async fn select_patient(
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Json(request): Json<PatientRequest>,
) -> Result<Json<PatientResponse>, ErrorResponse> {
    let mut session = session.lock().await;
    match session.select_patient(&request.patient_id) {
        Ok(selected) => {
            let patient_id = selected.map(|p| p.to_string());
            debug!(patient_id = ?patient_id, "Patient selected");
            Ok(Json(PatientResponse { patient_id }))
        }
        Err(MedHistError::Validation(e)) => {
            debug!(error = %e, "Rejected patient ID");
            Err(ErrorResponse::new(
                StatusCode::BAD_REQUEST,
                PATIENT_FORMAT_HINT,
                "INVALID_PATIENT_ID",
            ))
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Serialize)]
pub struct GeneratedProfileResponse {
    pub patient_id: String,
    pub last_visit: String,
    pub next_appointment: String,
    pub content: String,
}

pub async fn generate_profile(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<Json<GeneratedProfileResponse>, ErrorResponse> {
    let assistant = require_assistant(&state)?;
    let mut session = session.lock().await;

    let profile = assistant.generate_profile_for(&mut session).await?;
    info!(patient_id = %profile.patient_id, "Synthetic data generated successfully");

    Ok(Json(GeneratedProfileResponse {
        patient_id: profile.patient_id.to_string(),
        last_visit: profile.schedule.last_visit_display(),
        next_appointment: profile.schedule.next_appointment_display(),
        content: profile.content,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    Cached,
    Summarized,
    NotFound,
}

#[derive(Debug, Serialize)]
pub struct ProfileViewResponse {
    pub source: ProfileSource,
    pub content: String,
}

pub async fn view_profile(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<Json<ProfileViewResponse>, ErrorResponse> {
    let assistant = require_assistant(&state)?;
    let mut session = session.lock().await;

    let response = match assistant.view_profile(&mut session).await? {
        ProfileView::Cached(profile) => ProfileViewResponse {
            source: ProfileSource::Cached,
            content: profile.content,
        },
        ProfileView::Summarized(reply) => ProfileViewResponse {
            source: ProfileSource::Summarized,
            content: reply.answer,
        },
        ProfileView::NotFound(message) => ProfileViewResponse {
            source: ProfileSource::NotFound,
            content: message,
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub content: String,
    /// Hold the response until the exchange is stored in memory.
    #[serde(default)]
    pub wait_for_memory: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub status: ReplyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_persisted: Option<bool>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ErrorResponse> {
    let assistant = require_assistant(&state)?;

    let reply = {
        let mut session = session.lock().await;
        assistant.ask(&mut session, &request.content).await?
    };

    let memory_persisted = if request.wait_for_memory {
        Some(match reply.persistence {
            Some(handle) => handle.wait().await.is_ok(),
            None => false,
        })
    } else {
        None
    };

    Ok(Json(ChatResponse {
        answer: reply.answer,
        status: reply.status,
        memory_persisted,
    }))
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub turns: Vec<Turn>,
}

pub async fn transcript(
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<Json<TranscriptResponse>, ErrorResponse> {
    let session = session.lock().await;
    let turns = session.transcript()?.to_vec();
    Ok(Json(TranscriptResponse { turns }))
}

/// Frames sent to WebSocket chat clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsFrame {
    /// One more character of the answer.
    Delta { content: String },
    /// The full answer; no more deltas follow for this query.
    Done { content: String },
    Error { content: String, code: String },
}

/// The answer replayed one character at a time, then the whole of it.
pub fn typewriter_frames(answer: &str) -> impl Iterator<Item = WsFrame> + '_ {
    answer
        .chars()
        .map(|c| WsFrame::Delta {
            content: c.to_string(),
        })
        .chain(std::iter::once(WsFrame::Done {
            content: answer.to_string(),
        }))
}

/// WebSocket chat: each text frame is one query.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Result<Response, ErrorResponse> {
    let assistant = require_assistant(&state)?;
    let delay = state.typewriter_delay;
    Ok(ws.on_upgrade(move |socket| handle_websocket(socket, assistant, session, delay)))
}

async fn handle_websocket(
    mut socket: WebSocket,
    assistant: Arc<Assistant>,
    session: SessionHandle,
    delay: Duration,
) {
    info!("WebSocket connection established");

    while let Some(msg) = socket.recv().await {
        let query = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Close(_)) => {
                info!("WebSocket connection closed");
                break;
            }
            Err(e) => {
                error!(error = %e, "WebSocket error");
                break;
            }
            _ => continue,
        };
        debug!(query_len = query.len(), "Received WebSocket query");

        let reply = {
            let mut session = session.lock().await;
            assistant.ask(&mut session, &query).await
        };

        let sent = match reply {
            Ok(reply) => send_typewriter(&mut socket, &reply.answer, delay).await,
            Err(e) => {
                let error = ErrorResponse::from(e);
                send_frame(
                    &mut socket,
                    &WsFrame::Error {
                        content: error.error,
                        code: error.code.to_string(),
                    },
                )
                .await
            }
        };
        if !sent {
            warn!("WebSocket client went away mid-reply");
            break;
        }
    }
}

async fn send_typewriter(socket: &mut WebSocket, answer: &str, delay: Duration) -> bool {
    for frame in typewriter_frames(answer) {
        let is_delta = matches!(frame, WsFrame::Delta { .. });
        if !send_frame(socket, &frame).await {
            return false;
        }
        if is_delta && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    true
}

async fn send_frame(socket: &mut WebSocket, frame: &WsFrame) -> bool {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "Failed to encode WebSocket frame");
            return false;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            uptime_seconds: 100,
            chat_enabled: false,
            active_sessions: 0,
            model: None,
            memory_backend: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains(r#""chat_enabled":false"#));
        assert!(!json.contains("model"));
    }

    #[test]
    fn chat_request_defaults_to_not_waiting() {
        let request: ChatRequest = serde_json::from_str(r#"{"content": "headache"}"#).unwrap();
        assert_eq!(request.content, "headache");
        assert!(!request.wait_for_memory);
    }

    #[test]
    fn error_body_omits_status() {
        let error = ErrorResponse::chat_disabled();
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["code"], "CHAT_DISABLED");
        assert_eq!(json["error"], CHAT_DISABLED_MESSAGE);
        assert!(json.get("status").is_none());
    }

    #[test]
    fn session_errors_map_to_client_statuses() {
        let e = ErrorResponse::from(MedHistError::NoPatientSelected);
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.error, "Please enter a patient ID to start the chat.");

        let e = ErrorResponse::from(MedHistError::InvalidCredentials);
        assert_eq!(e.status, StatusCode::UNAUTHORIZED);

        let e = ErrorResponse::from(MedHistError::Memory("down".into()));
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);

        let e = ErrorResponse::from(MedHistError::EmptyQuery);
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, "EMPTY_QUERY");

        let e = ErrorResponse::from(MedHistError::NoPatientForProfile);
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.error, "Please enter a patient ID first.");
    }

    #[test]
    fn typewriter_emits_each_char_then_done() {
        let frames: Vec<_> = typewriter_frames("héllo").collect();
        assert_eq!(frames.len(), 6);
        assert_eq!(
            frames[1],
            WsFrame::Delta {
                content: "é".into()
            }
        );
        assert_eq!(
            frames[5],
            WsFrame::Done {
                content: "héllo".into()
            }
        );
    }

    #[test]
    fn ws_frame_is_tagged_by_type() {
        let json = serde_json::to_string(&WsFrame::Delta {
            content: "a".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"delta","content":"a"}"#);
    }
}
