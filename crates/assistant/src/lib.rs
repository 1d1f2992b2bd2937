//! Orchestration layer for the medical history assistant.
//!
//! The [`Assistant`] sequences calls to the two external collaborators:
//!
//! 1. Validates the patient ID
//! 2. Searches patient memory for context
//! 3. Asks the completion gateway for an answer
//! 4. Persists the exchange in the background, returning a handle to observe it
//!
//! A [`Session`] carries per-user state (login, selected patient, cached
//! profile, transcript) and is passed into the assistant explicitly.
//!
//! # Architecture
//!
//! ```text
//!   Session (login gate, patient, transcript)
//!        │ &mut
//!        ▼
//! ┌─────────────────┐      ┌──────────────────┐
//! │    Assistant    │─────►│ ProfileGenerator │
//! │ (orchestrator)  │      └────────┬─────────┘
//! └───┬─────────┬───┘               │
//!     │         │                   │
//!     ▼         ▼                   ▼
//! [LlmClient] [MemoryGateway] ◄─────┘
//! ```

pub mod auth;
pub mod config;
pub mod orchestrator;
pub mod persistence;
pub mod profile;
pub mod prompt;
pub mod session;

pub use auth::{Authenticator, StaticCredentials};
pub use config::{AssistantConfig, AuthConfig, ChatConfig, ServerConfig};
pub use orchestrator::{Assistant, QueryReply, ReplyStatus, FALLBACK_APOLOGY};
pub use persistence::PersistenceHandle;
pub use profile::{PatientProfile, ProfileGenerator, VisitSchedule};
pub use session::{AuthState, ProfileView, Session};
