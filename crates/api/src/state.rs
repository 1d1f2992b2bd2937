//! Application state for the API server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use medhist_assistant::{Assistant, AssistantConfig, Authenticator, Session, StaticCredentials};
use medhist_common::Result;
use medhist_llm::{build_llm_client, config::API_KEY_ENV};
use medhist_memory::build_memory_gateway;
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One logged-in user's session, serialized by its own lock.
pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

struct SessionEntry {
    handle: SessionHandle,
    last_seen: Instant,
}

/// Bounds on the session registry.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    /// Sessions unused for this long are dropped.
    pub idle_ttl: Duration,
    /// Logging in beyond this evicts the least recently used session.
    pub max_sessions: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(3600),
            max_sessions: 1000,
        }
    }
}

/// Shared application state for the API server.
pub struct AppState {
    /// `None` when no LLM credential is configured; chat routes then answer 503.
    pub assistant: Option<Arc<Assistant>>,

    pub authenticator: Arc<dyn Authenticator>,

    sessions: RwLock<HashMap<Uuid, SessionEntry>>,

    session_limits: SessionLimits,

    /// Pause between characters on the WebSocket chat.
    pub typewriter_delay: Duration,

    /// Server start time (for health checks)
    pub start_time: Instant,
}

impl AppState {
    pub fn new(assistant: Option<Assistant>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            assistant: assistant.map(Arc::new),
            authenticator,
            sessions: RwLock::new(HashMap::new()),
            session_limits: SessionLimits::default(),
            typewriter_delay: Duration::ZERO,
            start_time: Instant::now(),
        }
    }

    /// Build the gateways described by `config`.
    ///
    /// A missing API key is not fatal: the server starts with chat disabled.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let authenticator = Arc::new(StaticCredentials::from_config(&config.auth));

        let assistant = match config.llm.resolve_api_key() {
            Some(api_key) => {
                let llm = build_llm_client(&config.llm, Some(api_key.clone()))?;
                let memory = build_memory_gateway(&config.memory, Some(api_key))?;
                info!(
                    model = %llm.model_name(),
                    memory_backend = memory.backend_name(),
                    "Assistant initialized"
                );
                Some(Assistant::from_config(config, llm, memory))
            }
            None => {
                warn!(
                    "{} is not set. Please set the OpenAI API key in your environment. \
                     Chat, profile and WebSocket routes are disabled.",
                    API_KEY_ENV
                );
                None
            }
        };

        Ok(Self::new(assistant, authenticator)
            .with_typewriter_delay(Duration::from_millis(config.chat.typewriter_delay_ms))
            .with_session_limits(SessionLimits {
                idle_ttl: Duration::from_secs(config.server.session_idle_secs),
                max_sessions: config.server.max_sessions,
            }))
    }

    pub fn with_session_limits(mut self, limits: SessionLimits) -> Self {
        self.session_limits = limits;
        self
    }

    pub fn with_typewriter_delay(mut self, delay: Duration) -> Self {
        self.typewriter_delay = delay;
        self
    }

    pub fn chat_enabled(&self) -> bool {
        self.assistant.is_some()
    }

    /// Open a new authenticated session and return its token.
    pub fn login(&self, username: &str, password: &str) -> Result<Uuid> {
        let mut session = Session::new();
        session.login(self.authenticator.as_ref(), username, password)?;

        let token = Uuid::new_v4();
        let mut sessions = self.sessions.write();
        self.prune(&mut sessions);

        let max = self.session_limits.max_sessions.max(1);
        while sessions.len() >= max {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(token, _)| *token)
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!(max_sessions = max, "Evicted least recently used session");
        }

        sessions.insert(
            token,
            SessionEntry {
                handle: Arc::new(tokio::sync::Mutex::new(session)),
                last_seen: Instant::now(),
            },
        );
        Ok(token)
    }

    /// Look up a live session and mark it as used.
    pub fn session(&self, token: &Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write();
        let entry = sessions.get_mut(token)?;
        if entry.last_seen.elapsed() > self.session_limits.idle_ttl {
            sessions.remove(token);
            debug!("Session expired after idling");
            return None;
        }
        entry.last_seen = Instant::now();
        Some(entry.handle.clone())
    }

    fn prune(&self, sessions: &mut HashMap<Uuid, SessionEntry>) {
        let ttl = self.session_limits.idle_ttl;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() <= ttl);
        let expired = before - sessions.len();
        if expired > 0 {
            debug!(expired, "Pruned idle sessions");
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Get the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medhist_common::MedHistError;

    fn state() -> AppState {
        AppState::new(None, Arc::new(StaticCredentials::default()))
    }

    #[test]
    fn login_registers_session() {
        let state = state();
        let token = state.login("admin", "admin").unwrap();
        assert_eq!(state.session_count(), 1);
        assert!(state.session(&token).is_some());
    }

    #[test]
    fn failed_login_registers_nothing() {
        let state = state();
        let err = state.login("admin", "wrong").unwrap_err();
        assert!(matches!(err, MedHistError::InvalidCredentials));
        assert_eq!(state.session_count(), 0);
    }

    #[test]
    fn unknown_token_has_no_session() {
        assert!(state().session(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn idle_sessions_expire() {
        let state = state().with_session_limits(SessionLimits {
            idle_ttl: Duration::from_millis(20),
            max_sessions: 10,
        });
        let stale = state.login("admin", "admin").unwrap();
        std::thread::sleep(Duration::from_millis(40));

        assert!(state.session(&stale).is_none());
        assert_eq!(state.session_count(), 0);
    }

    #[test]
    fn login_prunes_idle_sessions() {
        let state = state().with_session_limits(SessionLimits {
            idle_ttl: Duration::from_millis(20),
            max_sessions: 10,
        });
        state.login("admin", "admin").unwrap();
        state.login("admin", "admin").unwrap();
        std::thread::sleep(Duration::from_millis(40));

        let fresh = state.login("admin", "admin").unwrap();
        assert_eq!(state.session_count(), 1);
        assert!(state.session(&fresh).is_some());
    }

    #[test]
    fn registry_is_capped_by_evicting_least_recently_used() {
        let state = state().with_session_limits(SessionLimits {
            idle_ttl: Duration::from_secs(60),
            max_sessions: 2,
        });
        let first = state.login("admin", "admin").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = state.login("admin", "admin").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        // Touching the first makes the second the eviction candidate.
        assert!(state.session(&first).is_some());
        std::thread::sleep(Duration::from_millis(5));

        let third = state.login("admin", "admin").unwrap();
        assert_eq!(state.session_count(), 2);
        assert!(state.session(&first).is_some());
        assert!(state.session(&second).is_none());
        assert!(state.session(&third).is_some());
    }

    #[test]
    fn tokens_are_distinct() {
        let state = state();
        let a = state.login("admin", "admin").unwrap();
        let b = state.login("admin", "admin").unwrap();
        assert_ne!(a, b);
        assert_eq!(state.session_count(), 2);
    }
}
