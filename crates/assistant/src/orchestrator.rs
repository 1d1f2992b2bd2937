//! Query orchestration: validate, recall, complete, persist.

use std::sync::Arc;

use medhist_common::{MedHistError, PatientId, PatientIdError, Result, Turn};
use medhist_llm::{LlmClient, LlmRequest};
use medhist_memory::{render_memories, MemoryGateway};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::config::AssistantConfig;
use crate::persistence::PersistenceHandle;
use crate::profile::{PatientProfile, ProfileGenerator};
use crate::prompt::{build_query_prompt, PROFILE_SUMMARY_QUERY, QUERY_SYSTEM_PROMPT};
use crate::session::{ProfileView, Session};

/// Returned in place of an answer when a gateway call fails.
pub const FALLBACK_APOLOGY: &str =
    "I apologize, but I encountered an error processing your request. Please try again.";

/// Query used to check whether anything is on record for a patient.
const MATCH_ALL_QUERY: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyStatus {
    Answered,
    /// A gateway failed; the answer is [`FALLBACK_APOLOGY`].
    Fallback { reason: String },
}

#[derive(Debug)]
pub struct QueryReply {
    pub answer: String,
    pub status: ReplyStatus,
    /// Present only when the answer came from the model.
    pub persistence: Option<PersistenceHandle>,
}

impl QueryReply {
    fn fallback(reason: String) -> Self {
        Self {
            answer: FALLBACK_APOLOGY.to_string(),
            status: ReplyStatus::Fallback { reason },
            persistence: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.status, ReplyStatus::Fallback { .. })
    }
}

/// Coordinates the memory and completion gateways for one deployment.
pub struct Assistant {
    llm: Arc<dyn LlmClient>,
    memory: Arc<dyn MemoryGateway>,
    profiles: ProfileGenerator,
    app_id: String,
    max_context_tokens: usize,
}

impl Assistant {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        memory: Arc<dyn MemoryGateway>,
        app_id: impl Into<String>,
    ) -> Self {
        let app_id = app_id.into();
        Self {
            profiles: ProfileGenerator::new(llm.clone(), memory.clone(), app_id.clone()),
            llm,
            memory,
            app_id,
            max_context_tokens: 4096,
        }
    }

    pub fn from_config(
        config: &AssistantConfig,
        llm: Arc<dyn LlmClient>,
        memory: Arc<dyn MemoryGateway>,
    ) -> Self {
        Self::new(llm, memory, config.memory.app_id.clone())
            .with_max_context_tokens(config.chat.max_context_tokens)
    }

    pub fn with_max_context_tokens(mut self, max_context_tokens: usize) -> Self {
        self.max_context_tokens = max_context_tokens;
        self
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    pub fn memory_backend(&self) -> &'static str {
        self.memory.backend_name()
    }

    /// Answer one query for a raw patient identifier.
    ///
    /// Only validation errors are returned. Gateway failures are logged and
    /// turned into a [`ReplyStatus::Fallback`] reply.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn handle_query(
        &self,
        query: &str,
        raw_patient_id: &str,
    ) -> std::result::Result<QueryReply, PatientIdError> {
        let patient = PatientId::require(raw_patient_id)?;

        match self.answer(query, &patient).await {
            Ok(answer) => {
                let persistence = PersistenceHandle::spawn(
                    self.memory.clone(),
                    patient,
                    self.app_id.clone(),
                    query.to_string(),
                    answer.clone(),
                );
                Ok(QueryReply {
                    answer,
                    status: ReplyStatus::Answered,
                    persistence: Some(persistence),
                })
            }
            Err(e) => {
                error!(patient_id = %patient, error = %e, "Query failed");
                Ok(QueryReply::fallback(e.to_string()))
            }
        }
    }

    async fn answer(&self, query: &str, patient: &PatientId) -> Result<String> {
        let memories = self.memory.search(query, patient).await?;
        let rendered = render_memories(&memories, self.max_context_tokens);
        debug!(patient_id = %patient, memories = memories.len(), "Recalled history");

        let prompt = build_query_prompt(&rendered, query);
        let response = self
            .llm
            .complete(LlmRequest::single(QUERY_SYSTEM_PROMPT, prompt))
            .await?;

        info!(
            patient_id = %patient,
            model = %response.model,
            answer_len = response.content.len(),
            "Query answered"
        );
        Ok(response.content)
    }

    /// Ask on behalf of a session, recording both turns in its transcript.
    ///
    /// A blank query fails with [`MedHistError::EmptyQuery`] before anything
    /// is recorded or sent.
    pub async fn ask(&self, session: &mut Session, query: &str) -> Result<QueryReply> {
        let patient = session.require_patient()?.clone();
        if query.trim().is_empty() {
            return Err(MedHistError::EmptyQuery);
        }

        session.push_turn(Turn::user(query));
        let reply = self.handle_query(query, patient.as_str()).await?;
        session.push_turn(Turn::assistant(reply.answer.clone()));

        Ok(reply)
    }

    /// Generate a synthetic profile for the selected patient and cache it.
    pub async fn generate_profile_for(&self, session: &mut Session) -> Result<PatientProfile> {
        let patient = profile_patient(session)?;
        let profile = self.profiles.generate(&patient).await?;
        session.cache_profile(profile.clone());
        Ok(profile)
    }

    /// Show the selected patient's profile: the cached one if this session
    /// generated it, else a model summary of what memory holds.
    pub async fn view_profile(&self, session: &mut Session) -> Result<ProfileView> {
        let patient = profile_patient(session)?;

        if let Some(profile) = session.profile()? {
            return Ok(ProfileView::Cached(profile.clone()));
        }

        debug!(patient_id = %patient, "No cached profile, checking memory");
        let on_record = self.memory.search(MATCH_ALL_QUERY, &patient).await?;
        if on_record.is_empty() {
            return Ok(ProfileView::NotFound(format!(
                "Patient ID {patient} does not exist. Please check the ID or create a new one."
            )));
        }

        let reply = self.ask(session, PROFILE_SUMMARY_QUERY).await?;
        Ok(ProfileView::Summarized(reply))
    }
}

fn profile_patient(session: &Session) -> Result<PatientId> {
    session
        .patient()?
        .cloned()
        .ok_or(MedHistError::NoPatientForProfile)
}
