//! Synthetic patient profile generation.

use std::sync::Arc;

use chrono::{Local, NaiveDate, TimeDelta};
use medhist_common::{PatientId, Result, Role};
use medhist_llm::{LlmClient, LlmRequest};
use medhist_memory::{MemoryGateway, MemoryMetadata};
use serde::Serialize;
use tracing::{debug, info};

use crate::prompt::{build_profile_prompt, PROFILE_SYSTEM_PROMPT};

/// Days between a visit and the invocation date, in either direction.
pub const VISIT_OFFSET_DAYS: i64 = 30;

const DATE_FORMAT: &str = "%B %d, %Y";

/// Last visit and next appointment dates around a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisitSchedule {
    pub today: NaiveDate,
    pub last_visit: NaiveDate,
    pub next_appointment: NaiveDate,
}

impl VisitSchedule {
    pub fn around(today: NaiveDate) -> Self {
        let offset = TimeDelta::days(VISIT_OFFSET_DAYS);
        Self {
            today,
            last_visit: today - offset,
            next_appointment: today + offset,
        }
    }

    /// e.g. "February 13, 2026"
    pub fn last_visit_display(&self) -> String {
        self.last_visit.format(DATE_FORMAT).to_string()
    }

    pub fn next_appointment_display(&self) -> String {
        self.next_appointment.format(DATE_FORMAT).to_string()
    }
}

/// A generated profile. The content is opaque model output.
#[derive(Debug, Clone, Serialize)]
pub struct PatientProfile {
    pub patient_id: PatientId,
    pub schedule: VisitSchedule,
    pub content: String,
}

/// Produces fictitious patient records and stores them in memory.
pub struct ProfileGenerator {
    llm: Arc<dyn LlmClient>,
    memory: Arc<dyn MemoryGateway>,
    app_id: String,
}

impl ProfileGenerator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        memory: Arc<dyn MemoryGateway>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            memory,
            app_id: app_id.into(),
        }
    }

    /// Generate a profile dated around the local current day.
    pub async fn generate(&self, patient: &PatientId) -> Result<PatientProfile> {
        self.generate_on(patient, Local::now().date_naive()).await
    }

    /// Generate a profile dated around `today`, then store it in memory with
    /// role `system`. Both gateway errors propagate.
    pub async fn generate_on(&self, patient: &PatientId, today: NaiveDate) -> Result<PatientProfile> {
        let schedule = VisitSchedule::around(today);
        info!(
            patient_id = %patient,
            last_visit = %schedule.last_visit,
            next_appointment = %schedule.next_appointment,
            "Generating synthetic profile"
        );

        let prompt = build_profile_prompt(patient, &schedule);
        let response = self
            .llm
            .complete(LlmRequest::single(PROFILE_SYSTEM_PROMPT, prompt))
            .await?;

        debug!(patient_id = %patient, chars = response.content.len(), "Profile generated");

        self.memory
            .add(
                &response.content,
                patient,
                MemoryMetadata::new(&self.app_id, Role::System),
            )
            .await?;

        Ok(PatientProfile {
            patient_id: patient.clone(),
            schedule,
            content: response.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medhist_common::MedHistError;
    use medhist_llm::LlmResponse;
    use medhist_memory::InMemoryMemory;
    use parking_lot::Mutex;

    struct CapturingLlm {
        requests: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait]
    impl LlmClient for CapturingLlm {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.requests.lock().push(request);
            Ok(LlmResponse {
                content: "Name: Jane Doe\nAge: 42".into(),
                model: "test".into(),
                usage: None,
                finish_reason: None,
            })
        }
        fn model_name(&self) -> &str {
            "test"
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse> {
            Err(MedHistError::Completion("503 Service Unavailable".into()))
        }
        fn model_name(&self) -> &str {
            "failing"
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn schedule_is_thirty_days_either_side() {
        for today in [date(2026, 10, 19), date(2024, 2, 29), date(2025, 12, 31), date(2026, 1, 1)] {
            let schedule = VisitSchedule::around(today);
            assert_eq!((today - schedule.last_visit).num_days(), 30);
            assert_eq!((schedule.next_appointment - today).num_days(), 30);
        }
    }

    #[test]
    fn schedule_crosses_year_boundary() {
        let schedule = VisitSchedule::around(date(2026, 1, 10));
        assert_eq!(schedule.last_visit, date(2025, 12, 11));
        assert_eq!(schedule.last_visit_display(), "December 11, 2025");
        assert_eq!(schedule.next_appointment_display(), "February 09, 2026");
    }

    #[tokio::test]
    async fn generated_profile_is_stored_as_system_record() {
        let llm = Arc::new(CapturingLlm {
            requests: Mutex::new(Vec::new()),
        });
        let memory = Arc::new(InMemoryMemory::default());
        let generator = ProfileGenerator::new(llm.clone(), memory.clone(), "medical-history-assistant");
        let patient = PatientId::require("PAT-12345").unwrap();

        let profile = generator.generate_on(&patient, date(2026, 3, 15)).await.unwrap();

        assert_eq!(profile.content, "Name: Jane Doe\nAge: 42");
        assert_eq!(profile.schedule.last_visit, date(2026, 2, 13));

        {
            let requests = llm.requests.lock();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].system_prompt.as_deref(), Some(PROFILE_SYSTEM_PROMPT));
            assert!(requests[0].messages[0].content.contains("April 14, 2026"));
        }

        let stored = memory.all().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].user_id, "PAT-12345");
        assert_eq!(stored[0].metadata.role, Role::System);
        assert_eq!(stored[0].text, profile.content);
    }

    #[tokio::test]
    async fn completion_failure_propagates_and_stores_nothing() {
        let memory = Arc::new(InMemoryMemory::default());
        let generator = ProfileGenerator::new(Arc::new(FailingLlm), memory.clone(), "app");
        let patient = PatientId::require("PAT-12345").unwrap();

        let err = generator.generate(&patient).await.unwrap_err();
        assert!(matches!(err, MedHistError::Completion(_)));
        assert!(memory.is_empty().await);
    }
}
