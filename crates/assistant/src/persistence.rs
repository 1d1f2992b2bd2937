//! Background persistence of answered exchanges.

use std::sync::Arc;

use medhist_common::{MedHistError, PatientId, Result, Role};
use medhist_memory::{MemoryGateway, MemoryMetadata};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to a background write of one query/answer pair.
///
/// Dropping the handle detaches the task; it keeps running. Awaiting
/// [`PersistenceHandle::wait`] yields the outcome of both writes.
#[derive(Debug)]
pub struct PersistenceHandle {
    task: JoinHandle<Result<()>>,
}

impl PersistenceHandle {
    /// Spawn a task that stores `query` as a `user` record and then `answer`
    /// as an `assistant` record. Must be called within a Tokio runtime.
    pub fn spawn(
        memory: Arc<dyn MemoryGateway>,
        patient: PatientId,
        app_id: String,
        query: String,
        answer: String,
    ) -> Self {
        let task = tokio::spawn(async move {
            let outcome = store_exchange(memory.as_ref(), &patient, &app_id, &query, &answer).await;
            match &outcome {
                Ok(()) => debug!(patient_id = %patient, "Exchange persisted"),
                Err(e) => warn!(patient_id = %patient, error = %e, "Failed to persist exchange"),
            }
            outcome
        });
        Self { task }
    }

    /// Wait for both writes to finish.
    pub async fn wait(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| MedHistError::Memory(format!("Persistence task failed: {e}")))?
    }
}

async fn store_exchange(
    memory: &dyn MemoryGateway,
    patient: &PatientId,
    app_id: &str,
    query: &str,
    answer: &str,
) -> Result<()> {
    memory
        .add(query, patient, MemoryMetadata::new(app_id, Role::User))
        .await?;
    memory
        .add(answer, patient, MemoryMetadata::new(app_id, Role::Assistant))
        .await?;
    Ok(())
}
