//! The memory gateway seam.

use async_trait::async_trait;
use medhist_common::{PatientId, Result};

use crate::types::{MemoryMetadata, MemoryRecord};

/// Store and search text scoped to one patient.
///
/// Implementations must never return records written under a different
/// patient ID. No ordering is promised between a completed `add` and a later
/// `search` beyond what the backend itself provides.
#[async_trait]
pub trait MemoryGateway: Send + Sync {
    /// Store `text` under `patient` with the given metadata.
    async fn add(
        &self,
        text: &str,
        patient: &PatientId,
        metadata: MemoryMetadata,
    ) -> Result<MemoryRecord>;

    /// Return the records for `patient` most relevant to `query`.
    async fn search(&self, query: &str, patient: &PatientId) -> Result<Vec<MemoryRecord>>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}
