//! Patient-scoped conversation memory.
//!
//! Every record is written under a [`PatientId`](medhist_common::PatientId)
//! with `{app_id, role}` metadata, and searches never cross patients.
//!
//! # Backends
//!
//! - **Qdrant**: points in a Qdrant collection over its gRPC API, with
//!   vectors produced by an OpenAI-compatible embeddings endpoint.
//! - **In-memory**: a process-local store with keyword scoring, used for
//!   offline runs and tests.
//!
//! # Architecture
//!
//! ```text
//!   add(text, patient, {app_id, role})      search(query, patient)
//!                  │                                 │
//!                  ▼                                 ▼
//!        ┌───────────────────────────────────────────────────┐
//!        │              dyn MemoryGateway                    │
//!        └─────────────┬───────────────────────┬─────────────┘
//!                      ▼                       ▼
//!             ┌─────────────────┐     ┌─────────────────┐
//!             │  QdrantMemory   │     │ InMemoryMemory  │
//!             │  + Embedder     │     │ (keyword score) │
//!             └─────────────────┘     └─────────────────┘
//! ```

pub mod embedding;
pub mod gateway;
pub mod in_memory;
pub mod qdrant;
pub mod retrieval;
pub mod types;

use std::sync::Arc;

use medhist_common::Result;

pub use embedding::{Embedder, OpenAiEmbedder};
pub use gateway::MemoryGateway;
pub use in_memory::InMemoryMemory;
pub use qdrant::QdrantMemory;
pub use retrieval::render_memories;
pub use types::{MemoryBackend, MemoryConfig, MemoryMetadata, MemoryRecord};

/// Build the configured memory backend.
///
/// `api_key` authenticates the embeddings endpoint and is only used by the
/// Qdrant backend.
pub fn build_memory_gateway(
    config: &MemoryConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn MemoryGateway>> {
    match config.backend {
        MemoryBackend::Qdrant => {
            let embedder = OpenAiEmbedder::new(
                config.embedding_api_url.clone(),
                config.embedding_model.clone(),
                config.embedding_dim,
                api_key,
            );
            Ok(Arc::new(QdrantMemory::new(
                config.clone(),
                Arc::new(embedder),
            )?))
        }
        MemoryBackend::InMemory => Ok(Arc::new(InMemoryMemory::new(config.search_limit))),
    }
}
