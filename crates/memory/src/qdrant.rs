//! Memory storage in a Qdrant collection.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medhist_common::{MedHistError, PatientId, Result, Role};
use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, Distance, FieldType, Filter, PointId, PointStruct,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::gateway::MemoryGateway;
use crate::types::{MemoryConfig, MemoryMetadata, MemoryRecord};

/// Payload stored alongside each point.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PointPayload {
    data: String,
    user_id: String,
    app_id: String,
    role: Role,
    created_at: DateTime<Utc>,
}

impl PointPayload {
    fn to_payload(&self) -> Result<Payload> {
        let json = serde_json::to_value(self)
            .map_err(|e| MedHistError::Memory(format!("Failed to encode payload: {e}")))?;
        Payload::try_from(json)
            .map_err(|e| MedHistError::Memory(format!("Failed to encode payload: {e}")))
    }

    fn from_qdrant(payload: HashMap<String, Value>) -> Option<Self> {
        let json = serde_json::Value::Object(
            payload
                .into_iter()
                .map(|(key, value)| (key, value.into_json()))
                .collect(),
        );
        serde_json::from_value(json).ok()
    }
}

fn qdrant_error(action: &str, e: impl std::fmt::Display) -> MedHistError {
    MedHistError::Memory(format!("Qdrant {action} failed: {e}"))
}

/// Qdrant-backed memory gateway.
///
/// The collection is created lazily on first use, sized to the embedder's
/// dimension with cosine distance.
pub struct QdrantMemory {
    config: MemoryConfig,
    client: Qdrant,
    embedder: Arc<dyn Embedder>,
    collection_ready: OnceCell<()>,
}

impl QdrantMemory {
    /// Build the client. No connection is made until the first call.
    pub fn new(config: MemoryConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let url = config.qdrant_url();
        info!(
            url = %url,
            collection = %config.collection_name,
            "Initializing Qdrant memory"
        );
        let client = Qdrant::from_url(&url)
            .build()
            .map_err(|e| qdrant_error("client setup", e))?;
        Ok(Self {
            config,
            client,
            embedder,
            collection_ready: OnceCell::new(),
        })
    }

    fn create_collection_request(&self) -> CreateCollectionBuilder {
        CreateCollectionBuilder::new(&self.config.collection_name).vectors_config(
            VectorParamsBuilder::new(self.embedder.dimension() as u64, Distance::Cosine),
        )
    }

    fn search_request(&self, vector: Vec<f32>, patient: &PatientId) -> SearchPointsBuilder {
        SearchPointsBuilder::new(
            &self.config.collection_name,
            vector,
            self.config.search_limit as u64,
        )
        .filter(Filter::must([Condition::matches(
            "user_id",
            patient.as_str().to_string(),
        )]))
        .with_payload(true)
    }

    async fn ensure_collection(&self) -> Result<()> {
        self.collection_ready
            .get_or_try_init(|| self.create_collection_if_missing())
            .await
            .map(|_| ())
    }

    async fn create_collection_if_missing(&self) -> Result<()> {
        let name = &self.config.collection_name;
        let exists = self
            .client
            .collection_exists(name)
            .await
            .map_err(|e| qdrant_error("collection lookup", e))?;
        if exists {
            debug!(collection = %name, "Qdrant collection exists");
            return Ok(());
        }

        info!(
            collection = %name,
            dimension = self.embedder.dimension(),
            "Creating Qdrant collection"
        );
        self.client
            .create_collection(self.create_collection_request())
            .await
            .map_err(|e| qdrant_error("create collection", e))?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                name,
                "user_id",
                FieldType::Keyword,
            ))
            .await
            .map_err(|e| qdrant_error("create user_id index", e))?;

        Ok(())
    }
}

fn point_id(id: Option<PointId>) -> String {
    match id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl MemoryGateway for QdrantMemory {
    async fn add(
        &self,
        text: &str,
        patient: &PatientId,
        metadata: MemoryMetadata,
    ) -> Result<MemoryRecord> {
        self.ensure_collection().await?;

        let vector = self.embedder.embed(text).await?;
        let id = Uuid::new_v4().to_string();
        let payload = PointPayload {
            data: text.to_string(),
            user_id: patient.as_str().to_string(),
            app_id: metadata.app_id.clone(),
            role: metadata.role,
            created_at: Utc::now(),
        };

        debug!(
            patient_id = %patient,
            role = %metadata.role,
            point_id = %id,
            "Upserting memory point"
        );

        let point = PointStruct::new(id.clone(), vector, payload.to_payload()?);
        self.client
            .upsert_points(
                UpsertPointsBuilder::new(&self.config.collection_name, vec![point]).wait(true),
            )
            .await
            .map_err(|e| qdrant_error("upsert", e))?;

        Ok(MemoryRecord {
            id,
            text: payload.data,
            user_id: payload.user_id,
            metadata,
            created_at: payload.created_at,
            score: None,
        })
    }

    async fn search(&self, query: &str, patient: &PatientId) -> Result<Vec<MemoryRecord>> {
        self.ensure_collection().await?;

        let vector = self.embedder.embed(query).await?;
        let response = self
            .client
            .search_points(self.search_request(vector, patient))
            .await
            .map_err(|e| qdrant_error("search", e))?;

        let records = into_records(response.result, patient);
        debug!(patient_id = %patient, hits = records.len(), "Searched memories");
        Ok(records)
    }

    fn backend_name(&self) -> &'static str {
        "qdrant"
    }
}

/// Convert search hits to records, dropping any point whose payload is
/// unreadable or belongs to another patient.
fn into_records(points: Vec<ScoredPoint>, patient: &PatientId) -> Vec<MemoryRecord> {
    points
        .into_iter()
        .filter_map(|point| {
            let Some(payload) = PointPayload::from_qdrant(point.payload) else {
                warn!("Skipping Qdrant point with unreadable payload");
                return None;
            };
            if payload.user_id != patient.as_str() {
                return None;
            }
            Some(MemoryRecord {
                id: point_id(point.id),
                text: payload.data,
                user_id: payload.user_id,
                metadata: MemoryMetadata::new(payload.app_id, payload.role),
                created_at: payload.created_at,
                score: Some(point.score),
            })
        })
        .collect()
}
