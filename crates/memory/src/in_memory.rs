//! Process-local memory store.
//!
//! Mirrors the shape of a vector search without any embeddings: every record
//! of the patient is a candidate, ranked by keyword overlap with the query
//! and then by recency. Nothing survives a restart.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use medhist_common::{PatientId, Result};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::gateway::MemoryGateway;
use crate::types::{MemoryMetadata, MemoryRecord};

pub struct InMemoryMemory {
    records: Arc<RwLock<Vec<MemoryRecord>>>,
    search_limit: usize,
}

impl InMemoryMemory {
    pub fn new(search_limit: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            search_limit,
        }
    }

    /// Every stored record, in insertion order.
    pub async fn all(&self) -> Vec<MemoryRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryMemory {
    fn default() -> Self {
        Self::new(100)
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of query terms present in `text`. A query without terms (such
/// as `*`) scores every record 1.0.
fn keyword_score(query_terms: &HashSet<String>, text: &str) -> f32 {
    if query_terms.is_empty() {
        return 1.0;
    }
    let text_terms = tokenize(text);
    let hits = query_terms.iter().filter(|t| text_terms.contains(*t)).count();
    hits as f32 / query_terms.len() as f32
}

#[async_trait]
impl MemoryGateway for InMemoryMemory {
    async fn add(
        &self,
        text: &str,
        patient: &PatientId,
        metadata: MemoryMetadata,
    ) -> Result<MemoryRecord> {
        let record = MemoryRecord {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            user_id: patient.as_str().to_string(),
            metadata,
            created_at: Utc::now(),
            score: None,
        };

        debug!(
            patient_id = %patient,
            role = %record.metadata.role,
            memory_id = %record.id,
            "Adding memory"
        );

        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn search(&self, query: &str, patient: &PatientId) -> Result<Vec<MemoryRecord>> {
        let query_terms = tokenize(query);
        let records = self.records.read().await;

        let mut results: Vec<(usize, MemoryRecord)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.user_id == patient.as_str())
            .map(|(position, r)| {
                let mut hit = r.clone();
                hit.score = Some(keyword_score(&query_terms, &r.text));
                (position, hit)
            })
            .collect();

        // Best score first, newest first among equals.
        results.sort_by(|(pa, a), (pb, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(pb.cmp(pa))
        });
        results.truncate(self.search_limit);

        debug!(patient_id = %patient, hits = results.len(), "Searched memories");
        Ok(results.into_iter().map(|(_, r)| r).collect())
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}
