//! Memory records and configuration.

use chrono::{DateTime, Utc};
use medhist_common::Role;
use serde::{Deserialize, Serialize};

/// Metadata attached to every stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// Application tag shared by every record this service writes
    pub app_id: String,

    /// Who produced the text
    pub role: Role,
}

impl MemoryMetadata {
    pub fn new(app_id: impl Into<String>, role: Role) -> Self {
        Self {
            app_id: app_id.into(),
            role,
        }
    }
}

/// A record as stored in, or returned from, the memory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique ID
    pub id: String,

    /// The stored text
    pub text: String,

    /// Patient the record belongs to (canonical `PAT-XXXXX`)
    pub user_id: String,

    pub metadata: MemoryMetadata,

    pub created_at: DateTime<Utc>,

    /// Similarity score, present on search results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// Which memory backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryBackend {
    #[default]
    Qdrant,
    InMemory,
}

impl std::str::FromStr for MemoryBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qdrant" => Ok(Self::Qdrant),
            "in-memory" | "memory" => Ok(Self::InMemory),
            other => Err(format!(
                "unknown memory backend '{other}' (expected 'qdrant' or 'in-memory')"
            )),
        }
    }
}

/// Configuration for the memory gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub backend: MemoryBackend,

    /// Qdrant collection name
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    #[serde(default = "default_host")]
    pub host: String,

    /// Qdrant REST port, the base for the default gRPC port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Qdrant gRPC port used by the client. Defaults to `port + 1`.
    #[serde(default)]
    pub grpc_port: Option<u16>,

    /// Tag written into every record's metadata
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Maximum records returned by a search
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding dimension, used when creating the collection
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Base URL of the embeddings endpoint
    #[serde(default)]
    pub embedding_api_url: Option<String>,
}

fn default_collection_name() -> String {
    "test".into()
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    6333
}

fn default_app_id() -> String {
    "medical-history-assistant".into()
}

fn default_search_limit() -> usize {
    100
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_embedding_dim() -> usize {
    1536
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackend::default(),
            collection_name: default_collection_name(),
            host: default_host(),
            port: default_port(),
            grpc_port: None,
            app_id: default_app_id(),
            search_limit: default_search_limit(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
            embedding_api_url: None,
        }
    }
}

impl MemoryConfig {
    /// Endpoint the gRPC client connects to.
    pub fn qdrant_url(&self) -> String {
        let port = self.grpc_port.unwrap_or(self.port.saturating_add(1));
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), port)
        } else {
            format!("http://{}:{}", self.host, port)
        }
    }
}
