//! Configuration for the assistant service.
//!
//! Loaded from a TOML file. Every section is optional; a missing file section
//! falls back to the defaults below.
//!
//! On Unix the file must be a regular file, must not be world-writable, and
//! must not be world-readable when it carries an API key or a password.

use std::path::Path;

use medhist_llm::LlmConfig;
use medhist_memory::MemoryConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub memory: MemoryConfig,
    pub auth: AuthConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Sessions idle for longer than this are dropped.
    pub session_idle_secs: u64,
    /// Upper bound on concurrently held sessions.
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8501,
            session_idle_secs: 3600,
            max_sessions: 1000,
        }
    }
}

/// The single credential pair accepted by the login gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: "admin".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Delay between streamed characters on the WebSocket chat.
    pub typewriter_delay_ms: u64,
    /// Estimated token budget for rendered memories in the query prompt.
    pub max_context_tokens: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            typewriter_delay_ms: 10,
            max_context_tokens: 4096,
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file, validating its permissions first
    /// on Unix.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let config = Self::from_file_unchecked(path)?;

        if config.llm.api_key.is_some() {
            warn!(
                "API key found in config file '{}'. Prefer the {} environment variable.",
                path.display(),
                medhist_llm::config::API_KEY_ENV
            );
        }

        Ok(config)
    }

    /// Load configuration without permission checks.
    pub fn from_file_unchecked(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(unix)]
fn validate_config_file_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

    if !metadata.is_file() {
        anyhow::bail!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        );
    }

    let permission_bits = metadata.permissions().mode() & 0o777;

    if permission_bits & 0o002 != 0 {
        anyhow::bail!(
            "Config file '{}' is world-writable (mode {:04o}). Fix with: chmod o-w {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)?;
    let has_secret = content.contains("api_key") || content.contains("password");

    if has_secret && permission_bits & 0o004 != 0 {
        anyhow::bail!(
            "Config file '{}' contains credentials but is world-readable (mode {:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    if has_secret && permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains credentials and is group-readable (mode {:04o}).",
            path.display(),
            permission_bits
        );
    }

    Ok(())
}
