//! GHS Bridge - synapse ritual orchestrator for local Ollama models
//!
//! An interactive bridge that:
//! - Loads curated content pools (archetypes, koans, philosophical frameworks)
//! - Composes mode-specific prompts and runs them against a local LLM
//! - Records every exchange and persists sessions (JSON + Markdown transcript)
//! - Aggregates persisted sessions into an evolution report with suggestions

pub mod backend;
pub mod bridge;
pub mod content;
pub mod evolution;
pub mod modes;
pub mod prompt;
pub mod session;

pub use backend::OllamaClient;
pub use bridge::Bridge;
pub use content::{ContentItem, ContentRepository};
pub use evolution::{aggregate_sessions, render_report, suggest, AggregateReport};
pub use modes::Mode;
pub use session::{ExchangeRecord, Session, SessionStore};

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Default Ollama model used when neither CLI nor bridge.toml override it.
pub const DEFAULT_MODEL: &str = "gemma3:12b";

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default generation timeout. Local models can be slow on long prompts.
pub const DEFAULT_GENERATE_TIMEOUT_SECS: u64 = 852;

/// Configuration for the bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Base path holding content pools, frameworks/ and sessions/
    pub base_path: PathBuf,

    /// Ollama model identifier
    pub model: String,

    /// Ollama base URL
    pub ollama_url: String,

    /// Timeout for a single generation call
    pub generate_timeout: Duration,

    /// Optional RNG seed for deterministic content selection
    pub seed: Option<u64>,
}

impl BridgeConfig {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            model: DEFAULT_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            generate_timeout: Duration::from_secs(DEFAULT_GENERATE_TIMEOUT_SECS),
            seed: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_ollama_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_url = url.into();
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Directory where session files are saved.
    pub fn sessions_dir(&self) -> PathBuf {
        self.base_path.join("sessions")
    }

    /// Directory where framework pools live.
    pub fn frameworks_dir(&self) -> PathBuf {
        self.base_path.join("frameworks")
    }

    /// Apply overrides from `bridge.toml` in the base path, if present.
    /// Unknown or missing fields are ignored; a malformed file is skipped
    /// with a warning rather than aborting startup.
    pub async fn apply_toml_overrides(mut self) -> Self {
        let path = self.base_path.join("bridge.toml");
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(_) => return self,
        };
        match toml::from_str::<BridgeToml>(&content) {
            Ok(overrides) => {
                if let Some(model) = overrides.model {
                    self.model = model;
                }
                if let Some(url) = overrides.ollama_url {
                    self.ollama_url = url;
                }
                if let Some(secs) = overrides.generate_timeout_secs {
                    self.generate_timeout = Duration::from_secs(secs);
                }
                info!("Applied overrides from {}", path.display());
            }
            Err(e) => {
                warn!("Ignoring malformed {}: {}", path.display(), e);
            }
        }
        self
    }
}

/// Partial bridge.toml - every field optional.
#[derive(Debug, Deserialize)]
struct BridgeToml {
    model: Option<String>,
    ollama_url: Option<String>,
    generate_timeout_secs: Option<u64>,
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in the bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    #[error("Path not found: {0}")]
    InvalidPath(PathBuf),

    #[error("Failed to parse session file {path}: {source}")]
    SessionParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Session JSON saved but transcript write to {path} failed: {source}")]
    TranscriptWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Resolve the bridge home directory: `GHS_HOME` env var, else `~/.ghs-bridge`.
pub fn default_base_path() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("GHS_HOME") {
        return Some(PathBuf::from(home));
    }
    dirs::home_dir().map(|h| h.join(".ghs-bridge"))
}
