//! Ollama backend client
//!
//! Thin wrapper over the local Ollama HTTP API. Generation failures are part
//! of the returned text, not a separate error channel: a timeout, a non-200
//! status or an unreachable backend all come back as `[ERROR] ...` strings so
//! transcripts and session logs always have something to record.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for the cheap liveness/model-list calls.
const TAGS_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a local Ollama instance.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    generate_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, generate_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            generate_timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// True when the Ollama API answers on `/api/tags`.
    pub async fn check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(TAGS_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Names of locally available models, empty on any failure.
    pub async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/api/tags", self.base_url);
        let response = match self.client.get(&url).timeout(TAGS_TIMEOUT).send().await {
            Ok(r) => r,
            Err(_) => return Vec::new(),
        };
        if !response.status().is_success() {
            return Vec::new();
        }
        match response.json::<TagsResponse>().await {
            Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Run one generation. Never returns an error: every failure mode maps
    /// to a deterministic `[ERROR] ...` text.
    pub async fn generate(&self, user_prompt: &str, system_prompt: Option<&str>) -> String {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt: user_prompt,
            system: system_prompt,
            stream: false,
        };

        debug!("Generating with model {} ({} prompt bytes)", self.model, user_prompt.len());

        let response = match self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.generate_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!("Generation timed out after {:?}", self.generate_timeout);
                return "[ERROR] Request timed out".to_string();
            }
            Err(e) if e.is_connect() => {
                warn!("Ollama unreachable at {}", self.base_url);
                return "[ERROR] Ollama is not running. Start it with: ollama serve".to_string();
            }
            Err(e) => return format!("[ERROR] {}", e),
        };

        let status = response.status();
        if !status.is_success() {
            return format!("[ERROR] Ollama returned status {}", status.as_u16());
        }

        match response.json::<GenerateResponse>().await {
            Ok(body) => body.response,
            Err(e) => format!("[ERROR] {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_client() -> OllamaClient {
        // Port 1 refuses connections immediately on any sane host
        OllamaClient::new("http://127.0.0.1:1", "test-model", Duration::from_secs(2))
    }

    #[tokio::test]
    async fn unreachable_backend_fails_check() {
        assert!(!unreachable_client().check().await);
    }

    #[tokio::test]
    async fn unreachable_backend_lists_no_models() {
        assert!(unreachable_client().list_models().await.is_empty());
    }

    #[tokio::test]
    async fn generate_degrades_to_error_text() {
        let response = unreachable_client().generate("hello", None).await;
        assert!(response.starts_with("[ERROR]"), "got: {}", response);
    }
}
