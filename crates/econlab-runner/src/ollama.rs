use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub fn default_base_url() -> String {
    std::env::var("OLLAMA_BASE_URL")
        .or_else(|_| std::env::var("OLLAMA_HOST"))
        .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine_http: status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("engine_transport: {0}")]
    Transport(String),
    #[error("engine_response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
    pub stream: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub info: Option<Map<String, Value>>,
}

// Single blocking request/response seam; the executor only sees this trait,
// so tests drive it with stub engines.
pub trait Generator {
    fn generate(&self, request: &GenerateRequest) -> Result<EngineResponse, EngineError>;
}

pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Generator for OllamaClient {
    fn generate(&self, request: &GenerateRequest) -> Result<EngineResponse, EngineError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| EngineError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EngineError::Http {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<EngineResponse>()
            .map_err(|e| EngineError::Malformed(e.to_string()))
    }
}
