// Model Gateway
// Sole owner of the Gemini credential and the only component that performs
// network I/O. Everything above it works with ModelRequest / ModelReply.

use crate::models::GroundingSource;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

const GEMINI_DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 120;
/// Fixed interval between long-running operation polls. No backoff growth and
/// no maximum iteration bound: an operation that never completes stalls the
/// call (known gap).
const OPERATION_POLL_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Remote { status: u16, message: String },
    #[error("content blocked by safety policy: {0}")]
    SafetyBlocked(String),
    #[error("missing content in response")]
    MissingContent,
    #[error("JSON decode error: {0}")]
    Json(String),
    #[error("API key not configured")]
    MissingApiKey,
    #[error("operation returned no completion handle")]
    MissingOperation,
}

impl GatewayError {
    /// Stable category string the UI keys on.
    pub fn category(&self) -> &'static str {
        match self {
            GatewayError::MissingApiKey => "CREDENTIAL_MISSING",
            GatewayError::SafetyBlocked(_) => "CONTENT_SAFETY_BLOCKED",
            _ => "REMOTE_ERROR",
        }
    }
}

// ============ Request / Reply boundary types ============

#[derive(Debug, Clone, Serialize)]
pub enum RequestPart {
    Text(String),
    InlineData { mime_type: String, data: String },
}

/// Provider-neutral request descriptor produced by the request builder.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRequest {
    pub model: String,
    pub parts: Vec<RequestPart>,
    pub system_instruction: Option<String>,
    pub response_mime_type: Option<String>,
    /// Attach the search-grounding tool (fact-check / reverse-search modes).
    pub use_search_grounding: bool,
    pub thinking_budget: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelReply {
    pub text: String,
    pub sources: Vec<GroundingSource>,
}

/// Seam between the forensics pipeline and the remote model. The pipeline,
/// batch orchestrator and export engine are generic over this trait so tests
/// can script replies without touching the network.
#[allow(async_fn_in_trait)]
pub trait ModelGateway {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelReply, GatewayError>;
}

// ============ Gemini implementation ============

pub struct GeminiGateway {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiGateway {
    /// Fails fast when no credential is configured (env first, then the
    /// config store) so callers can prompt for key selection.
    pub fn new() -> Result<Self, GatewayError> {
        let api_key = resolve_api_key().ok_or(GatewayError::MissingApiKey)?;
        Ok(Self::with_key(api_key))
    }

    pub fn with_key(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        let base_url =
            env::var("GEMINI_API_URL").unwrap_or_else(|_| GEMINI_DEFAULT_URL.to_string());
        Self {
            client,
            base_url,
            api_key,
        }
    }

    pub fn with_proxy(proxy_url: &str) -> Result<Self, GatewayError> {
        let api_key = resolve_api_key().ok_or(GatewayError::MissingApiKey)?;
        let proxy = reqwest::Proxy::all(proxy_url)?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .proxy(proxy)
            .build()?;
        let base_url =
            env::var("GEMINI_API_URL").unwrap_or_else(|_| GEMINI_DEFAULT_URL.to_string());
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, GatewayError> {
        let start = Instant::now();
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Json(e.to_string()))?;
        info!(
            "[GATEWAY] POST ok latency_ms={} url={}",
            start.elapsed().as_millis(),
            url
        );
        Ok(data)
    }

    /// Synthesize a single image; returns a data URL. Red-team lab feature,
    /// not part of the forensic pipeline.
    pub async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "imageConfig": { "aspectRatio": aspect_ratio } }
        });

        let data = self.post_json(&url, &body).await?;
        check_safety_block(&data)?;

        let parts = data["candidates"][0]["content"]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        for part in parts {
            if let Some(payload) = part["inlineData"]["data"].as_str() {
                return Ok(format!("data:image/png;base64,{}", payload));
            }
        }
        Err(GatewayError::MissingContent)
    }

    /// Start a long-running video synthesis and poll the operation handle at
    /// a fixed interval until its completion flag is set. Returns a keyed
    /// download URI for the generated video.
    pub async fn generate_video(&self, model: &str, prompt: &str) -> Result<String, GatewayError> {
        let url = format!("{}/models/{}:predictLongRunning", self.base_url, model);
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "numberOfVideos": 1,
                "resolution": "720p",
                "aspectRatio": "16:9"
            }
        });

        let started = self.post_json(&url, &body).await?;
        let operation_name = started["name"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(GatewayError::MissingOperation)?;
        info!("[GATEWAY] video operation started: {}", operation_name);

        let mut polls = 0u32;
        let operation = loop {
            tokio::time::sleep(std::time::Duration::from_secs(OPERATION_POLL_SECS)).await;
            polls += 1;

            let poll_url = format!("{}/{}", self.base_url, operation_name);
            let response = self
                .client
                .get(&poll_url)
                .header("x-goog-api-key", &self.api_key)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(GatewayError::Remote {
                    status: status.as_u16(),
                    message,
                });
            }
            let data: Value = response
                .json()
                .await
                .map_err(|e| GatewayError::Json(e.to_string()))?;

            if data["done"].as_bool().unwrap_or(false) {
                info!("[GATEWAY] video operation done after {} polls", polls);
                break data;
            }
            if polls % 6 == 0 {
                info!("[GATEWAY] video operation still running, polls={}", polls);
            }
        };

        let uri = extract_video_uri(&operation).ok_or(GatewayError::MissingOperation)?;
        Ok(format!("{}&key={}", uri, self.api_key))
    }
}

impl ModelGateway for GeminiGateway {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelReply, GatewayError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, request.model
        );
        let body = build_generate_body(request);
        let data = self.post_json(&url, &body).await?;
        extract_reply(&data)
    }
}

// ============ Wire shaping (pure, unit-tested) ============

pub fn build_generate_body(request: &ModelRequest) -> Value {
    let parts: Vec<Value> = request
        .parts
        .iter()
        .map(|part| match part {
            RequestPart::Text(text) => json!({ "text": text }),
            RequestPart::InlineData { mime_type, data } => json!({
                "inlineData": { "mimeType": mime_type, "data": data }
            }),
        })
        .collect();

    let mut body = json!({ "contents": [{ "parts": parts }] });

    if let Some(ref system) = request.system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }

    let mut generation_config = serde_json::Map::new();
    if let Some(ref mime) = request.response_mime_type {
        generation_config.insert("responseMimeType".to_string(), json!(mime));
    }
    if let Some(budget) = request.thinking_budget {
        generation_config.insert(
            "thinkingConfig".to_string(),
            json!({ "thinkingBudget": budget }),
        );
    }
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }

    if request.use_search_grounding {
        body["tools"] = json!([{ "googleSearch": {} }]);
    }

    body
}

fn check_safety_block(data: &Value) -> Result<(), GatewayError> {
    if let Some(reason) = data["promptFeedback"]["blockReason"].as_str() {
        warn!("[GATEWAY] prompt blocked: {}", reason);
        return Err(GatewayError::SafetyBlocked(reason.to_string()));
    }
    if let Some(finish) = data["candidates"][0]["finishReason"].as_str() {
        if matches!(finish, "SAFETY" | "PROHIBITED_CONTENT" | "IMAGE_SAFETY") {
            warn!("[GATEWAY] candidate blocked: {}", finish);
            return Err(GatewayError::SafetyBlocked(finish.to_string()));
        }
    }
    Ok(())
}

/// Recover text and grounding citations from a generateContent response.
pub fn extract_reply(data: &Value) -> Result<ModelReply, GatewayError> {
    check_safety_block(data)?;

    let parts = data["candidates"][0]["content"]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        return Err(GatewayError::MissingContent);
    }

    let sources = data["candidates"][0]["groundingMetadata"]["groundingChunks"]
        .as_array()
        .map(|chunks| {
            chunks
                .iter()
                .filter(|c| c["web"].is_object())
                .map(|c| GroundingSource {
                    title: c["web"]["title"]
                        .as_str()
                        .unwrap_or("Verified Source")
                        .to_string(),
                    url: c["web"]["uri"].as_str().unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ModelReply { text, sources })
}

fn extract_video_uri(operation: &Value) -> Option<String> {
    // Two response layouts exist in the wild; accept either.
    let candidates = [
        &operation["response"]["generateVideoResponse"]["generatedSamples"][0]["video"]["uri"],
        &operation["response"]["generatedVideos"][0]["video"]["uri"],
    ];
    candidates
        .iter()
        .find_map(|v| v.as_str().map(|s| s.to_string()))
}

/// Get the Gemini API key from environment or config file.
pub fn resolve_api_key() -> Option<String> {
    for key in ["GEMINI_API_KEY", "PROOFY_GEMINI_API_KEY"] {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    if let Some(config_dir) = super::ConfigStore::default_config_dir() {
        let store = super::ConfigStore::new(config_dir);
        if let Ok(Some(key)) = store.get_api_key() {
            return Some(key);
        }
    }

    None
}
