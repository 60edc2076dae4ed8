//! HTTP generation backend
//!
//! Speaks a `generateContent`-style JSON API:
//!
//! ```text
//! POST {base_url}/models/{model}:generateContent
//! x-goog-api-key: {api_key}
//! { "contents": [...], "systemInstruction": {...}, "generationConfig": {...} }
//! ```

use async_trait::async_trait;
use migra_remote::{
    AbortSignal, Contents, GenerationService, InlineData, Part, RemoteError, ServiceRequest,
    ServiceResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Default API root
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// HTTP backend settings
#[derive(Debug, Clone)]
pub struct HttpServiceConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// API key; requests fail fast without one
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for HttpServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(300),
        }
    }
}

impl HttpServiceConfig {
    /// Settings with an API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the API root
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Generation service over HTTP
#[derive(Debug, Clone)]
pub struct HttpGenerationService {
    config: HttpServiceConfig,
    client: reqwest::Client,
}

impl HttpGenerationService {
    /// Create a service with its own client
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Other`] if the HTTP client cannot be built.
    pub fn new(config: HttpServiceConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Other(format!("http client: {e}")))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn send(&self, request: &ServiceRequest, key: &str) -> Result<ServiceResponse, RemoteError> {
        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", key)
            .json(&request_body(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(RemoteError::status(status.as_u16(), error_message(&body)));
        }
        parse_response(&body)
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn request(
        &self,
        request: ServiceRequest,
        signal: &AbortSignal,
    ) -> Result<ServiceResponse, RemoteError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RemoteError::Unavailable("no API key configured".to_string()))?;

        tracing::debug!("POST {} ({})", self.endpoint(&request.model), request.model);
        signal.run(self.send(&request, key)).await?
    }

    fn has_api_key(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Transport(format!("request timed out: {err}"))
    } else {
        RemoteError::Transport(format!("network error: {err}"))
    }
}

/// JSON body for a request
#[must_use]
pub fn request_body(request: &ServiceRequest) -> Value {
    let parts: Vec<Value> = match &request.contents {
        Contents::Text(text) => vec![json!({ "text": text })],
        Contents::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => json!({ "text": text }),
                Part::InlineData(d) => json!({
                    "inlineData": { "mimeType": d.mime_type, "data": d.data }
                }),
            })
            .collect(),
    };

    let mut body = json!({ "contents": [{ "role": "user", "parts": parts }] });
    let config = &request.config;

    if let Some(system) = &config.system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }

    let mut generation = serde_json::Map::new();
    if let Some(mime) = &config.response_mime_type {
        generation.insert("responseMimeType".into(), json!(mime));
    }
    if let Some(budget) = config.thinking_budget {
        generation.insert("thinkingConfig".into(), json!({ "thinkingBudget": budget }));
    }
    if let Some(image) = &config.image {
        generation.insert("responseModalities".into(), json!(["TEXT", "IMAGE"]));
        let mut image_config = json!({ "aspectRatio": image.aspect_ratio });
        if let Some(size) = &image.image_size {
            image_config["imageSize"] = json!(size);
        }
        generation.insert("imageConfig".into(), image_config);
    }
    if !generation.is_empty() {
        body["generationConfig"] = Value::Object(generation);
    }
    body
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
    #[serde(default)]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    mime_type: String,
    data: String,
}

/// Parse a success body into a [`ServiceResponse`]
///
/// Thought parts are skipped; text parts are concatenated.
///
/// # Errors
///
/// Returns [`RemoteError::Malformed`] when the body is not the expected JSON.
pub fn parse_response(body: &str) -> Result<ServiceResponse, RemoteError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| RemoteError::Malformed(e.to_string()))?;

    let mut text = String::new();
    let mut inline_data = Vec::new();
    let parts = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    for part in parts {
        if part.thought == Some(true) {
            continue;
        }
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(d) = part.inline_data {
            inline_data.push(InlineData {
                mime_type: d.mime_type,
                data: d.data,
            });
        }
    }

    Ok(ServiceResponse {
        text: (!text.is_empty()).then_some(text),
        inline_data,
    })
}

/// Error message from an error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
