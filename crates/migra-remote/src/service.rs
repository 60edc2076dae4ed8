//! Generation service contract
//!
//! The orchestration core talks to a text/image generation backend only
//! through [`GenerationService`]. Implementations perform a single attempt per
//! call; retries belong to the caller (see [`crate::with_retry`]).

use crate::abort::AbortSignal;
use crate::error::RemoteError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

/// One content part of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    /// Plain text
    Text(String),
    /// Base64 payload with its MIME type
    InlineData(InlineData),
}

/// Base64-encoded binary payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type, e.g. `image/png`
    pub mime_type: String,
    /// Base64 data
    pub data: String,
}

/// Request body: a single prompt or a list of parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Contents {
    /// Single text prompt
    Text(String),
    /// Multi-part content
    Parts(Vec<Part>),
}

impl Contents {
    /// Concatenated text of all text parts
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    Part::Text(t) => Some(t.as_str()),
                    Part::InlineData(_) => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for Contents {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Contents {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Image generation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    /// Aspect ratio such as `16:9`
    pub aspect_ratio: String,
    /// Optional size hint such as `1K`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<String>,
}

/// Per-request generation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// System instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    /// Response format hint, e.g. `application/json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    /// Reasoning token budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
    /// Image output parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageConfig>,
}

/// Request to a generation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    /// Model identifier
    pub model: String,
    /// Prompt contents
    pub contents: Contents,
    /// Generation settings
    #[serde(default)]
    pub config: RequestConfig,
}

impl ServiceRequest {
    /// Text request with default settings
    pub fn new(model: impl Into<String>, contents: impl Into<Contents>) -> Self {
        Self {
            model: model.into(),
            contents: contents.into(),
            config: RequestConfig::default(),
        }
    }

    /// Set the system instruction
    #[inline]
    #[must_use]
    pub fn with_system(mut self, instruction: impl Into<String>) -> Self {
        self.config.system_instruction = Some(instruction.into());
        self
    }

    /// Ask for a JSON response
    #[inline]
    #[must_use]
    pub fn json(mut self) -> Self {
        self.config.response_mime_type = Some("application/json".to_string());
        self
    }

    /// Set the thinking budget
    #[inline]
    #[must_use]
    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.config.thinking_budget = Some(budget);
        self
    }

    /// Ask for image output
    #[inline]
    #[must_use]
    pub fn with_image(mut self, image: ImageConfig) -> Self {
        self.config.image = Some(image);
        self
    }
}

/// Service response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    /// Generated text, if any
    #[serde(default)]
    pub text: Option<String>,
    /// Generated binary parts
    #[serde(default)]
    pub inline_data: Vec<InlineData>,
}

impl ServiceResponse {
    /// Text-only response
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: Vec::new(),
        }
    }

    /// Text or empty string
    #[inline]
    #[must_use]
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// First image part, if any
    #[must_use]
    pub fn first_image(&self) -> Option<&InlineData> {
        self.inline_data
            .iter()
            .find(|d| d.mime_type.starts_with("image/"))
    }
}

/// Stream of text chunks
pub type ChunkStream<'a> = BoxStream<'a, Result<String, RemoteError>>;

/// Text/image generation backend
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Perform one request
    async fn request(
        &self,
        request: ServiceRequest,
        signal: &AbortSignal,
    ) -> Result<ServiceResponse, RemoteError>;

    /// Stream a text response
    ///
    /// The default yields the whole [`request`](Self::request) text as one
    /// chunk.
    async fn request_stream<'a>(
        &'a self,
        request: ServiceRequest,
        signal: &'a AbortSignal,
    ) -> Result<ChunkStream<'a>, RemoteError> {
        let response = self.request(request, signal).await?;
        let text = response.text.unwrap_or_default();
        Ok(stream::once(async move { Ok(text) }).boxed())
    }

    /// Check if credentials are configured
    fn has_api_key(&self) -> bool {
        true
    }
}

#[async_trait]
impl<S: GenerationService + ?Sized> GenerationService for std::sync::Arc<S> {
    async fn request(
        &self,
        request: ServiceRequest,
        signal: &AbortSignal,
    ) -> Result<ServiceResponse, RemoteError> {
        (**self).request(request, signal).await
    }

    async fn request_stream<'a>(
        &'a self,
        request: ServiceRequest,
        signal: &'a AbortSignal,
    ) -> Result<ChunkStream<'a>, RemoteError> {
        (**self).request_stream(request, signal).await
    }

    fn has_api_key(&self) -> bool {
        (**self).has_api_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use pretty_assertions::assert_eq;

    struct Echo;

    #[async_trait]
    impl GenerationService for Echo {
        async fn request(
            &self,
            request: ServiceRequest,
            signal: &AbortSignal,
        ) -> Result<ServiceResponse, RemoteError> {
            signal.check()?;
            Ok(ServiceResponse::text(request.contents.text()))
        }
    }

    #[tokio::test]
    async fn default_stream_is_single_chunk() {
        let service = Echo;
        let signal = AbortSignal::new();
        let chunks: Vec<String> = service
            .request_stream(ServiceRequest::new("m", "hello"), &signal)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks, vec!["hello".to_string()]);
        assert!(service.has_api_key());
    }

    #[test]
    fn request_builders() {
        let req = ServiceRequest::new("model-a", "prompt")
            .with_system("be terse")
            .json()
            .with_thinking_budget(1024);
        assert_eq!(req.config.system_instruction.as_deref(), Some("be terse"));
        assert_eq!(req.config.response_mime_type.as_deref(), Some("application/json"));
        assert_eq!(req.config.thinking_budget, Some(1024));
    }

    #[test]
    fn parts_text_skips_binary() {
        let contents = Contents::Parts(vec![
            Part::Text("a".into()),
            Part::InlineData(InlineData {
                mime_type: "image/png".into(),
                data: "AAAA".into(),
            }),
            Part::Text("b".into()),
        ]);
        assert_eq!(contents.text(), "a\nb");
    }

    #[test]
    fn first_image_filters_mime() {
        let response = ServiceResponse {
            text: None,
            inline_data: vec![
                InlineData {
                    mime_type: "text/plain".into(),
                    data: "x".into(),
                },
                InlineData {
                    mime_type: "image/png".into(),
                    data: "y".into(),
                },
            ],
        };
        assert_eq!(response.first_image().map(|d| d.data.as_str()), Some("y"));
        assert_eq!(response.text_or_empty(), "");
    }
}
