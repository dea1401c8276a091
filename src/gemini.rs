//! Gemini `generateContent` clients.
//!
//! Two backends speak the same request/response JSON and differ only in
//! endpoint and how the API key is passed. Callers see them through
//! [`GenerationClient`] and never learn which one is active.

use crate::aspect::AspectRatio;
use crate::config::{Backend, Config};
use crate::error::{NanoBananaError, Result};
use crate::history::ImagePayload;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::time::Duration;

const GOOGLE_AI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const VERTEX_AI_BASE: &str = "https://aiplatform.googleapis.com/v1/publishers/google/models";
const REQUEST_TIMEOUT_SECS: u64 = 180;
const ERROR_BODY_LIMIT: usize = 500;

/// One piece of a message: text or inline image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn image(payload: ImagePayload) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: payload.mime_type,
                data: payload.data_base64,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A role-tagged message in a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ChatTurn {
    pub fn user(parts: Vec<Part>) -> Self {
        Self { role: Role::User, parts }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }
}

/// An image returned by the model, plus any text it produced alongside.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub payload: ImagePayload,
    pub text: Option<String>,
}

pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The capability the server needs from an upstream model API.
pub trait GenerationClient: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Produce one image from `parts` (prompt text and optional input images).
    fn generate_image(
        &self,
        parts: Vec<Part>,
        aspect_ratio: AspectRatio,
    ) -> ClientFuture<'_, GeneratedImage>;

    /// Continue a conversation and return the model's text reply.
    fn chat(&self, turns: Vec<ChatTurn>) -> ClientFuture<'_, String>;
}

/// Build the client for the configured backend.
pub fn build_client(config: &Config) -> Result<Arc<dyn GenerationClient>> {
    let http = Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?;
    let shared = HttpBackend {
        http,
        api_key: config.api_key.clone(),
        chat_model: config.chat_model.clone(),
        image_model: config.image_model.clone(),
    };
    let client: Arc<dyn GenerationClient> = match config.backend {
        Backend::Gemini => Arc::new(GoogleAiClient { inner: shared }),
        Backend::Vertex => Arc::new(VertexAiClient { inner: shared }),
    };
    tracing::info!(
        backend = client.backend_name(),
        chat_model = %config.chat_model,
        image_model = %config.image_model,
        "Generation client ready"
    );
    Ok(client)
}

struct HttpBackend {
    http: Client,
    api_key: String,
    chat_model: String,
    image_model: String,
}

/// Gemini Developer API; key goes in the `x-goog-api-key` header.
pub struct GoogleAiClient {
    inner: HttpBackend,
}

impl GoogleAiClient {
    fn request(&self, model: &str) -> RequestBuilder {
        self.inner
            .http
            .post(format!("{GOOGLE_AI_BASE}/{model}:generateContent"))
            .header("x-goog-api-key", &self.inner.api_key)
    }
}

impl GenerationClient for GoogleAiClient {
    fn backend_name(&self) -> &'static str {
        "gemini"
    }

    fn generate_image(
        &self,
        parts: Vec<Part>,
        aspect_ratio: AspectRatio,
    ) -> ClientFuture<'_, GeneratedImage> {
        Box::pin(async move {
            let body = GenerateContentRequest::image(parts, aspect_ratio);
            let request = self.request(&self.inner.image_model);
            let response = send(self.backend_name(), request, &body).await?;
            response.into_image()
        })
    }

    fn chat(&self, turns: Vec<ChatTurn>) -> ClientFuture<'_, String> {
        Box::pin(async move {
            let body = GenerateContentRequest::chat(turns);
            let request = self.request(&self.inner.chat_model);
            let response = send(self.backend_name(), request, &body).await?;
            response.into_text()
        })
    }
}

/// Vertex AI express mode; key goes in the `key` query parameter.
pub struct VertexAiClient {
    inner: HttpBackend,
}

impl VertexAiClient {
    fn request(&self, model: &str) -> RequestBuilder {
        self.inner
            .http
            .post(format!("{VERTEX_AI_BASE}/{model}:generateContent"))
            .query(&[("key", self.inner.api_key.as_str())])
    }
}

impl GenerationClient for VertexAiClient {
    fn backend_name(&self) -> &'static str {
        "vertex"
    }

    fn generate_image(
        &self,
        parts: Vec<Part>,
        aspect_ratio: AspectRatio,
    ) -> ClientFuture<'_, GeneratedImage> {
        Box::pin(async move {
            let body = GenerateContentRequest::image(parts, aspect_ratio);
            let request = self.request(&self.inner.image_model);
            let response = send(self.backend_name(), request, &body).await?;
            response.into_image()
        })
    }

    fn chat(&self, turns: Vec<ChatTurn>) -> ClientFuture<'_, String> {
        Box::pin(async move {
            let body = GenerateContentRequest::chat(turns);
            let request = self.request(&self.inner.chat_model);
            let response = send(self.backend_name(), request, &body).await?;
            response.into_text()
        })
    }
}

async fn send(
    backend: &str,
    request: RequestBuilder,
    body: &GenerateContentRequest,
) -> Result<GenerateContentResponse> {
    let response = request.json(body).send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorResponse>(&text)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| truncate(&text, ERROR_BODY_LIMIT));
        tracing::warn!(backend, status = status.as_u16(), "Upstream request failed");
        return Err(NanoBananaError::UpstreamGenerationFailure(format!(
            "{backend} returned HTTP {}: {message}",
            status.as_u16()
        )));
    }

    serde_json::from_str(&text).map_err(|e| {
        NanoBananaError::UpstreamGenerationFailure(format!(
            "could not parse {backend} response: {e}"
        ))
    })
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<ChatTurn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    fn image(parts: Vec<Part>, aspect_ratio: AspectRatio) -> Self {
        Self {
            contents: vec![ChatTurn::user(parts)],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
                image_config: ImageConfig {
                    aspect_ratio: aspect_ratio.as_str(),
                },
            }),
        }
    }

    fn chat(turns: Vec<ChatTurn>) -> Self {
        Self {
            contents: turns,
            generation_config: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    image_config: ImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &ResponsePart> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter(|p| !p.thought)
    }

    fn joined_text(&self) -> Option<String> {
        let text: String = self.parts().filter_map(|p| p.text.as_deref()).collect();
        (!text.is_empty()).then_some(text)
    }

    /// Why the response carries nothing usable, as far as the API says.
    fn empty_reason(&self) -> String {
        if let Some(reason) = self.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
            return format!("prompt blocked ({reason})");
        }
        match self.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            Some(reason) => format!("finish reason {reason}"),
            None => "no candidates returned".to_string(),
        }
    }

    fn into_image(self) -> Result<GeneratedImage> {
        let text = self.joined_text();
        let inline = self.parts().find_map(|p| p.inline_data.clone());
        match inline {
            Some(inline) => Ok(GeneratedImage {
                payload: ImagePayload {
                    data_base64: inline.data,
                    mime_type: inline.mime_type,
                },
                text,
            }),
            None => Err(NanoBananaError::UpstreamGenerationFailure(match text {
                Some(text) => format!("model returned no image; it said: {text}"),
                None => format!("model returned no image: {}", self.empty_reason()),
            })),
        }
    }

    fn into_text(self) -> Result<String> {
        self.joined_text().ok_or_else(|| {
            NanoBananaError::UpstreamGenerationFailure(format!(
                "model returned no text: {}",
                self.empty_reason()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_request_carries_aspect_ratio_and_inline_data() {
        let body = GenerateContentRequest::image(
            vec![
                Part::text("a cat"),
                Part::image(ImagePayload {
                    data_base64: "AAAA".to_string(),
                    mime_type: "image/png".to_string(),
                }),
            ],
            AspectRatio::Landscape16x9,
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "a cat");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(json["generationConfig"]["responseModalities"][1], "IMAGE");
    }

    #[test]
    fn chat_request_has_no_generation_config() {
        let body = GenerateContentRequest::chat(vec![
            ChatTurn::user(vec![Part::text("hi")]),
            ChatTurn::model("hello"),
        ]);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("generationConfig").is_none());
        assert_eq!(json["contents"][1]["role"], "model");
    }

    #[test]
    fn image_response_extracts_inline_data_and_skips_thoughts() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking...", "thought": true},
                    {"text": "Here you go"},
                    {"inlineData": {"mimeType": "image/png", "data": "iVBOR"}}
                ]},
                "finishReason": "STOP"
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let image = response.into_image().unwrap();
        assert_eq!(image.payload.data_base64, "iVBOR");
        assert_eq!(image.payload.mime_type, "image/png");
        assert_eq!(image.text.as_deref(), Some("Here you go"));
    }

    #[test]
    fn text_only_response_is_an_upstream_failure() {
        let raw = r#"{"candidates": [{"content": {"parts": [{"text": "I can't draw that"}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let err = response.into_image().unwrap_err();
        assert!(matches!(err, NanoBananaError::UpstreamGenerationFailure(ref m) if m.contains("can't draw")));
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let raw = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let err = response.into_text().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("short", 10), "short");
    }
}
