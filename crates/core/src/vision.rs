//! Vision API client.
//!
//! The [`VisionClient`] trait is what the controller talks to;
//! [`OpenAiVisionClient`] implements it against the OpenAI chat completions
//! endpoint, sending the capture as an inline PNG next to a text prompt.
//! Every failure is classified into one of the four [`AnalysisErrorKind`]s
//! before it leaves this module.

use crate::config::{API_KEY_VAR, Config};
use crate::error::{AnalysisErrorKind, AppError, Result, VisionError};
use crate::image_processing::ImageProcessor;
use async_trait::async_trait;
use image::DynamicImage;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Prompt sent with every capture unless the user configured their own.
pub const DEFAULT_ANALYSIS_PROMPT: &str = "Please perform the following tasks:\n\
1. Analyze the provided image to extract all text accurately.\n\
2. Examine the extracted text to determine if it contains a problem, question, or concept that needs explanation.\n\
3. Provide a clear, step-by-step solution or explanation based on the extracted text.\n\
4. Use markdown-like formatting for readability:\n   \
- Headings: '### '\n   \
- Subheadings: '## '\n   \
- Bullet points: '- '\n   \
- Code blocks: triple backticks (```)\n   \
- Inline bold: '**bold text**'\n\
5. Return the final answer in plain text format with these cues.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Outcome of one analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisResult {
    Success(String),
    Failure {
        kind: AnalysisErrorKind,
        message: String,
    },
}

impl AnalysisResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure_kind(&self) -> Option<AnalysisErrorKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<std::result::Result<String, VisionError>> for AnalysisResult {
    fn from(result: std::result::Result<String, VisionError>) -> Self {
        match result {
            Ok(text) => Self::Success(text),
            Err(VisionError { kind, message }) => Self::Failure { kind, message },
        }
    }
}

/// Something that can describe an image.
///
/// Implementations issue exactly one request per call and keep nothing
/// from `image` once the future completes.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn analyze(&self, image: &DynamicImage, prompt: &str) -> AnalysisResult;
}

pub struct OpenAiVisionClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiVisionClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::config(format!("Failed to create HTTP client: {}", e)))?;
        Self::with_http_client(config, http)
    }

    fn with_http_client(config: &Config, http: reqwest::Client) -> Result<Self> {
        let endpoint = config
            .base_url
            .join("chat/completions")
            .map_err(|e| AppError::config(format!("Invalid API endpoint: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.openai_api_key.clone(),
            model: config.model_name.clone(),
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request_analysis(
        &self,
        image: &DynamicImage,
        prompt: &str,
    ) -> std::result::Result<String, VisionError> {
        if self.api_key.trim().is_empty() {
            return Err(VisionError::auth(format!("{} is not set", API_KEY_VAR)));
        }

        let data_url = ImageProcessor::to_png_data_url(image)?;
        let body = build_request(&self.model, self.max_tokens, prompt, &data_url);

        log::info!(
            "[VISION] sending {}x{} image to {} ({})",
            image.width(),
            image.height(),
            self.endpoint,
            self.model
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(translate_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(translate_transport_error)?;

        if !status.is_success() {
            return Err(translate_status(status, &text));
        }

        parse_answer(&text)
    }
}

#[async_trait]
impl VisionClient for OpenAiVisionClient {
    async fn analyze(&self, image: &DynamicImage, prompt: &str) -> AnalysisResult {
        let result = self.request_analysis(image, prompt).await;
        match &result {
            Ok(text) => log::info!("[VISION] received {} characters", text.len()),
            Err(e) => log::warn!("[VISION] request failed: {}", e),
        }
        result.into()
    }
}

// --- OpenAI API Request/Response Structures ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn build_request<'a>(
    model: &'a str,
    max_tokens: u32,
    prompt: &'a str,
    data_url: &'a str,
) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model,
        messages: vec![RequestMessage {
            role: "user",
            content: vec![
                ContentPart::Text { text: prompt },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_url },
                },
            ],
        }],
        max_tokens,
    }
}

fn translate_transport_error(err: reqwest::Error) -> VisionError {
    if err.is_timeout() {
        VisionError::network(format!("Request timed out: {}", err))
    } else if err.is_decode() {
        VisionError::api(format!("Failed to read response: {}", err))
    } else {
        VisionError::network(format!("Request failed: {}", err))
    }
}

fn translate_status(status: StatusCode, body: &str) -> VisionError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .ok()
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    let message = format!("HTTP {}: {}", status.as_u16(), detail);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => VisionError::auth(message),
        _ => VisionError::api(message),
    }
}

fn parse_answer(body: &str) -> std::result::Result<String, VisionError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| VisionError::api(format!("Failed to parse response: {}", e)))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| VisionError::api("No choices returned"))?;

    let answer = choice.message.content.unwrap_or_default().trim().to_string();
    if answer.is_empty() {
        return Err(VisionError::api("No text response received"));
    }

    Ok(answer)
}
