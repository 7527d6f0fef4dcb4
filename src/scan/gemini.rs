//! Google Gemini `generateContent` over REST

use super::{LanguageModel, PromptPart};
use crate::error::{SheetfillError, SheetfillResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GeminiModel {
    pub fn new(api_key: &str, model: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

fn to_wire(part: PromptPart) -> Part {
    match part {
        PromptPart::Text(text) => Part::Text(text),
        PromptPart::Image { mime_type, data } => Part::InlineData(InlineData {
            mime_type,
            data: BASE64.encode(data),
        }),
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    async fn generate(&self, parts: Vec<PromptPart>) -> SheetfillResult<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: parts.into_iter().map(to_wire).collect(),
            }],
        };

        debug!(model = %self.model, "Calling Gemini generateContent");
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SheetfillError::UpstreamCallFailure(format!("Gemini API error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => "unknown error".to_string(),
            };
            return Err(SheetfillError::UpstreamCallFailure(format!(
                "Gemini API error ({}): {}",
                status, message
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            SheetfillError::UpstreamCallFailure(format!("Gemini returned an unreadable response: {}", e))
        })?;

        extract_text(body)
    }
}

fn extract_text(body: GenerateResponse) -> SheetfillResult<String> {
    if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(SheetfillError::UpstreamCallFailure(format!(
            "Gemini blocked the prompt: {}",
            reason
        )));
    }

    let candidate = body.candidates.into_iter().next().ok_or_else(|| {
        SheetfillError::UpstreamCallFailure("Gemini returned no candidates".to_string())
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(SheetfillError::UpstreamCallFailure(format!(
            "Gemini returned no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}
