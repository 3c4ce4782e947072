//! Gemini vision client: one image in, one short description out.
//!
//! The credential is validated before anything touches the network, the
//! request carries a fixed instruction prompt plus the inline JPEG bytes,
//! and every successful description gets the attribution footer appended.
//! A single attempt per call; the hover pipeline retries by re-hovering.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::error::AnalysisError;
use shared::settings::validate_api_key;
use tracing::debug;

const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

const PROMPT: &str = "Analyze this image and provide a brief description.";

/// Appended to every successful analysis, exactly once.
const ATTRIBUTION: &str = "\n\n© 2025 Falah G. Salieh (فلاح الخفاجي)\nGemini Image Analyzer";

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

/// Vision-model seam. The hover router only sees this trait, so tests can
/// swap in a scripted backend.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Describe a base64 JPEG image. Validates the credential before any I/O.
    async fn analyze(&self, image_base64: &str, api_key: &str) -> Result<String, AnalysisError>;
}

pub struct GeminiClient {
    http: Client,
    endpoint: String,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn build_request(image_base64: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text { text: PROMPT.to_string() },
                    GeminiPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: image_base64.to_string(),
                        },
                    },
                ],
            }],
        }
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageAnalyzer for GeminiClient {
    async fn analyze(&self, image_base64: &str, api_key: &str) -> Result<String, AnalysisError> {
        validate_api_key(api_key)?;

        let url = format!("{}?key={}", self.endpoint, api_key);
        debug!("sending analysis request to Gemini");
        let resp = self
            .http
            .post(&url)
            .json(&Self::build_request(image_base64))
            .send()
            .await
            .map_err(|e| AnalysisError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp
                .json::<GeminiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.map(|e| e.message))
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(AnalysisError::Api { status, message });
        }

        let body: GeminiResponse = resp
            .json()
            .await
            .map_err(|_| AnalysisError::MalformedResponse)?;
        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.as_str())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(AnalysisError::MalformedResponse);
        }

        Ok(format!("{text}{ATTRIBUTION}"))
    }
}
