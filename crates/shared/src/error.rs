//! Error taxonomy for the hover analysis pipeline.
//!
//! Every failure the pipeline can hit maps onto one of three enums:
//! credential problems, image acquisition problems, and analysis (API)
//! problems. All of them are caught at the hover router boundary and
//! flattened into a display string; nothing here escapes to the host.

use thiserror::Error;

/// Problems with the stored API credential, detected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Please set your Gemini API key in the extension settings")]
    Empty,
    #[error("Invalid API key format. Please check your API key")]
    TooShort,
}

/// Failures while obtaining the raw image bytes.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The direct fetch failed (transport error, non-success status, or an
    /// unreadable body).
    #[error("direct fetch failed: {0}")]
    NetworkFailed(String),
    /// The render fallback failed (load error, decode error, or a tainted
    /// surface that refused export).
    #[error("render fallback failed: {0}")]
    RenderFailed(String),
    /// Both strategies were tried and neither produced bytes.
    #[error("Failed to load image data. The image might be protected or unavailable")]
    Unavailable,
}

/// Failures from the vision-model call.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    /// The request never completed (DNS, connect, TLS, ...).
    #[error("Network error: {0}")]
    Network(String),
    /// Non-success HTTP status, with whatever message the error body carried.
    #[error("API request failed: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Invalid response format from API")]
    MalformedResponse,
}
