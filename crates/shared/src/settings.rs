//! Settings schema and credential validation.

use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// A key shorter than this cannot be a real Gemini API key.
pub const MIN_API_KEY_LEN: usize = 10;

/// Persisted settings. A single string field today; kept as a struct so the
/// file format can grow without a migration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    #[serde(default)]
    pub gemini_api_key: String,
}

/// Shape check for the stored credential. No network, no UI.
pub fn validate_api_key(key: &str) -> Result<(), CredentialError> {
    if key.is_empty() {
        return Err(CredentialError::Empty);
    }
    if key.len() < MIN_API_KEY_LEN {
        return Err(CredentialError::TooShort);
    }
    Ok(())
}
