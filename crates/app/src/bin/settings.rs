//! Settings editor: writes the Gemini API key into the store.
//!
//! After a successful save it prints the `API_KEY_UPDATED` notification
//! payload; the host delivers that to any running pipeline instances so
//! they reload the credential without a restart.

use anyhow::Result;
use services::settings_store::SettingsStore;
use shared::events::Notification;
use shared::settings::{AnalyzerSettings, MIN_API_KEY_LEN};

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let key = std::env::args()
        .nth(1)
        .map(|arg| arg.trim().to_string())
        .unwrap_or_default();

    if key.is_empty() {
        eprintln!("Please enter an API key");
        eprintln!("usage: hoverlens-settings <gemini-api-key>");
        std::process::exit(1);
    }
    if key.len() < MIN_API_KEY_LEN {
        eprintln!("API key seems too short. Please check it");
        std::process::exit(1);
    }

    let store = SettingsStore::open_default();
    store.save(&AnalyzerSettings { gemini_api_key: key })?;
    println!("API key saved successfully!");
    println!("{}", serde_json::to_string(&Notification::ApiKeyUpdated)?);
    Ok(())
}
