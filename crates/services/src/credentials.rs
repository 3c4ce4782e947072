//! Credential provider: the pipeline's read-only view of the API key.
//!
//! Wraps the settings store, keeps the current key in memory, and refreshes
//! it when the store reports a change or when the settings editor pings us
//! with an `API_KEY_UPDATED` notification. Nothing else mutates the
//! credential; it lives for the hosting session.

use std::sync::Arc;

use parking_lot::RwLock;
use shared::error::CredentialError;
use shared::events::Notification;
use shared::settings::validate_api_key;
use tracing::debug;

use crate::settings_store::SettingsStore;

pub struct CredentialProvider {
    store: Arc<SettingsStore>,
    current: RwLock<String>,
}

impl CredentialProvider {
    /// Load the credential and subscribe to store changes so later edits are
    /// picked up without a reload.
    pub fn new(store: Arc<SettingsStore>) -> Arc<Self> {
        let provider = Arc::new(Self {
            current: RwLock::new(store.load().gemini_api_key),
            store,
        });
        debug!(
            "API key loaded: {}",
            if provider.current.read().is_empty() { "missing" } else { "present" }
        );

        let weak = Arc::downgrade(&provider);
        provider.store.subscribe(move |settings| {
            if let Some(provider) = weak.upgrade() {
                *provider.current.write() = settings.gemini_api_key.clone();
            }
        });
        provider
    }

    /// The credential as currently known. Empty string when absent.
    pub fn current(&self) -> String {
        self.current.read().clone()
    }

    /// Shape check on the current credential.
    pub fn validate(&self) -> Result<(), CredentialError> {
        validate_api_key(&self.current.read())
    }

    /// Handle a cross-process notification from the settings editor.
    pub fn handle_notification(&self, notification: &Notification) {
        match notification {
            Notification::ApiKeyUpdated => {
                *self.current.write() = self.store.load().gemini_api_key;
                debug!("API key reloaded after external update");
            }
        }
    }
}
