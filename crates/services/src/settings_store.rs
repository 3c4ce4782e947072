//! Persistent key-value store for the analyzer settings.
//!
//! A single JSON file under the platform config directory, with in-process
//! change subscription. The pipeline only reads; the settings editor writes.
//! A missing or corrupt file always reads as defaults; the store never
//! errors out of a load.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use shared::settings::AnalyzerSettings;
use tracing::{debug, warn};

type ChangeListener = Box<dyn Fn(&AnalyzerSettings) + Send + Sync>;

pub struct SettingsStore {
    path: PathBuf,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl SettingsStore {
    /// Store backed by the platform config directory.
    pub fn open_default() -> Arc<Self> {
        let path = directories::ProjectDirs::from("com.local", "Hoverlens", "Hoverlens")
            .map(|p| p.config_dir().join("settings.json"))
            .unwrap_or_else(|| PathBuf::from("./hoverlens-settings.json"));
        Self::with_path(path)
    }

    /// Store backed by an explicit file path (tests, portable installs).
    pub fn with_path(path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            path,
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Read the current settings. Any failure reads as defaults.
    pub fn load(&self) -> AnalyzerSettings {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("settings file unreadable, using defaults: {e}");
                    AnalyzerSettings::default()
                }
            },
            Err(_) => AnalyzerSettings::default(),
        }
    }

    /// Persist settings and notify every subscriber.
    pub fn save(&self, settings: &AnalyzerSettings) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, json)?;
        debug!("settings saved to {}", self.path.display());

        for listener in self.listeners.lock().iter() {
            listener(settings);
        }
        Ok(())
    }

    /// Register a callback invoked on every successful save.
    pub fn subscribe(&self, listener: impl Fn(&AnalyzerSettings) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }
}
