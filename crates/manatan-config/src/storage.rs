//! Local key-value persistence for [`Settings`], the desktop stand-in for
//! the page's `localStorage`.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::Settings;

pub const SETTINGS_KEY: &str = "manatan-settings-v3";
pub const SETUP_COMPLETE_KEY: &str = "manatan-setup-complete";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Whole store kept as one JSON object on disk, rewritten on every change.
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let entries = if path.exists() {
            let data = fs::read_to_string(&path)?;
            match serde_json::from_str(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Store {} is corrupt, starting empty: {e}", path.display());
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// `$MANATAN_DATA_DIR`, else `$XDG_CONFIG_HOME/manatan`, else `~/.config/manatan`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = env::var("MANATAN_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Ok(dir) = env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(dir).join("manatan");
    }

    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".config").join("manatan"))
        .unwrap_or_else(|_| PathBuf::from(".manatan"))
}

pub fn default_store_path() -> PathBuf {
    data_dir().join("storage.json")
}

pub struct SettingsStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> SettingsStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Stored settings, or defaults when nothing usable is stored.
    pub fn load(&self) -> Settings {
        match self.store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Stored settings are invalid, using defaults: {e}");
                Settings::default()
            }),
            Ok(None) => {
                tracing::info!("No stored settings, using defaults");
                Settings::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read settings, using defaults: {e}");
                Settings::default()
            }
        }
    }

    pub fn save(&mut self, settings: &Settings) -> Result<(), StorageError> {
        let raw = serde_json::to_string(settings)?;
        self.store.set(SETTINGS_KEY, raw)
    }

    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.store.remove(SETTINGS_KEY)
    }

    pub fn is_setup_complete(&self) -> bool {
        matches!(self.store.get(SETUP_COMPLETE_KEY), Ok(Some(v)) if v == "true")
    }

    pub fn mark_setup_complete(&mut self) -> Result<(), StorageError> {
        self.store.set(SETUP_COMPLETE_KEY, "true".to_string())
    }
}
