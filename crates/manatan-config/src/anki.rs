use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_url() -> String {
    "http://127.0.0.1:8765".to_string()
}

fn default_timeout_seconds() -> u64 {
    20
}

fn default_stale_after_seconds() -> u64 {
    300
}

fn default_tags() -> Vec<String> {
    vec!["manatan".to_string()]
}

fn default_fields() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Expression".to_string(), "{expression}".to_string()),
        ("Reading".to_string(), "{reading}".to_string()),
        ("Meaning".to_string(), "{glossary}".to_string()),
        ("Sentence".to_string(), "{sentence}".to_string()),
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnkiConfig {
    /// Enable Anki integration
    pub enabled: bool,
    /// AnkiConnect URL
    #[serde(default = "default_url")]
    pub url: String,
    pub deck: String,
    pub model: String,
    /// Note field name to template, e.g. `"Reading" -> "{reading}"`
    #[serde(default = "default_fields")]
    pub fields: BTreeMap<String, String>,
    /// Field receiving the page screenshot, if any
    pub image_field: Option<String>,
    /// Show the crop dialog before attaching a screenshot
    pub enable_cropper: bool,
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// "Update last card" refuses notes older than this
    #[serde(default = "default_stale_after_seconds")]
    pub stale_after_seconds: u64,
}

impl Default for AnkiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_url(),
            deck: String::new(),
            model: String::new(),
            fields: default_fields(),
            image_field: None,
            enable_cropper: false,
            tags: default_tags(),
            timeout_seconds: default_timeout_seconds(),
            stale_after_seconds: default_stale_after_seconds(),
        }
    }
}
