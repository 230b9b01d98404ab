use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "http://127.0.0.1:4568".to_string()
}

fn default_language() -> String {
    "ja".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Companion backend serving `/api/ocr` and `/api/yomitan`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Language of the material being read (ISO 639-1)
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            password: None,
            language: default_language(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl ServerConfig {
    /// `user`/`pass` query pairs, present only when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}
