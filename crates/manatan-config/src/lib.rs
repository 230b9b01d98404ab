use std::env;

use serde::{Deserialize, Serialize};

use self::anki::AnkiConfig;
use self::interaction::InteractionConfig;
use self::overlay::OverlayConfig;
use self::server::ServerConfig;
use self::site::SiteProfile;

pub mod anki;
pub mod interaction;
pub mod overlay;
pub mod server;
pub mod site;
pub mod storage;

fn default_bridge_addr() -> String {
    "127.0.0.1:4570".to_string()
}

fn default_sites() -> Vec<SiteProfile> {
    site::default_profiles()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub overlay: OverlayConfig,
    pub interaction: InteractionConfig,
    pub server: ServerConfig,
    pub anki: AnkiConfig,
    #[serde(default = "default_sites")]
    pub sites: Vec<SiteProfile>,
    /// Address the injected page script connects to
    #[serde(default = "default_bridge_addr")]
    pub bridge_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            overlay: OverlayConfig::default(),
            interaction: InteractionConfig::default(),
            server: ServerConfig::default(),
            anki: AnkiConfig::default(),
            sites: default_sites(),
            bridge_addr: default_bridge_addr(),
        }
    }
}

impl Settings {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var("MANATAN_BASE_URL") {
            self.server.base_url = url;
        }

        if let Ok(lang) = env::var("MANATAN_LANGUAGE") {
            self.server.language = lang;
        }

        if let Ok(url) = env::var("MANATAN_ANKI_URL") {
            self.anki.url = url;
        }

        if let Ok(addr) = env::var("MANATAN_BRIDGE_ADDR") {
            self.bridge_addr = addr;
        }

        self.server.timeout_seconds = env::var("MANATAN_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.server.timeout_seconds);

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let raw = r#"{"overlay":{"soloHover":false},"anki":{"enabled":true}}"#;
        let settings: Settings = serde_json::from_str(raw).unwrap();

        assert!(!settings.overlay.solo_hover);
        assert!(settings.overlay.enable_overlay);
        assert!(settings.anki.enabled);
        assert_eq!(settings.anki.url, "http://127.0.0.1:8765");
        assert!(!settings.sites.is_empty());
        assert_eq!(settings.bridge_addr, "127.0.0.1:4570");
    }
}
