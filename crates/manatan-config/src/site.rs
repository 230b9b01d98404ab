use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Loopback, private and link-local addresses, `localhost` and mDNS `.local` names.
pub fn is_local_host(host: &str) -> bool {
    let host = host.trim_matches(['[', ']']).trim_end_matches('.').to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") || host.ends_with(".local") {
        return true;
    }

    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => ip.is_loopback() || ip.is_private() || ip.is_link_local(),
        Ok(IpAddr::V6(ip)) => {
            let first = ip.segments()[0];
            // fc00::/7 unique local, fe80::/10 link-local
            ip.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
        Err(_) => false,
    }
}

fn default_min_rendered_height() -> f64 {
    150.0
}

fn default_reader_path_pattern() -> String {
    r"/chapter/\d+/page/\d+".to_string()
}

fn default_chapter_pattern() -> String {
    r"/chapter/(\d+)".to_string()
}

/// How to find page images on one reader site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteProfile {
    pub name: String,
    /// Host names the profile applies to, matched as suffixes
    pub hosts: Vec<String>,
    pub image_selectors: Vec<String>,
    /// Fallback: image URLs that look like reader pages
    #[serde(default = "default_reader_path_pattern")]
    pub reader_path_pattern: String,
    /// First capture group is the chapter id, applied to image and page URLs
    #[serde(default = "default_chapter_pattern")]
    pub chapter_pattern: String,
    /// Fallback: rendered height below which an image counts as a thumbnail
    #[serde(default = "default_min_rendered_height")]
    pub min_rendered_height: f64,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::generic()
    }
}

impl SiteProfile {
    /// Profile with no selectors, relying entirely on the structural heuristic.
    pub fn generic() -> Self {
        Self {
            name: "generic".to_string(),
            hosts: vec![],
            image_selectors: vec![],
            reader_path_pattern: default_reader_path_pattern(),
            chapter_pattern: default_chapter_pattern(),
            min_rendered_height: default_min_rendered_height(),
        }
    }

    pub fn matches_host(&self, host: &str) -> bool {
        self.hosts
            .iter()
            .any(|h| host == h || host.ends_with(&format!(".{h}")))
    }

    /// Pick the profile for `host`.
    ///
    /// A locally served reader with no matching profile uses the first
    /// configured one instead of failing closed.
    pub fn resolve<'a>(profiles: &'a [SiteProfile], host: &str) -> Option<&'a SiteProfile> {
        if let Some(profile) = profiles.iter().find(|p| p.matches_host(host)) {
            return Some(profile);
        }

        if is_local_host(host) {
            tracing::debug!("No site profile for local host {host}, using first profile");
            return profiles.first();
        }

        None
    }
}

pub fn default_profiles() -> Vec<SiteProfile> {
    vec![
        SiteProfile {
            name: "suwayomi".to_string(),
            hosts: vec!["suwayomi.org".to_string(), "manatan.app".to_string()],
            image_selectors: vec![
                r#"img[src*="/api/v1/manga/"][src*="/page/"]"#.to_string(),
                ".reader-page img".to_string(),
            ],
            reader_path_pattern: r"/api/v1/manga/\d+/chapter/\d+/page/\d+".to_string(),
            chapter_pattern: r"/chapter/(\d+)".to_string(),
            min_rendered_height: default_min_rendered_height(),
        },
        SiteProfile {
            name: "komga".to_string(),
            hosts: vec!["komga.org".to_string()],
            image_selectors: vec![r#"img[src*="/api/v1/books/"][src*="/pages/"]"#.to_string()],
            reader_path_pattern: r"/api/v1/books/[^/]+/pages/\d+".to_string(),
            chapter_pattern: r"/books/([^/]+)".to_string(),
            min_rendered_height: default_min_rendered_height(),
        },
    ]
}
