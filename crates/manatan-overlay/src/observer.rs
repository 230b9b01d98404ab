//! Finds OCR target images in the host page and republishes the list when it
//! changes. Rescans are driven by `mark_dirty` and happen at most once per
//! animation frame.

use std::collections::HashSet;

use manatan_config::site::SiteProfile;
use manatan_types::{DomSnapshot, ElementId, HostImage};
use regex::Regex;

/// Images this short (natural pixels) are icons or thumbnails.
pub const MIN_NATURAL_HEIGHT: f64 = 200.0;

/// Read access to the host document.
pub trait HostDom {
    fn location(&self) -> &str;
    fn images(&self) -> &[HostImage];
}

impl HostDom for DomSnapshot {
    fn location(&self) -> &str {
        &self.location
    }

    fn images(&self) -> &[HostImage] {
        &self.images
    }
}

/// Host name of a page URL, empty when it has none.
pub fn host_of(location: &str) -> String {
    url::Url::parse(location)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_matches(['[', ']']).to_string()))
        .unwrap_or_default()
}

fn path_of(src: &str) -> String {
    match url::Url::parse(src) {
        Ok(u) => u.path().to_string(),
        Err(_) => src.to_string(),
    }
}

fn compile(pattern: &str, what: &str, profile: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Invalid {what} pattern in site profile {profile}: {e}");
            None
        }
    }
}

/// A [`SiteProfile`] with its patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    pub profile: SiteProfile,
    reader_path: Option<Regex>,
    chapter: Option<Regex>,
}

impl CompiledProfile {
    pub fn new(profile: SiteProfile) -> Self {
        Self {
            reader_path: compile(&profile.reader_path_pattern, "reader path", &profile.name),
            chapter: compile(&profile.chapter_pattern, "chapter", &profile.name),
            profile,
        }
    }

    /// Profile for the page at `location`, generic when nothing matches.
    pub fn for_location(profiles: &[SiteProfile], location: &str) -> Self {
        let host = host_of(location);
        let profile = SiteProfile::resolve(profiles, &host)
            .cloned()
            .unwrap_or_else(SiteProfile::generic);

        tracing::debug!("Using site profile {} for {host}", profile.name);
        Self::new(profile)
    }

    /// Chapter id of an image or page URL.
    pub fn chapter_id(&self, url: &str) -> Option<String> {
        let re = self.chapter.as_ref()?;
        re.captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn matches_selectors(&self, image: &HostImage) -> bool {
        image
            .matched
            .iter()
            .any(|s| self.profile.image_selectors.contains(s))
    }

    fn looks_like_page(&self, image: &HostImage) -> bool {
        let Some(re) = &self.reader_path else {
            return false;
        };

        re.is_match(&path_of(&image.src)) && image.rect.height > self.profile.min_rendered_height
    }
}

/// Candidate images: selector matches, or the structural fallback when no
/// selector matched anything. Then connected, tall enough, deduplicated.
pub fn scan(profile: &CompiledProfile, dom: &impl HostDom) -> Vec<HostImage> {
    let images = dom.images();

    let mut candidates: Vec<&HostImage> = images
        .iter()
        .filter(|img| profile.matches_selectors(img))
        .collect();

    if candidates.is_empty() {
        candidates = images
            .iter()
            .filter(|img| profile.looks_like_page(img))
            .collect();
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|img| img.connected && img.natural_height > MIN_NATURAL_HEIGHT)
        .filter(|img| seen.insert(img.id))
        .cloned()
        .collect()
}

/// Same length and same `src` element by element.
fn same_sources(a: &[HostImage], b: &[HostImage]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.src == y.src)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Predicate = Box<dyn Fn(&HostImage) -> bool + Send>;
type OnChange = Box<dyn FnMut(&[HostImage]) + Send>;

struct Subscription {
    id: SubscriptionId,
    predicate: Predicate,
    on_change: OnChange,
    published: Vec<HostImage>,
}

pub struct ImageObserver {
    profile: CompiledProfile,
    subscriptions: Vec<Subscription>,
    dirty: bool,
    next_id: u64,
}

impl ImageObserver {
    pub fn new(profile: CompiledProfile) -> Self {
        Self {
            profile,
            subscriptions: Vec::new(),
            dirty: true,
            next_id: 0,
        }
    }

    pub fn profile(&self) -> &CompiledProfile {
        &self.profile
    }

    pub fn set_profile(&mut self, profile: CompiledProfile) {
        tracing::info!("Site profile switched to {}", profile.profile.name);
        self.profile = profile;
        self.dirty = true;
    }

    /// Watch for target images accepted by `predicate`.
    ///
    /// `on_change` runs after the next frame with the initial list, then only
    /// when the list really changed.
    pub fn subscribe(
        &mut self,
        predicate: impl Fn(&HostImage) -> bool + Send + 'static,
        on_change: impl FnMut(&[HostImage]) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        self.subscriptions.push(Subscription {
            id,
            predicate: Box::new(predicate),
            on_change: Box::new(on_change),
            published: Vec::new(),
        });
        self.dirty = true;
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscriptions.retain(|s| s.id != id);
    }

    /// A child was inserted or a `src` changed somewhere in the document.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn published(&self, id: SubscriptionId) -> Option<&[HostImage]> {
        self.subscriptions
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.published.as_slice())
    }

    /// Rescan if anything changed since the last frame. Returns whether a
    /// scan ran.
    pub fn on_animation_frame(&mut self, dom: &impl HostDom) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;

        let targets = scan(&self.profile, dom);
        tracing::trace!("Observer scan found {} images", targets.len());

        for sub in &mut self.subscriptions {
            let matching: Vec<HostImage> = targets
                .iter()
                .filter(|img| (sub.predicate)(img))
                .cloned()
                .collect();

            if same_sources(&sub.published, &matching) {
                continue;
            }

            sub.published = matching;
            (sub.on_change)(&sub.published);
        }

        true
    }

    /// Ids of the images the subscription last published.
    pub fn published_ids(&self, id: SubscriptionId) -> Vec<ElementId> {
        self.published(id)
            .map(|images| images.iter().map(|img| img.id).collect())
            .unwrap_or_default()
    }
}
