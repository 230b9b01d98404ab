//! Per-image floating layer kept aligned with the image's screen rect.

use manatan_config::Settings;
use manatan_config::interaction::InteractionMode;
use manatan_core::geometry::{exceeds_dead_zone, intersects_viewport};
use manatan_types::{DomSnapshot, ElementId, HostImage, OcrStatus, Point, RenderMessage, Size, Viewport};

use crate::Effect;
use crate::observer::CompiledProfile;

/// Keeps the host's observers and listeners for one image alive.
///
/// Dropping the guard tells the host to remove them.
pub struct ListenerGuard {
    image: ElementId,
    effects: kanal::Sender<Effect>,
}

impl ListenerGuard {
    pub fn observe(image: ElementId, effects: kanal::Sender<Effect>) -> Self {
        if effects
            .send(Effect::Render(RenderMessage::Observe { image }))
            .is_err()
        {
            tracing::warn!("Effect channel closed, image {image:?} not observed");
        }
        Self { image, effects }
    }

    pub fn image(&self) -> ElementId {
        self.image
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        let _ = self.effects.send(Effect::Render(RenderMessage::Unobserve { image: self.image }));
    }
}

pub struct ImageOverlay {
    guard: ListenerGuard,
    src: String,
    visible: bool,
    transform: Point,
    size: Size,
    sync_requested: bool,
}

impl ImageOverlay {
    /// Start tracking `image` and request its OCR data.
    pub fn mount(image: &HostImage, effects: &kanal::Sender<Effect>) -> Self {
        tracing::debug!("Mounting overlay for {:?} ({})", image.id, image.src);

        let guard = ListenerGuard::observe(image.id, effects.clone());
        let _ = effects.send(Effect::Fetch {
            url: image.src.clone(),
        });

        Self {
            guard,
            src: image.src.clone(),
            visible: false,
            transform: Point::default(),
            size: Size::default(),
            sync_requested: true,
        }
    }

    pub fn image(&self) -> ElementId {
        self.guard.image()
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn transform(&self) -> Point {
        self.transform
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// The image now shows another page. Returns whether it changed.
    pub fn set_src(&mut self, src: &str, effects: &kanal::Sender<Effect>) -> bool {
        if self.src == src {
            return false;
        }

        tracing::debug!("Image {:?} src changed to {src}", self.image());
        self.src = src.to_string();
        let _ = effects.send(Effect::Fetch {
            url: self.src.clone(),
        });
        self.sync_requested = true;
        true
    }

    /// Scroll, resize and intersection changes only request a sync; the
    /// next frame performs it once.
    pub fn request_sync(&mut self) {
        self.sync_requested = true;
    }

    pub fn sync_pending(&self) -> bool {
        self.sync_requested
    }

    /// Perform a requested sync. `None` means the image is gone from the page.
    pub fn on_animation_frame(&mut self, image: Option<&HostImage>, viewport: Viewport, margin: f64) -> bool {
        if !self.sync_requested {
            return false;
        }
        self.sync_requested = false;

        match image {
            Some(image) => self.sync_position(image, viewport, margin),
            None => self.hide(),
        }
    }

    fn hide(&mut self) -> bool {
        let changed = self.visible;
        self.visible = false;
        changed
    }

    /// Align the layer with `image`. Returns whether anything observable changed.
    pub fn sync_position(&mut self, image: &HostImage, viewport: Viewport, margin: f64) -> bool {
        if !image.connected || !image.displayed {
            return self.hide();
        }

        if !intersects_viewport(image.rect, viewport, margin) {
            return self.hide();
        }

        let mut changed = !self.visible;
        self.visible = true;

        let transform = Point::new(image.rect.left, image.rect.top);
        if transform != self.transform {
            self.transform = transform;
            changed = true;
        }

        let size = image.rect.size();
        if exceeds_dead_zone(self.size, size) {
            self.size = size;
            changed = true;
        }

        changed
    }
}

/// Whether text boxes are painted regardless of hover.
pub fn should_show_children(settings: &Settings, status: OcrStatus) -> bool {
    settings.overlay.enable_overlay
        && (!settings.overlay.solo_hover
            || settings.interaction.mode == InteractionMode::Click
            || settings.overlay.debug_mode
            || matches!(status, OcrStatus::Loading | OcrStatus::Error))
}

/// Whether the overlay for `image` renders nothing at all.
///
/// In paginated mode an image from another chapter than the page URL is
/// hidden; images or pages without a chapter id are never suppressed for it.
pub fn is_suppressed(settings: &Settings, image: &HostImage, dom: &DomSnapshot, profile: &CompiledProfile) -> bool {
    if !settings.overlay.enable_overlay || !image.displayed || dom.reader_overlay_open {
        return true;
    }

    if dom.paginated {
        let image_chapter = profile.chapter_id(&image.src);
        let page_chapter = profile.chapter_id(&dom.location);
        if let (Some(image_chapter), Some(page_chapter)) = (image_chapter, page_chapter) {
            return image_chapter != page_chapter;
        }
    }

    false
}
