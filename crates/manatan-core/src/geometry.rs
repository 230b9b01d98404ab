//! Conversions between the coordinate spaces an overlay passes through:
//! normalized (OCR output, 0..1 of the natural image), percent (CSS box of
//! the rendered image), local pixels (inside the overlay layer) and viewport
//! pixels (client rects).

use manatan_config::overlay::TextOrientation;
use manatan_types::{BoundingBox, Orientation, Point, Rect, Size, Viewport};

pub const MAX_FONT_SIZE: f64 = 200.0;
pub const MIN_FONT_SIZE: f64 = 10.0;
/// Lower floor on mobile so text fits small speech bubbles
pub const MIN_FONT_SIZE_MOBILE: f64 = 5.0;
/// Height/width ratio above which smart orientation picks vertical flow
pub const VERTICAL_ASPECT_RATIO: f64 = 1.5;
/// Content size changes at or below this are layout jitter
pub const SIZE_DEAD_ZONE: f64 = 1.0;
/// Images smaller than this in either dimension are not considered visible
pub const MIN_VISIBLE_SIZE: f64 = 2.0;

const LINE_HEIGHT: f64 = 1.2;
const NARROW_GLYPH_EM: f64 = 0.55;

/// Box in percent of the rendered image, ready for `left/top/width/height: N%`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PercentBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Percent box of `bbox`, grown by `adjustment` percent points on every side
/// and clipped to the image.
pub fn to_percent_box(bbox: &BoundingBox, adjustment: f64) -> PercentBox {
    let adjustment = if adjustment.is_finite() { adjustment } else { 0.0 };

    let left = (bbox.x * 100.0 - adjustment).max(0.0);
    let top = (bbox.y * 100.0 - adjustment).max(0.0);
    let right = (bbox.right() * 100.0 + adjustment).min(100.0);
    let bottom = (bbox.bottom() * 100.0 + adjustment).min(100.0);

    PercentBox {
        left,
        top,
        width: (right - left).max(0.0),
        height: (bottom - top).max(0.0),
    }
}

/// Percent box to pixels inside an overlay of `rendered` size.
pub fn percent_to_local(pct: &PercentBox, rendered: Size) -> Rect {
    Rect::new(
        pct.left / 100.0 * rendered.width,
        pct.top / 100.0 * rendered.height,
        pct.width / 100.0 * rendered.width,
        pct.height / 100.0 * rendered.height,
    )
}

pub fn normalized_to_local(bbox: &BoundingBox, rendered: Size) -> Rect {
    Rect::new(
        bbox.x * rendered.width,
        bbox.y * rendered.height,
        bbox.width * rendered.width,
        bbox.height * rendered.height,
    )
}

/// Natural-resolution pixel rect, used when cropping the source image.
pub fn normalized_to_natural(bbox: &BoundingBox, natural: Size) -> Rect {
    normalized_to_local(bbox, natural)
}

pub fn local_to_viewport(local: Rect, image_rect: Rect) -> Rect {
    Rect::new(
        image_rect.left + local.left,
        image_rect.top + local.top,
        local.width,
        local.height,
    )
}

/// Client point to normalized image coordinates. `None` for a zero-area image.
pub fn viewport_to_normalized(point: Point, image_rect: Rect) -> Option<Point> {
    if image_rect.width <= 0.0 || image_rect.height <= 0.0 {
        return None;
    }

    Some(Point::new(
        (point.x - image_rect.left) / image_rect.width,
        (point.y - image_rect.top) / image_rect.height,
    ))
}

/// Smallest box containing both inputs.
pub fn union_box(a: &BoundingBox, b: &BoundingBox) -> BoundingBox {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    let right = a.right().max(b.right());
    let bottom = a.bottom().max(b.bottom());

    BoundingBox::new(x, y, right - x, bottom - y)
}

/// Viewport intersection with a pre-fetch `margin` around the viewport.
///
/// Near-zero-area rects never intersect.
pub fn intersects_viewport(rect: Rect, viewport: Viewport, margin: f64) -> bool {
    if rect.width <= MIN_VISIBLE_SIZE || rect.height <= MIN_VISIBLE_SIZE {
        return false;
    }

    rect.bottom() > -margin
        && rect.top < viewport.height + margin
        && rect.right() > -margin
        && rect.left < viewport.width + margin
}

/// Whether a content resize is large enough to apply.
pub fn exceeds_dead_zone(previous: Size, next: Size) -> bool {
    (previous.width - next.width).abs() > SIZE_DEAD_ZONE
        || (previous.height - next.height).abs() > SIZE_DEAD_ZONE
}

pub fn is_vertical(forced: Option<Orientation>, mode: TextOrientation, rendered: Size) -> bool {
    match forced {
        Some(Orientation::Vertical) => return true,
        Some(Orientation::Horizontal) => return false,
        Some(Orientation::Auto) | None => {}
    }

    match mode {
        TextOrientation::ForceVertical => true,
        TextOrientation::ForceHorizontal => false,
        TextOrientation::Smart => rendered.height > rendered.width * VERTICAL_ASPECT_RATIO,
    }
}

/// Inputs for [`fit_font_size`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontFit {
    /// Rendered block size in pixels
    pub size: Size,
    pub lines: usize,
    /// Longest line, in ems
    pub longest_line: f64,
    pub vertical: bool,
}

impl FontFit {
    pub fn for_text(text: &str, size: Size, vertical: bool) -> Self {
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let longest_line = lines
            .iter()
            .map(|line| line_extent(line, vertical))
            .fold(0.0, f64::max);

        Self {
            size,
            lines: lines.len(),
            longest_line,
            vertical,
        }
    }
}

/// Length of a line along its flow direction, in ems.
///
/// Vertical text stacks every glyph on a full em. Horizontal Latin glyphs are
/// narrower than CJK ones.
fn line_extent(line: &str, vertical: bool) -> f64 {
    if vertical {
        return line.chars().count() as f64;
    }

    line.chars()
        .map(|c| if c.is_ascii() { NARROW_GLYPH_EM } else { 1.0 })
        .sum()
}

pub fn min_font_size(mobile: bool) -> f64 {
    if mobile {
        MIN_FONT_SIZE_MOBILE
    } else {
        MIN_FONT_SIZE
    }
}

/// Largest font size whose text still fits both dimensions of the box,
/// scaled by `multiplier` and clamped to `[min_font_size(mobile), MAX_FONT_SIZE]`.
pub fn fit_font_size(fit: &FontFit, multiplier: f64, mobile: bool) -> f64 {
    let min = min_font_size(mobile);

    let lines = fit.lines.max(1) as f64;
    let longest = fit.longest_line.max(1.0);

    let (along, across) = if fit.vertical {
        (fit.size.height, fit.size.width)
    } else {
        (fit.size.width, fit.size.height)
    };

    let by_length = along / longest;
    let by_lines = across / (lines * LINE_HEIGHT);
    let size = by_length.min(by_lines) * multiplier;

    if !size.is_finite() {
        return min;
    }

    size.clamp(min, MAX_FONT_SIZE)
}
