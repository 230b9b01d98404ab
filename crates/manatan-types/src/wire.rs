//! Messages exchanged with the script injected into the reader page.

use serde::{Deserialize, Serialize};

use crate::types::{
    BlockState, BoundingBox, DictPopupState, ElementId, OcrStatus, Point, Rect, Size,
};

/// One `<img>` as seen by the host at snapshot time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostImage {
    pub id: ElementId,
    pub src: String,
    pub natural_width: f64,
    pub natural_height: f64,
    pub rect: Rect,
    /// `isConnected`
    pub connected: bool,
    /// Has an offset parent, i.e. not hidden by `display: none` up the tree.
    pub displayed: bool,
    /// Configured selectors this element matched when the host queried them.
    #[serde(default)]
    pub matched: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSnapshot {
    pub location: String,
    pub viewport: Viewport,
    pub images: Vec<HostImage>,
    /// A full-screen reader overlay of the host app is covering the page.
    #[serde(default)]
    pub reader_overlay_open: bool,
    /// Reader is in a paginated (single or double page) mode.
    #[serde(default)]
    pub paginated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub meta: bool,
}

/// Result of the host's caret hit test at the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaretHit {
    pub offset: usize,
    /// Glyph box of the character before `offset`, when there is one.
    #[serde(default)]
    pub previous_glyph: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostMessage {
    /// Child insertion or `src` change somewhere under `document.body`.
    Mutation,
    Scroll,
    Resize,
    #[serde(rename_all = "camelCase")]
    Intersection { image: ElementId },
    /// Sent once per animation frame after any of the events above.
    Frame(DomSnapshot),
    #[serde(rename_all = "camelCase")]
    PointerEnter { image: ElementId, block: usize },
    #[serde(rename_all = "camelCase")]
    PointerLeave { image: ElementId, block: usize },
    #[serde(rename_all = "camelCase")]
    Activate {
        image: ElementId,
        block: usize,
        point: Point,
        #[serde(default)]
        modifiers: Modifiers,
        #[serde(default)]
        caret: Option<CaretHit>,
        time_ms: u64,
    },
    #[serde(rename_all = "camelCase")]
    DoubleActivate { image: ElementId, block: usize },
    #[serde(rename_all = "camelCase")]
    Blur {
        image: ElementId,
        block: usize,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ContextMenu { image: ElementId, block: usize },
    #[serde(rename_all = "camelCase")]
    Retry { image: ElementId },
    ClosePopup,
    /// "Add to Anki" pressed inside the popup for the result at `index`.
    #[serde(rename_all = "camelCase")]
    PopupAnki { index: usize },
    #[serde(rename_all = "camelCase")]
    CropConfirmed { img_src: String, crop: BoundingBox },
}

/// Where an overlay is painted. Ownership stays with the image regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderTarget {
    #[default]
    TopLayer,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockView {
    pub index: usize,
    pub text: String,
    pub left_pct: f64,
    pub top_pct: f64,
    pub width_pct: f64,
    pub height_pct: f64,
    pub font_size: f64,
    pub vertical: bool,
    pub opacity: f64,
    pub state: BlockState,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayFrame {
    pub image: ElementId,
    pub img_src: String,
    pub target: RenderTarget,
    pub visible: bool,
    /// `translate(x, y)` of the layer.
    pub transform: Point,
    pub size: Size,
    pub status: OcrStatus,
    pub show_children: bool,
    pub blocks: Vec<BlockView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RenderMessage {
    #[serde(rename_all = "camelCase")]
    Overlays { frames: Vec<OverlayFrame> },
    /// Start intersection/resize observation and scroll/resize listeners for an image.
    #[serde(rename_all = "camelCase")]
    Observe { image: ElementId },
    #[serde(rename_all = "camelCase")]
    Unobserve { image: ElementId },
    Popup(DictPopupState),
    #[serde(rename_all = "camelCase")]
    Notice { message: String },
    #[serde(rename_all = "camelCase")]
    OpenCropper { img_src: String, suggested: BoundingBox },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_messages_are_tagged() {
        let raw = r#"{"type":"activate","image":3,"block":1,"point":{"x":5.0,"y":6.0},"modifiers":{"shift":true},"timeMs":42}"#;
        let msg: HostMessage = serde_json::from_str(raw).unwrap();

        match msg {
            HostMessage::Activate {
                image,
                block,
                modifiers,
                caret,
                time_ms,
                ..
            } => {
                assert_eq!(image, ElementId(3));
                assert_eq!(block, 1);
                assert!(modifiers.shift);
                assert!(!modifiers.alt);
                assert!(caret.is_none());
                assert_eq!(time_ms, 42);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn render_message_round_trips_through_json() {
        let msg = RenderMessage::Notice {
            message: "Anki integration is disabled".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.starts_with(r#"{"type":"notice""#));
    }
}
