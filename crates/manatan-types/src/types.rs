use serde::{Deserialize, Serialize};

use crate::wire::HostMessage;

/// Zero-width space embedded in block text where two blocks were merged.
pub const MERGE_MARKER: char = '\u{200B}';

#[derive(Debug, Clone)]
pub enum AppEvent {
    Host(HostMessage),
    OcrFinished {
        url: String,
    },
    LookupFinished {
        request: u64,
        outcome: LookupOutcome,
    },
    LookupFailed {
        request: u64,
        message: String,
    },
    AnkiFinished {
        message: String,
    },
    AnkiFailed {
        message: String,
    },
    BridgeConnected,
    BridgeDisconnected,
}

/// Normalized rectangle, every field in [0, 1] relative to the image's natural size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Vertical,
    Horizontal,
    #[default]
    Auto,
}

/// One detected text region on one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrBlock {
    pub text: String,
    pub tight_bounding_box: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_orientation: Option<Orientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_merged: Option<bool>,
}

impl OcrBlock {
    pub fn new(text: impl Into<String>, tight_bounding_box: BoundingBox) -> Self {
        Self {
            text: text.into(),
            tight_bounding_box,
            forced_orientation: None,
            is_merged: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// First operand of a pending merge. At most one exists per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeAnchor {
    pub img_src: String,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Screen-space rectangle in CSS pixels, as reported by `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRange {
    pub img_src: String,
    pub index: usize,
    pub start_char: usize,
    pub length: usize,
}

/// Left and right pages of a double-page spread, by image source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpreadContext {
    pub left: Option<String>,
    pub right: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupContext {
    pub img_src: String,
    pub sentence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread: Option<SpreadContext>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictPopupState {
    pub visible: bool,
    pub position: Point,
    pub is_loading: bool,
    /// The dictionary backend is still warming up.
    pub is_cold_start: bool,
    pub results: Vec<DictionaryResult>,
    pub highlight: Option<HighlightRange>,
    pub context: Option<PopupContext>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frequency {
    pub dictionary: String,
    pub display: String,
    pub value: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryResult {
    pub term: String,
    pub reading: String,
    pub definitions: Vec<String>,
    #[serde(default)]
    pub frequencies: Vec<Frequency>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Number of source characters the entry covers, starting at the lookup offset.
    #[serde(default)]
    pub match_len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Results(Vec<DictionaryResult>),
    /// Backend is cold-starting; the caller should show a notice and let the user retry.
    Loading,
}

/// Interaction state of one text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockState {
    #[default]
    Idle,
    HoverActive,
    Editing,
    MergeAnchor,
    LookupActive,
}

/// Host-assigned identity of a DOM element. Stable while the node lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);
