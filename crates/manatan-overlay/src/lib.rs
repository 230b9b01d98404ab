mod engine;
pub mod observer;
pub mod overlay;
pub mod popup;
pub mod textbox;

pub use engine::OverlayEngine;

use manatan_types::{BoundingBox, DictionaryResult, RenderMessage};

/// Work the engine hands back to its owner. The engine itself never awaits.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Render(RenderMessage),
    /// OCR for a newly mounted or re-pointed image
    Fetch {
        url: String,
    },
    /// User asked to retry a failed image
    Retry {
        url: String,
    },
    Lookup {
        request: u64,
        text: String,
        language: String,
    },
    /// Update the last Anki card with this sentence (context menu)
    SubmitCard {
        img_src: String,
        sentence: String,
        suggested_crop: BoundingBox,
    },
    /// Create a card from a popup entry
    AddCard {
        img_src: String,
        sentence: String,
        result: DictionaryResult,
    },
}
