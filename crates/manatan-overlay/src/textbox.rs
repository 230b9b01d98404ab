//! Interaction state and layout of one OCR block.

use manatan_config::Settings;
use manatan_config::interaction::{InteractionConfig, ModifierKey};
use manatan_core::geometry::{FontFit, fit_font_size, is_vertical, percent_to_local, to_percent_box};
use manatan_core::preprocess::{DefaultPreprocessor, Preprocessor};
use manatan_types::{BlockState, BlockView, CaretHit, Modifiers, OcrBlock, Point, Size};

/// After a mobile tap arms a block, taps within this window are the
/// synthetic follow-up of the same touch.
pub const MOBILE_ARM_WINDOW_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEvent {
    PointerEnter,
    PointerLeave,
    /// First tap on mobile
    Armed,
    AnchorSet,
    /// Anchor merged, deselected or discarded
    AnchorReleased,
    LookupStarted,
    PopupClosed,
    DoubleActivate,
    Blur,
}

/// Next state, or the same state when `event` does not apply.
pub fn transition(state: BlockState, event: BlockEvent) -> BlockState {
    use BlockEvent as E;
    use BlockState as S;

    match (state, event) {
        (S::Idle, E::PointerEnter) => S::HoverActive,
        (S::HoverActive, E::PointerLeave) => S::Idle,
        (S::Idle | S::HoverActive, E::Armed) => S::HoverActive,
        (S::Editing, E::AnchorSet | E::DoubleActivate) => S::Editing,
        (_, E::AnchorSet) => S::MergeAnchor,
        (S::MergeAnchor, E::AnchorReleased) => S::Idle,
        (S::Idle | S::HoverActive, E::LookupStarted) => S::LookupActive,
        (S::LookupActive, E::PopupClosed) => S::Idle,
        (_, E::DoubleActivate) => S::Editing,
        (S::Editing, E::Blur) => S::Idle,
        (state, _) => state,
    }
}

/// What a primary activation on a block means, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Delete,
    MergeTap,
    /// Mobile first tap: reveal only
    Arm,
    Ignored,
    Lookup { offset: usize },
}

pub fn modifier_held(key: ModifierKey, modifiers: &Modifiers) -> bool {
    match key {
        ModifierKey::None => false,
        ModifierKey::Alt => modifiers.alt,
        ModifierKey::Ctrl => modifiers.ctrl,
        ModifierKey::Shift => modifiers.shift,
        ModifierKey::Meta => modifiers.meta,
    }
}

/// Character offset under the pointer.
///
/// Caret hit testing reports the following character at glyph edges, so a
/// point inside the previous glyph's box wins.
pub fn resolve_offset(caret: Option<CaretHit>, point: Point) -> usize {
    let Some(caret) = caret else {
        return 0;
    };

    match caret.previous_glyph {
        Some(glyph) if caret.offset > 0 && glyph.contains(point) => caret.offset - 1,
        _ => caret.offset,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockController {
    state: BlockState,
    armed_at: Option<u64>,
}

impl BlockController {
    pub fn state(&self) -> BlockState {
        self.state
    }

    pub fn armed(&self) -> bool {
        self.armed_at.is_some()
    }

    /// Returns whether the state changed.
    pub fn apply(&mut self, event: BlockEvent) -> bool {
        let next = transition(self.state, event);
        if next == BlockState::Idle {
            self.armed_at = None;
        }

        let changed = next != self.state;
        if changed {
            tracing::trace!("Block {:?} -> {:?} on {:?}", self.state, next, event);
        }
        self.state = next;
        changed
    }

    /// Drop a mobile arm, hiding the block again unless it moved on to
    /// another state. Returns whether anything changed.
    pub fn disarm(&mut self) -> bool {
        if self.armed_at.take().is_none() {
            return false;
        }
        if self.state == BlockState::HoverActive {
            self.state = BlockState::Idle;
        }
        true
    }

    /// Decide what a primary activation does.
    pub fn classify(
        &mut self,
        config: &InteractionConfig,
        modifiers: &Modifiers,
        caret: Option<CaretHit>,
        point: Point,
        time_ms: u64,
    ) -> Activation {
        if modifier_held(config.delete_modifier, modifiers) {
            return Activation::Delete;
        }
        if modifier_held(config.merge_modifier, modifiers) {
            return Activation::MergeTap;
        }
        if self.state == BlockState::Editing {
            return Activation::Ignored;
        }

        if config.mobile_mode {
            match self.armed_at {
                None => {
                    self.armed_at = Some(time_ms);
                    self.apply(BlockEvent::Armed);
                    return Activation::Arm;
                }
                Some(at) if time_ms.saturating_sub(at) < MOBILE_ARM_WINDOW_MS => {
                    return Activation::Ignored;
                }
                Some(_) => {}
            }
        }

        Activation::Lookup {
            offset: resolve_offset(caret, point),
        }
    }
}

pub fn block_opacity(solo_hover: bool, show_children: bool, controller: &BlockController) -> f64 {
    if !solo_hover || show_children || controller.armed() || controller.state() != BlockState::Idle {
        1.0
    } else {
        0.0
    }
}

/// Display text to commit after editing, or `None` when nothing changed.
pub fn edited_text(stored: &str, edited: &str) -> Option<String> {
    let current = DefaultPreprocessor.display(stored);
    let edited = edited.replace("\r\n", "\n");

    (edited.trim_end_matches('\n') != current).then_some(edited)
}

/// Layout and paint state of `block` inside an overlay of `rendered` size.
pub fn block_view(
    index: usize,
    block: &OcrBlock,
    controller: &BlockController,
    rendered: Size,
    settings: &Settings,
    show_children: bool,
) -> BlockView {
    let overlay = &settings.overlay;
    let mobile = settings.interaction.mobile_mode;

    let pct = to_percent_box(&block.tight_bounding_box, overlay.bounding_box_adjustment);
    let local = percent_to_local(&pct, rendered);
    let vertical = is_vertical(block.forced_orientation, overlay.text_orientation, local.size());

    let text = DefaultPreprocessor.display(&block.text);
    let multiplier = if vertical {
        overlay.font_multiplier_vertical
    } else {
        overlay.font_multiplier_horizontal
    };
    let font_size = fit_font_size(&FontFit::for_text(&text, local.size(), vertical), multiplier, mobile);

    BlockView {
        index,
        text,
        left_pct: pct.left,
        top_pct: pct.top,
        width_pct: pct.width,
        height_pct: pct.height,
        font_size,
        vertical,
        opacity: block_opacity(overlay.solo_hover, show_children, controller),
        state: controller.state(),
    }
}
