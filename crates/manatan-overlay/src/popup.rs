use manatan_types::{
    DictPopupState, ElementId, HighlightRange, HostImage, LookupOutcome, Point, PopupContext, Size, SpreadContext,
    Viewport,
};

/// Space the host reserves for the popup.
pub const POPUP_SIZE: Size = Size {
    width: 360.0,
    height: 420.0,
};
const POPUP_MARGIN: f64 = 8.0;
const POINTER_GAP: f64 = 12.0;

/// Top-left corner for a popup opened at `pointer`, kept inside the viewport.
///
/// Opens below-right of the pointer, flips left when there is no room.
pub fn clamp_popup(pointer: Point, popup: Size, viewport: Viewport) -> Point {
    let mut x = pointer.x + POINTER_GAP;
    let mut y = pointer.y + POINTER_GAP;

    if x + popup.width + POPUP_MARGIN > viewport.width {
        x = pointer.x - popup.width - POINTER_GAP;
    }
    if y + popup.height + POPUP_MARGIN > viewport.height {
        y = viewport.height - popup.height - POPUP_MARGIN;
    }

    let max_x = (viewport.width - popup.width - POPUP_MARGIN).max(POPUP_MARGIN);
    let max_y = (viewport.height - popup.height - POPUP_MARGIN).max(POPUP_MARGIN);

    Point::new(x.clamp(POPUP_MARGIN, max_x), y.clamp(POPUP_MARGIN, max_y))
}

/// Pages shown side by side with `img_src` in a double-page layout.
pub fn spread_for(images: &[HostImage], img_src: &str) -> Option<SpreadContext> {
    let page = images.iter().find(|img| img.src == img_src)?;

    let partner = images.iter().find(|other| {
        if other.id == page.id || other.src == page.src {
            return false;
        }

        let overlap = page.rect.bottom().min(other.rect.bottom()) - page.rect.top.max(other.rect.top);
        let gap = if other.rect.left >= page.rect.left {
            other.rect.left - page.rect.right()
        } else {
            page.rect.left - other.rect.right()
        };

        overlap > page.rect.height.min(other.rect.height) * 0.5 && gap.abs() <= 4.0
    })?;

    let (left, right) = if partner.rect.left < page.rect.left {
        (partner, page)
    } else {
        (page, partner)
    };

    Some(SpreadContext {
        left: Some(left.src.clone()),
        right: Some(right.src.clone()),
    })
}

/// Block a lookup was started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTarget {
    pub image: ElementId,
    pub img_src: String,
    pub block: usize,
}

/// Lookup request bookkeeping. Only the newest request may fill the popup.
#[derive(Debug, Default)]
pub struct PopupController {
    next_request: u64,
    pending: Option<u64>,
    target: Option<LookupTarget>,
}

impl PopupController {
    pub fn target(&self) -> Option<&LookupTarget> {
        self.target.as_ref()
    }

    /// Loading popup for a new lookup. Any older request becomes stale.
    pub fn open(
        &mut self,
        target: LookupTarget,
        position: Point,
        highlight: HighlightRange,
        context: PopupContext,
    ) -> (u64, DictPopupState) {
        self.next_request += 1;
        let request = self.next_request;
        self.pending = Some(request);
        self.target = Some(target);

        let state = DictPopupState {
            visible: true,
            position,
            is_loading: true,
            highlight: Some(highlight),
            context: Some(context),
            ..DictPopupState::default()
        };

        (request, state)
    }

    fn take(&mut self, request: u64) -> bool {
        if self.pending != Some(request) {
            tracing::debug!("Dropping stale lookup {request}");
            return false;
        }
        self.pending = None;
        true
    }

    /// Popup after the lookup answered. `None` when the request is stale.
    pub fn resolve(&mut self, request: u64, outcome: LookupOutcome, current: &DictPopupState) -> Option<DictPopupState> {
        if !self.take(request) {
            return None;
        }

        let mut state = current.clone();
        state.is_loading = false;
        state.error = None;

        match outcome {
            LookupOutcome::Results(results) => {
                if let (Some(highlight), Some(first)) = (state.highlight.as_mut(), results.first()) {
                    highlight.length = first.match_len;
                }
                state.is_cold_start = false;
                state.results = results;
            }
            LookupOutcome::Loading => {
                state.is_cold_start = true;
                state.results.clear();
            }
        }

        Some(state)
    }

    pub fn fail(&mut self, request: u64, message: String, current: &DictPopupState) -> Option<DictPopupState> {
        if !self.take(request) {
            return None;
        }

        let mut state = current.clone();
        state.is_loading = false;
        state.results.clear();
        state.error = Some(message);
        Some(state)
    }

    /// Hide the popup. Returns the block the lookup came from.
    pub fn close(&mut self) -> Option<LookupTarget> {
        self.pending = None;
        self.target.take()
    }
}

#[cfg(test)]
mod tests {
    use manatan_types::{DictionaryResult, Rect};

    use super::*;

    const VIEWPORT: Viewport = Viewport {
        width: 1280.0,
        height: 720.0,
    };

    fn target() -> LookupTarget {
        LookupTarget {
            image: ElementId(1),
            img_src: "http://x/1.png".to_string(),
            block: 0,
        }
    }

    fn highlight() -> HighlightRange {
        HighlightRange {
            img_src: "http://x/1.png".to_string(),
            index: 0,
            start_char: 2,
            length: 1,
        }
    }

    #[test]
    fn popup_stays_inside_viewport() {
        assert_eq!(clamp_popup(Point::new(100.0, 100.0), POPUP_SIZE, VIEWPORT), Point::new(112.0, 112.0));

        let corner = clamp_popup(Point::new(1270.0, 710.0), POPUP_SIZE, VIEWPORT);
        assert_eq!(corner, Point::new(1270.0 - 360.0 - 12.0, 720.0 - 420.0 - 8.0));

        let tiny = Viewport {
            width: 200.0,
            height: 200.0,
        };
        assert_eq!(clamp_popup(Point::new(150.0, 150.0), POPUP_SIZE, tiny), Point::new(8.0, 8.0));
    }

    #[test]
    fn stale_results_are_dropped() {
        let mut popup = PopupController::default();
        let (first, _) = popup.open(target(), Point::default(), highlight(), PopupContext::default());
        let (second, loading) = popup.open(target(), Point::default(), highlight(), PopupContext::default());

        assert!(loading.is_loading);
        assert!(popup.resolve(first, LookupOutcome::Results(vec![]), &loading).is_none());

        let result = DictionaryResult {
            term: "食べる".to_string(),
            match_len: 2,
            ..DictionaryResult::default()
        };
        let state = popup
            .resolve(second, LookupOutcome::Results(vec![result]), &loading)
            .unwrap();

        assert!(!state.is_loading);
        assert_eq!(state.results.len(), 1);
        assert_eq!(state.highlight.unwrap().length, 2);
    }

    #[test]
    fn cold_start_and_failure() {
        let mut popup = PopupController::default();
        let (request, loading) = popup.open(target(), Point::default(), highlight(), PopupContext::default());
        let state = popup.resolve(request, LookupOutcome::Loading, &loading).unwrap();
        assert!(state.is_cold_start);
        assert!(!state.is_loading);

        let (request, loading) = popup.open(target(), Point::default(), highlight(), PopupContext::default());
        let state = popup.fail(request, "HTTP 500".to_string(), &loading).unwrap();
        assert_eq!(state.error.as_deref(), Some("HTTP 500"));

        assert_eq!(popup.close(), Some(target()));
        assert_eq!(popup.close(), None);
    }

    #[test]
    fn side_by_side_pages_form_a_spread() {
        let page = |id, src: &str, left| HostImage {
            id: ElementId(id),
            src: src.to_string(),
            rect: Rect::new(left, 0.0, 400.0, 600.0),
            connected: true,
            displayed: true,
            ..HostImage::default()
        };
        let images = vec![page(1, "p2", 400.0), page(2, "p1", 0.0), page(3, "p9", 2000.0)];

        assert_eq!(
            spread_for(&images, "p2"),
            Some(SpreadContext {
                left: Some("p1".to_string()),
                right: Some("p2".to_string()),
            })
        );
        assert_eq!(spread_for(&images, "p9"), None);
    }
}
