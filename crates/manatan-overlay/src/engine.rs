use std::collections::{HashMap, HashSet};

use manatan_config::Settings;
use manatan_core::language;
use manatan_core::preprocess::{DefaultPreprocessor, Preprocessor};
use manatan_core::store::{MergeTap, StoreHandle};
use manatan_types::{
    DictPopupState, DomSnapshot, ElementId, HighlightRange, HostImage, HostMessage, LookupOutcome, OverlayFrame,
    Point, PopupContext, RenderMessage, RenderTarget,
};

use crate::Effect;
use crate::observer::{CompiledProfile, ImageObserver, host_of};
use crate::overlay::{ImageOverlay, is_suppressed, should_show_children};
use crate::popup::{LookupTarget, POPUP_SIZE, PopupController, clamp_popup, spread_for};
use crate::textbox::{Activation, BlockController, BlockEvent, block_view, edited_text};

/// Owns every overlay, block controller and the popup for one page.
///
/// Runs on a single task. Host messages go in through [`OverlayEngine::handle`],
/// network work and render output come out as [`Effect`]s.
pub struct OverlayEngine {
    settings: Settings,
    store: StoreHandle,
    effects: kanal::Sender<Effect>,
    observer: ImageObserver,
    targets: kanal::Receiver<Vec<HostImage>>,
    overlays: HashMap<ElementId, ImageOverlay>,
    order: Vec<ElementId>,
    blocks: HashMap<(ElementId, usize), BlockController>,
    /// The one block a mobile first tap revealed
    armed: Option<(ElementId, usize)>,
    popup: PopupController,
    dom: DomSnapshot,
    dirty: bool,
    rendered_revision: Option<u64>,
}

impl OverlayEngine {
    pub fn new(settings: Settings, store: StoreHandle, effects: kanal::Sender<Effect>) -> Self {
        let profile = CompiledProfile::for_location(&settings.sites, "");
        let mut observer = ImageObserver::new(profile);

        let (targets_tx, targets) = kanal::unbounded();
        observer.subscribe(
            |_| true,
            move |images| {
                let _ = targets_tx.send(images.to_vec());
            },
        );

        Self {
            settings,
            store,
            effects,
            observer,
            targets,
            overlays: HashMap::new(),
            order: Vec::new(),
            blocks: HashMap::new(),
            armed: None,
            popup: PopupController::default(),
            dom: DomSnapshot::default(),
            dirty: true,
            rendered_revision: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        if settings.sites != self.settings.sites {
            self.observer
                .set_profile(CompiledProfile::for_location(&settings.sites, &self.dom.location));
        }
        self.settings = settings;
        self.observer.mark_dirty();
        self.dirty = true;
    }

    pub fn mounted(&self) -> &[ElementId] {
        &self.order
    }

    fn emit(&self, effect: Effect) {
        if self.effects.send(effect).is_err() {
            tracing::warn!("Effect channel closed");
        }
    }

    fn controller(&self, image: ElementId, block: usize) -> BlockController {
        self.blocks.get(&(image, block)).copied().unwrap_or_default()
    }

    fn controller_mut(&mut self, image: ElementId, block: usize) -> &mut BlockController {
        self.blocks.entry((image, block)).or_default()
    }

    /// Indices on this image shifted; per-block state no longer lines up.
    ///
    /// A popup opened from this image would highlight the wrong block, so it
    /// closes too.
    fn reset_blocks(&mut self, image: ElementId) {
        if self.popup.target().is_some_and(|t| t.image == image) {
            self.popup.close();
            self.set_popup(DictPopupState::default());
        }
        if self.armed.is_some_and(|(id, _)| id == image) {
            self.armed = None;
        }
        self.blocks.retain(|(id, _), _| *id != image);
    }

    /// Keep at most one block armed.
    fn arm(&mut self, image: ElementId, block: usize) {
        let previous = self.armed.replace((image, block)).filter(|p| *p != (image, block));
        if let Some(controller) = previous.and_then(|p| self.blocks.get_mut(&p)) {
            controller.disarm();
        }
    }

    fn src_of(&self, image: ElementId) -> Option<String> {
        self.overlays.get(&image).map(|o| o.src().to_string())
    }

    fn image_for_src(&self, src: &str) -> Option<ElementId> {
        self.overlays
            .iter()
            .find(|(_, overlay)| overlay.src() == src)
            .map(|(id, _)| *id)
    }

    fn set_popup(&mut self, state: DictPopupState) {
        self.store.write().set_popup(state.clone());
        self.emit(Effect::Render(RenderMessage::Popup(state)));
    }

    pub fn handle(&mut self, message: HostMessage) {
        match message {
            HostMessage::Mutation => self.observer.mark_dirty(),
            HostMessage::Scroll | HostMessage::Resize => {
                for overlay in self.overlays.values_mut() {
                    overlay.request_sync();
                }
            }
            HostMessage::Intersection { image } => {
                if let Some(overlay) = self.overlays.get_mut(&image) {
                    overlay.request_sync();
                }
            }
            HostMessage::Frame(dom) => self.on_frame(dom),
            HostMessage::PointerEnter { image, block } => {
                self.dirty |= self.controller_mut(image, block).apply(BlockEvent::PointerEnter);
            }
            HostMessage::PointerLeave { image, block } => {
                self.dirty |= self.controller_mut(image, block).apply(BlockEvent::PointerLeave);
            }
            HostMessage::Activate {
                image,
                block,
                point,
                modifiers,
                caret,
                time_ms,
            } => {
                let interaction = self.settings.interaction.clone();
                let activation = self
                    .controller_mut(image, block)
                    .classify(&interaction, &modifiers, caret, point, time_ms);
                self.activate(image, block, activation, point);
            }
            HostMessage::DoubleActivate { image, block } => {
                self.dirty |= self.controller_mut(image, block).apply(BlockEvent::DoubleActivate);
            }
            HostMessage::Blur { image, block, text } => self.commit_edit(image, block, &text),
            HostMessage::ContextMenu { image, block } => self.submit_card(image, block),
            HostMessage::Retry { image } => {
                if let Some(url) = self.src_of(image) {
                    self.emit(Effect::Retry { url });
                }
            }
            HostMessage::ClosePopup => self.close_popup(),
            HostMessage::PopupAnki { index } => self.add_card_from_popup(index),
            // The crop dialog answers the controller, not the overlay
            HostMessage::CropConfirmed { .. } => {}
        }

        self.flush();
    }

    fn on_frame(&mut self, dom: DomSnapshot) {
        if host_of(&dom.location) != host_of(&self.dom.location) {
            self.observer
                .set_profile(CompiledProfile::for_location(&self.settings.sites, &dom.location));
        }
        if dom.location != self.dom.location || dom.paginated != self.dom.paginated {
            self.dirty = true;
        }
        self.dom = dom;

        self.observer.on_animation_frame(&self.dom);
        while let Ok(Some(targets)) = self.targets.try_recv() {
            self.reconcile(targets);
        }

        let viewport = self.dom.viewport;
        let margin = self.settings.overlay.prefetch_margin;
        for overlay in self.overlays.values_mut() {
            let image = self.dom.images.iter().find(|img| img.id == overlay.image());
            self.dirty |= overlay.on_animation_frame(image, viewport, margin);
        }
    }

    /// Mount overlays for new targets, drop the ones that left the page.
    fn reconcile(&mut self, targets: Vec<HostImage>) {
        let keep: HashSet<ElementId> = targets.iter().map(|img| img.id).collect();

        let gone: Vec<ElementId> = self
            .overlays
            .keys()
            .filter(|id| !keep.contains(id))
            .copied()
            .collect();
        for id in gone {
            if let Some(overlay) = self.overlays.remove(&id) {
                tracing::debug!("Unmounting overlay for {id:?}");
                let anchored = self
                    .store
                    .read()
                    .merge_anchor()
                    .is_some_and(|a| a.img_src == overlay.src());
                if anchored {
                    self.store.write().clear_merge_anchor();
                }
            }
            self.reset_blocks(id);
        }

        for image in &targets {
            match self.overlays.get_mut(&image.id) {
                Some(overlay) => {
                    if overlay.set_src(&image.src, &self.effects) {
                        self.reset_blocks(image.id);
                    }
                }
                None => {
                    let overlay = ImageOverlay::mount(image, &self.effects);
                    self.overlays.insert(image.id, overlay);
                }
            }
        }

        self.order = targets.iter().map(|img| img.id).collect();
        self.dirty = true;
    }

    fn activate(&mut self, image: ElementId, block: usize, activation: Activation, point: Point) {
        let Some(src) = self.src_of(image) else {
            return;
        };

        match activation {
            Activation::Delete => match self.store.write().delete_block(&src, block) {
                Ok(()) => tracing::info!("Deleted block {block} of {src}"),
                Err(e) => tracing::warn!("Delete failed: {e}"),
            },
            Activation::MergeTap => self.merge_tap(image, &src, block),
            Activation::Arm => self.arm(image, block),
            Activation::Ignored => {}
            Activation::Lookup { offset } => self.start_lookup(image, &src, block, offset, point),
        }

        if activation == Activation::Delete {
            self.reset_blocks(image);
        }
        self.dirty = true;
    }

    fn merge_tap(&mut self, image: ElementId, src: &str, block: usize) {
        let previous = self.store.read().merge_anchor().cloned();
        let separator = language::merge_separator(&self.settings.server.language);
        let outcome = self.store.write().merge_tap(src, block, &separator);

        match outcome {
            Ok(MergeTap::AnchorSet) => {
                self.controller_mut(image, block).apply(BlockEvent::AnchorSet);
            }
            Ok(MergeTap::Merged { index }) => {
                tracing::info!("Merged blocks of {src} into {index}");
                self.reset_blocks(image);
            }
            Ok(MergeTap::AnchorCleared) => {
                let released = previous.and_then(|a| Some((self.image_for_src(&a.img_src)?, a.index)));
                if let Some((id, index)) = released {
                    self.controller_mut(id, index).apply(BlockEvent::AnchorReleased);
                }
            }
            Err(e) => tracing::warn!("Merge failed: {e}"),
        }
    }

    fn start_lookup(&mut self, image: ElementId, src: &str, block: usize, offset: usize, point: Point) {
        let (text, sentence) = {
            let store = self.store.read();
            let Some(raw) = store.blocks(src).and_then(|b| b.get(block)).map(|b| b.text.clone()) else {
                return;
            };
            let display = DefaultPreprocessor.display(&raw);
            (
                DefaultPreprocessor.lookup_text(&display, offset),
                DefaultPreprocessor.sentence(&raw),
            )
        };

        if text.is_empty() {
            return;
        }

        if let Some(previous) = self.popup.close() {
            self.controller_mut(previous.image, previous.block)
                .apply(BlockEvent::PopupClosed);
        }

        let spread = if self.dom.paginated {
            spread_for(&self.dom.images, src)
        } else {
            None
        };

        let (request, state) = self.popup.open(
            LookupTarget {
                image,
                img_src: src.to_string(),
                block,
            },
            clamp_popup(point, POPUP_SIZE, self.dom.viewport),
            HighlightRange {
                img_src: src.to_string(),
                index: block,
                start_char: offset,
                length: 1,
            },
            PopupContext {
                img_src: src.to_string(),
                sentence,
                spread,
            },
        );

        self.controller_mut(image, block).apply(BlockEvent::LookupStarted);
        self.set_popup(state);

        tracing::debug!("Lookup {request} at {offset} in block {block} of {src}");
        self.emit(Effect::Lookup {
            request,
            text,
            language: self.settings.server.language.clone(),
        });
    }

    fn close_popup(&mut self) {
        if let Some(target) = self.popup.close() {
            self.controller_mut(target.image, target.block)
                .apply(BlockEvent::PopupClosed);
        }
        self.set_popup(DictPopupState::default());
        self.dirty = true;
    }

    fn commit_edit(&mut self, image: ElementId, block: usize, text: &str) {
        if self.controller(image, block).state() != manatan_types::BlockState::Editing {
            return;
        }

        if let Some(src) = self.src_of(image) {
            let stored = self
                .store
                .read()
                .blocks(&src)
                .and_then(|b| b.get(block))
                .map(|b| b.text.clone());

            if let Some(edited) = stored.and_then(|stored| edited_text(&stored, text)) {
                match self.store.write().edit_block(&src, block, &edited) {
                    Ok(()) => tracing::info!("Edited block {block} of {src}"),
                    Err(e) => tracing::warn!("Edit failed: {e}"),
                }
            }
        }

        self.controller_mut(image, block).apply(BlockEvent::Blur);
        self.dirty = true;
    }

    fn submit_card(&mut self, image: ElementId, block: usize) {
        let Some(src) = self.src_of(image) else {
            return;
        };

        let found = self
            .store
            .read()
            .blocks(&src)
            .and_then(|b| b.get(block))
            .map(|b| (DefaultPreprocessor.sentence(&b.text), b.tight_bounding_box));

        if let Some((sentence, suggested_crop)) = found {
            self.emit(Effect::SubmitCard {
                img_src: src,
                sentence,
                suggested_crop,
            });
        }
    }

    fn add_card_from_popup(&mut self, index: usize) {
        let store = self.store.read();
        let popup = store.popup();

        let (Some(result), Some(context)) = (popup.results.get(index), popup.context.as_ref()) else {
            tracing::warn!("No popup entry {index} to add");
            return;
        };

        let effect = Effect::AddCard {
            img_src: context.img_src.clone(),
            sentence: context.sentence.clone(),
            result: result.clone(),
        };
        drop(store);
        self.emit(effect);
    }

    pub fn on_lookup_finished(&mut self, request: u64, outcome: LookupOutcome) {
        let current = self.store.read().popup().clone();
        if let Some(state) = self.popup.resolve(request, outcome, &current) {
            self.set_popup(state);
        }
    }

    pub fn on_lookup_failed(&mut self, request: u64, message: String) {
        let current = self.store.read().popup().clone();
        if let Some(state) = self.popup.fail(request, message, &current) {
            self.set_popup(state);
        }
    }

    /// Render frames for every mounted, unsuppressed overlay.
    pub fn frames(&self) -> Vec<OverlayFrame> {
        let store = self.store.read();
        let profile = self.observer.profile();

        self.order
            .iter()
            .filter_map(|id| {
                let overlay = self.overlays.get(id)?;
                let image = self.dom.images.iter().find(|img| img.id == *id)?;
                if is_suppressed(&self.settings, image, &self.dom, profile) {
                    return None;
                }

                let status = store.status(overlay.src());
                let show_children = should_show_children(&self.settings, status);
                let blocks = store
                    .blocks(overlay.src())
                    .unwrap_or_default()
                    .iter()
                    .enumerate()
                    .map(|(index, block)| {
                        block_view(
                            index,
                            block,
                            &self.controller(*id, index),
                            overlay.size(),
                            &self.settings,
                            show_children,
                        )
                    })
                    .collect();

                Some(OverlayFrame {
                    image: *id,
                    img_src: overlay.src().to_string(),
                    target: RenderTarget::TopLayer,
                    visible: overlay.visible(),
                    transform: overlay.transform(),
                    size: overlay.size(),
                    status,
                    show_children,
                    blocks,
                })
            })
            .collect()
    }

    /// Send new frames when local state or the store changed.
    pub fn flush(&mut self) {
        let revision = self.store.read().revision();
        if !self.dirty && self.rendered_revision == Some(revision) {
            return;
        }

        self.dirty = false;
        self.rendered_revision = Some(revision);

        let frames = self.frames();
        self.emit(Effect::Render(RenderMessage::Overlays { frames }));
    }
}

#[cfg(test)]
mod tests {
    use manatan_types::{
        BlockState, BoundingBox, CaretHit, DictionaryResult, Modifiers, OcrBlock, OcrStatus, Rect, Viewport,
    };

    use super::*;

    const PAGE_1: &str = "http://localhost:4567/api/v1/manga/1/chapter/3/page/1";
    const PAGE_2: &str = "http://localhost:4567/api/v1/manga/1/chapter/3/page/2";

    fn image(id: u64, src: &str, top: f64) -> HostImage {
        HostImage {
            id: ElementId(id),
            src: src.to_string(),
            natural_width: 1000.0,
            natural_height: 1500.0,
            rect: Rect::new(100.0, top, 500.0, 750.0),
            connected: true,
            displayed: true,
            matched: vec![".reader-page img".to_string()],
        }
    }

    fn dom(images: Vec<HostImage>) -> DomSnapshot {
        DomSnapshot {
            location: "http://localhost:4567/manga/1/chapter/3/page/1".to_string(),
            viewport: Viewport {
                width: 1280.0,
                height: 800.0,
            },
            images,
            ..DomSnapshot::default()
        }
    }

    fn engine(settings: Settings) -> (OverlayEngine, kanal::Receiver<Effect>) {
        let (tx, rx) = kanal::unbounded();
        (OverlayEngine::new(settings, StoreHandle::default(), tx), rx)
    }

    fn drain(rx: &kanal::Receiver<Effect>) -> Vec<Effect> {
        let mut out = Vec::new();
        while let Ok(Some(effect)) = rx.try_recv() {
            out.push(effect);
        }
        out
    }

    fn last_frames(effects: &[Effect]) -> Option<Vec<OverlayFrame>> {
        effects.iter().rev().find_map(|e| match e {
            Effect::Render(RenderMessage::Overlays { frames }) => Some(frames.clone()),
            _ => None,
        })
    }

    fn hello_world() -> Vec<OcrBlock> {
        vec![
            OcrBlock::new("Hello", BoundingBox::new(0.0, 0.0, 0.5, 0.2)),
            OcrBlock::new("World", BoundingBox::new(0.5, 0.0, 0.5, 0.2)),
        ]
    }

    fn activate(image: u64, block: usize, modifiers: Modifiers) -> HostMessage {
        HostMessage::Activate {
            image: ElementId(image),
            block,
            point: Point::new(150.0, 120.0),
            modifiers,
            caret: Some(CaretHit {
                offset: 1,
                previous_glyph: None,
            }),
            time_ms: 0,
        }
    }

    /// Engine with page 1 mounted and its OCR data cached.
    fn mounted(settings: Settings) -> (OverlayEngine, kanal::Receiver<Effect>) {
        let (mut engine, rx) = engine(settings);
        engine.handle(HostMessage::Frame(dom(vec![image(1, PAGE_1, 0.0)])));
        engine.store.write().complete_fetch(PAGE_1, hello_world());
        engine.flush();
        drain(&rx);
        (engine, rx)
    }

    #[test]
    fn new_image_is_observed_fetched_and_rendered() {
        let (mut engine, rx) = engine(Settings::default());
        engine.handle(HostMessage::Frame(dom(vec![image(1, PAGE_1, 0.0)])));

        let effects = drain(&rx);
        assert!(effects.contains(&Effect::Render(RenderMessage::Observe { image: ElementId(1) })));
        assert!(effects.contains(&Effect::Fetch { url: PAGE_1.to_string() }));

        let frames = last_frames(&effects).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].visible);
        assert_eq!(frames[0].target, RenderTarget::TopLayer);
        assert_eq!(frames[0].transform, Point::new(100.0, 0.0));
        assert_eq!(frames[0].status, OcrStatus::Idle);

        engine.store.write().complete_fetch(PAGE_1, hello_world());
        engine.flush();
        let frames = last_frames(&drain(&rx)).unwrap();
        assert_eq!(frames[0].status, OcrStatus::Success);
        assert_eq!(frames[0].blocks.len(), 2);
    }

    #[test]
    fn departed_image_is_unobserved() {
        let (mut engine, rx) = mounted(Settings::default());

        engine.handle(HostMessage::Mutation);
        engine.handle(HostMessage::Frame(dom(vec![image(2, PAGE_2, 0.0)])));

        let effects = drain(&rx);
        assert!(effects.contains(&Effect::Render(RenderMessage::Unobserve { image: ElementId(1) })));
        assert!(effects.contains(&Effect::Fetch { url: PAGE_2.to_string() }));
        assert_eq!(engine.mounted(), &[ElementId(2)]);
    }

    #[test]
    fn disabled_overlay_renders_nothing() {
        let (mut engine, rx) = mounted(Settings::default());
        engine.handle(HostMessage::PointerEnter {
            image: ElementId(1),
            block: 0,
        });
        engine.handle(activate(1, 1, Modifiers::default()));

        let mut settings = Settings::default();
        settings.overlay.enable_overlay = false;
        engine.set_settings(settings);
        engine.flush();

        assert_eq!(last_frames(&drain(&rx)), Some(vec![]));
    }

    #[test]
    fn merge_taps_join_blocks() {
        let mut settings = Settings::default();
        settings.server.language = "en".to_string();
        let (mut engine, rx) = mounted(settings);
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };

        engine.handle(activate(1, 0, ctrl));
        let frames = last_frames(&drain(&rx)).unwrap();
        assert_eq!(frames[0].blocks[0].state, BlockState::MergeAnchor);
        assert_eq!(frames[0].blocks[0].opacity, 1.0);

        engine.handle(activate(1, 1, ctrl));
        let blocks = engine.store.read().blocks(PAGE_1).unwrap().to_vec();
        assert_eq!(
            blocks,
            vec![OcrBlock {
                text: "Hello World".to_string(),
                tight_bounding_box: BoundingBox::new(0.0, 0.0, 1.0, 0.2),
                forced_orientation: None,
                is_merged: Some(true),
            }]
        );

        let frames = last_frames(&drain(&rx)).unwrap();
        assert_eq!(frames[0].blocks.len(), 1);
        assert_eq!(frames[0].blocks[0].state, BlockState::Idle);
    }

    #[test]
    fn cross_image_merge_releases_anchor() {
        let (mut engine, rx) = mounted(Settings::default());
        engine.handle(HostMessage::Mutation);
        engine.handle(HostMessage::Frame(dom(vec![
            image(1, PAGE_1, 0.0),
            image(2, PAGE_2, 760.0),
        ])));
        engine.store.write().complete_fetch(PAGE_2, hello_world());

        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        engine.handle(activate(2, 1, ctrl));
        engine.handle(activate(1, 0, ctrl));

        assert!(engine.store.read().merge_anchor().is_none());
        assert_eq!(engine.controller(ElementId(2), 1).state(), BlockState::Idle);
        assert_eq!(engine.store.read().blocks(PAGE_1).unwrap().len(), 2);
        drain(&rx);
    }

    #[test]
    fn delete_modifier_removes_block() {
        let (mut engine, _rx) = mounted(Settings::default());
        let alt = Modifiers {
            alt: true,
            ..Modifiers::default()
        };

        engine.handle(activate(1, 0, alt));
        let blocks = engine.store.read().blocks(PAGE_1).unwrap().to_vec();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "World");
    }

    #[test]
    fn lookup_opens_popup_and_applies_results() {
        let (mut engine, rx) = mounted(Settings::default());

        engine.handle(activate(1, 1, Modifiers::default()));
        let effects = drain(&rx);

        let (request, text) = effects
            .iter()
            .find_map(|e| match e {
                Effect::Lookup { request, text, .. } => Some((*request, text.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(text, "orld");

        let popup = engine.store.read().popup().clone();
        assert!(popup.visible && popup.is_loading);
        assert_eq!(popup.context.as_ref().unwrap().sentence, "World");
        assert_eq!(engine.controller(ElementId(1), 1).state(), BlockState::LookupActive);

        let result = DictionaryResult {
            term: "or".to_string(),
            match_len: 2,
            ..DictionaryResult::default()
        };
        engine.on_lookup_finished(request, LookupOutcome::Results(vec![result]));
        let popup = engine.store.read().popup().clone();
        assert!(!popup.is_loading);
        assert_eq!(popup.highlight.unwrap().length, 2);

        engine.handle(HostMessage::PopupAnki { index: 0 });
        assert!(drain(&rx).iter().any(|e| matches!(e, Effect::AddCard { sentence, .. } if sentence == "World")));

        engine.handle(HostMessage::ClosePopup);
        assert!(!engine.store.read().popup().visible);
        assert_eq!(engine.controller(ElementId(1), 1).state(), BlockState::Idle);
    }

    #[test]
    fn blur_commits_edited_text() {
        let (mut engine, _rx) = mounted(Settings::default());
        engine.handle(HostMessage::DoubleActivate {
            image: ElementId(1),
            block: 0,
        });
        engine.handle(HostMessage::Blur {
            image: ElementId(1),
            block: 0,
            text: "Hel\nlo".to_string(),
        });

        assert_eq!(engine.store.read().blocks(PAGE_1).unwrap()[0].text, "Hel\u{200B}lo");
        assert_eq!(engine.controller(ElementId(1), 0).state(), BlockState::Idle);
    }

    #[test]
    fn scroll_is_coalesced_into_next_frame() {
        let (mut engine, rx) = mounted(Settings::default());

        engine.handle(HostMessage::Scroll);
        engine.handle(HostMessage::Scroll);
        assert_eq!(last_frames(&drain(&rx)), None);

        engine.handle(HostMessage::Frame(dom(vec![image(1, PAGE_1, -300.0)])));
        let frames = last_frames(&drain(&rx)).unwrap();
        assert_eq!(frames[0].transform, Point::new(100.0, -300.0));
    }

    #[test]
    fn mobile_arm_moves_between_blocks() {
        let mut settings = Settings::default();
        settings.interaction.mobile_mode = true;
        let (mut engine, rx) = mounted(settings);

        let tap = |block: usize, time_ms: u64| HostMessage::Activate {
            image: ElementId(1),
            block,
            point: Point::new(150.0, 120.0),
            modifiers: Modifiers::default(),
            caret: None,
            time_ms,
        };

        engine.handle(tap(0, 0));
        let frames = last_frames(&drain(&rx)).unwrap();
        assert_eq!(frames[0].blocks[0].opacity, 1.0);
        assert_eq!(frames[0].blocks[1].opacity, 0.0);

        engine.handle(tap(1, 1_000));
        let frames = last_frames(&drain(&rx)).unwrap();
        assert_eq!(frames[0].blocks[0].opacity, 0.0);
        assert_eq!(frames[0].blocks[0].state, BlockState::Idle);
        assert_eq!(frames[0].blocks[1].opacity, 1.0);

        // Block 0 needs a fresh arm, so a single tap does not look it up
        engine.handle(tap(0, 2_000));
        assert!(!drain(&rx).iter().any(|e| matches!(e, Effect::Lookup { .. })));
        assert!(!engine.controller(ElementId(1), 1).armed());
    }

    #[test]
    fn src_change_repoints_overlay_and_refetches() {
        let (mut engine, rx) = mounted(Settings::default());

        engine.handle(HostMessage::Mutation);
        engine.handle(HostMessage::Frame(dom(vec![image(1, PAGE_2, 0.0)])));

        let effects = drain(&rx);
        assert!(effects.contains(&Effect::Fetch { url: PAGE_2.to_string() }));
        assert!(!effects.contains(&Effect::Render(RenderMessage::Unobserve { image: ElementId(1) })));
        assert_eq!(engine.mounted(), &[ElementId(1)]);

        let frames = last_frames(&effects).unwrap();
        assert_eq!(frames[0].img_src, PAGE_2);
        assert!(frames[0].blocks.is_empty());

        engine.store.write().complete_fetch(
            PAGE_2,
            vec![OcrBlock::new("Page two", BoundingBox::new(0.1, 0.1, 0.3, 0.1))],
        );
        engine.flush();
        let frames = last_frames(&drain(&rx)).unwrap();
        assert_eq!(frames[0].img_src, PAGE_2);
        assert_eq!(frames[0].blocks.len(), 1);
        assert_eq!(frames[0].blocks[0].text, "Page two");
    }

    #[test]
    fn deleting_on_the_lookup_image_closes_popup() {
        let (mut engine, rx) = mounted(Settings::default());

        engine.handle(activate(1, 1, Modifiers::default()));
        let request = drain(&rx)
            .iter()
            .find_map(|e| match e {
                Effect::Lookup { request, .. } => Some(*request),
                _ => None,
            })
            .unwrap();
        assert!(engine.store.read().popup().visible);

        let alt = Modifiers {
            alt: true,
            ..Modifiers::default()
        };
        engine.handle(activate(1, 0, alt));

        assert!(drain(&rx).contains(&Effect::Render(RenderMessage::Popup(DictPopupState::default()))));
        assert!(!engine.store.read().popup().visible);
        assert!(engine.popup.target().is_none());

        // The answer to the closed lookup is dropped
        engine.on_lookup_finished(request, LookupOutcome::Results(vec![DictionaryResult::default()]));
        assert!(!engine.store.read().popup().visible);
        assert_eq!(engine.controller(ElementId(1), 0).state(), BlockState::Idle);
    }

    #[test]
    fn context_menu_requests_card_update() {
        let (mut engine, rx) = mounted(Settings::default());
        engine.handle(HostMessage::ContextMenu {
            image: ElementId(1),
            block: 0,
        });

        assert!(drain(&rx).contains(&Effect::SubmitCard {
            img_src: PAGE_1.to_string(),
            sentence: "Hello".to_string(),
            suggested_crop: BoundingBox::new(0.0, 0.0, 0.5, 0.2),
        }));
    }
}
