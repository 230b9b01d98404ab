use std::sync::Arc;
use std::time::Duration;

use kanal::{AsyncReceiver, AsyncSender};
use manatan_anki::{SubmitPlan, plan_submission};
use manatan_overlay::{Effect, OverlayEngine};
use manatan_types::{AppEvent, BoundingBox, HostMessage, RenderMessage};
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

pub mod card;
pub mod lookup;
pub mod ocr;

use card::PendingCard;

/// Store changes made by spawned tasks (e.g. a fetch going to `loading`)
/// reach the host on the next tick.
const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Owns the overlay engine and turns its effects into tasks and renders.
struct EventLoop {
    state: Arc<AppState>,
    engine: OverlayEngine,
    effects_tx: kanal::Sender<Effect>,
    effects_rx: kanal::Receiver<Effect>,
    events_tx: AsyncSender<AppEvent>,
    renders_tx: AsyncSender<RenderMessage>,
    /// Card waiting for the user to confirm a crop
    pending_card: Option<PendingCard>,
}

pub async fn event_loop(
    state: Arc<AppState>,
    events_rx: AsyncReceiver<AppEvent>,
    events_tx: AsyncSender<AppEvent>,
    renders_tx: AsyncSender<RenderMessage>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let settings = state.settings.read().await.clone();
    let (effects_tx, effects_rx) = kanal::unbounded();
    let engine = OverlayEngine::new(settings, state.store.clone(), effects_tx.clone());

    let mut event_loop = EventLoop {
        state,
        engine,
        effects_tx,
        effects_rx,
        events_tx,
        renders_tx,
        pending_card: None,
    };

    let mut interval = tokio::time::interval(FRAME_INTERVAL);

    tracing::info!("Event loop started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Event loop stopping");
                return Ok(());
            }
            event = events_rx.recv() => {
                let event = event?;
                tracing::debug!("Event received: {:?}", std::mem::discriminant(&event));
                event_loop.handle(event).await?;
            }
            _ = interval.tick() => event_loop.engine.flush(),
        }

        event_loop.dispatch_effects().await?;
    }
}

impl EventLoop {
    async fn handle(&mut self, event: AppEvent) -> anyhow::Result<()> {
        match event {
            AppEvent::Host(HostMessage::CropConfirmed { img_src, crop }) => self.crop_confirmed(img_src, crop),
            AppEvent::Host(message) => self.engine.handle(message),
            AppEvent::OcrFinished { url } => {
                tracing::debug!("OCR finished for {url}");
                self.engine.flush();
            }
            AppEvent::LookupFinished { request, outcome } => self.engine.on_lookup_finished(request, outcome),
            AppEvent::LookupFailed { request, message } => self.engine.on_lookup_failed(request, message),
            AppEvent::AnkiFinished { message } | AppEvent::AnkiFailed { message } => {
                self.renders_tx.send(RenderMessage::Notice { message }).await?;
            }
            AppEvent::BridgeConnected => {
                tracing::info!("Host page attached");
                self.engine.flush();
            }
            AppEvent::BridgeDisconnected => self.reset_engine().await,
        }

        Ok(())
    }

    /// Element ids belong to the page that assigned them; start over for the next one.
    async fn reset_engine(&mut self) {
        let settings = self.state.settings.read().await.clone();
        self.engine = OverlayEngine::new(settings, self.state.store.clone(), self.effects_tx.clone());
        self.pending_card = None;

        let mut dropped = 0;
        while let Ok(Some(_)) = self.effects_rx.try_recv() {
            dropped += 1;
        }
        tracing::debug!("Overlay engine reset, {dropped} effects for the old page dropped");
    }

    fn crop_confirmed(&mut self, img_src: String, crop: BoundingBox) {
        match self.pending_card.take() {
            Some(card) if card.img_src == img_src => {
                tokio::spawn(card::update_last_card(
                    self.state.clone(),
                    card,
                    Some(crop),
                    self.events_tx.clone(),
                ));
            }
            other => {
                tracing::warn!("Crop confirmed for {img_src} without a pending card");
                self.pending_card = other;
            }
        }
    }

    async fn dispatch_effects(&mut self) -> anyhow::Result<()> {
        while let Ok(Some(effect)) = self.effects_rx.try_recv() {
            match effect {
                Effect::Render(message) => self.renders_tx.send(message).await?,
                Effect::Fetch { url } => {
                    tokio::spawn(ocr::fetch(self.state.fetcher.clone(), url, self.events_tx.clone()));
                }
                Effect::Retry { url } => {
                    tokio::spawn(ocr::retry(self.state.fetcher.clone(), url, self.events_tx.clone()));
                }
                Effect::Lookup {
                    request,
                    text,
                    language,
                } => {
                    tokio::spawn(lookup::lookup(
                        self.state.dictionary.clone(),
                        request,
                        text,
                        language,
                        self.events_tx.clone(),
                    ));
                }
                Effect::SubmitCard {
                    img_src,
                    sentence,
                    suggested_crop,
                } => self.submit_card(PendingCard { img_src, sentence }, suggested_crop).await?,
                Effect::AddCard {
                    img_src,
                    sentence,
                    result,
                } => {
                    tokio::spawn(card::add_card(
                        self.state.clone(),
                        PendingCard { img_src, sentence },
                        result,
                        self.events_tx.clone(),
                    ));
                }
            }
        }

        Ok(())
    }

    async fn submit_card(&mut self, card: PendingCard, suggested: BoundingBox) -> anyhow::Result<()> {
        match plan_submission(self.state.anki.config()) {
            SubmitPlan::Notice(message) => {
                self.renders_tx.send(RenderMessage::Notice { message }).await?;
            }
            SubmitPlan::OpenCropper => {
                let img_src = card.img_src.clone();
                self.pending_card = Some(card);
                self.renders_tx
                    .send(RenderMessage::OpenCropper { img_src, suggested })
                    .await?;
            }
            SubmitPlan::Submit => {
                tokio::spawn(card::update_last_card(
                    self.state.clone(),
                    card,
                    None,
                    self.events_tx.clone(),
                ));
            }
        }

        Ok(())
    }
}
