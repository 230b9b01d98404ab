use std::sync::Arc;

use anyhow::Context;
use manatan_anki::AnkiService;
use manatan_config::Settings;
use manatan_core::store::StoreHandle;
use manatan_dictionary::{Dictionary, YomitanClient};
use manatan_ocr::{HttpOcrBackend, OcrFetcher};
use tokio::sync::RwLock;

pub struct AppState {
    pub settings: Arc<RwLock<Settings>>,
    pub store: StoreHandle,
    pub fetcher: OcrFetcher,
    pub dictionary: Arc<dyn Dictionary>,
    pub anki: AnkiService,
}

impl AppState {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let store = StoreHandle::default();

        let backend = HttpOcrBackend::new(&settings.server).context("failed to build OCR client")?;
        let dictionary = YomitanClient::new(&settings.server).context("failed to build dictionary client")?;
        let anki = AnkiService::new(settings.anki.clone()).context("failed to build AnkiConnect client")?;

        Ok(Self {
            fetcher: OcrFetcher::new(store.clone(), Arc::new(backend)),
            settings: Arc::new(RwLock::new(settings)),
            store,
            dictionary: Arc::new(dictionary),
            anki,
        })
    }
}
