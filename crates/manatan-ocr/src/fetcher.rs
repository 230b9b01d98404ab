use std::sync::Arc;

use manatan_core::store::StoreHandle;

use crate::{OcrBackend, OcrError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Nothing issued: empty URL, already cached, in flight, or failed earlier.
    Skipped,
    Loaded { blocks: usize },
    Failed,
}

/// Issues OCR requests through the store so at most one is in flight per URL.
#[derive(Clone)]
pub struct OcrFetcher {
    store: StoreHandle,
    backend: Arc<dyn OcrBackend>,
}

impl OcrFetcher {
    pub fn new(store: StoreHandle, backend: Arc<dyn OcrBackend>) -> Self {
        Self { store, backend }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Fetch blocks for `url` unless they are cached or already requested.
    ///
    /// A URL whose last fetch failed stays failed until [`OcrFetcher::retry`].
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        if !self.store.write().begin_fetch(url) {
            return FetchOutcome::Skipped;
        }
        self.run(url).await
    }

    /// User-triggered re-fetch of a failed URL.
    pub async fn retry(&self, url: &str) -> FetchOutcome {
        if !self.store.write().begin_retry(url) {
            return FetchOutcome::Skipped;
        }
        tracing::info!("Retrying OCR for {url}");
        self.run(url).await
    }

    async fn run(&self, url: &str) -> FetchOutcome {
        tracing::debug!("Requesting OCR for {url}");

        match self.backend.fetch_blocks(url).await {
            Ok(blocks) => {
                let count = blocks.len();
                tracing::debug!("OCR for {url}: {count} blocks");
                self.store.write().complete_fetch(url, blocks);
                FetchOutcome::Loaded { blocks: count }
            }
            Err(e) => {
                tracing::error!("OCR failed for {url}: {e}");
                self.store.write().fail_fetch(url);
                FetchOutcome::Failed
            }
        }
    }

    /// Purge the server cache, then forget everything cached locally.
    pub async fn purge(&self) -> Result<(), OcrError> {
        self.backend.purge_cache().await?;
        self.store.write().clear();
        tracing::info!("OCR cache purged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use httpmock::prelude::*;
    use manatan_config::server::ServerConfig;
    use manatan_types::{BoundingBox, OcrBlock, OcrStatus};
    use tokio::sync::Notify;

    use super::*;
    use crate::HttpOcrBackend;

    /// Holds every request until released.
    struct GatedBackend {
        calls: AtomicUsize,
        gate: Notify,
    }

    #[async_trait::async_trait]
    impl OcrBackend for GatedBackend {
        async fn fetch_blocks(&self, _image_url: &str) -> Result<Vec<OcrBlock>, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(vec![OcrBlock::new("テスト", BoundingBox::new(0.1, 0.1, 0.2, 0.2))])
        }

        async fn purge_cache(&self) -> Result<(), OcrError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_fetches_issue_one_request() {
        let backend = Arc::new(GatedBackend {
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
        });
        let fetcher = OcrFetcher::new(StoreHandle::default(), backend.clone());
        let url = "https://x/page1.png";

        let first = tokio::spawn({
            let fetcher = fetcher.clone();
            async move { fetcher.fetch(url).await }
        });

        tokio::time::timeout(Duration::from_secs(2), async {
            while backend.calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("first request never started");

        assert_eq!(fetcher.store().read().status(url), OcrStatus::Loading);
        assert_eq!(fetcher.fetch(url).await, FetchOutcome::Skipped);

        backend.gate.notify_one();
        let outcome = first.await.unwrap();

        assert_eq!(outcome, FetchOutcome::Loaded { blocks: 1 });
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.store().read().status(url), OcrStatus::Success);
        assert_eq!(fetcher.fetch(url).await, FetchOutcome::Skipped);
    }

    #[tokio::test]
    async fn failed_fetch_waits_for_manual_retry() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/ocr/ocr")
                    .query_param("url", "https://x/page1.png");
                then.status(400);
            })
            .await;

        let config = ServerConfig {
            base_url: server.base_url(),
            ..ServerConfig::default()
        };
        let backend = Arc::new(HttpOcrBackend::new(&config).unwrap());
        let fetcher = OcrFetcher::new(StoreHandle::default(), backend);
        let url = "https://x/page1.png";

        assert_eq!(fetcher.fetch(url).await, FetchOutcome::Failed);
        assert_eq!(fetcher.store().read().status(url), OcrStatus::Error);

        // No automatic re-fetch once failed
        assert_eq!(fetcher.fetch(url).await, FetchOutcome::Skipped);
        mock.assert_hits_async(1).await;

        assert_eq!(fetcher.retry(url).await, FetchOutcome::Failed);
        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn empty_url_is_ignored() {
        let backend = Arc::new(GatedBackend {
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
        });
        let fetcher = OcrFetcher::new(StoreHandle::default(), backend.clone());

        assert_eq!(fetcher.fetch("").await, FetchOutcome::Skipped);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }
}
