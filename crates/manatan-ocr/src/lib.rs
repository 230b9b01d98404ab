mod client;
mod fetcher;

pub use client::HttpOcrBackend;
pub use fetcher::{FetchOutcome, OcrFetcher};

use manatan_types::OcrBlock;

/// Remote OCR service contract.
#[async_trait::async_trait]
pub trait OcrBackend: Send + Sync {
    /// Text blocks detected on the image at `image_url`
    async fn fetch_blocks(&self, image_url: &str) -> Result<Vec<OcrBlock>, OcrError>;

    /// Drop the server-side result cache
    async fn purge_cache(&self) -> Result<(), OcrError>;
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("OCR server returned HTTP {0}")]
    Status(u16),

    #[error("Invalid OCR payload: {0}")]
    InvalidPayload(String),
}
