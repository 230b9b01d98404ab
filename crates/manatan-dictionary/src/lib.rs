mod client;
pub mod frequency;
pub mod furigana;

pub use client::{AdminResponse, YomitanClient};
pub use furigana::build_sentence_furigana;

use manatan_types::LookupOutcome;

/// Dictionary lookup provider interface
#[async_trait::async_trait]
pub trait Dictionary: Send + Sync {
    /// Entries matching the start of `text`
    async fn lookup(&self, text: &str, language: &str) -> Result<LookupOutcome, DictionaryError>;

    /// URL of a pronunciation recording, when the source has one
    async fn audio_url(
        &self,
        source: &str,
        term: &str,
        reading: &str,
        language: &str,
    ) -> Result<Option<String>, DictionaryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Dictionary server returned HTTP {0}")]
    Status(u16),

    #[error("Invalid dictionary payload: {0}")]
    InvalidPayload(String),

    #[error("Dictionary backend error: {0}")]
    Backend(String),
}
