use std::sync::Arc;

use kanal::AsyncSender;
use manatan_dictionary::Dictionary;
use manatan_types::AppEvent;

pub async fn lookup(
    dictionary: Arc<dyn Dictionary>,
    request: u64,
    text: String,
    language: String,
    events_tx: AsyncSender<AppEvent>,
) {
    tracing::debug!("Looking up '{text}' ({language})");

    let event = match dictionary.lookup(&text, &language).await {
        Ok(outcome) => AppEvent::LookupFinished { request, outcome },
        Err(e) => {
            tracing::warn!("Lookup failed: {e}");
            AppEvent::LookupFailed {
                request,
                message: e.to_string(),
            }
        }
    };

    if let Err(e) = events_tx.send(event).await {
        tracing::error!("Failed to report lookup result: {e}");
    }
}
