use kanal::AsyncSender;
use manatan_ocr::{FetchOutcome, OcrFetcher};
use manatan_types::AppEvent;

pub async fn fetch(fetcher: OcrFetcher, url: String, events_tx: AsyncSender<AppEvent>) {
    let outcome = fetcher.fetch(&url).await;
    report(outcome, url, &events_tx).await;
}

pub async fn retry(fetcher: OcrFetcher, url: String, events_tx: AsyncSender<AppEvent>) {
    let outcome = fetcher.retry(&url).await;
    report(outcome, url, &events_tx).await;
}

async fn report(outcome: FetchOutcome, url: String, events_tx: &AsyncSender<AppEvent>) {
    if outcome == FetchOutcome::Skipped {
        return;
    }

    if let Err(e) = events_tx.send(AppEvent::OcrFinished { url }).await {
        tracing::error!("Failed to report OCR result: {e}");
    }
}
