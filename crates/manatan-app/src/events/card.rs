use std::sync::Arc;

use kanal::AsyncSender;
use manatan_anki::CardData;
use manatan_dictionary::build_sentence_furigana;
use manatan_types::{AppEvent, BoundingBox, DictionaryResult};

use crate::state::AppState;

/// Sentence picked from an overlay, waiting to be written to Anki.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCard {
    pub img_src: String,
    pub sentence: String,
}

/// Ruby markup is only built when a field template uses `{furigana}`.
async fn with_furigana(state: &AppState, mut data: CardData) -> CardData {
    let wanted = state
        .anki
        .config()
        .fields
        .values()
        .any(|template| template.contains("{furigana}"));

    if wanted && !data.sentence.is_empty() {
        let language = state.settings.read().await.server.language.clone();
        data.furigana = Some(build_sentence_furigana(&*state.dictionary, &data.sentence, &language).await);
    }
    data
}

async fn report(events_tx: &AsyncSender<AppEvent>, event: AppEvent) {
    if let Err(e) = events_tx.send(event).await {
        tracing::error!("Failed to report Anki result: {e}");
    }
}

/// Context menu: put the sentence (and page picture) on the newest note.
pub async fn update_last_card(
    state: Arc<AppState>,
    card: PendingCard,
    crop: Option<BoundingBox>,
    events_tx: AsyncSender<AppEvent>,
) {
    let data = with_furigana(&state, CardData::sentence_only(&card.sentence)).await;
    let picture = state.anki.capture_picture(&card.img_src, crop.as_ref()).await;

    let event = match state.anki.update_last_card(&data, picture).await {
        Ok(id) => AppEvent::AnkiFinished {
            message: format!("Updated Anki note {id}"),
        },
        Err(e) => {
            tracing::warn!("Updating last Anki card failed: {e}");
            AppEvent::AnkiFailed { message: e.to_string() }
        }
    };

    report(&events_tx, event).await;
}

/// Popup button: new note for one dictionary entry.
pub async fn add_card(
    state: Arc<AppState>,
    card: PendingCard,
    result: DictionaryResult,
    events_tx: AsyncSender<AppEvent>,
) {
    let data = with_furigana(&state, CardData::from_result(&result, &card.sentence)).await;
    let picture = state.anki.capture_picture(&card.img_src, None).await;

    let event = match state.anki.add_card(&data, picture).await {
        Ok(id) => AppEvent::AnkiFinished {
            message: format!("Added {} to Anki (note {id})", result.term),
        },
        Err(e) => {
            tracing::warn!("Adding Anki card failed: {e}");
            AppEvent::AnkiFailed { message: e.to_string() }
        }
    };

    report(&events_tx, event).await;
}
