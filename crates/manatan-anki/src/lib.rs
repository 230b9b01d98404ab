mod client;
pub mod emphasis;
pub mod picture;
mod template;

pub use client::{AnkiConnectClient, NewNote, NoteFieldValue, NoteInfo, PermissionReply};
pub use picture::Picture;
pub use template::{CardData, render_field, render_fields};

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use manatan_config::anki::AnkiConfig;
use manatan_types::BoundingBox;

use crate::emphasis::inherit_emphasis;

#[derive(Debug, thiserror::Error)]
pub enum AnkiError {
    #[error("Could not reach AnkiConnect: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("AnkiConnect error: {0}")]
    AnkiConnect(String),

    #[error("AnkiConnect returned null result")]
    NullResult,

    #[error("Unexpected AnkiConnect response: {0}")]
    InvalidResponse(String),

    #[error("Anki integration is disabled")]
    Disabled,

    #[error("No Anki deck selected")]
    MissingDeck,

    #[error("No Anki note type selected")]
    MissingModel,

    #[error("No card was created today")]
    NoRecentCard,

    #[error("Last card is {age_minutes} minutes old, refusing to update it")]
    StaleCard { age_minutes: u64 },

    #[error("Image processing failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Invalid image: {0}")]
    Image(String),
}

/// What a submission request should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitPlan {
    /// Show this message instead of submitting
    Notice(String),
    /// Let the user pick a crop rectangle first
    OpenCropper,
    Submit,
}

pub fn plan_submission(config: &AnkiConfig) -> SubmitPlan {
    if !config.enabled {
        return SubmitPlan::Notice(
            "Anki integration is disabled. Enable it in the settings first.".to_string(),
        );
    }

    if config.enable_cropper && config.image_field.as_deref().is_some_and(|f| !f.is_empty()) {
        return SubmitPlan::OpenCropper;
    }

    SubmitPlan::Submit
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Card creation and "update last card" on top of [`AnkiConnectClient`].
#[derive(Clone)]
pub struct AnkiService {
    client: AnkiConnectClient,
    http: reqwest::Client,
    config: AnkiConfig,
}

impl AnkiService {
    pub fn new(config: AnkiConfig) -> Result<Self, AnkiError> {
        let timeout = Duration::from_secs(config.timeout_seconds);

        Ok(Self {
            client: AnkiConnectClient::new(config.url.clone(), timeout)?,
            http: reqwest::Client::builder().timeout(timeout).build()?,
            config,
        })
    }

    pub fn client(&self) -> &AnkiConnectClient {
        &self.client
    }

    pub fn config(&self) -> &AnkiConfig {
        &self.config
    }

    /// Checked before any request goes out.
    pub fn validate(&self) -> Result<(), AnkiError> {
        if !self.config.enabled {
            return Err(AnkiError::Disabled);
        }
        if self.config.deck.trim().is_empty() {
            return Err(AnkiError::MissingDeck);
        }
        if self.config.model.trim().is_empty() {
            return Err(AnkiError::MissingModel);
        }
        Ok(())
    }

    /// Screenshot of `img_src` for the configured image field.
    ///
    /// Best effort: any failure is logged and yields `None`.
    pub async fn capture_picture(&self, img_src: &str, crop: Option<&BoundingBox>) -> Option<Picture> {
        let field = self.config.image_field.as_deref().filter(|f| !f.is_empty())?;

        let bytes = match picture::fetch_image(&self.http, img_src).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Could not download {img_src} for Anki: {e}");
                return None;
            }
        };

        match picture::encode_png(&bytes, crop) {
            Ok(data) => Some(picture::picture(data, field, now_ms())),
            Err(e) => {
                tracing::warn!("Could not encode {img_src} for Anki: {e}");
                None
            }
        }
    }

    pub async fn add_card(&self, data: &CardData, picture: Option<Picture>) -> Result<u64, AnkiError> {
        self.validate()?;

        let note = NewNote {
            deck_name: self.config.deck.clone(),
            model_name: self.config.model.clone(),
            fields: render_fields(&self.config.fields, data),
            tags: self.config.tags.clone(),
            picture: picture.into_iter().collect(),
        };

        let id = self.client.add_note(&note).await?;
        tracing::info!("Added Anki note {id} for {}", data.expression);
        Ok(id)
    }

    pub async fn update_last_card(&self, data: &CardData, picture: Option<Picture>) -> Result<u64, AnkiError> {
        self.update_last_card_at(data, picture, now_ms()).await
    }

    /// Merge `data` into the newest note added today, unless it is stale.
    ///
    /// Note ids are creation timestamps in milliseconds.
    pub async fn update_last_card_at(
        &self,
        data: &CardData,
        picture: Option<Picture>,
        now_ms: u64,
    ) -> Result<u64, AnkiError> {
        self.validate()?;

        let ids = self.client.find_notes("added:1").await?;
        let Some(&newest) = ids.iter().max() else {
            return Err(AnkiError::NoRecentCard);
        };

        let age_ms = now_ms.saturating_sub(newest);
        if age_ms > self.config.stale_after_seconds * 1000 {
            return Err(AnkiError::StaleCard {
                age_minutes: age_ms / 60_000,
            });
        }

        let existing = self
            .client
            .notes_info(&[newest])
            .await?
            .into_iter()
            .next()
            .map(|note| note.fields)
            .unwrap_or_default();

        let fields: BTreeMap<String, String> = render_fields(&self.config.fields, data)
            .into_iter()
            .filter(|(name, _)| existing.is_empty() || existing.contains_key(name))
            .map(|(name, value)| {
                let merged = match existing.get(&name) {
                    Some(old) => inherit_emphasis(&old.value, &value),
                    None => value,
                };
                (name, merged)
            })
            .collect();

        let pictures: Vec<Picture> = picture.into_iter().collect();
        self.client.update_note_fields(newest, &fields, &pictures).await?;
        tracing::info!("Updated Anki note {newest} ({} fields)", fields.len());

        if let Err(e) = self.client.gui_browse(&format!("nid:{newest}")).await {
            tracing::warn!("Could not open the Anki browser: {e}");
        }

        Ok(newest)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    const NOW: u64 = 1_760_000_000_000;

    fn config(url: String) -> AnkiConfig {
        AnkiConfig {
            enabled: true,
            url,
            deck: "Mining".to_string(),
            model: "Lapis".to_string(),
            ..AnkiConfig::default()
        }
    }

    async fn mock_action<'a>(server: &'a MockServer, action: &str, result: serde_json::Value) -> httpmock::Mock<'a> {
        let body = json!({ "action": action }).to_string();
        server
            .mock_async(move |when, then| {
                when.method(POST).json_body_partial(body);
                then.status(200).json_body(json!({ "result": result, "error": null }));
            })
            .await
    }

    #[test]
    fn submission_plan_follows_settings() {
        let mut config = AnkiConfig::default();
        assert!(matches!(plan_submission(&config), SubmitPlan::Notice(_)));

        config.enabled = true;
        assert_eq!(plan_submission(&config), SubmitPlan::Submit);

        config.enable_cropper = true;
        assert_eq!(plan_submission(&config), SubmitPlan::Submit);

        config.image_field = Some("Picture".to_string());
        assert_eq!(plan_submission(&config), SubmitPlan::OpenCropper);
    }

    #[tokio::test]
    async fn missing_deck_aborts_before_network() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({"result": 1, "error": null}));
            })
            .await;

        let service = AnkiService::new(AnkiConfig {
            deck: String::new(),
            ..config(server.base_url())
        })
        .unwrap();

        let err = service
            .add_card(&CardData::sentence_only("猫"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AnkiError::MissingDeck), "{err}");
        any.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn stale_last_card_is_not_updated() {
        let server = MockServer::start_async().await;
        let six_minutes_ago = NOW - 6 * 60 * 1000;
        let find = mock_action(&server, "findNotes", json!([six_minutes_ago - 5000, six_minutes_ago])).await;
        let update = mock_action(&server, "updateNoteFields", json!(null)).await;

        let service = AnkiService::new(config(server.base_url())).unwrap();
        let err = service
            .update_last_card_at(&CardData::sentence_only("猫がいる"), None, NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, AnkiError::StaleCard { age_minutes: 6 }), "{err}");
        find.assert_async().await;
        update.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn no_card_today_is_reported() {
        let server = MockServer::start_async().await;
        mock_action(&server, "findNotes", json!([])).await;

        let service = AnkiService::new(config(server.base_url())).unwrap();
        let err = service
            .update_last_card_at(&CardData::sentence_only("猫"), None, NOW)
            .await
            .unwrap_err();

        assert!(matches!(err, AnkiError::NoRecentCard), "{err}");
    }

    #[tokio::test]
    async fn recent_card_gets_fields_with_inherited_emphasis() {
        let server = MockServer::start_async().await;
        let recent = NOW - 60 * 1000;
        mock_action(&server, "findNotes", json!([recent])).await;
        mock_action(
            &server,
            "notesInfo",
            json!([{
                "noteId": recent,
                "modelName": "Lapis",
                "tags": [],
                "fields": {
                    "Expression": {"value": "猫", "order": 0},
                    "Sentence": {"value": "<b>猫</b>だ", "order": 1}
                }
            }]),
        )
        .await;
        let browse = mock_action(&server, "guiBrowse", json!([recent])).await;

        let expected = json!({
            "action": "updateNoteFields",
            "params": {"note": {"id": recent, "fields": {"Sentence": "黒い<b>猫</b>がいる"}}}
        })
        .to_string();
        let update = server
            .mock_async(move |when, then| {
                when.method(POST).json_body_partial(expected);
                then.status(200).json_body(json!({"result": null, "error": null}));
            })
            .await;

        let service = AnkiService::new(config(server.base_url())).unwrap();
        let id = service
            .update_last_card_at(&CardData::sentence_only("黒い猫がいる"), None, NOW)
            .await
            .unwrap();

        assert_eq!(id, recent);
        update.assert_async().await;
        browse.assert_async().await;
    }
}
