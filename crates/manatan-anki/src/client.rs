use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AnkiError;
use crate::picture::Picture;

/// A note as returned by `notesInfo`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInfo {
    pub note_id: u64,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fields: HashMap<String, NoteFieldValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteFieldValue {
    pub value: String,
    #[serde(default)]
    pub order: u32,
}

/// Payload of `addNote`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub deck_name: String,
    pub model_name: String,
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub picture: Vec<Picture>,
}

#[derive(Clone)]
pub struct AnkiConnectClient {
    base_url: String,
    client: reqwest::Client,
}

impl AnkiConnectClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AnkiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// Check if AnkiConnect is available
    pub async fn check_connection(&self) -> Result<u32, AnkiError> {
        self.invoke("version", json!({})).await
    }

    /// Get list of deck names
    pub async fn deck_names(&self) -> Result<Vec<String>, AnkiError> {
        self.invoke("deckNames", json!({})).await
    }

    /// Get list of model (note type) names
    pub async fn model_names(&self) -> Result<Vec<String>, AnkiError> {
        self.invoke("modelNames", json!({})).await
    }

    pub async fn model_field_names(&self, model: &str) -> Result<Vec<String>, AnkiError> {
        self.invoke("modelFieldNames", json!({ "modelName": model })).await
    }

    /// Note ids matching an Anki search query, e.g. `added:1`
    pub async fn find_notes(&self, query: &str) -> Result<Vec<u64>, AnkiError> {
        self.invoke("findNotes", json!({ "query": query })).await
    }

    pub async fn notes_info(&self, ids: &[u64]) -> Result<Vec<NoteInfo>, AnkiError> {
        self.invoke("notesInfo", json!({ "notes": ids })).await
    }

    /// Open the Anki card browser on a query
    pub async fn gui_browse(&self, query: &str) -> Result<Vec<u64>, AnkiError> {
        self.invoke("guiBrowse", json!({ "query": query })).await
    }

    /// Add a note to Anki
    pub async fn add_note(&self, note: &NewNote) -> Result<u64, AnkiError> {
        let params = json!({
            "note": {
                "deckName": note.deck_name,
                "modelName": note.model_name,
                "fields": note.fields,
                "tags": note.tags,
                "options": { "allowDuplicate": true },
                "picture": note.picture,
            }
        });

        self.invoke("addNote", params).await
    }

    pub async fn update_note_fields(
        &self,
        id: u64,
        fields: &BTreeMap<String, String>,
        picture: &[Picture],
    ) -> Result<(), AnkiError> {
        let params = json!({
            "note": {
                "id": id,
                "fields": fields,
                "picture": picture,
            }
        });

        self.invoke_unit("updateNoteFields", params).await
    }

    pub async fn request_permission(&self) -> Result<PermissionReply, AnkiError> {
        let response: AnkiResponse<PermissionReply> =
            self.send_once("requestPermission", &json!({})).await?;
        response.into_result()
    }

    /// Invoke an AnkiConnect API action
    async fn invoke<T>(&self, action: &str, params: serde_json::Value) -> Result<T, AnkiError>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.send(action, params).await?.into_result()
    }

    /// For actions whose successful `result` is `null`
    async fn invoke_unit(&self, action: &str, params: serde_json::Value) -> Result<(), AnkiError> {
        let response: AnkiResponse<serde_json::Value> = self.send(action, params).await?;
        match response.error {
            Some(error) => Err(AnkiError::AnkiConnect(error)),
            None => Ok(()),
        }
    }

    /// Send once; on a transport failure ask for permission and retry once.
    async fn send<T>(&self, action: &str, params: serde_json::Value) -> Result<AnkiResponse<T>, AnkiError>
    where
        T: for<'de> Deserialize<'de>,
    {
        match self.send_once(action, &params).await {
            Err(AnkiError::Transport(e)) => {
                tracing::warn!("AnkiConnect {action} failed ({e}), requesting permission");

                match self.request_permission().await {
                    Ok(reply) => tracing::info!("AnkiConnect permission: {}", reply.permission),
                    Err(e) => tracing::warn!("AnkiConnect permission request failed: {e}"),
                }

                self.send_once(action, &params).await
            }
            other => other,
        }
    }

    async fn send_once<T>(&self, action: &str, params: &serde_json::Value) -> Result<AnkiResponse<T>, AnkiError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request = AnkiRequest {
            action,
            version: 6,
            params,
        };

        tracing::debug!("AnkiConnect -> {action}");

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await?;

        // AnkiConnect answers a rejected origin with 403
        let response = response.error_for_status()?;

        response
            .json::<AnkiResponse<T>>()
            .await
            .map_err(|e| AnkiError::InvalidResponse(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionReply {
    pub permission: String,
}

#[derive(Serialize)]
struct AnkiRequest<'a> {
    action: &'a str,
    version: u32,
    params: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct AnkiResponse<T> {
    result: Option<T>,
    error: Option<String>,
}

impl<T> AnkiResponse<T> {
    fn into_result(self) -> Result<T, AnkiError> {
        if let Some(error) = self.error {
            return Err(AnkiError::AnkiConnect(error));
        }

        self.result.ok_or(AnkiError::NullResult)
    }
}
