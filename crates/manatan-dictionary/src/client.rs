use std::time::Duration;

use manatan_config::server::ServerConfig;
use manatan_types::{DictionaryResult, Frequency, LookupOutcome};
use reqwest::multipart;
use serde::Deserialize;
use serde_json::Value;

use crate::frequency::{display_value, parse_rank};
use crate::{Dictionary, DictionaryError};

/// Reply of the Yomitan admin endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl AdminResponse {
    fn into_result(self) -> Result<Option<String>, DictionaryError> {
        if self.status == "ok" {
            return Ok(self.message);
        }

        Err(DictionaryError::Backend(
            self.message.unwrap_or_else(|| format!("status {}", self.status)),
        ))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    #[serde(alias = "expression")]
    term: String,
    #[serde(default)]
    reading: String,
    #[serde(default, alias = "glossary")]
    definitions: Vec<Value>,
    #[serde(default)]
    frequencies: Vec<RawFrequency>,
    #[serde(default)]
    tags: Vec<Value>,
    #[serde(default)]
    match_len: usize,
}

#[derive(Deserialize)]
struct RawFrequency {
    #[serde(default)]
    dictionary: String,
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct AudioResponse {
    #[serde(default)]
    url: Option<String>,
}

impl From<RawEntry> for DictionaryResult {
    fn from(raw: RawEntry) -> Self {
        let match_len = if raw.match_len > 0 {
            raw.match_len
        } else {
            raw.term.chars().count()
        };

        Self {
            definitions: raw
                .definitions
                .iter()
                .map(plain_text)
                .filter(|d| !d.is_empty())
                .collect(),
            frequencies: raw
                .frequencies
                .into_iter()
                .map(|f| Frequency {
                    display: display_value(&f.value),
                    value: parse_rank(&f.value),
                    dictionary: f.dictionary,
                })
                .collect(),
            tags: raw
                .tags
                .iter()
                .filter_map(|t| match t {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                })
                .collect(),
            term: raw.term,
            reading: raw.reading,
            match_len,
        }
    }
}

/// Flatten a glossary item (plain string or structured content) to text.
fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(plain_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(map) => map
            .get("content")
            .or_else(|| map.get("text"))
            .map(plain_text)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Client of the companion server's `/api/yomitan` endpoints.
#[derive(Clone)]
pub struct YomitanClient {
    base_url: String,
    credentials: Option<(String, String)>,
    client: reqwest::Client,
}

impl YomitanClient {
    pub fn new(server: &ServerConfig) -> Result<Self, DictionaryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: server.base_url.trim_end_matches('/').to_string(),
            credentials: server
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/yomitan/{}", self.base_url, path)
    }

    fn with_auth(&self, mut query: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some((user, pass)) = &self.credentials {
            query.push(("user", user.clone()));
            query.push(("pass", pass.clone()));
        }
        query
    }

    async fn admin(&self, path: &str, query: Vec<(&'static str, String)>) -> Result<Option<String>, DictionaryError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .query(&self.with_auth(query))
            .send()
            .await?;

        decode::<AdminResponse>(response).await?.into_result()
    }

    pub async fn install_language(&self, language: &str) -> Result<Option<String>, DictionaryError> {
        tracing::info!("Installing dictionaries for {language}");
        self.admin("install-language", vec![("language", language.to_string())])
            .await
    }

    pub async fn reset(&self) -> Result<Option<String>, DictionaryError> {
        tracing::info!("Resetting Yomitan dictionaries");
        self.admin("reset", vec![]).await
    }

    pub async fn install_defaults(&self) -> Result<Option<String>, DictionaryError> {
        tracing::info!("Installing default dictionaries");
        self.admin("install-defaults", vec![]).await
    }

    /// Upload a dictionary archive.
    pub async fn import(&self, file_name: &str, bytes: Vec<u8>) -> Result<Option<String>, DictionaryError> {
        tracing::info!("Importing dictionary {file_name} ({} bytes)", bytes.len());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/zip")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("import"))
            .query(&self.with_auth(vec![]))
            .multipart(form)
            .send()
            .await?;

        decode::<AdminResponse>(response).await?.into_result()
    }
}

async fn decode<T>(response: reqwest::Response) -> Result<T, DictionaryError>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if !status.is_success() {
        return Err(DictionaryError::Status(status.as_u16()));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| DictionaryError::InvalidPayload(e.to_string()))
}

/// Cold start: `"loading"`, `{"status": "loading"}` or `{"loading": true}`.
fn is_loading(value: &Value) -> bool {
    match value {
        Value::String(s) => s == "loading",
        Value::Object(map) => {
            map.get("status").and_then(Value::as_str) == Some("loading")
                || map.get("loading").and_then(Value::as_bool) == Some(true)
        }
        _ => false,
    }
}

#[async_trait::async_trait]
impl Dictionary for YomitanClient {
    async fn lookup(&self, text: &str, language: &str) -> Result<LookupOutcome, DictionaryError> {
        let query = self.with_auth(vec![
            ("text", text.to_string()),
            ("language", language.to_string()),
        ]);

        let response = self
            .client
            .get(self.endpoint("lookup"))
            .query(&query)
            .send()
            .await?;

        let body: Value = decode(response).await?;

        if is_loading(&body) {
            tracing::info!("Dictionary backend is still loading");
            return Ok(LookupOutcome::Loading);
        }

        let Value::Array(_) = body else {
            return Err(DictionaryError::InvalidPayload(
                "expected an array of entries".to_string(),
            ));
        };

        let entries: Vec<RawEntry> =
            serde_json::from_value(body).map_err(|e| DictionaryError::InvalidPayload(e.to_string()))?;

        Ok(LookupOutcome::Results(
            entries.into_iter().map(DictionaryResult::from).collect(),
        ))
    }

    async fn audio_url(
        &self,
        source: &str,
        term: &str,
        reading: &str,
        language: &str,
    ) -> Result<Option<String>, DictionaryError> {
        let query = self.with_auth(vec![
            ("source", source.to_string()),
            ("term", term.to_string()),
            ("reading", reading.to_string()),
            ("language", language.to_string()),
        ]);

        let response = self
            .client
            .get(self.endpoint("audio"))
            .query(&query)
            .send()
            .await?;

        let audio: AudioResponse = decode(response).await?;
        Ok(audio.url.filter(|u| !u.is_empty()))
    }
}
