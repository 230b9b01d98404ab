use std::time::Duration;

use manatan_config::server::ServerConfig;
use manatan_core::language;
use manatan_types::OcrBlock;
use serde_json::Value;

use crate::{OcrBackend, OcrError};

#[derive(Clone)]
pub struct HttpOcrBackend {
    base_url: String,
    credentials: Option<(String, String)>,
    language: String,
    add_space_on_merge: bool,
    client: reqwest::Client,
}

impl HttpOcrBackend {
    pub fn new(server: &ServerConfig) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: server.base_url.trim_end_matches('/').to_string(),
            credentials: server
                .credentials()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
            add_space_on_merge: language::uses_spaces(&server.language),
            language: server.language.clone(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_query(&self) -> Vec<(&'static str, String)> {
        match &self.credentials {
            Some((user, pass)) => vec![("user", user.clone()), ("pass", pass.clone())],
            None => vec![],
        }
    }
}

#[async_trait::async_trait]
impl OcrBackend for HttpOcrBackend {
    async fn fetch_blocks(&self, image_url: &str) -> Result<Vec<OcrBlock>, OcrError> {
        let mut query = vec![
            ("url", image_url.to_string()),
            ("add_space_on_merge", self.add_space_on_merge.to_string()),
            ("language", self.language.clone()),
        ];
        query.extend(self.auth_query());

        let response = self
            .client
            .get(self.endpoint("/api/ocr/ocr"))
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| OcrError::InvalidPayload(e.to_string()))?;

        if !body.is_array() {
            return Err(OcrError::InvalidPayload(format!(
                "expected an array of blocks, got {}",
                kind(&body)
            )));
        }

        serde_json::from_value(body).map_err(|e| OcrError::InvalidPayload(e.to_string()))
    }

    async fn purge_cache(&self) -> Result<(), OcrError> {
        let response = self
            .client
            .post(self.endpoint("/api/ocr/purge-cache"))
            .query(&self.auth_query())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::Status(status.as_u16()));
        }
        Ok(())
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
