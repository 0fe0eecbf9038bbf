//! Remote key-value store over a Redis-style REST API
//!
//! Speaks the protocol shared by Upstash Redis and Vercel KV:
//! `GET {base}/get/{key}` answers `{"result": <string|null>}` and
//! `POST {base}/set/{key}` stores the request body. Requests carry a bearer
//! token.

use crate::config::RemoteKvSettings;
use crate::error::{RankingError, Result};
use crate::storage::backend::KeyValueStore;
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RestKvResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RestKvStore {
    name: String,
    base_url: Url,
    token: String,
    client: Client,
}

impl RestKvStore {
    pub fn new(name: impl Into<String>, settings: &RemoteKvSettings) -> Result<Self> {
        let name = name.into();
        let base_url = Url::parse(settings.url.trim_end_matches('/')).map_err(|e| {
            RankingError::ConfigurationError {
                message: format!("Invalid URL for '{}': {}", name, e),
            }
        })?;

        Ok(Self {
            name,
            base_url,
            token: settings.token.clone(),
            client: Client::new(),
        })
    }

    fn command_url(&self, command: &str, key: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RankingError::ConfigurationError {
                message: format!("URL of '{}' cannot be a base", self.name),
            })?
            .pop_if_empty()
            .push(command)
            .push(key);
        Ok(url)
    }

    async fn handle_response(&self, response: Response) -> Result<Option<serde_json::Value>> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RankingError::StorageError {
                backend: self.name.clone(),
                message: format!("HTTP {}: {}", status.as_u16(), text),
            }
            .into());
        }

        let body: RestKvResponse =
            serde_json::from_str(&text).map_err(|e| RankingError::StorageError {
                backend: self.name.clone(),
                message: format!("JSON parse error: {}", e),
            })?;
        if let Some(error) = body.error {
            return Err(RankingError::StorageError {
                backend: self.name.clone(),
                message: error,
            }
            .into());
        }
        Ok(body.result)
    }
}

#[async_trait]
impl KeyValueStore for RestKvStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let url = self.command_url("get", key)?;
        debug!("Request: GET {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        match self.handle_response(response).await? {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(raw)) => Ok(Some(raw)),
            // Some KV clients store JSON natively instead of as a string
            Some(other) => Ok(Some(other.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let url = self.command_url("set", key)?;
        debug!("Request: POST {} ({} bytes)", url, value.len());
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .body(value.to_string())
            .send()
            .await?;

        self.handle_response(response).await?;
        Ok(())
    }
}
