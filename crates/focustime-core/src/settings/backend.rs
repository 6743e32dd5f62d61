//! Remote persistence for the per-user settings record.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::types::{SettingsBody, SettingsRecord};
use crate::error::SettingsError;
use crate::storage::SettingsApiConfig;

/// Where the single settings record of the current user lives.
///
/// `fetch_current` returns `Ok(None)` when the user has no record yet.
/// Create and update are distinguished by the caller, which remembers the
/// record id from the last fetch or create.
pub trait SettingsBackend: Send + Sync {
    fn fetch_current(
        &self,
    ) -> impl Future<Output = Result<Option<SettingsRecord>, SettingsError>> + Send;

    fn create(
        &self,
        body: SettingsBody,
    ) -> impl Future<Output = Result<SettingsRecord, SettingsError>> + Send;

    fn update(
        &self,
        id: &str,
        body: SettingsBody,
    ) -> impl Future<Output = Result<SettingsRecord, SettingsError>> + Send;
}

const COLLECTION: &str = "pomodoro-settings";

/// Server error bodies are cut to this many characters.
const MAX_ERROR_CHARS: usize = 200;

/// REST backend: `GET/POST {base}/pomodoro-settings`, `PUT {base}/pomodoro-settings/{id}`.
pub struct HttpSettingsBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpSettingsBackend {
    /// Create a backend for `base_url`. A `None` token means the user is signed out.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, SettingsError> {
        Self::with_timeout(base_url, token, Duration::from_secs(10))
    }

    pub fn with_timeout(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SettingsError> {
        // Url::join replaces the last segment unless the base ends in a slash.
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Build from config, reading the bearer token from the configured env var.
    pub fn from_config(config: &SettingsApiConfig) -> Result<Self, SettingsError> {
        let token = std::env::var(&config.token_env).ok();
        Self::with_timeout(
            &config.base_url,
            token,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn token(&self) -> Result<&str, SettingsError> {
        self.token.as_deref().ok_or(SettingsError::NotAuthenticated)
    }

    fn collection_url(&self) -> Result<Url, SettingsError> {
        Ok(self.base_url.join(COLLECTION)?)
    }

    fn record_url(&self, id: &str) -> Result<Url, SettingsError> {
        let mut url = self.collection_url()?;
        let base = url.to_string();
        url.path_segments_mut()
            .map_err(|_| SettingsError::Malformed(format!("cannot append id to {base}")))?
            .push(id);
        Ok(url)
    }
}

impl SettingsBackend for HttpSettingsBackend {
    async fn fetch_current(&self) -> Result<Option<SettingsRecord>, SettingsError> {
        let token = self.token()?;
        let resp = self
            .client
            .get(self.collection_url()?)
            .bearer_auth(token)
            .send()
            .await?;

        match resp.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SettingsError::NotAuthenticated)
            }
            status if !status.is_success() => return Err(server_error(resp).await),
            _ => {}
        }

        // Servers answer either a record or a JSON `null` for "none yet".
        decode(resp).await
    }

    async fn create(&self, body: SettingsBody) -> Result<SettingsRecord, SettingsError> {
        let token = self.token()?;
        let resp = self
            .client
            .post(self.collection_url()?)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        read_record(resp).await
    }

    async fn update(&self, id: &str, body: SettingsBody) -> Result<SettingsRecord, SettingsError> {
        let token = self.token()?;
        let resp = self
            .client
            .put(self.record_url(id)?)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        read_record(resp).await
    }
}

async fn read_record(resp: Response) -> Result<SettingsRecord, SettingsError> {
    match resp.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SettingsError::NotAuthenticated),
        status if !status.is_success() => Err(server_error(resp).await),
        _ => decode(resp).await,
    }
}

/// Transport failures stay `Network`; a body we cannot read as a record is `Malformed`.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, SettingsError> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| SettingsError::Malformed(e.to_string()))
}

async fn server_error(resp: Response) -> SettingsError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = body.chars().take(MAX_ERROR_CHARS).collect();
    SettingsError::Server { status, message }
}
