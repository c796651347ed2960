//! Thin HTTP client for the bridge's CLIP v2 API.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::HueConfig;
use crate::error::HueError;
use crate::resources::Envelope;

const APPLICATION_KEY_HEADER: &str = "hue-application-key";
const EVENT_STREAM_PATH: &str = "/eventstream/clip/v2";

pub struct HueClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HueClient {
    /// Build a client for the configured bridge.
    ///
    /// The bridge serves a self-signed certificate, so certificate checks
    /// are disabled.
    ///
    /// # Errors
    ///
    /// Returns [`HueError::InvalidApplicationKey`] when the key is not a
    /// valid header value, and [`HueError::Http`] when the TLS backend cannot
    /// be initialised.
    pub fn new(config: &HueConfig) -> Result<Self, HueError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(&config.application_key)
            .map_err(|_| HueError::InvalidApplicationKey)?;
        key.set_sensitive(true);
        headers.insert(APPLICATION_KEY_HEADER, key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("https://{}", config.address),
            timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn check(path: &str, response: Response) -> Result<Response, HueError> {
        let status = response.status();
        if status == StatusCode::MULTI_STATUS || !status.is_success() {
            return Err(HueError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(response)
    }

    /// Read every resource under `path`.
    ///
    /// # Errors
    ///
    /// Returns transport, status or parse errors.
    #[tracing::instrument(skip(self))]
    pub async fn get<T: DeserializeOwned + Send>(&self, path: &str) -> Result<Vec<T>, HueError> {
        let response = self
            .http
            .get(self.url(path))
            .timeout(self.timeout)
            .send()
            .await?;
        let body = Self::check(path, response)?.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        if !envelope.errors.is_empty() {
            tracing::warn!(errors = ?envelope.errors, "bridge reported errors");
        }
        Ok(envelope.data)
    }

    /// Read the single resource at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HueError::MissingResource`] when the answer is empty.
    pub async fn get_one<T: DeserializeOwned + Send>(
        &self,
        kind: &'static str,
        path: &str,
    ) -> Result<T, HueError> {
        self.get(path)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HueError::MissingResource {
                kind,
                id: path.to_string(),
            })
    }

    /// Write `body` to the resource at `path`.
    ///
    /// # Errors
    ///
    /// Returns transport or status errors; a multi-status answer is an
    /// error as well.
    #[tracing::instrument(skip(self, body))]
    pub async fn put<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), HueError> {
        let response = self
            .http
            .put(self.url(path))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;
        Self::check(path, response)?;
        Ok(())
    }

    /// Open the server-sent event stream. The response has no timeout; it
    /// stays open until the bridge or the caller drops it.
    ///
    /// # Errors
    ///
    /// Returns transport or status errors of the initial request.
    pub async fn open_event_stream(&self) -> Result<Response, HueError> {
        let response = self
            .http
            .get(self.url(EVENT_STREAM_PATH))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        Self::check(EVENT_STREAM_PATH, response)
    }
}
