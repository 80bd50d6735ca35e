use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use tracking_core::model::{SessionDelta, SessionId};

use crate::error::{ApiError, ConfigError};
use crate::wire::{CreateSessionRequest, CreateSessionResponse, UpdateSessionResponse};

/// Path of the session collection, relative to the API base URL.
pub const TRACKPROGRESS_PATH: &str = "api/logger/trackprogress/";

const CSRF_HEADER: &str = "X-CSRFToken";

//
// ─── API CONTRACT ──────────────────────────────────────────────────────────────
//

/// Server operations a progress tracker needs.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Create a session, or resume the server's open one for the same context.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the response is malformed.
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, ApiError>;

    /// Send accumulated changes for a session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the response is malformed.
    async fn update_session(
        &self,
        session_id: &SessionId,
        delta: &SessionDelta,
    ) -> Result<UpdateSessionResponse, ApiError>;
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: Url,
    pub csrf_token: Option<String>,
    pub timeout: Duration,
}

impl ApiConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if `base_url` does not parse.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        // Url::join drops the last segment unless the base ends with '/'.
        let mut base = base_url.trim().to_owned();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            base_url: Url::parse(&base)?,
            csrf_token: None,
            timeout: Duration::from_secs(30),
        })
    }

    #[must_use]
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `PROGRESS_API_BASE_URL`, and optionally `PROGRESS_API_CSRF_TOKEN`
    /// and `PROGRESS_API_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is missing or invalid, or the
    /// timeout is not a whole number of seconds.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var("PROGRESS_API_BASE_URL")
            .map_err(|_| ConfigError::MissingVar("PROGRESS_API_BASE_URL"))?;
        let mut config = Self::new(&base_url)?;

        if let Ok(token) = env::var("PROGRESS_API_CSRF_TOKEN") {
            if !token.trim().is_empty() {
                config.csrf_token = Some(token);
            }
        }
        if let Ok(raw) = env::var("PROGRESS_API_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

//
// ─── HTTP CLIENT ───────────────────────────────────────────────────────────────
//

/// `SessionApi` over the REST endpoint.
#[derive(Clone, Debug)]
pub struct HttpSessionApi {
    client: Client,
    collection_url: Url,
    csrf_token: Option<String>,
}

impl HttpSessionApi {
    /// # Errors
    ///
    /// Returns `ConfigError` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ConfigError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let collection_url = config.base_url.join(TRACKPROGRESS_PATH)?;
        Ok(Self {
            client,
            collection_url,
            csrf_token: config.csrf_token,
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError` if the environment is incomplete or the client
    /// cannot be built.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(ApiConfig::from_env()?)
    }

    #[must_use]
    pub fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    fn item_url(&self, session_id: &SessionId) -> Result<Url, ApiError> {
        self.collection_url
            .join(&format!("{session_id}/"))
            .map_err(|e| ApiError::Url(e.to_string()))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let request = match &self.csrf_token {
            Some(token) => request.header(CSRF_HEADER, token),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                retry_after: parse_retry_after(response.headers()),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn create_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreateSessionResponse, ApiError> {
        let builder = self.client.post(self.collection_url.clone()).json(request);
        self.send(builder).await
    }

    async fn update_session(
        &self,
        session_id: &SessionId,
        delta: &SessionDelta,
    ) -> Result<UpdateSessionResponse, ApiError> {
        let builder = self.client.put(self.item_url(session_id)?).json(delta);
        self.send(builder).await
    }
}

/// `Retry-After` in its delay-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()?;
    // Rejects negative, non-finite and out-of-range values.
    Duration::try_from_secs_f64(seconds).ok()
}
