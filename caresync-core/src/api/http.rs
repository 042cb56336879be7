//! HTTP client for the platform's REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use super::{ApiError, ReachabilityProbe, RemoteApi};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default path probed to decide whether the backend is reachable.
pub const DEFAULT_HEALTH_PATH: &str = "/api/health";

/// REST client for the platform backend.
#[derive(Debug, Clone)]
pub struct HttpApi {
    base_url: String,
    api_key: Option<String>,
    health_path: String,
    client: Client,
}

impl HttpApi {
    /// Creates a client for `base_url` with the given request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: normalize_base_url(&base_url.into()),
            api_key,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            client,
        })
    }

    /// Overrides the path used by the reachability probe.
    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    /// Returns the normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_path(&self) -> &str {
        &self.health_path
    }

    /// Builds the absolute URL for `path`.
    fn build_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn fetch(&self, path: &str) -> Result<Value, ApiError> {
        let response = self
            .authorize(self.client.get(self.build_url(path)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status().as_u16(),
                path: path.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<(), ApiError> {
        let response = self
            .authorize(self.client.post(self.build_url(path)))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                status: response.status().as_u16(),
                path: path.to_string(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl ReachabilityProbe for HttpApi {
    async fn check(&self) -> bool {
        match self
            .client
            .get(self.build_url(&self.health_path))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Reachability probe failed: {}", e);
                false
            }
        }
    }
}

/// Adds a scheme to bare hosts and trims trailing slashes.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim();
    let with_scheme = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    };
    with_scheme.trim_end_matches('/').to_string()
}
