//! HTTP client utilities.

use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpSettings;
use crate::sources::{SourceError, Stage};

/// HTTP client handed explicitly to every provider.
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::from_settings(&HttpSettings::default())
    }

    /// Create a client from configured user agent and timeouts
    pub fn from_settings(settings: &HttpSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// GET `url` and return the body, mapping every failure to
    /// [`SourceError::ProviderUnavailable`] for `stage`.
    pub async fn get_text(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        stage: Stage,
    ) -> Result<String, SourceError> {
        tracing::debug!(%stage, url, "sending request");

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("request timed out: {}", e)
            } else {
                format!("request failed: {}", e)
            };
            tracing::warn!(%stage, %reason, "transport failure");
            SourceError::unavailable(stage, reason)
        })?;

        let status = response.status();
        tracing::debug!(%stage, status = status.as_u16(), "response received");

        if !status.is_success() {
            let reason = describe_status(status);
            tracing::warn!(%stage, %reason, "non-success status");
            return Err(SourceError::unavailable(stage, reason));
        }

        response
            .text()
            .await
            .map_err(|e| SourceError::unavailable(stage, format!("failed to read body: {}", e)))
    }
}

/// Distinguish rate limiting and blocking from other failures in logs
fn describe_status(status: StatusCode) -> String {
    match status {
        StatusCode::TOO_MANY_REQUESTS => format!("rate limited (HTTP {})", status),
        StatusCode::FORBIDDEN => format!("blocked (HTTP {})", status),
        _ => format!("HTTP status {}", status),
    }
}
