//! HTTP dataset source.

use std::time::Duration;

use async_trait::async_trait;
use tracing::instrument;

use gapfill_core::traits::DatasetSource;
use gapfill_core::DatasetError;

use crate::error::ProviderError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fetches datasets over HTTP(S).
pub struct HttpSource {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpSource {
    pub fn new(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::NetworkError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs,
        })
    }

    async fn get(&self, url: &str) -> Result<String, ProviderError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                ProviderError::NetworkError(format!("could not connect to {url}"))
            } else {
                ProviderError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(ProviderError::NotFound(url.to_string()));
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::HttpStatus {
                status,
                message: body,
            });
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(format!("failed to read response: {e}")))
    }
}

#[async_trait]
impl DatasetSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    fn accepts(&self, location: &str) -> bool {
        location.starts_with("http://") || location.starts_with("https://")
    }

    #[instrument(skip(self))]
    async fn fetch(&self, location: &str) -> Result<String, DatasetError> {
        self.get(location)
            .await
            .map_err(|e| e.into_fetch_error(location))
    }
}
