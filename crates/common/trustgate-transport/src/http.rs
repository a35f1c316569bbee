use crate::RegistryTransport;
use reqwest::Client;
use std::time::Duration;
use trustgate_types::{HttpConfig, TransportError};

/// Default timeout for registry requests.
const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 30;

/// reqwest-backed transport used in production.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, TransportError> {
        Self::new(config.timeout(), &config.user_agent)
    }

    pub fn with_defaults() -> Result<Self, TransportError> {
        Self::new(
            Duration::from_secs(DEFAULT_REGISTRY_TIMEOUT_SECS),
            &HttpConfig::default().user_agent,
        )
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RegistryTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        tracing::debug!("Fetching registry document from {}", url);

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!("Registry request to {} failed with status {}", url, status);
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.bytes().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            reason: format!("failed to read response body: {}", e),
        })?;

        tracing::debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }
}
