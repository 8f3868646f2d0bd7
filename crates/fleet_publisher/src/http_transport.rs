use std::time::Duration;

use fleet_core::publish::publisher::OutboundMessage;
use reqwest::{Url, header::CONTENT_TYPE};
use tracing::{debug, warn};

use crate::transport::{Qos, Transport, TransportError};

pub const PUBLISH_URL_ENV_VAR: &str = "FLEET_PUBLISH_URL";
pub const PUBLISH_API_KEY_ENV_VAR: &str = "FLEET_PUBLISH_API_KEY";
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct HttpTransportParams {
    pub base_url: String,
    pub api_key: Option<String>,
    pub qos: Qos,
    /// Attempts per message with `Qos::AtLeastOnce`.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl HttpTransportParams {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpTransportParams {
            base_url: base_url.into(),
            api_key: None,
            qos: Qos::default(),
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
        }
    }

    /// Endpoint from `FLEET_PUBLISH_URL`, optional key from
    /// `FLEET_PUBLISH_API_KEY`.
    pub fn from_env() -> Result<Self, TransportError> {
        let base_url = std::env::var(PUBLISH_URL_ENV_VAR)
            .map_err(|_| TransportError::MissingConfig(PUBLISH_URL_ENV_VAR))?;

        Ok(HttpTransportParams {
            api_key: std::env::var(PUBLISH_API_KEY_ENV_VAR).ok(),
            ..Self::new(base_url)
        })
    }
}

/// Publishes every message as a JSON POST on `{base_url}/topics/{topic}`.
pub struct HttpTransport {
    params: HttpTransportParams,
    base_url: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(params: HttpTransportParams) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(params.timeout).build()?;
        Self::with_client(params, client)
    }

    pub fn with_client(params: HttpTransportParams, client: reqwest::Client) -> Result<Self, TransportError> {
        let base_url =
            Url::parse(&params.base_url).map_err(|_| TransportError::InvalidUrl(params.base_url.clone()))?;

        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(params.base_url));
        }

        Ok(HttpTransport {
            params,
            base_url,
            client,
        })
    }

    /// The topic is a single, percent-encoded path segment.
    pub fn topic_url(&self, topic: &str) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.params.base_url.clone()))?
            .pop_if_empty()
            .push("topics")
            .push(topic);

        url.query_pairs_mut()
            .append_pair("qos", &self.params.qos.level().to_string());

        Ok(url)
    }

    async fn post(&self, url: Url, message: &OutboundMessage) -> Result<(), TransportError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(message.payload.clone());

        if let Some(api_key) = &self.params.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }

        let response = request.send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(TransportError::Api { status, message })
        }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let url = self.topic_url(&message.topic)?;

        let max_attempts = match self.params.qos {
            Qos::AtMostOnce => 1,
            Qos::AtLeastOnce => self.params.max_attempts.max(1),
        };

        let mut attempt = 1;
        loop {
            match self.post(url.clone(), message).await {
                Ok(()) => {
                    debug!("Published {} (attempt {})", message.topic, attempt);
                    return Ok(());
                }
                Err(err) if attempt < max_attempts && err.is_retryable() => {
                    warn!(
                        "Publishing {} failed, attempt {}/{}: {}",
                        message.topic, attempt, max_attempts, err
                    );
                    tokio::time::sleep(self.params.retry_delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
