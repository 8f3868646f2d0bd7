use std::future::Future;

use fleet_core::publish::publisher::OutboundMessage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid endpoint {0}")]
    InvalidUrl(String),

    #[error("Missing environment variable {0}")]
    MissingConfig(&'static str),
}

impl TransportError {
    /// Network failures, server errors and throttling may succeed on a later
    /// attempt. Client errors and configuration problems never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Request(err) => !err.is_builder(),
            TransportError::Api { status, .. } => *status >= 500 || *status == 429,
            TransportError::InvalidUrl(_) | TransportError::MissingConfig(_) => false,
        }
    }
}

/// Delivery guarantee requested from the broker.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    AtMostOnce,
    #[default]
    AtLeastOnce,
}

impl Qos {
    pub fn level(&self) -> u8 {
        match self {
            Qos::AtMostOnce => 0,
            Qos::AtLeastOnce => 1,
        }
    }
}

/// Sends one message to the outside world. Runs on the publisher worker,
/// never on the simulation thread.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, message: &OutboundMessage) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16) -> TransportError {
        TransportError::Api {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(api_error(500).is_retryable());
        assert!(api_error(503).is_retryable());
        assert!(api_error(429).is_retryable());

        assert!(!api_error(400).is_retryable());
        assert!(!api_error(401).is_retryable());
        assert!(!api_error(404).is_retryable());
        assert!(!TransportError::InvalidUrl(String::from("nope")).is_retryable());
        assert!(!TransportError::MissingConfig("FLEET_PUBLISH_URL").is_retryable());
    }
}
