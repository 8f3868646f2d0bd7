use fleet_core::publish::publisher::OutboundMessage;
use tracing::info;

use crate::transport::{Transport, TransportError};

/// Writes every message to the log instead of a broker.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl Transport for LogTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        info!(topic = %message.topic, "{}", String::from_utf8_lossy(&message.payload));
        Ok(())
    }
}
