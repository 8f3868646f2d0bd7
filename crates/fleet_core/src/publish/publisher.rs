use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::vehicle::VehicleId;

/// Topic plus serialized JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    pub fn json<T>(topic: String, payload: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize,
    {
        Ok(OutboundMessage {
            topic,
            payload: serde_json::to_vec(payload)?,
        })
    }
}

/// Fire-and-forget boundary to the transport. Implementations must not block
/// the caller on network I/O and never report delivery failures back.
pub trait Publisher {
    fn publish(&self, message: OutboundMessage);
}

impl<P> Publisher for Arc<P>
where
    P: Publisher + ?Sized,
{
    fn publish(&self, message: OutboundMessage) {
        (**self).publish(message)
    }
}

impl<P> Publisher for &P
where
    P: Publisher + ?Sized,
{
    fn publish(&self, message: OutboundMessage) {
        (**self).publish(message)
    }
}

/// Per-vehicle topic names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Topics {
            prefix: prefix.into(),
        }
    }

    pub fn gps(&self, vehicle_id: &VehicleId) -> String {
        format!("{}/{}/gps", self.prefix, vehicle_id)
    }

    pub fn telemetry(&self, vehicle_id: &VehicleId) -> String {
        format!("{}/{}/telemetry", self.prefix, vehicle_id)
    }
}

/// Keeps every message in memory. Used for dry runs and tests.
#[derive(Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<OutboundMessage>>,
}

impl MemoryPublisher {
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&self, message: OutboundMessage) {
        self.messages.lock().push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        let topics = Topics::new("fleet");
        let vehicle_id = VehicleId::new("veh_7");

        assert_eq!(topics.gps(&vehicle_id), "fleet/veh_7/gps");
        assert_eq!(topics.telemetry(&vehicle_id), "fleet/veh_7/telemetry");
    }

    #[test]
    fn test_memory_publisher_through_arc() {
        let publisher = Arc::new(MemoryPublisher::default());
        let shared = Arc::clone(&publisher);

        shared.publish(
            OutboundMessage::json("fleet/veh_1/gps".to_owned(), &serde_json::json!({ "a": 1 }))
                .unwrap(),
        );

        assert_eq!(publisher.len(), 1);
        assert_eq!(publisher.take()[0].payload, br#"{"a":1}"#.to_vec());
        assert!(publisher.is_empty());
    }
}
