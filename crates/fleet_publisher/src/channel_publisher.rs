use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use fleet_core::publish::publisher::{OutboundMessage, Publisher};
use serde::Serialize;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::{JoinError, JoinHandle},
};
use tracing::{error, info, warn};

use crate::transport::Transport;

/// Hands messages to the publisher worker without blocking. When the queue is
/// full the message is dropped and counted.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<OutboundMessage>,
    dropped: Arc<AtomicUsize>,
}

impl ChannelPublisher {
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, message: OutboundMessage) {
        match self.sender.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Publish queue full, dropping message on {}", message.topic);
            }
            Err(TrySendError::Closed(message)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Publisher stopped, dropping message on {}", message.topic);
            }
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub sent: usize,
    pub failed: usize,
    pub dropped: usize,
}

pub struct PublisherHandle {
    join: JoinHandle<PublisherStats>,
    dropped: Arc<AtomicUsize>,
}

impl PublisherHandle {
    /// Waits until every `ChannelPublisher` is gone and the queue is drained.
    pub async fn shutdown(self) -> Result<PublisherStats, JoinError> {
        let stats = self.join.await?;

        Ok(PublisherStats {
            dropped: self.dropped.load(Ordering::Relaxed),
            ..stats
        })
    }
}

/// Spawns the worker that forwards queued messages to `transport`, one at a
/// time and in order. Must be called from within a tokio runtime.
pub fn spawn_publisher<T>(transport: T, capacity: usize) -> (ChannelPublisher, PublisherHandle)
where
    T: Transport,
{
    let (sender, mut receiver) = mpsc::channel::<OutboundMessage>(capacity.max(1));
    let dropped = Arc::new(AtomicUsize::new(0));

    let join = tokio::spawn(async move {
        let mut stats = PublisherStats::default();

        while let Some(message) = receiver.recv().await {
            match transport.send(&message).await {
                Ok(()) => stats.sent += 1,
                Err(err) => {
                    stats.failed += 1;
                    error!("Failed to publish on {}: {}", message.topic, err);
                }
            }
        }

        info!("Publisher stopped, {} sent, {} failed", stats.sent, stats.failed);
        stats
    });

    (
        ChannelPublisher {
            sender,
            dropped: Arc::clone(&dropped),
        },
        PublisherHandle { join, dropped },
    )
}
