use jiff::{SignedDuration, Timestamp};
use tracing::{debug, warn};

use crate::{
    engine::{RawKinematics, SimulationEngine},
    lifecycle::fleet::Fleet,
    publish::publisher::{OutboundMessage, Publisher, Topics},
    telemetry::telemetry_synthesizer::TelemetrySynthesizer,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Vehicles for which both messages were handed to the publisher.
    pub published: usize,
    /// Active fleet vehicles without a sample this tick.
    pub skipped: usize,
}

/// Interval-gated sampling of every active fleet vehicle.
pub struct PublishScheduler {
    interval: SignedDuration,
    last_publish: SignedDuration,
    /// Wall-clock instant of simulation time zero.
    anchor: Timestamp,
    synthesizer: TelemetrySynthesizer,
    topics: Topics,
}

impl PublishScheduler {
    pub fn new(
        interval: SignedDuration,
        start: SignedDuration,
        anchor: Timestamp,
        synthesizer: TelemetrySynthesizer,
        topics: Topics,
    ) -> Self {
        PublishScheduler {
            interval,
            last_publish: start,
            anchor,
            synthesizer,
            topics,
        }
    }

    pub fn interval(&self) -> SignedDuration {
        self.interval
    }

    pub fn last_publish(&self) -> SignedDuration {
        self.last_publish
    }

    pub fn is_due(&self, now: SignedDuration) -> bool {
        now - self.last_publish >= self.interval
    }

    /// Called once per engine step. Returns a report when the interval has
    /// elapsed and a publish tick ran.
    pub fn on_step<E, P>(
        &mut self,
        engine: &E,
        fleet: &mut Fleet,
        publisher: &P,
        now: SignedDuration,
    ) -> Option<PublishReport>
    where
        E: SimulationEngine + ?Sized,
        P: Publisher + ?Sized,
    {
        if !self.is_due(now) {
            return None;
        }

        self.last_publish = now;

        let mut report = PublishReport::default();

        let timestamp = match self.anchor.checked_add(now) {
            Ok(timestamp) => timestamp,
            Err(err) => {
                warn!("Cannot timestamp samples at {}: {}", now, err);
                return Some(report);
            }
        };

        for vehicle_id in engine.active_vehicle_ids() {
            // background traffic is not part of the fleet
            let Some(daemon) = fleet.get_mut(&vehicle_id) else {
                continue;
            };

            let kinematics = match RawKinematics::read(engine, &vehicle_id) {
                Ok(kinematics) => kinematics,
                Err(err) => {
                    debug!("No sample for {} this tick: {}", vehicle_id, err);
                    report.skipped += 1;
                    continue;
                }
            };

            let record = daemon.sample(&self.synthesizer, &kinematics, timestamp);

            let messages = OutboundMessage::json(self.topics.gps(&vehicle_id), &record.gps_message())
                .and_then(|gps| {
                    OutboundMessage::json(
                        self.topics.telemetry(&vehicle_id),
                        &record.telemetry_message(),
                    )
                    .map(|telemetry| (gps, telemetry))
                });

            match messages {
                Ok((gps, telemetry)) => {
                    publisher.publish(gps);
                    publisher.publish(telemetry);
                    report.published += 1;
                }
                Err(err) => {
                    warn!("Could not serialize telemetry of {}: {}", vehicle_id, err);
                    report.skipped += 1;
                }
            }
        }

        debug!(
            "Publish tick at {}: {} published, {} skipped",
            now, report.published, report.skipped
        );

        Some(report)
    }
}
