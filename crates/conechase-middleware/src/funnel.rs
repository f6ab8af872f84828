//! Single-consumer event funnel.
//!
//! Asynchronous sources never touch controller state.  [`register`] spawns
//! one forwarder task per source topic; each forwarder only enqueues a
//! [`StateEvent`] onto one bounded `mpsc` channel whose receiver the
//! controller drains at its own pace.
//!
//! The returned [`SourceRegistration`] is the unregister handle: dropping it
//! (normal exit, early return or panic unwind) aborts every forwarder, after
//! which the sources see one subscriber fewer.

use conechase_types::{ConeObservation, EventPayload};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bus::{EventBus, Topic};

/// Events delivered to the controller's consumption point.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    ConeLocations(Vec<ConeObservation>),
    Touch(bool),
}

impl StateEvent {
    fn from_payload(payload: EventPayload) -> Option<Self> {
        match payload {
            EventPayload::ConeLocations(cones) => Some(StateEvent::ConeLocations(cones)),
            EventPayload::Touch(touched) => Some(StateEvent::Touch(touched)),
            _ => None,
        }
    }
}

/// Live subscription of one run to its event sources.
#[derive(Debug)]
pub struct SourceRegistration {
    topics: Vec<Topic>,
    forwarders: Vec<JoinHandle<()>>,
}

impl SourceRegistration {
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Stop forwarding.  Equivalent to dropping the registration.
    pub fn unregister(self) {}
}

impl Drop for SourceRegistration {
    fn drop(&mut self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
        debug!(topics = ?self.topics, "event sources unregistered");
    }
}

/// Subscribe to `topics` and funnel their events into one receiver.
///
/// Subscriptions are taken before this function returns, so nothing
/// published afterwards is missed.  Must be called inside a Tokio runtime.
pub fn register(
    bus: &EventBus,
    topics: &[Topic],
    capacity: usize,
) -> (SourceRegistration, mpsc::Receiver<StateEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let forwarders = topics
        .iter()
        .map(|&topic| {
            let mut source = bus.subscribe_to(topic);
            let tx = tx.clone();
            tokio::spawn(async move {
                loop {
                    match source.recv().await {
                        Ok(event) => {
                            let Some(state_event) = StateEvent::from_payload(event.payload) else {
                                continue;
                            };
                            if tx.send(state_event).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!(topic = topic.as_str(), lagged_by = n, "event source lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        })
        .collect();
    debug!(?topics, "event sources registered");
    (
        SourceRegistration {
            topics: topics.to_vec(),
            forwarders,
        },
        rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use conechase_types::{CommandMessage, Event};
    use std::time::Duration;

    const SOURCES: [Topic; 2] = [Topic::Perception, Topic::Touch];

    #[tokio::test]
    async fn funnels_both_sources_into_one_receiver() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let (_registration, mut rx) = register(&bus, &SOURCES, 16);

        bus.publish_to(Topic::Touch, Event::new("test", EventPayload::Touch(true)))?;
        assert_eq!(rx.recv().await, Some(StateEvent::Touch(true)));

        let cone = ConeObservation { x: 1.0, y: 2.0, z: 0.0 };
        bus.publish_to(
            Topic::Perception,
            Event::new("test", EventPayload::ConeLocations(vec![cone])),
        )?;
        assert_eq!(rx.recv().await, Some(StateEvent::ConeLocations(vec![cone])));
        Ok(())
    }

    #[tokio::test]
    async fn dropping_registration_unsubscribes() {
        let bus = EventBus::default();
        let (registration, mut rx) = register(&bus, &SOURCES, 16);
        assert_eq!(bus.receiver_count(Topic::Touch), 1);
        assert_eq!(registration.topics(), &SOURCES);

        registration.unregister();
        // Aborted tasks release their receivers once the runtime reaps them.
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(bus.receiver_count(Topic::Touch), 0);
        assert_eq!(bus.receiver_count(Topic::Perception), 0);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn ignores_foreign_payloads() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let (_registration, mut rx) = register(&bus, &[Topic::Touch], 16);

        let command = CommandMessage {
            state_name: "Driving_toward_cone".to_string(),
            cmd: "START".to_string(),
        };
        bus.publish_to(Topic::Touch, Event::new("test", EventPayload::Command(command)))?;
        bus.publish_to(Topic::Touch, Event::new("test", EventPayload::Touch(false)))?;

        assert_eq!(rx.recv().await, Some(StateEvent::Touch(false)));
        Ok(())
    }
}
