//! Typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Commands`] | Executor `START` / `RESET` / `PAUSE` messages |
//! | [`Topic::Perception`] | Cone location frames from the camera pipeline |
//! | [`Topic::Touch`] | Bumper / touch sensor readings |
//! | [`Topic::ExecutorReports`] | `DONE` transition reports back to the executor |

use conechase_types::{ConeError, Event};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Inbound executor commands.
    Commands,
    /// Inbound cone location frames.
    Perception,
    /// Inbound touch sensor readings.
    Touch,
    /// Outbound transition reports.
    ExecutorReports,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Commands => "commands",
            Topic::Perception => "perception",
            Topic::Touch => "touch",
            Topic::ExecutorReports => "executor_reports",
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    commands: broadcast::Sender<Event>,
    perception: broadcast::Sender<Event>,
    touch: broadcast::Sender<Event>,
    executor_reports: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (commands, _) = broadcast::channel(capacity);
        let (perception, _) = broadcast::channel(capacity);
        let (touch, _) = broadcast::channel(capacity);
        let (executor_reports, _) = broadcast::channel(capacity);
        Self {
            commands,
            perception,
            touch,
            executor_reports,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    ///
    /// # Errors
    ///
    /// Returns [`ConeError::Channel`] when nobody is subscribed to `topic`.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, ConeError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| ConeError::Channel(format!("no subscribers for topic {}", topic.as_str())))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn receiver_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Commands => &self.commands,
            Topic::Perception => &self.perception,
            Topic::Touch => &self.touch,
            Topic::ExecutorReports => &self.executor_reports,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// A receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
#[derive(Debug)]
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(RecvError::Lagged(n))` – the subscriber fell behind and `n`
    ///   messages were dropped.  The caller decides whether to continue.
    /// * `Err(RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, RecvError> {
        self.receiver.recv().await
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
