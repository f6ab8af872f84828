//! `conechase-middleware` – Message plumbing
//!
//! Routes asynchronous data between the executor, the perception pipeline,
//! the touch sensor and the state controller without caring about the data's
//! meaning.
//!
//! # Modules
//!
//! - [`bus`] – Typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.
//! - [`bridge`] – Newline-delimited JSON bridge between an external byte
//!   stream and the bus.
//! - [`funnel`] – Forwards perception and touch events into one
//!   single-consumer queue; unregisters on drop.
//! - [`handshake`] – Executor command intake and exactly-once `DONE`
//!   reporting.

pub mod bridge;
pub mod bus;
pub mod funnel;
pub mod handshake;

pub use bridge::{InboundFrame, MessageBridge, ReportStream};
pub use bus::{EventBus, Topic, TopicReceiver};
pub use funnel::{SourceRegistration, StateEvent, register};
pub use handshake::{DoneReporter, ExecutorHandshake, parse_command};
