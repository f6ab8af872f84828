//! [`ExecutorHandshake`] – command intake and `DONE` reporting for one
//! mission state.
//!
//! Inbound commands are filtered by state name: anything addressed to another
//! state is discarded, never queued.  Among several pending commands for this
//! state the most recent one wins.
//!
//! Outbound reporting goes through a [`DoneReporter`] obtained once per run.
//! [`DoneReporter::report_done`] consumes the reporter, so a run cannot
//! report twice.

use conechase_types::{
    Command, CommandKind, CommandMessage, ConeError, Event, EventPayload, ExecMessage,
    ExecutorReport, StateIdentity, TransitionOutcome,
};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Topic, TopicReceiver};

/// Interpret a raw command message for `identity`.
///
/// Returns `None` when the message targets another state or carries an
/// unknown verb; the latter is logged as `Invalid cmd`.
pub fn parse_command(identity: StateIdentity, message: &CommandMessage) -> Option<Command> {
    if message.state_name != identity.as_str() {
        debug!(state = %identity, target = %message.state_name, "command for another state ignored");
        return None;
    }
    match message.cmd.parse::<CommandKind>() {
        Ok(kind) => Some(Command {
            target: identity,
            kind,
        }),
        Err(_) => {
            warn!(state = %identity, cmd = %message.cmd, "Invalid cmd");
            None
        }
    }
}

/// The executor-facing side of one mission state.
#[derive(Debug)]
pub struct ExecutorHandshake {
    identity: StateIdentity,
    bus: EventBus,
    commands: TopicReceiver,
}

impl ExecutorHandshake {
    /// Subscribe to [`Topic::Commands`] on behalf of `identity`.
    pub fn new(identity: StateIdentity, bus: &EventBus) -> Self {
        Self {
            identity,
            bus: bus.clone(),
            commands: bus.subscribe_to(Topic::Commands),
        }
    }

    pub fn identity(&self) -> StateIdentity {
        self.identity
    }

    /// Drain pending commands without waiting and return the latest one
    /// addressed to this state.
    pub fn try_recv_command(&mut self) -> Option<Command> {
        let mut latest = None;
        loop {
            match self.commands.try_recv() {
                Ok(event) => {
                    if let Some(command) = self.accept(event) {
                        latest = Some(command);
                    }
                }
                Err(TryRecvError::Lagged(n)) => {
                    warn!(state = %self.identity, lagged_by = n, "command intake lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return latest,
            }
        }
    }

    /// Wait for the next command addressed to this state.
    ///
    /// Cancel-safe: dropping the future loses no command.
    ///
    /// # Errors
    ///
    /// Returns [`ConeError::Channel`] once the command topic is closed.
    pub async fn recv_command(&mut self) -> Result<Command, ConeError> {
        loop {
            match self.commands.recv().await {
                Ok(event) => {
                    if let Some(command) = self.accept(event) {
                        return Ok(command);
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(state = %self.identity, lagged_by = n, "command intake lagged");
                }
                Err(RecvError::Closed) => {
                    return Err(ConeError::Channel("command topic closed".to_string()));
                }
            }
        }
    }

    /// Hand out the single reporter for a new run.
    pub fn begin_run(&self) -> DoneReporter {
        DoneReporter {
            identity: self.identity,
            bus: self.bus.clone(),
        }
    }

    fn accept(&self, event: Event) -> Option<Command> {
        match event.payload {
            EventPayload::Command(message) => parse_command(self.identity, &message),
            _ => None,
        }
    }
}

/// Sends exactly one `DONE` report for one run.
#[derive(Debug)]
#[must_use = "a run must report its outcome"]
pub struct DoneReporter {
    identity: StateIdentity,
    bus: EventBus,
}

impl DoneReporter {
    /// Publish the run's outcome on [`Topic::ExecutorReports`].
    ///
    /// # Errors
    ///
    /// Returns [`ConeError::Channel`] if nobody is listening for reports.
    pub fn report_done(self, outcome: TransitionOutcome) -> Result<ExecutorReport, ConeError> {
        let report = ExecutorReport {
            state_name: self.identity.to_string(),
            msg: ExecMessage::Done,
            outcome,
        };
        let event = Event::new(
            "conechase-middleware::handshake/done",
            EventPayload::Report(report.clone()),
        );
        self.bus.publish_to(Topic::ExecutorReports, event)?;
        info!(state = %self.identity, outcome = %outcome, next = ?outcome.next_state(), "DONE reported");
        Ok(report)
    }
}
