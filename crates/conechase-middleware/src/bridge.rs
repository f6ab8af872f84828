//! Line-oriented message bridge.
//!
//! [`MessageBridge`]:
//!
//! 1. **Ingests** executor commands, cone location frames and touch readings
//!    and publishes them as [`Event`] values on the matching [`Topic`].
//!
//! 2. **Pumps** newline-delimited JSON [`InboundFrame`]s from any async reader
//!    (stdin in the `conechase` binary) into the ingest helpers.
//!
//! 3. **Writes** every [`ExecutorReport`] published on
//!    [`Topic::ExecutorReports`] to an async writer as one JSON object per
//!    line.
//!
//! The bridge does not interpret the data it routes; it only handles
//! serialisation and transport.
//!
//! # Inbound frame format
//!
//! ```json
//! {"type":"command","state_name":"Driving_toward_cone","cmd":"START"}
//! {"type":"cone_locations","cones":[{"x":-12.0,"y":80.0,"z":450.0}]}
//! {"type":"touch","data":true}
//! ```

use conechase_types::{
    CommandMessage, ConeError, ConeObservation, Event, EventPayload, ExecutorReport,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Topic, TopicReceiver};

const COMMAND_SOURCE: &str = "conechase-middleware::bridge/command";
const PERCEPTION_SOURCE: &str = "conechase-middleware::bridge/cone_locations";
const TOUCH_SOURCE: &str = "conechase-middleware::bridge/touch";

/// One inbound line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    Command { state_name: String, cmd: String },
    ConeLocations {
        #[serde(default)]
        cones: Vec<ConeObservation>,
    },
    Touch { data: bool },
}

impl InboundFrame {
    /// Parse one JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`ConeError::Serialization`] for malformed JSON or an unknown
    /// `type`.
    pub fn parse(line: &str) -> Result<Self, ConeError> {
        serde_json::from_str(line).map_err(|e| ConeError::Serialization(e.to_string()))
    }
}

/// Bridge between an external line protocol and the internal [`EventBus`].
#[derive(Clone, Debug)]
pub struct MessageBridge {
    bus: EventBus,
}

impl MessageBridge {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    // -----------------------------------------------------------------------
    // Ingest helpers
    // -----------------------------------------------------------------------

    /// Publish a raw executor command on [`Topic::Commands`].
    pub fn ingest_command(
        &self,
        state_name: impl Into<String>,
        cmd: impl Into<String>,
    ) -> Result<usize, ConeError> {
        let event = Event::new(
            COMMAND_SOURCE,
            EventPayload::Command(CommandMessage {
                state_name: state_name.into(),
                cmd: cmd.into(),
            }),
        );
        self.bus.publish_to(Topic::Commands, event)
    }

    /// Publish one perception frame on [`Topic::Perception`].  Empty frames
    /// are forwarded as-is.
    pub fn ingest_cone_locations(&self, cones: Vec<ConeObservation>) -> Result<usize, ConeError> {
        let event = Event::new(PERCEPTION_SOURCE, EventPayload::ConeLocations(cones));
        self.bus.publish_to(Topic::Perception, event)
    }

    /// Publish a touch reading on [`Topic::Touch`].
    pub fn ingest_touch(&self, touched: bool) -> Result<usize, ConeError> {
        let event = Event::new(TOUCH_SOURCE, EventPayload::Touch(touched));
        self.bus.publish_to(Topic::Touch, event)
    }

    /// Route an already-parsed frame to its ingest helper.
    pub fn ingest_frame(&self, frame: InboundFrame) -> Result<usize, ConeError> {
        match frame {
            InboundFrame::Command { state_name, cmd } => self.ingest_command(state_name, cmd),
            InboundFrame::ConeLocations { cones } => self.ingest_cone_locations(cones),
            InboundFrame::Touch { data } => self.ingest_touch(data),
        }
    }

    /// Parse and route one line.  Blank lines are ignored and return `Ok(0)`.
    pub fn ingest_line(&self, line: &str) -> Result<usize, ConeError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(0);
        }
        self.ingest_frame(InboundFrame::parse(line)?)
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    /// Read frames from `reader` until EOF or shutdown.
    ///
    /// Malformed lines are logged and skipped.  Frames published while
    /// nobody listens on their topic (perception outside a run, for example)
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConeError::Channel`] if reading from `reader` fails.
    pub async fn pump_lines<R>(
        &self,
        reader: R,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ConeError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = line.map_err(|e| ConeError::Channel(format!("inbound read error: {e}")))?;
                    let Some(line) = line else {
                        info!("inbound stream closed");
                        return Ok(());
                    };
                    match self.ingest_line(&line) {
                        Ok(_) => {}
                        Err(ConeError::Channel(reason)) => debug!(%reason, "inbound frame dropped"),
                        Err(e) => warn!(error = %e, "ignoring malformed inbound frame"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Subscribe to [`Topic::ExecutorReports`] now, so no report published
    /// after this call is missed.
    pub fn report_stream(&self) -> ReportStream {
        ReportStream {
            receiver: self.bus.subscribe_to(Topic::ExecutorReports),
        }
    }
}

/// Outbound report writer obtained from [`MessageBridge::report_stream`].
#[derive(Debug)]
pub struct ReportStream {
    receiver: TopicReceiver,
}

impl ReportStream {
    /// Write each report as a JSON line until the bus closes or `stop` is
    /// raised.  Reports already buffered when `stop` is raised are still
    /// written.
    ///
    /// `stop` should be raised once every publisher is done, not on process
    /// shutdown: a run interrupted by shutdown publishes its `aborted` report
    /// after the shutdown flag flips.
    ///
    /// # Errors
    ///
    /// Returns [`ConeError::Serialization`] if a report cannot be encoded
    /// and [`ConeError::Channel`] if the writer fails.
    pub async fn write_to<W>(
        mut self,
        mut writer: W,
        mut stop: watch::Receiver<bool>,
    ) -> Result<(), ConeError>
    where
        W: AsyncWrite + Unpin,
    {
        loop {
            tokio::select! {
                result = self.receiver.recv() => {
                    match result {
                        Ok(Event { payload: EventPayload::Report(report), .. }) => {
                            write_report(&mut writer, &report).await?;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(n)) => warn!(lagged_by = n, "report writer lagged"),
                        Err(RecvError::Closed) => return Ok(()),
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        self.drain(&mut writer).await?;
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Flush reports already buffered on the channel.
    async fn drain<W: AsyncWrite + Unpin>(&mut self, writer: &mut W) -> Result<(), ConeError> {
        while let Ok(event) = self.receiver.try_recv() {
            if let EventPayload::Report(report) = event.payload {
                write_report(writer, &report).await?;
            }
        }
        Ok(())
    }
}

async fn write_report<W: AsyncWrite + Unpin>(
    writer: &mut W,
    report: &ExecutorReport,
) -> Result<(), ConeError> {
    let mut json =
        serde_json::to_string(report).map_err(|e| ConeError::Serialization(e.to_string()))?;
    json.push('\n');
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| ConeError::Channel(format!("report write error: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| ConeError::Channel(format!("report flush error: {e}")))
}
