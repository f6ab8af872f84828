//! `conechase-runtime` – State execution
//!
//! Runs mission states: arms the vehicle, drives the control tick, decides
//! the exit, disarms and reports.
//!
//! # Modules
//!
//! - [`controller`] – [`ExecutionController`][controller::ExecutionController]:
//!   the generic per-state orchestrator, parameterised by a
//!   [`StateStrategy`][strategy::StateStrategy] and a
//!   [`VehicleControl`][conechase_hal::VehicleControl] implementation.
//! - [`strategy`] – [`StateStrategy`][strategy::StateStrategy] hooks and the
//!   [`DriveTowardCone`][strategy::DriveTowardCone] strategy.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: the global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod controller;
pub mod strategy;
pub mod telemetry;

pub use controller::{ControllerConfig, ExecutionController, RunPhase, RunSummary};
pub use strategy::{DriveTowardCone, StateStrategy};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
