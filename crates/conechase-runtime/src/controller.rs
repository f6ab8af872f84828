//! [`ExecutionController`] – one mission state's run, from arm to report.
//!
//! ```text
//! Idle ─START─▶ Armed ─▶ RunningLoop ─break─▶ Disarming ─▶ Reported
//! ```
//!
//! Each run:
//!
//! 1. **Hold** – the vehicle is put in `HOLD` and disarmed as a precaution.
//! 2. **Calibrate** – RC1/RC3 limits are read once; failure ends the run
//!    before arming and no outcome is reported.
//! 3. **Arm** – `MANUAL` mode, motors armed, deadline set.
//! 4. **Loop** – perception and touch arrive through one
//!    [`funnel`][conechase_middleware::funnel] receiver and only update the
//!    latest values.  Every tick pulls the latest command, checks the exit
//!    conditions in priority order (touch, command ≠ `START`, deadline) and
//!    then applies the newest perception frame, if any.
//! 5. **Disarm** – sources are unregistered, a neutral command is sent, the
//!    vehicle goes to `HOLD` and is disarmed.  Every step is attempted even
//!    if an earlier one fails, and shutdown takes the same path.
//! 6. **Report** – the strategy's decision table turns the exit condition
//!    into flags, the fixed priority picks the outcome, and exactly one
//!    `DONE` is published.

use std::time::Duration;

use conechase_hal::{VehicleControl, VehicleMode, fetch_limits};
use conechase_kernel::{BreakCondition, OutcomeFlags, TimeoutTimer, TouchLatch, evaluate_tick};
use conechase_middleware::{
    DoneReporter, EventBus, ExecutorHandshake, StateEvent, Topic, register,
};
use conechase_types::{
    ActuatorCommand, CalibrationLimits, Command, CommandKind, ConeError, ConeObservation,
    ExecutorReport, StateIdentity, TransitionOutcome,
};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::strategy::StateStrategy;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Event sources a run subscribes to.
const RUN_SOURCES: [Topic; 2] = [Topic::Perception, Topic::Touch];

/// Timing and buffering for [`ExecutionController`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    /// Time allotted to one run before `segment_timeout`.
    pub segment_duration: Duration,
    /// Period of the control tick.
    pub tick_period: Duration,
    /// Capacity of the perception/touch funnel.
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            segment_duration: Duration::from_secs(30),
            tick_period: Duration::from_millis(500),
            event_capacity: 64,
        }
    }
}

impl ControllerConfig {
    /// Set the segment duration in seconds.  Negative or non-finite values
    /// leave the current duration unchanged.
    pub fn with_segment_secs(mut self, secs: f64) -> Self {
        if let Ok(duration) = Duration::try_from_secs_f64(secs) {
            self.segment_duration = duration;
        }
        self
    }

    /// Set the tick rate in hertz.  Non-positive or non-finite rates leave
    /// the current period unchanged.
    pub fn with_tick_hz(mut self, hz: f64) -> Self {
        if hz.is_finite() && hz > 0.0 {
            if let Ok(period) = Duration::try_from_secs_f64(1.0 / hz) {
                if !period.is_zero() {
                    self.tick_period = period;
                }
            }
        }
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run bookkeeping
// ─────────────────────────────────────────────────────────────────────────────

/// Where the controller is within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Armed,
    RunningLoop,
    Disarming,
    Reported,
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub condition: BreakCondition,
    pub flags: OutcomeFlags,
    pub outcome: TransitionOutcome,
    /// Last servo command applied from perception, if any.
    pub last_command: Option<ActuatorCommand>,
    pub report: ExecutorReport,
}

/// Values owned by the loop for the lifetime of one run.
struct RunState {
    limits: CalibrationLimits,
    timer: TimeoutTimer,
    latch: TouchLatch,
    command: CommandKind,
    pending_frame: Option<Vec<ConeObservation>>,
    last_command: Option<ActuatorCommand>,
    last_countdown: Option<u64>,
}

impl RunState {
    /// Fresh state with the deadline armed from the current instant.
    fn start(limits: CalibrationLimits, segment: Duration) -> Self {
        Self {
            limits,
            timer: TimeoutTimer::arm(Instant::now().into_std(), segment),
            latch: TouchLatch::new(),
            command: CommandKind::Start,
            pending_frame: None,
            last_command: None,
            last_countdown: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ExecutionController
// ─────────────────────────────────────────────────────────────────────────────

/// Generic orchestrator for one mission state.
pub struct ExecutionController<S, V> {
    strategy: S,
    vehicle: V,
    bus: EventBus,
    handshake: ExecutorHandshake,
    config: ControllerConfig,
    phase: RunPhase,
}

impl<S, V> ExecutionController<S, V>
where
    S: StateStrategy,
    V: VehicleControl,
{
    /// Build a controller and subscribe it to executor commands on `bus`.
    pub fn new(strategy: S, vehicle: V, bus: &EventBus, config: ControllerConfig) -> Self {
        let handshake = ExecutorHandshake::new(strategy.identity(), bus);
        Self {
            strategy,
            vehicle,
            bus: bus.clone(),
            handshake,
            config,
            phase: RunPhase::Idle,
        }
    }

    pub fn identity(&self) -> StateIdentity {
        self.handshake.identity()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Idle loop: wait for commands and run on `START` until shutdown.
    ///
    /// `RESET` and `PAUSE` received while idle put the vehicle in `HOLD` and
    /// disarm it.  Runs that fail at startup are logged and the controller
    /// returns to idle.
    ///
    /// # Errors
    ///
    /// Returns [`ConeError::Channel`] once the command topic closes.
    pub async fn serve(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ConeError> {
        info!(state = %self.identity(), "waiting for executor commands");
        loop {
            if *shutdown.borrow() {
                info!(state = %self.identity(), "shutdown requested; leaving idle loop");
                return Ok(());
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
                command = self.handshake.recv_command() => {
                    let command = command?;
                    match command.kind {
                        CommandKind::Start => match self.execute(command, &mut shutdown).await {
                            Ok(summary) => {
                                if summary.condition == BreakCondition::Shutdown {
                                    return Ok(());
                                }
                            }
                            Err(e) if e.is_fatal_startup() => {
                                error!(state = %self.identity(), error = %e, "run failed at startup");
                            }
                            Err(e) => {
                                error!(state = %self.identity(), error = %e, "run failed");
                            }
                        },
                        CommandKind::Reset | CommandKind::Pause => {
                            info!(state = %self.identity(), cmd = %command.kind, "idle hold requested");
                            if let Err(e) = self.hold_and_disarm() {
                                error!(state = %self.identity(), error = %e, "idle hold failed");
                            }
                        }
                    }
                }
            }
        }
    }

    /// Perform one run for a `START` command.
    ///
    /// # Errors
    ///
    /// * [`ConeError::NotStarted`] if `command` is not `START`.
    /// * [`ConeError::CalibrationUnavailable`] / [`ConeError::InvalidCalibration`]
    ///   if limits cannot be read; nothing is armed or reported.
    /// * [`ConeError::VehicleFault`] if the precautionary hold is rejected.
    /// * [`ConeError::Channel`] if the report cannot be delivered.
    #[instrument(skip(self, shutdown), fields(state = %self.identity()))]
    pub async fn execute(
        &mut self,
        command: Command,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<RunSummary, ConeError> {
        if command.kind != CommandKind::Start || command.target != self.identity() {
            return Err(ConeError::NotStarted);
        }
        self.phase = RunPhase::Idle;

        let (registration, mut events) =
            register(&self.bus, &RUN_SOURCES, self.config.event_capacity);
        let reporter = self.handshake.begin_run();

        self.hold_and_disarm()?;
        let limits = fetch_limits(&self.vehicle)?;
        info!(?limits, "calibration loaded");

        let (condition, last_command) = match self.arm() {
            Ok(()) => {
                let mut run = RunState::start(limits, self.config.segment_duration);
                self.phase = RunPhase::RunningLoop;
                self.strategy.enter(&limits);
                info!(
                    segment_secs = self.config.segment_duration.as_secs_f64(),
                    "armed; approaching"
                );
                let condition = self.run_loop(&mut run, &mut events, shutdown).await;
                (condition, run.last_command)
            }
            Err(e) => {
                error!(error = %e, "arming failed");
                (BreakCondition::VehicleFault, None)
            }
        };
        info!(%condition, "leaving control loop");

        self.phase = RunPhase::Disarming;
        registration.unregister();
        self.disarm(&limits);

        let flags = self.strategy.exit(condition);
        let outcome = flags.resolve();
        let report = self.report(reporter, outcome)?;

        Ok(RunSummary {
            condition,
            flags,
            outcome,
            last_command,
            report,
        })
    }

    async fn run_loop(
        &mut self,
        run: &mut RunState,
        events: &mut tokio::sync::mpsc::Receiver<StateEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> BreakCondition {
        let mut ticker = tokio::time::interval(self.config.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sources_open = true;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break BreakCondition::Shutdown;
                    }
                }
                event = events.recv(), if sources_open => match event {
                    Some(StateEvent::Touch(touched)) => {
                        if run.latch.record(touched) {
                            info!("touch detected");
                        }
                    }
                    Some(StateEvent::ConeLocations(cones)) => run.pending_frame = Some(cones),
                    None => {
                        warn!("event sources closed");
                        sources_open = false;
                    }
                },
                _ = ticker.tick() => {
                    if let Some(condition) = self.tick(run, shutdown) {
                        break condition;
                    }
                }
            }
        }
    }

    /// One control tick.  Returns the exit condition, if any.
    fn tick(&mut self, run: &mut RunState, shutdown: &watch::Receiver<bool>) -> Option<BreakCondition> {
        if *shutdown.borrow() {
            return Some(BreakCondition::Shutdown);
        }
        if let Some(command) = self.handshake.try_recv_command() {
            run.command = command.kind;
        }

        let now = Instant::now().into_std();
        if let Some(condition) = evaluate_tick(&run.latch, run.command, &run.timer, now) {
            return Some(condition);
        }

        let remaining = run.timer.remaining_secs(now);
        if run.last_countdown != Some(remaining) {
            info!("Timeout in: {remaining}");
            run.last_countdown = Some(remaining);
        }

        let frame = run.pending_frame.take()?;
        match self.strategy.evaluate(&frame, &run.limits) {
            Some(command) => {
                if let Err(e) = self
                    .vehicle
                    .set_throttle_servo(command.throttle_us, command.steering_us)
                {
                    error!(error = %e, "servo command rejected");
                    return Some(BreakCondition::VehicleFault);
                }
                debug!(
                    steering_us = command.steering_us,
                    throttle_us = command.throttle_us,
                    "servo command applied"
                );
                run.last_command = Some(command);
            }
            None => debug!("empty cone frame skipped"),
        }
        None
    }

    fn arm(&mut self) -> Result<(), ConeError> {
        self.vehicle.set_mode(VehicleMode::Manual)?;
        self.vehicle.set_arm(true)?;
        self.phase = RunPhase::Armed;
        Ok(())
    }

    fn hold_and_disarm(&mut self) -> Result<(), ConeError> {
        self.vehicle.set_mode(VehicleMode::Hold)?;
        self.vehicle.set_arm(false)
    }

    /// Neutral command, `HOLD`, disarm.  Each step runs even if the previous
    /// one failed.
    fn disarm(&mut self, limits: &CalibrationLimits) {
        let neutral = limits.neutral_command();
        if let Err(e) = self
            .vehicle
            .set_throttle_servo(neutral.throttle_us, neutral.steering_us)
        {
            error!(error = %e, "neutral command failed during disarm");
        }
        if let Err(e) = self.vehicle.set_mode(VehicleMode::Hold) {
            error!(error = %e, "HOLD failed during disarm");
        }
        if let Err(e) = self.vehicle.set_arm(false) {
            error!(error = %e, "disarm failed");
        }
        info!("vehicle disarmed");
    }

    /// Consuming `reporter` bounds each run to one `DONE`.  The phase only
    /// reaches `Reported` once the report is delivered.
    fn report(
        &mut self,
        reporter: DoneReporter,
        outcome: TransitionOutcome,
    ) -> Result<ExecutorReport, ConeError> {
        let report = reporter.report_done(outcome)?;
        self.phase = RunPhase::Reported;
        Ok(report)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::DriveTowardCone;
    use conechase_hal::planner::PlannerConfig;
    use conechase_hal::sim::{SimHandle, SimVehicle, VehicleCall};
    use conechase_middleware::{MessageBridge, TopicReceiver};
    use conechase_types::EventPayload;
    use tokio::sync::broadcast::error::TryRecvError;

    const STATE: &str = "Driving_toward_cone";

    fn start() -> Command {
        Command {
            target: StateIdentity::DrivingTowardCone,
            kind: CommandKind::Start,
        }
    }

    fn segment(secs: u64) -> ControllerConfig {
        ControllerConfig {
            segment_duration: Duration::from_secs(secs),
            ..ControllerConfig::default()
        }
    }

    struct Harness {
        controller: ExecutionController<DriveTowardCone, SimVehicle>,
        handle: SimHandle,
        bridge: MessageBridge,
        reports: TopicReceiver,
        shutdown_tx: watch::Sender<bool>,
        shutdown: watch::Receiver<bool>,
    }

    fn harness(vehicle: SimVehicle, strategy: DriveTowardCone, config: ControllerConfig) -> Harness {
        let bus = EventBus::default();
        let handle = vehicle.handle();
        let reports = bus.subscribe_to(Topic::ExecutorReports);
        let controller = ExecutionController::new(strategy, vehicle, &bus, config);
        let (shutdown_tx, shutdown) = watch::channel(false);
        Harness {
            controller,
            handle,
            bridge: MessageBridge::new(bus),
            reports,
            shutdown_tx,
            shutdown,
        }
    }

    fn default_harness(secs: u64) -> Harness {
        harness(SimVehicle::new(), DriveTowardCone::default(), segment(secs))
    }

    fn reported(reports: &mut TopicReceiver) -> Vec<TransitionOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match reports.try_recv() {
                Ok(event) => {
                    if let EventPayload::Report(report) = event.payload {
                        outcomes.push(report.outcome);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return outcomes,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    fn ends_disarmed(handle: &SimHandle) {
        let calls = handle.calls();
        let tail = &calls[calls.len() - 3..];
        assert!(matches!(tail[0], VehicleCall::SetThrottleServo { .. }));
        assert_eq!(tail[1], VehicleCall::SetMode(VehicleMode::Hold));
        assert_eq!(tail[2], VehicleCall::SetArm(false));
        assert!(!handle.armed());
    }

    #[tokio::test(start_paused = true)]
    async fn touch_reports_touched_cone_once() {
        let mut h = default_harness(30);
        let bridge = h.bridge.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            bridge.ingest_touch(false).ok();
            bridge.ingest_touch(true).ok();
        });

        let summary = h.controller.execute(start(), &mut h.shutdown).await.unwrap();

        assert_eq!(summary.condition, BreakCondition::Touched);
        assert_eq!(summary.outcome, TransitionOutcome::TouchedCone);
        assert_eq!(summary.report.state_name, STATE);
        assert_eq!(h.controller.phase(), RunPhase::Reported);
        assert_eq!(reported(&mut h.reports), vec![TransitionOutcome::TouchedCone]);
        ends_disarmed(&h.handle);
    }

    #[tokio::test(start_paused = true)]
    async fn final_cone_touch_reports_touched_last_cone() {
        let mut h = harness(
            SimVehicle::new(),
            DriveTowardCone::default().final_cone(true),
            segment(30),
        );
        let bridge = h.bridge.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            bridge.ingest_touch(true).ok();
        });

        let summary = h.controller.execute(start(), &mut h.shutdown).await.unwrap();
        assert_eq!(summary.outcome, TransitionOutcome::TouchedLastCone);
    }

    #[tokio::test(start_paused = true)]
    async fn segment_timeout_fires_no_earlier_than_deadline() {
        let mut h = default_harness(5);
        let started = Instant::now();

        let summary = h.controller.execute(start(), &mut h.shutdown).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(7));
        assert_eq!(summary.condition, BreakCondition::SegmentTimeout);
        assert_eq!(summary.outcome, TransitionOutcome::SegmentTimeout);
        assert_eq!(reported(&mut h.reports), vec![TransitionOutcome::SegmentTimeout]);
        ends_disarmed(&h.handle);
    }

    #[tokio::test(start_paused = true)]
    async fn command_change_aborts_run() {
        let mut h = default_harness(30);
        let bridge = h.bridge.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            bridge.ingest_command("Following_waypoint", "PAUSE").ok();
            bridge.ingest_command(STATE, "PAUSE").ok();
        });

        let summary = h.controller.execute(start(), &mut h.shutdown).await.unwrap();

        assert_eq!(summary.condition, BreakCondition::CommandChanged(CommandKind::Pause));
        assert_eq!(summary.outcome, TransitionOutcome::Aborted);
        assert_eq!(reported(&mut h.reports), vec![TransitionOutcome::Aborted]);
        ends_disarmed(&h.handle);
    }

    #[tokio::test(start_paused = true)]
    async fn touch_outranks_command_change_in_same_tick() {
        let mut h = default_harness(30);
        let bridge = h.bridge.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1100)).await;
            bridge.ingest_command(STATE, "RESET").ok();
            bridge.ingest_touch(true).ok();
        });

        let summary = h.controller.execute(start(), &mut h.shutdown).await.unwrap();
        assert_eq!(summary.outcome, TransitionOutcome::TouchedCone);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_calibration_is_fatal_and_unreported() {
        let mut h = harness(
            SimVehicle::new().without_param("RC1_MIN"),
            DriveTowardCone::default(),
            segment(30),
        );

        let err = h.controller.execute(start(), &mut h.shutdown).await.unwrap_err();

        assert!(err.is_fatal_startup());
        assert!(reported(&mut h.reports).is_empty());
        assert!(!h.handle.calls().contains(&VehicleCall::SetArm(true)));
        assert_eq!(
            h.handle.calls(),
            vec![
                VehicleCall::SetMode(VehicleMode::Hold),
                VehicleCall::SetArm(false),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn perception_is_applied_and_empty_frames_skipped() {
        let strategy = DriveTowardCone::new(PlannerConfig::default().with_throttle_override(1675.0));
        let mut h = harness(SimVehicle::new(), strategy, segment(30));
        let bridge = h.bridge.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(600)).await;
            bridge
                .ingest_cone_locations(vec![ConeObservation { x: 0.0, y: 50.0, z: 0.0 }])
                .ok();
            tokio::time::sleep(Duration::from_secs(1)).await;
            bridge.ingest_cone_locations(Vec::new()).ok();
            tokio::time::sleep(Duration::from_secs(1)).await;
            bridge.ingest_touch(true).ok();
        });

        let summary = h.controller.execute(start(), &mut h.shutdown).await.unwrap();

        let applied = ActuatorCommand {
            steering_us: 1435,
            throttle_us: 1675,
        };
        let neutral = ActuatorCommand {
            steering_us: 1435,
            throttle_us: 1650,
        };
        assert_eq!(summary.last_command, Some(applied));
        assert_eq!(h.handle.servo_commands(), vec![applied, neutral]);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_still_disarms_and_reports_aborted() {
        let mut h = default_harness(30);
        let tx = h.shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            tx.send(true).ok();
        });

        let summary = h.controller.execute(start(), &mut h.shutdown).await.unwrap();

        assert_eq!(summary.condition, BreakCondition::Shutdown);
        assert_eq!(summary.outcome, TransitionOutcome::Aborted);
        assert_eq!(reported(&mut h.reports), vec![TransitionOutcome::Aborted]);
        ends_disarmed(&h.handle);
    }

    #[tokio::test(start_paused = true)]
    async fn undelivered_report_stops_short_of_reported() {
        let mut h = default_harness(30);
        drop(h.reports);
        let bridge = h.bridge.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            bridge.ingest_touch(true).ok();
        });

        let err = h.controller.execute(start(), &mut h.shutdown).await.unwrap_err();

        assert!(matches!(err, ConeError::Channel(_)));
        assert_eq!(h.controller.phase(), RunPhase::Disarming);
        ends_disarmed(&h.handle);
    }

    #[tokio::test(start_paused = true)]
    async fn servo_fault_aborts_and_completes_disarm() {
        let mut h = harness(
            SimVehicle::new().failing_on("set_throttle_servo"),
            DriveTowardCone::default(),
            segment(30),
        );
        let bridge = h.bridge.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            bridge
                .ingest_cone_locations(vec![ConeObservation { x: 40.0, y: 90.0, z: 0.0 }])
                .ok();
        });

        let summary = h.controller.execute(start(), &mut h.shutdown).await.unwrap();

        assert_eq!(summary.condition, BreakCondition::VehicleFault);
        assert_eq!(summary.outcome, TransitionOutcome::Aborted);
        assert_eq!(h.handle.mode(), Some(VehicleMode::Hold));
        assert!(!h.handle.armed());
    }

    #[tokio::test(start_paused = true)]
    async fn sources_are_unregistered_after_run() {
        let mut h = default_harness(1);
        h.controller.execute(start(), &mut h.shutdown).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.bridge.ingest_touch(true).is_err());
    }

    #[tokio::test]
    async fn execute_rejects_non_start_command() {
        let mut h = default_harness(30);
        let pause = Command {
            target: StateIdentity::DrivingTowardCone,
            kind: CommandKind::Pause,
        };
        let err = h.controller.execute(pause, &mut h.shutdown).await.unwrap_err();
        assert_eq!(err, ConeError::NotStarted);
        assert!(h.handle.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn serve_holds_on_idle_reset_and_runs_on_start() {
        let h = default_harness(2);
        let Harness {
            mut controller,
            handle,
            bridge,
            mut reports,
            shutdown_tx,
            shutdown,
        } = h;
        let server = tokio::spawn(async move { controller.serve(shutdown).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        bridge.ingest_command(STATE, "RESET").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            handle.calls(),
            vec![
                VehicleCall::SetMode(VehicleMode::Hold),
                VehicleCall::SetArm(false),
            ]
        );

        bridge.ingest_command(STATE, "START").unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(reported(&mut reports), vec![TransitionOutcome::SegmentTimeout]);

        shutdown_tx.send(true).unwrap();
        server.await.unwrap().unwrap();
    }
}
