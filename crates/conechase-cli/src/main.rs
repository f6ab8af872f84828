//! `conechase` – cone-approach state node
//!
//! Runs the `Driving_toward_cone` mission state against a simulated vehicle:
//!
//! 1. Loads `~/.conechase/config.toml` (or `--config`), applies
//!    `CONECHASE_*` environment overrides, then command-line flags.
//! 2. Reads newline-delimited JSON commands, cone frames and touch readings
//!    from **stdin** and writes `DONE` reports to **stdout**.
//! 3. Intercepts **Ctrl-C**: an active run is disarmed and reports `aborted`
//!    before the process exits.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use conechase_hal::{SimVehicle, VehicleControl};
use conechase_middleware::{EventBus, MessageBridge};
use conechase_runtime::{DriveTowardCone, ExecutionController, StateStrategy, init_tracing};
use conechase_types::ConeError;
use tokio::io::{AsyncWrite, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "conechase")]
#[command(about = "Drive toward the nearest cone until touched, timed out or aborted", long_about = None)]
struct Args {
    /// Throttle gain multiplier.
    #[arg(short = 't', long)]
    throttle_factor: Option<f64>,

    /// Steering gain multiplier.
    #[arg(short = 's', long)]
    steering_factor: Option<f64>,

    /// Seconds allotted to one approach.
    #[arg(long)]
    segment_duration_sec: Option<f64>,

    /// Force throttle to a fixed pulse width in microseconds (bench value
    /// 1675 when given without a value).
    #[arg(long, value_name = "US", num_args = 0..=1, default_missing_value = "1675")]
    throttle_override: Option<f64>,

    /// This approach targets the last cone of the course.
    #[arg(long)]
    final_cone: bool,

    /// Control tick rate in hertz.
    #[arg(long)]
    tick_hz: Option<f64>,

    /// Config file (default `~/.conechase/config.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    init_config: bool,
}

impl Args {
    /// Flags win over file and environment.
    fn apply(&self, cfg: &mut Config) {
        if let Some(v) = self.throttle_factor {
            cfg.throttle_factor = v;
        }
        if let Some(v) = self.steering_factor {
            cfg.steering_factor = v;
        }
        if let Some(v) = self.segment_duration_sec {
            cfg.segment_duration_sec = v;
        }
        if let Some(v) = self.throttle_override {
            cfg.throttle_override = Some(v);
        }
        if self.final_cone {
            cfg.final_cone = true;
        }
        if let Some(v) = self.tick_hz {
            cfg.tick_hz = v;
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Tracing before the runtime: the OTLP exporter must not need one.
    let _guard = init_tracing("conechase");

    let path = args.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            info!(path = %path.display(), "config loaded");
            cfg
        }
        Ok(None) => {
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            warn!(error = %e, "config unreadable; using defaults");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    args.apply(&mut cfg);

    if args.init_config {
        return match config::save_to(&cfg, &path) {
            Ok(()) => {
                eprintln!(
                    "  {} Config saved to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let (shutdown_tx, shutdown) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – disarming …".yellow().bold());
        let _ = shutdown_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; shutdown will not disarm");
    }

    let result = runtime.block_on(run(cfg, shutdown));
    // A pending stdin read would otherwise block runtime teardown.
    runtime.shutdown_timeout(Duration::from_secs(1));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "conechase stopped".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config, shutdown: watch::Receiver<bool>) -> Result<(), ConeError> {
    info!(?cfg, "starting cone-approach node");

    let bus = EventBus::default();
    let bridge = MessageBridge::new(bus.clone());

    let vehicle =
        SimVehicle::new().with_calibration(cfg.calibration.steering, cfg.calibration.throttle);
    let strategy = DriveTowardCone::new(cfg.planner_config()).final_cone(cfg.final_cone);
    let mut controller =
        ExecutionController::new(strategy, vehicle, &bus, cfg.controller_config());

    let inbound = {
        let bridge = bridge.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = bridge.pump_lines(BufReader::new(tokio::io::stdin()), shutdown).await {
                warn!(error = %e, "stdin ingestion stopped");
            }
        })
    };

    let served = serve_with_reports(&mut controller, &bridge, tokio::io::stdout(), shutdown).await;
    inbound.abort();
    served
}

/// Serve `controller` while executor reports are written to `out`.
///
/// The report writer stops only after `serve` has returned, so the report of
/// a run cut short by shutdown is written before this returns.
async fn serve_with_reports<S, V, W>(
    controller: &mut ExecutionController<S, V>,
    bridge: &MessageBridge,
    out: W,
    shutdown: watch::Receiver<bool>,
) -> Result<(), ConeError>
where
    S: StateStrategy,
    V: VehicleControl,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (writer_stop_tx, writer_stop) = watch::channel(false);
    let writer = tokio::spawn(bridge.report_stream().write_to(out, writer_stop));

    let served = controller.serve(shutdown).await;

    let _ = writer_stop_tx.send(true);
    match writer.await {
        Ok(result) => result?,
        Err(e) => warn!(error = %e, "report writer task failed"),
    }
    served
}
