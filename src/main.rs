use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use intersection_sim::interface::{parse_speed, CommandInterface};
use intersection_sim::simulation::{
    IntersectionSnapshot, ServiceModel, SignalPlan, SignalTiming, SimConfig, SimIntersection,
    DEFAULT_ARRIVAL_RATE, DEFAULT_CARS_PER_GREEN, DEFAULT_CROSSING_DISTANCE,
    DEFAULT_CROSSING_STEP, DEFAULT_EMERGENCY_RATE, DEFAULT_MAX_VEHICLES,
};

/// How often the loop wakes up to check for shutdown while idle
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Longest pause between ticks, reached at the slowest accepted speed
const MAX_PAUSE: Duration = Duration::from_secs(1_000_000);

/// Ticks between progress summaries in headless mode
const SUMMARY_INTERVAL: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SignalMode {
    /// North-South green, then East-West green
    TwoPhase,
    /// One approach at a time: N, S, E, W
    RoundRobin,
}

#[derive(Parser)]
#[command(name = "intersection_sim")]
#[command(about = "Signalized intersection simulation driven by line commands")]
struct Cli {
    /// Run a fixed number of ticks without reading commands
    #[arg(long)]
    headless: bool,

    /// Number of simulation ticks to run in headless mode
    #[arg(long, default_value = "1000")]
    ticks: u32,

    /// Seed for reproducible arrivals
    #[arg(long)]
    seed: Option<u64>,

    /// Pacing multiplier: ticks per real second in interactive mode
    #[arg(long, default_value = "1.0", value_parser = speed_arg)]
    speed: f64,

    #[arg(long, default_value_t = DEFAULT_ARRIVAL_RATE)]
    arrival_rate: f64,

    #[arg(long, default_value_t = DEFAULT_EMERGENCY_RATE)]
    emergency_rate: f64,

    /// Ticks without new emergency vehicles after one appears
    #[arg(long, default_value = "0")]
    emergency_cooldown: u32,

    #[arg(long, value_enum, default_value_t = SignalMode::TwoPhase)]
    signal: SignalMode,

    /// North-South green time in seconds (two-phase signal)
    #[arg(long)]
    ns_duration: Option<f64>,

    /// East-West green time in seconds (two-phase signal)
    #[arg(long)]
    ew_duration: Option<f64>,

    /// Green time per approach in seconds (round-robin signal)
    ///
    /// Unset phase durations fall back to the default signal timing.
    #[arg(long)]
    phase_duration: Option<f64>,

    /// Extra green seconds per queued vehicle when a phase starts
    #[arg(long, default_value = "0")]
    extension_per_vehicle: f64,

    #[arg(long, default_value_t = DEFAULT_CARS_PER_GREEN)]
    cars_per_green: usize,

    /// Move vehicles through the intersection step by step instead of
    /// releasing them in batches
    #[arg(long)]
    crossing: bool,

    #[arg(long, default_value_t = DEFAULT_MAX_VEHICLES)]
    max_vehicles: usize,

    /// Do not cap the number of waiting vehicles
    #[arg(long)]
    unlimited: bool,
}

impl Cli {
    fn sim_config(&self) -> SimConfig {
        let timing = SignalTiming::default();
        let base = timing.default_duration;
        let plan = match self.signal {
            SignalMode::TwoPhase => SignalPlan::two_phase(
                self.ns_duration.unwrap_or(base),
                self.ew_duration.unwrap_or(base),
            ),
            SignalMode::RoundRobin => SignalPlan::round_robin(self.phase_duration.unwrap_or(base)),
        }
        .with_extension_per_vehicle(self.extension_per_vehicle);

        let service = if self.crossing {
            ServiceModel::Crossing {
                step: DEFAULT_CROSSING_STEP,
                distance: DEFAULT_CROSSING_DISTANCE,
            }
        } else {
            ServiceModel::Discharge {
                cars_per_green: self.cars_per_green,
            }
        };

        let mut config = SimConfig::default()
            .with_timing(timing)
            .with_arrival_rate(self.arrival_rate)
            .with_emergency_rate(self.emergency_rate)
            .with_signal_plan(plan)
            .with_service(service)
            .with_max_vehicles((!self.unlimited).then_some(self.max_vehicles));
        config.emergency_cooldown_ticks = self.emergency_cooldown;
        config.seed = self.seed;
        config
    }
}

fn speed_arg(value: &str) -> Result<f64, String> {
    parse_speed(value).map_err(|e| e.to_string())
}

/// Real-time pacing owned by the driving loop
struct Pacing {
    speed: f64,
}

impl Pacing {
    fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.speed).unwrap_or(MAX_PAUSE)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,intersection_sim=info"),
    )
    .init();

    let cli = Cli::parse();

    let intersection =
        SimIntersection::new(cli.sim_config()).context("Invalid simulation configuration")?;
    let interface = CommandInterface::new(intersection);
    let shutdown = register_shutdown().context("Failed to install signal handlers")?;

    if cli.headless {
        run_headless(&interface, cli.ticks, &shutdown)
    } else {
        run_interactive(&interface, Pacing { speed: cli.speed }, &shutdown)
    }
}

/// Flag raised by SIGINT or SIGTERM
fn register_shutdown() -> io::Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::flag;
        flag::register(SIGINT, Arc::clone(&shutdown))?;
        flag::register(SIGTERM, Arc::clone(&shutdown))?;
    }
    Ok(shutdown)
}

/// Read commands from stdin until EOF or shutdown
///
/// Every reply is written as one JSON line on stdout. A blank line runs one
/// tick and then waits for the pacing interval.
fn run_interactive(
    interface: &CommandInterface,
    mut pacing: Pacing,
    shutdown: &AtomicBool,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read command: {e}");
                    break;
                }
            }
        }
    });

    info!("Intersection simulation ready, waiting for commands");
    while !shutdown.load(Ordering::Relaxed) {
        let line = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match interface.handle_line(&line) {
            Some(reply) => {
                if let Some(speed) = reply.new_speed() {
                    pacing.speed = speed;
                }
                let json = serde_json::to_string(&reply).context("Failed to encode reply")?;
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{json}").context("Failed to write reply")?;
                stdout.flush().context("Failed to flush stdout")?;
            }
            None => pause(pacing.interval(), shutdown),
        }
    }

    info!("Simulation stopped");
    Ok(())
}

/// Sleep for `interval`, waking early on shutdown
fn pause(interval: Duration, shutdown: &AtomicBool) {
    let start = Instant::now();
    let deadline = start.checked_add(interval.min(MAX_PAUSE)).unwrap_or(start);
    loop {
        let now = Instant::now();
        if now >= deadline || shutdown.load(Ordering::Relaxed) {
            return;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Run the simulation without pacing or commands
fn run_headless(interface: &CommandInterface, ticks: u32, shutdown: &AtomicBool) -> Result<()> {
    info!("Running {ticks} ticks in headless mode");

    for tick in 1..=ticks {
        if shutdown.load(Ordering::Relaxed) {
            warn!("Interrupted after {} ticks", tick - 1);
            break;
        }
        interface.step().context("Simulation tick failed")?;
        if tick % SUMMARY_INTERVAL == 0 {
            log_summary(&interface.snapshot());
        }
    }

    let snapshot = interface.snapshot();
    let history = interface.history(None);
    info!("=== SIMULATION COMPLETE ===");
    log_summary(&snapshot);
    info!("Peak vehicles waiting: {}", history.peak_in_system);
    info!(
        "Emergency vehicles: {} generated, {} served",
        snapshot.emergency_count, snapshot.emergency_served
    );

    let json = serde_json::to_string_pretty(&snapshot).context("Failed to encode snapshot")?;
    println!("{json}");
    Ok(())
}

fn log_summary(snapshot: &IntersectionSnapshot) {
    info!(
        "t={:.0}s phase={} ({:.0}s left) waiting={} served={} avg_wait={:.1}s throughput={:.1}/min",
        snapshot.elapsed_time,
        snapshot.phase,
        snapshot.time_remaining,
        snapshot.total_in_system,
        snapshot.total_served,
        snapshot.overall_avg_wait,
        snapshot.throughput
    );
}
