//! Sentinel CLI - drive the pasture sentinel mission from the terminal
//!
//! Reads one signal per line from stdin, either a raw signal name or a
//! transport payload such as `{"signal": "Start SOI"}`, and prints every
//! published snapshot as a JSON line on stdout. Wall time is mapped onto
//! the interpreter's logical clock so delayed transitions fire on time.

use anyhow::Context as _;
use clap::Parser;
use pasture_sentinel::config::SentinelConfig;
use pasture_sentinel::mission::{self, MissionVariant};
use pasture_sentinel::transport::decode_inbound;
use pasture_sentinel::Interpreter;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sentinel-cli")]
#[command(about = "Run the pasture sentinel mission statechart", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mission variant, overriding the config file
    #[arg(long, value_enum)]
    variant: Option<MissionVariant>,

    /// Escalation delay in milliseconds for the timed variant
    #[arg(long)]
    escalation_ms: Option<u64>,
}

impl Cli {
    fn config(&self) -> anyhow::Result<SentinelConfig> {
        let mut config = match &self.config {
            Some(path) => SentinelConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SentinelConfig::default(),
        };
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if let Some(escalation_ms) = self.escalation_ms {
            config.escalation_ms = escalation_ms;
        }
        Ok(config)
    }
}

/// Interpret one input line as a signal.
fn parse_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line.starts_with('{') || line.starts_with('"') {
        decode_inbound(line)
    } else {
        Some(line.to_string())
    }
}

/// Maps wall time onto the interpreter's logical clock.
struct WallClock {
    last_tick: Instant,
}

impl WallClock {
    fn new(now: Instant) -> Self {
        Self { last_tick: now }
    }

    /// Advance the logical clock by the wall time elapsed since the last tick.
    fn catch_up(&mut self, drone: &Interpreter, now: Instant) -> usize {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        match drone.advance(elapsed) {
            Ok(fired) => fired,
            Err(err) => {
                error!(%err, "delayed transition failed");
                0
            }
        }
    }

    /// Deliver a signal that arrived at `now`.
    ///
    /// The clock is brought up to date first, so timers armed by the signal
    /// count from its arrival and not from the previous tick.
    fn deliver(&mut self, drone: &Interpreter, signal: String, now: Instant) {
        self.catch_up(drone, now);
        match drone.send(signal.clone()) {
            Ok(delivery) => info!(%signal, ?delivery, "signal delivered"),
            Err(err) => error!(%err, %signal, "signal failed"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;
    let drone = mission::interpreter(&config)?;

    drone.subscribe(|snapshot| match serde_json::to_string(&snapshot) {
        Ok(json) => println!("{json}"),
        Err(err) => error!(%err, "failed to encode snapshot"),
    });
    drone.start()?;
    info!(variant = %config.variant, "mission ready; type signals, one per line");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut clock = WallClock::new(Instant::now());
    loop {
        let deadline = drone.next_deadline();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if let Some(signal) = parse_line(&line) {
                    clock.deliver(&drone, signal, Instant::now());
                }
            }
            _ = sleep(deadline.unwrap_or(Duration::MAX)), if deadline.is_some() => {}
        }
        clock.catch_up(&drone, Instant::now());

        if !drone.is_running() {
            info!(status = ?drone.status(), "mission finished");
            break;
        }
    }

    drone.stop();
    Ok(())
}
