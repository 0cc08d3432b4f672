use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sr_lab_abstract::{SimConfig, SrConfig};
use sr_lab_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Selective-Repeat ARQ simulator")]
struct Args {
    /// Load a scenario from disk (TOML). Other channel/protocol flags are ignored.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Number of application messages to send in a headless run.
    #[arg(long, default_value_t = 10)]
    messages: u32,

    /// Logical milliseconds between application messages.
    #[arg(long, default_value_t = 2)]
    interval: u64,

    /// Stop a headless run after this much logical time.
    #[arg(long, default_value_t = 100_000)]
    max_duration: u64,

    /// Sequence number modulus K.
    #[arg(long)]
    modulus: Option<u32>,
    #[arg(long)]
    sender_window: Option<u32>,
    #[arg(long)]
    receiver_window: Option<u32>,
    /// Retransmission timeout in logical milliseconds.
    #[arg(long)]
    timeout: Option<u64>,

    #[arg(long)]
    loss_rate: Option<f64>,
    #[arg(long)]
    corrupt_rate: Option<f64>,
    #[arg(long)]
    min_latency: Option<u64>,
    #[arg(long)]
    max_latency: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();
    info!("sr-lab-sim-cli starting…");

    let report = if let Some(path) = &args.scenario {
        scenario_runner::run_scenario(path)?
    } else {
        run_default_sim(&args)?
    };

    info!(
        "Finished at t={}ms: {} messages delivered, {} packets sent by sender, {} refusals",
        report.duration_ms,
        report.delivered_data.len(),
        report.sender_packet_count,
        report.app_refusals
    );
    if let Some(retransmissions) = report.last_metric("sender.retransmissions") {
        info!("Sender retransmissions: {}", retransmissions);
    }

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn sim_config(&self) -> SimConfig {
        let mut config = SimConfig {
            loss_rate: 0.1,
            corrupt_rate: 0.05,
            seed: 42,
            ..Default::default()
        };
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        config
    }

    fn protocol_config(&self) -> SrConfig {
        let mut config = SrConfig::default();
        if let Some(v) = self.modulus {
            config.modulus = v;
        }
        if let Some(v) = self.sender_window {
            config.sender_window = v;
        }
        if let Some(v) = self.receiver_window {
            config.receiver_window = v;
        }
        if let Some(v) = self.timeout {
            config.timeout_ms = v;
        }
        config
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_default_sim(args: &Args) -> Result<SimulationReport> {
    let mut sim = Simulator::selective_repeat(args.sim_config(), args.protocol_config())
        .context("Failed to build simulator")?;
    for i in 0..args.messages {
        sim.schedule_app_send(i as u64 * args.interval, format!("Packet {}", i + 1));
    }

    info!("Starting default headless simulation…");
    let drained = sim.run_until(args.max_duration)?;
    if !drained {
        warn!(
            "Stopped at {}ms (limit {}ms) with {} events pending",
            sim.current_time(),
            args.max_duration,
            sim.remaining_events()
        );
    }
    info!("Simulation complete.");
    Ok(sim.export_report())
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
