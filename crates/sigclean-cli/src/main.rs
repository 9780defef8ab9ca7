//! sigclean: run simulated biosignals through the filter chain and report
//! what each channel looked like before and after.

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use sigclean_core::{ChannelStats, SampleBlock};
use sigclean_filters::{ChainConfig, ChannelFilterBank, SignalProcessor};
use sigclean_simulation::{
    start_stream, BiosignalSimulator, SignalComponent, SimulatorConfig, StreamCommand, StreamConfig,
};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SPS: f32 = 250.0;

#[derive(Parser)]
#[command(name = "sigclean")]
#[command(about = "Real-time per-channel biosignal filtering", long_about = None)]
struct Cli {
    /// Sample rate in Hz [default: the config file's rate, else 250]
    #[arg(long)]
    sps: Option<f32>,

    /// Number of channels
    #[arg(long, default_value_t = 8)]
    channels: usize,

    /// Seconds of signal to process
    #[arg(long, default_value_t = 4.0)]
    seconds: f32,

    /// Filter configuration file (JSON); overrides --preset
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in filter configuration
    #[arg(long, value_enum, default_value_t = Preset::Default)]
    preset: Preset,

    /// Simulated signal
    #[arg(long, value_enum, default_value_t = Signal::Headset)]
    signal: Signal,

    /// Seed for the simulated noise
    #[arg(long)]
    seed: Option<u64>,

    /// Stream blocks through the real-time pipeline instead of one batch
    #[arg(long)]
    realtime: bool,

    /// Print the effective filter configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    Default,
    Passthrough,
    Eeg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Signal {
    Alpha,
    Headset,
    Mains60,
    Artifacts,
}

impl Signal {
    fn components(self) -> anyhow::Result<Vec<SignalComponent>> {
        let label = match self {
            Signal::Alpha => "Clean Alpha",
            Signal::Headset => "Headset",
            Signal::Mains60 => "Mains 60 Hz",
            Signal::Artifacts => "Artifacts",
        };
        SignalComponent::presets()
            .into_iter()
            .find(|(name, _)| *name == label)
            .map(|(_, components)| components)
            .ok_or_else(|| anyhow!("no signal preset named '{}'", label))
    }
}

/// The filter configuration; its sample rate drives the whole run
fn chain_config(cli: &Cli) -> anyhow::Result<ChainConfig> {
    let config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let config = ChainConfig::from_json(&json)
                .with_context(|| format!("parsing {}", path.display()))?;
            match cli.sps {
                Some(sps) if sps != config.sample_rate => {
                    warn!(
                        file_sps = config.sample_rate,
                        sps,
                        "--sps overrides the sample rate in {}",
                        path.display()
                    );
                    config.with_sample_rate(sps)
                }
                _ => config,
            }
        }
        None => {
            let sps = cli.sps.unwrap_or(DEFAULT_SPS);
            match cli.preset {
                Preset::Default => ChainConfig::default().with_sample_rate(sps),
                Preset::Passthrough => ChainConfig::passthrough(sps),
                Preset::Eeg => ChainConfig::eeg_display(sps),
            }
        }
    };

    config.validate().context("invalid filter configuration")?;
    Ok(config)
}

fn simulator_config(cli: &Cli, sps: f32) -> anyhow::Result<SimulatorConfig> {
    let mut config =
        SimulatorConfig::headset(sps, cli.channels).with_components(cli.signal.components()?);
    config.seed = cli.seed;
    config.validate().context("invalid simulator settings")?;
    Ok(config)
}

/// Filter the whole run as a single block
fn run_batch(
    cli: &Cli,
    chain: ChainConfig,
    simulator: SimulatorConfig,
) -> anyhow::Result<(SampleBlock, SampleBlock, ChannelFilterBank)> {
    let mut simulator = BiosignalSimulator::new(simulator)?;
    let mut bank = ChannelFilterBank::for_stream(chain, simulator.metadata())?;

    let raw = simulator.generate(cli.seconds)?;
    let filtered = bank.process(&raw)?;

    if let Some(metrics) = bank.last_metrics() {
        info!(
            processing_us = metrics.processing_time_us,
            ns_per_sample = metrics.nanos_per_sample(),
            realtime_factor = metrics.realtime_factor,
            "batch filtered"
        );
    }
    Ok((raw, filtered, bank))
}

/// Stream blocks at real-time pace and stitch them back together
async fn run_realtime(
    cli: &Cli,
    chain: ChainConfig,
    simulator: SimulatorConfig,
) -> anyhow::Result<(SampleBlock, SampleBlock)> {
    let metadata = simulator.metadata()?;
    let frames = (cli.seconds * metadata.sampling_rate).round() as usize;
    let config = StreamConfig {
        simulator,
        chain,
        ..StreamConfig::default()
    };
    let block_duration = config.block_duration;
    let mut handle = start_stream(config)?;
    handle.control.send(StreamCommand::Start).await?;

    let wanted = (cli.seconds / block_duration).ceil() as u64;
    let mut raw = Vec::new();
    let mut filtered = Vec::new();
    let mut received = 0;

    while received < wanted {
        match handle.data.recv().await {
            Ok(block) => {
                debug!(sequence = block.sequence, "block received");
                raw.extend_from_slice(&block.raw.data);
                filtered.extend_from_slice(&block.filtered.data);
                received += 1;
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "fell behind the stream");
            }
            Err(err) => return Err(err.into()),
        }
    }

    handle.control.send(StreamCommand::Shutdown).await?;
    let stats = handle.stats.lock().await.clone();
    handle.task.await??;
    info!(
        blocks = stats.blocks_generated,
        average_processing_us = stats.average_processing_us,
        non_finite_inputs = stats.non_finite_inputs,
        "stream finished"
    );

    // The last block may run past the requested length
    let len = frames * metadata.channel_count;
    raw.truncate(len);
    filtered.truncate(len);
    Ok((SampleBlock::new(raw, metadata.clone())?, SampleBlock::new(filtered, metadata)?))
}

fn print_report(raw: &SampleBlock, filtered: &SampleBlock) -> anyhow::Result<()> {
    println!(
        "{:>3}  {:>10} {:>10} {:>10} {:>4}   {:>10} {:>10} {:>10}",
        "ch", "raw mean", "raw rms", "raw p2p", "nan", "out mean", "out rms", "out p2p"
    );
    for channel in 0..raw.channel_count() {
        let before: ChannelStats = raw.channel_stats(channel)?;
        let after: ChannelStats = filtered.channel_stats(channel)?;
        println!(
            "{:>3}  {:>10.2} {:>10.2} {:>10.2} {:>4}   {:>10.2} {:>10.2} {:>10.2}",
            channel,
            before.mean,
            before.rms,
            before.peak_to_peak,
            before.non_finite,
            after.mean,
            after.rms,
            after.peak_to_peak
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "sigclean=debug" } else { "sigclean=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let chain = chain_config(&cli)?;
    if cli.print_config {
        println!("{}", chain.to_json()?);
        return Ok(());
    }

    let simulator = simulator_config(&cli, chain.sample_rate)?;
    info!(
        sps = chain.sample_rate,
        channels = cli.channels,
        seconds = cli.seconds,
        stages = ?chain.enabled_stages(),
        "starting"
    );

    let (raw, filtered) = if cli.realtime {
        run_realtime(&cli, chain, simulator).await?
    } else {
        let (raw, filtered, bank) = run_batch(&cli, chain, simulator)?;
        for (channel, diagnostics) in bank.diagnostics().iter().enumerate() {
            if diagnostics.non_finite_inputs > 0 || diagnostics.degenerate_outputs > 0 {
                info!(channel, ?diagnostics, "channel recovered from bad samples");
            }
        }
        (raw, filtered)
    };

    print_report(&raw, &filtered)
}
