//! Real-time filtered stream driven by the simulator

use crate::simulator::{BiosignalSimulator, SimulatorConfig};
use serde::{Deserialize, Serialize};
use sigclean_core::{config_error, SampleBlock, SigResult};
use sigclean_filters::{ChainConfig, ChannelFilterBank, SignalProcessor};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Longest accepted block, in seconds
pub const MAX_BLOCK_DURATION: f32 = 60.0;

/// Configuration for real-time streaming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub simulator: SimulatorConfig,
    /// Filter settings; the sample rate is taken from the simulator
    pub chain: ChainConfig,
    /// Block duration in seconds, also the tick period
    pub block_duration: f32,
    /// Blocks buffered per subscriber before the slowest one lags
    pub buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            chain: ChainConfig::default(),
            block_duration: 0.1,
            buffer_size: 50,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> SigResult<()> {
        self.simulator.validate()?;
        if !self.block_duration.is_finite()
            || self.block_duration <= 0.0
            || self.block_duration > MAX_BLOCK_DURATION
        {
            return Err(config_error!(
                "block_duration",
                "must be in (0, {}] seconds, got {}",
                MAX_BLOCK_DURATION,
                self.block_duration
            ));
        }
        if self.block_duration * self.simulator.sampling_rate < 1.0 {
            return Err(config_error!(
                "block_duration",
                "{} s holds less than one sample at {} Hz",
                self.block_duration,
                self.simulator.sampling_rate
            ));
        }
        if self.buffer_size == 0 {
            return Err(config_error!("buffer_size", "must be at least 1"));
        }
        Ok(())
    }

    /// Tick period of the stream
    pub fn tick_period(&self) -> SigResult<Duration> {
        Duration::try_from_secs_f32(self.block_duration)
            .ok()
            .filter(|period| !period.is_zero())
            .ok_or_else(|| {
                config_error!(
                    "block_duration",
                    "{} s is not a usable tick period",
                    self.block_duration
                )
            })
    }
}

/// Sizes blocks so the running sample total follows the wall clock when a
/// block does not hold a whole number of samples
#[derive(Debug, Clone)]
struct BlockPacer {
    samples_per_block: f64,
    blocks: u64,
    emitted: u64,
}

impl BlockPacer {
    fn new(block_duration: f32, sampling_rate: f32) -> Self {
        Self {
            samples_per_block: block_duration as f64 * sampling_rate as f64,
            blocks: 0,
            emitted: 0,
        }
    }

    /// Samples per channel for the next block
    fn next_len(&mut self) -> usize {
        self.blocks += 1;
        let due = (self.blocks as f64 * self.samples_per_block).round() as u64;
        let len = due.saturating_sub(self.emitted);
        self.emitted = due.max(self.emitted);
        len as usize
    }

    fn reset(&mut self) {
        self.blocks = 0;
        self.emitted = 0;
    }
}

/// One tick of the stream: the generated block and its filtered copy
#[derive(Debug, Clone)]
pub struct FilteredBlock {
    /// Position in the stream since the last `Stop`
    pub sequence: u64,
    pub raw: SampleBlock,
    pub filtered: SampleBlock,
}

/// Commands for controlling the stream
#[derive(Debug, Clone)]
pub enum StreamCommand {
    Start,
    /// Halt, rewind the simulator and clear every filter
    Stop,
    Pause,
    Resume,
    /// Swap the filter configuration between blocks
    Reconfigure(ChainConfig),
    /// End the stream task
    Shutdown,
}

/// Stream statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStats {
    pub is_running: bool,
    pub blocks_generated: u64,
    /// Seconds of signal produced since the last `Stop`
    pub total_duration: f32,
    pub last_processing_us: u64,
    pub average_processing_us: f32,
    /// NaN or infinite inputs replaced across all channels
    pub non_finite_inputs: u64,
    pub reconfigurations: u64,
    pub rejected_reconfigurations: u64,
    /// Unix time of the last block, in milliseconds
    pub last_update: u64,
}

/// Real-time simulated stream with per-channel filtering
pub struct RealTimeStream {
    config: StreamConfig,
    simulator: BiosignalSimulator,
    bank: ChannelFilterBank,
    pacer: BlockPacer,
    data_sender: broadcast::Sender<FilteredBlock>,
    control_receiver: mpsc::Receiver<StreamCommand>,
    control_sender: mpsc::Sender<StreamCommand>,
    stats: Arc<Mutex<StreamStats>>,
    running: bool,
    sequence: u64,
}

impl RealTimeStream {
    pub fn new(config: StreamConfig) -> SigResult<Self> {
        config.validate()?;
        let simulator = BiosignalSimulator::new(config.simulator.clone())?;
        let bank = ChannelFilterBank::for_stream(config.chain.clone(), simulator.metadata())?;
        let pacer = BlockPacer::new(config.block_duration, config.simulator.sampling_rate);

        let (data_sender, _) = broadcast::channel(config.buffer_size);
        let (control_sender, control_receiver) = mpsc::channel(32);

        Ok(Self {
            config,
            simulator,
            bank,
            pacer,
            data_sender,
            control_receiver,
            control_sender,
            stats: Arc::new(Mutex::new(StreamStats::default())),
            running: false,
            sequence: 0,
        })
    }

    /// Get a receiver for filtered blocks
    pub fn subscribe(&self) -> broadcast::Receiver<FilteredBlock> {
        self.data_sender.subscribe()
    }

    /// Get control sender for sending commands
    pub fn control_handle(&self) -> mpsc::Sender<StreamCommand> {
        self.control_sender.clone()
    }

    /// Shared statistics, updated after every block
    pub fn stats_handle(&self) -> Arc<Mutex<StreamStats>> {
        Arc::clone(&self.stats)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Run until a `Shutdown` command arrives.
    ///
    /// Filtering happens on this task, so a `Reconfigure` always lands
    /// between two blocks.
    pub async fn run(&mut self) -> SigResult<()> {
        let mut ticker = interval(self.config.tick_period()?);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            sample_rate = self.config.simulator.sampling_rate,
            channels = self.config.simulator.channel_count,
            block_ms = self.config.block_duration * 1000.0,
            "stream ready"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.running {
                        self.emit_block().await?;
                    }
                }

                command = self.control_receiver.recv() => {
                    match command {
                        Some(StreamCommand::Shutdown) | None => {
                            info!("stream shutting down");
                            break;
                        }
                        Some(command) => self.handle_command(command).await,
                    }
                }
            }
        }

        self.stats.lock().await.is_running = false;
        Ok(())
    }

    async fn emit_block(&mut self) -> SigResult<()> {
        let raw = self.simulator.generate_samples(self.pacer.next_len())?;
        let filtered = self.bank.process(&raw)?;

        let processing_us = self
            .bank
            .last_metrics()
            .map_or(0, |metrics| metrics.processing_time_us);
        let non_finite_inputs = self
            .bank
            .diagnostics()
            .iter()
            .map(|diagnostics| diagnostics.non_finite_inputs)
            .sum();

        {
            let mut stats = self.stats.lock().await;
            stats.blocks_generated += 1;
            stats.total_duration += raw.duration();
            stats.last_processing_us = processing_us;
            let n = stats.blocks_generated as f32;
            stats.average_processing_us += (processing_us as f32 - stats.average_processing_us) / n;
            stats.non_finite_inputs = non_finite_inputs;
            stats.last_update = unix_millis();
        }

        if processing_us as f32 > self.config.block_duration * 1e6 {
            warn!(
                processing_us,
                block_ms = self.config.block_duration * 1000.0,
                "filtering is slower than real time"
            );
        }

        debug!(
            block_id = %raw.id,
            sequence = self.sequence,
            samples = raw.samples_per_channel(),
            processing_us,
            "block filtered"
        );

        let block = FilteredBlock {
            sequence: self.sequence,
            raw,
            filtered,
        };
        self.sequence += 1;

        // No subscribers is fine
        let _ = self.data_sender.send(block);
        Ok(())
    }

    async fn handle_command(&mut self, command: StreamCommand) {
        match command {
            StreamCommand::Start | StreamCommand::Resume => {
                self.running = true;
                self.stats.lock().await.is_running = true;
                debug!(?command, "stream running");
            }
            StreamCommand::Pause => {
                self.running = false;
                self.stats.lock().await.is_running = false;
                debug!("stream paused");
            }
            StreamCommand::Stop => {
                self.running = false;
                self.sequence = 0;
                self.simulator.reset_time();
                self.pacer.reset();
                self.bank.reset();
                {
                    let mut stats = self.stats.lock().await;
                    stats.is_running = false;
                    stats.blocks_generated = 0;
                    stats.total_duration = 0.0;
                    stats.average_processing_us = 0.0;
                    stats.non_finite_inputs = 0;
                }
                info!("stream stopped");
            }
            StreamCommand::Reconfigure(chain) => {
                let chain = chain.with_sample_rate(self.simulator.metadata().sampling_rate);
                match self.bank.reconfigure(chain.clone()) {
                    Ok(()) => {
                        self.config.chain = chain;
                        self.stats.lock().await.reconfigurations += 1;
                        info!(stages = ?self.config.chain.enabled_stages(), "filters reconfigured");
                    }
                    Err(err) => {
                        self.stats.lock().await.rejected_reconfigurations += 1;
                        warn!(%err, "reconfiguration rejected, keeping previous filters");
                    }
                }
            }
            StreamCommand::Shutdown => {}
        }
    }
}

fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

/// Handles to a stream running in the background
pub struct StreamHandle {
    pub data: broadcast::Receiver<FilteredBlock>,
    pub control: mpsc::Sender<StreamCommand>,
    pub stats: Arc<Mutex<StreamStats>>,
    pub task: JoinHandle<SigResult<()>>,
}

/// Helper function to create and start a stream in the background
pub fn start_stream(config: StreamConfig) -> SigResult<StreamHandle> {
    let mut stream = RealTimeStream::new(config)?;
    let data = stream.subscribe();
    let control = stream.control_handle();
    let stats = stream.stats_handle();

    let task = tokio::spawn(async move {
        let result = stream.run().await;
        if let Err(err) = &result {
            warn!(%err, "stream task failed");
        }
        result
    });

    Ok(StreamHandle {
        data,
        control,
        stats,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_patterns::SignalComponent;
    use tokio::time::timeout;

    fn fast_config() -> StreamConfig {
        StreamConfig {
            simulator: SimulatorConfig::headset(250.0, 4).with_seed(7),
            chain: ChainConfig::eeg_display(250.0),
            block_duration: 0.02,
            buffer_size: 64,
        }
    }

    async fn next_block(handle: &mut StreamHandle) -> FilteredBlock {
        timeout(Duration::from_secs(5), handle.data.recv())
            .await
            .expect("timed out waiting for a block")
            .expect("stream closed")
    }

    #[tokio::test]
    async fn test_stream_produces_filtered_blocks() {
        let mut handle = start_stream(fast_config()).unwrap();
        handle.control.send(StreamCommand::Start).await.unwrap();

        let mut ids = Vec::new();
        for expected_sequence in 0..3 {
            let block = next_block(&mut handle).await;
            assert_eq!(block.sequence, expected_sequence);
            ids.push(block.raw.id);
            assert_eq!(block.raw.channel_count(), 4);
            assert_eq!(block.raw.samples_per_channel(), 5);
            assert_eq!(block.filtered.len(), block.raw.len());
            assert!(block.filtered.data.iter().all(|x| x.is_finite()));
        }
        ids.dedup();
        assert_eq!(ids.len(), 3);

        let stats = handle.stats.lock().await.clone();
        assert!(stats.is_running);
        assert!(stats.blocks_generated >= 3);

        handle.control.send(StreamCommand::Shutdown).await.unwrap();
        assert!(handle.task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_reconfigure_applies_between_blocks() {
        let mut config = fast_config();
        config.simulator = config
            .simulator
            .with_components(vec![SignalComponent::Sine { frequency: 10.0, amplitude: 20.0 }]);
        let mut handle = start_stream(config).unwrap();

        // Commands are handled in order, so the swap precedes the first block
        handle
            .control
            .send(StreamCommand::Reconfigure(ChainConfig::passthrough(1000.0)))
            .await
            .unwrap();
        handle.control.send(StreamCommand::Start).await.unwrap();

        let block = next_block(&mut handle).await;
        assert_eq!(block.raw.data, block.filtered.data);
        assert_eq!(handle.stats.lock().await.reconfigurations, 1);

        handle.control.send(StreamCommand::Shutdown).await.unwrap();
        assert!(handle.task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_reconfigure_is_rejected() {
        let mut handle = start_stream(fast_config()).unwrap();

        let invalid = ChainConfig { notch_bandwidth: 0.0, ..ChainConfig::default() };
        handle.control.send(StreamCommand::Reconfigure(invalid)).await.unwrap();
        handle.control.send(StreamCommand::Start).await.unwrap();

        let block = next_block(&mut handle).await;
        assert!(block.filtered.data.iter().all(|x| x.is_finite()));

        let stats = handle.stats.lock().await.clone();
        assert_eq!(stats.rejected_reconfigurations, 1);
        assert_eq!(stats.reconfigurations, 0);

        handle.control.send(StreamCommand::Shutdown).await.unwrap();
        assert!(handle.task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stop_rewinds_stream() {
        let mut handle = start_stream(fast_config()).unwrap();
        handle.control.send(StreamCommand::Start).await.unwrap();
        next_block(&mut handle).await;
        next_block(&mut handle).await;

        handle.control.send(StreamCommand::Stop).await.unwrap();
        handle.control.send(StreamCommand::Start).await.unwrap();

        // Drain anything sent before the stop took effect
        let mut block = next_block(&mut handle).await;
        while block.sequence != 0 {
            block = next_block(&mut handle).await;
        }
        assert_eq!(block.sequence, 0);

        handle.control.send(StreamCommand::Shutdown).await.unwrap();
        assert!(handle.task.await.unwrap().is_ok());
    }

    #[test]
    fn test_invalid_stream_config() {
        let config = StreamConfig { block_duration: 0.0, ..StreamConfig::default() };
        assert!(RealTimeStream::new(config).is_err());

        let config = StreamConfig { buffer_size: 0, ..StreamConfig::default() };
        assert!(RealTimeStream::new(config).is_err());
    }

    #[test]
    fn test_block_duration_bounds() {
        let config = StreamConfig { block_duration: 1e-12, ..StreamConfig::default() };
        assert!(config.validate().is_err());
        assert!(RealTimeStream::new(config).is_err());

        // 1 ms at 250 Hz is a quarter of a sample
        let config = StreamConfig { block_duration: 0.001, ..StreamConfig::default() };
        assert!(config.validate().is_err());

        let config = StreamConfig { block_duration: 1e12, ..StreamConfig::default() };
        assert!(config.validate().is_err());

        let config = StreamConfig { block_duration: f32::MAX, ..StreamConfig::default() };
        assert!(config.tick_period().is_err());
        let config = StreamConfig { block_duration: 1e-12, ..StreamConfig::default() };
        assert!(config.tick_period().is_err());

        let config = StreamConfig { block_duration: 0.004, ..StreamConfig::default() };
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_period().unwrap(), Duration::from_millis(4));
    }

    #[test]
    fn test_pacer_tracks_sample_rate() {
        // 25.6 samples per block at 256 Hz
        let mut pacer = BlockPacer::new(0.1, 256.0);
        let lens: Vec<usize> = (0..10).map(|_| pacer.next_len()).collect();
        assert!(lens.iter().all(|&len| len == 25 || len == 26));
        assert_eq!(lens.iter().sum::<usize>(), 256);

        let total: usize = (0..990).map(|_| pacer.next_len()).sum();
        assert_eq!(total + 256, 25_600);

        pacer.reset();
        assert_eq!(pacer.next_len(), 26);

        let mut whole = BlockPacer::new(0.02, 250.0);
        assert!((0..100).all(|_| whole.next_len() == 5));
    }

    #[tokio::test]
    async fn test_stream_keeps_fractional_rate() {
        let config = StreamConfig {
            simulator: SimulatorConfig::headset(256.0, 2).with_seed(3),
            chain: ChainConfig::eeg_display(256.0),
            block_duration: 0.01,
            buffer_size: 64,
        };
        let mut handle = start_stream(config).unwrap();
        handle.control.send(StreamCommand::Start).await.unwrap();

        let mut samples = 0;
        for _ in 0..100 {
            samples += next_block(&mut handle).await.raw.samples_per_channel();
        }
        assert_eq!(samples, 256);

        handle.control.send(StreamCommand::Shutdown).await.unwrap();
        assert!(handle.task.await.unwrap().is_ok());
    }
}
