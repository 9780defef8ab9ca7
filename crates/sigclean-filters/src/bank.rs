//! Multi-channel filter bank: one independent chain per channel

use crate::chain::{ChainDiagnostics, ChannelFilterChain};
use crate::config::ChainConfig;
use crate::processor::{ProcessingMetrics, SignalProcessor};
use sigclean_core::{SampleBlock, SigError, SigResult, StreamMetadata};
use tracing::debug;

/// Filter chains for every channel of a stream.
///
/// Chains never share state. Settings changed through [`channel_mut`]
/// apply to that channel only, until the next bank-wide [`reconfigure`].
///
/// [`channel_mut`]: ChannelFilterBank::channel_mut
/// [`reconfigure`]: ChannelFilterBank::reconfigure
#[derive(Debug, Clone)]
pub struct ChannelFilterBank {
    config: ChainConfig,
    chains: Vec<ChannelFilterChain>,
    last_metrics: Option<ProcessingMetrics>,
}

impl ChannelFilterBank {
    pub fn new(config: ChainConfig, channel_count: usize) -> SigResult<Self> {
        StreamMetadata::validate_channel_count(channel_count)?;
        let template = ChannelFilterChain::new(config.clone())?;

        Ok(Self {
            config,
            chains: vec![template; channel_count],
            last_metrics: None,
        })
    }

    /// Bank sized and tuned for a stream's metadata
    pub fn for_stream(config: ChainConfig, metadata: &StreamMetadata) -> SigResult<Self> {
        let config = config.with_sample_rate(metadata.sampling_rate);
        Self::new(config, metadata.channel_count)
    }

    /// Filter one tick, one sample per channel
    pub fn apply_frame(&mut self, frame: &[f32]) -> SigResult<Vec<f32>> {
        let mut out = vec![0.0; frame.len()];
        self.apply_frame_into(frame, &mut out)?;
        Ok(out)
    }

    /// Filter one tick into a caller-provided buffer
    pub fn apply_frame_into(&mut self, frame: &[f32], out: &mut [f32]) -> SigResult<()> {
        self.check_channels(frame.len())?;
        self.check_channels(out.len())?;

        for ((chain, &raw), slot) in self.chains.iter_mut().zip(frame).zip(out.iter_mut()) {
            *slot = chain.apply(raw);
        }
        Ok(())
    }

    /// Reconfigure every channel. Validation happens once, up front, so the
    /// bank either switches entirely or not at all.
    pub fn reconfigure(&mut self, config: ChainConfig) -> SigResult<()> {
        config.validate()?;
        for chain in &mut self.chains {
            chain.reconfigure(config.clone())?;
        }

        debug!(
            channels = self.chains.len(),
            sample_rate = config.sample_rate,
            "filter bank reconfigured"
        );
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn channel_count(&self) -> usize {
        self.chains.len()
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelFilterChain> {
        self.chains.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut ChannelFilterChain> {
        self.chains.get_mut(index)
    }

    pub fn diagnostics(&self) -> Vec<ChainDiagnostics> {
        self.chains.iter().map(ChannelFilterChain::diagnostics).collect()
    }

    /// Metrics of the most recent `process` call
    pub fn last_metrics(&self) -> Option<&ProcessingMetrics> {
        self.last_metrics.as_ref()
    }

    fn check_channels(&self, actual: usize) -> SigResult<()> {
        if actual != self.chains.len() {
            return Err(SigError::ChannelMismatch {
                expected: self.chains.len(),
                actual,
            });
        }
        Ok(())
    }

    fn check_block(&self, block: &SampleBlock) -> SigResult<()> {
        self.check_channels(block.channel_count())?;

        let expected = self.config.sample_rate;
        if (block.sampling_rate() - expected).abs() > expected * 1e-6 {
            return Err(SigError::SamplingRateMismatch {
                expected,
                actual: block.sampling_rate(),
            });
        }
        Ok(())
    }
}

impl SignalProcessor for ChannelFilterBank {
    fn process(&mut self, input: &SampleBlock) -> SigResult<SampleBlock> {
        let mut timer = ProcessingMetrics::start_timing();
        timer.set_block(input);

        if let Err(err) = self.check_block(input) {
            self.last_metrics = Some(timer.finish_with_error(&err.to_string()));
            return Err(err);
        }

        let mut data = vec![0.0; input.data.len()];
        for (frame, out) in input.frames().zip(data.chunks_exact_mut(self.chains.len())) {
            for ((chain, &raw), slot) in self.chains.iter_mut().zip(frame).zip(out.iter_mut()) {
                *slot = chain.apply(raw);
            }
        }

        let output = SampleBlock::new(data, input.metadata.clone())?;
        self.last_metrics = Some(timer.finish(input.duration()));
        Ok(output)
    }

    fn name(&self) -> &str {
        "Channel Filter Bank"
    }

    fn reset(&mut self) {
        for chain in &mut self.chains {
            chain.reset();
        }
        self.last_metrics = None;
    }
}
