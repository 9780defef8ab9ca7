//! Multi-channel biosignal simulator

use crate::signal_patterns::SignalComponent;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use sigclean_core::{
    config_error, PhysicalUnit, SampleBlock, SigResult, SignalKind, StreamMetadata,
};

/// Configuration for a simulated stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub signal_kind: SignalKind,
    /// Sampling rate in Hz
    pub sampling_rate: f32,
    /// Number of channels to simulate
    pub channel_count: usize,
    /// Components summed on every channel
    pub components: Vec<SignalComponent>,
    /// Phase step (radians) between consecutive channels for `Sine` components
    pub channel_phase_step: f32,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::headset(250.0, 8)
    }
}

impl SimulatorConfig {
    /// EEG headset with alpha/beta activity, electrode offset, 50 Hz mains and noise
    pub fn headset(sampling_rate: f32, channel_count: usize) -> Self {
        Self {
            signal_kind: SignalKind::Eeg,
            sampling_rate,
            channel_count,
            components: vec![
                SignalComponent::Sine { frequency: 10.0, amplitude: 20.0 },
                SignalComponent::Sine { frequency: 21.0, amplitude: 6.0 },
                SignalComponent::DcOffset { level: 300.0 },
                SignalComponent::Powerline { frequency: 50.0, amplitude: 40.0 },
                SignalComponent::GaussianNoise { std_dev: 2.0 },
            ],
            channel_phase_step: 0.4,
            seed: None,
        }
    }

    pub fn with_components(mut self, components: Vec<SignalComponent>) -> Self {
        self.components = components;
        self
    }

    pub fn with_component(mut self, component: SignalComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> SigResult<()> {
        StreamMetadata::validate_sampling_rate(self.sampling_rate)?;
        StreamMetadata::validate_channel_count(self.channel_count)?;
        if !self.channel_phase_step.is_finite() {
            return Err(config_error!(
                "channel_phase_step",
                "must be finite, got {}",
                self.channel_phase_step
            ));
        }
        for component in &self.components {
            component.validate()?;
        }
        Ok(())
    }

    pub fn metadata(&self) -> SigResult<StreamMetadata> {
        StreamMetadata::new(
            self.signal_kind,
            self.sampling_rate,
            self.channel_count,
            PhysicalUnit::Microvolts,
        )
    }
}

/// Deterministic (given a seed) generator of interleaved sample blocks
pub struct BiosignalSimulator {
    config: SimulatorConfig,
    metadata: StreamMetadata,
    rng: rand::rngs::StdRng,
    sample_index: u64,
}

impl BiosignalSimulator {
    pub fn new(config: SimulatorConfig) -> SigResult<Self> {
        config.validate()?;
        let metadata = config.metadata()?;

        let rng = match config.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            metadata,
            rng,
            sample_index: 0,
        })
    }

    /// Generate `duration` seconds, continuing where the last block ended
    pub fn generate(&mut self, duration: f32) -> SigResult<SampleBlock> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(config_error!("duration", "must be non-negative, got {}", duration));
        }
        let samples = (duration * self.config.sampling_rate).round() as usize;
        self.generate_samples(samples)
    }

    /// Generate exactly `samples_per_channel` ticks
    pub fn generate_samples(&mut self, samples_per_channel: usize) -> SigResult<SampleBlock> {
        let channels = self.config.channel_count;
        let mut data = Vec::with_capacity(samples_per_channel * channels);

        for _ in 0..samples_per_channel {
            let index = self.sample_index;
            for channel in 0..channels {
                let value = self.sample(index, channel);
                data.push(value);
            }
            self.sample_index += 1;
        }

        SampleBlock::new(data, self.metadata.clone())
    }

    fn sample(&mut self, index: u64, channel: usize) -> f32 {
        let phase = channel as f64 * self.config.channel_phase_step as f64;
        let rate = self.config.sampling_rate;

        let mut value = 0.0;
        let mut dropped = false;
        for component in &self.config.components {
            value += component.value_at(index, rate, phase);
            dropped |= component.drops(index);

            if let SignalComponent::GaussianNoise { std_dev } = *component {
                let z: f32 = self.rng.sample(StandardNormal);
                value += std_dev * z;
            }
        }

        if dropped {
            f32::NAN
        } else {
            value
        }
    }

    /// Restart the time axis; the noise sequence continues
    pub fn reset_time(&mut self) {
        self.sample_index = 0;
    }

    /// Ticks generated since the last time reset
    pub fn elapsed_samples(&self) -> u64 {
        self.sample_index
    }

    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}
