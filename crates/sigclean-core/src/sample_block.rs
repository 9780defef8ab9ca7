//! SampleBlock: interleaved multi-channel sample container

use crate::error::{SigError, SigResult};
use crate::metadata::StreamMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A run of consecutive ticks for every channel of a stream
#[derive(Debug, Clone)]
pub struct SampleBlock {
    /// Unique identifier for this block
    pub id: Uuid,
    /// Sample data, interleaved by tick: `[ch0_t0, ch1_t0, ch0_t1, ...]`
    pub data: Vec<f32>,
    /// Stream metadata
    pub metadata: StreamMetadata,
}

impl SampleBlock {
    /// Create a block from interleaved data
    pub fn new(data: Vec<f32>, metadata: StreamMetadata) -> SigResult<Self> {
        if metadata.channel_count == 0 || data.len() % metadata.channel_count != 0 {
            return Err(SigError::InvalidSignalData {
                reason: format!(
                    "Data length {} is not a multiple of channel count {}",
                    data.len(),
                    metadata.channel_count
                ),
            });
        }

        Ok(SampleBlock {
            id: Uuid::new_v4(),
            data,
            metadata,
        })
    }

    /// Create a block from per-channel vectors of equal length
    pub fn from_channels(channels: &[Vec<f32>], metadata: StreamMetadata) -> SigResult<Self> {
        if channels.len() != metadata.channel_count {
            return Err(SigError::ChannelMismatch {
                expected: metadata.channel_count,
                actual: channels.len(),
            });
        }

        let samples = channels.first().map_or(0, Vec::len);
        if channels.iter().any(|ch| ch.len() != samples) {
            return Err(SigError::InvalidSignalData {
                reason: "All channels must hold the same number of samples".to_string(),
            });
        }

        let mut data = Vec::with_capacity(samples * channels.len());
        for sample_idx in 0..samples {
            for channel in channels {
                data.push(channel[sample_idx]);
            }
        }

        SampleBlock::new(data, metadata)
    }

    /// Get total number of samples across all channels
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if block is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get number of samples per channel
    pub fn samples_per_channel(&self) -> usize {
        self.data.len() / self.metadata.channel_count
    }

    /// Iterate over ticks; each item holds one sample per channel
    pub fn frames(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.metadata.channel_count)
    }

    /// Get data for a specific channel
    pub fn channel_data(&self, channel_index: usize) -> SigResult<Vec<f32>> {
        if channel_index >= self.metadata.channel_count {
            return Err(SigError::InvalidSignalData {
                reason: format!(
                    "Channel index {} out of bounds (0-{})",
                    channel_index,
                    self.metadata.channel_count - 1
                ),
            });
        }

        Ok(self
            .frames()
            .map(|frame| frame[channel_index])
            .collect())
    }

    /// Get all channel data as separate vectors
    pub fn all_channels(&self) -> SigResult<Vec<Vec<f32>>> {
        (0..self.metadata.channel_count)
            .map(|ch| self.channel_data(ch))
            .collect()
    }

    /// Block duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples_per_channel() as f32 / self.metadata.sampling_rate
    }

    /// Get sampling rate
    pub fn sampling_rate(&self) -> f32 {
        self.metadata.sampling_rate
    }

    /// Get channel count
    pub fn channel_count(&self) -> usize {
        self.metadata.channel_count
    }

    /// Calculate basic statistics for a channel
    pub fn channel_stats(&self, channel_index: usize) -> SigResult<ChannelStats> {
        let data = self.channel_data(channel_index)?;
        Ok(ChannelStats::calculate(&data))
    }
}

/// Basic statistics for a signal channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f32,
    pub rms: f32,
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
    pub peak_to_peak: f32,
    /// Samples that were NaN or infinite; excluded from the other fields
    pub non_finite: usize,
}

impl ChannelStats {
    pub fn calculate(data: &[f32]) -> Self {
        let finite: Vec<f32> = data.iter().copied().filter(|x| x.is_finite()).collect();
        let non_finite = data.len() - finite.len();

        if finite.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
                non_finite,
            };
        }

        let n = finite.len() as f32;
        let mean = finite.iter().sum::<f32>() / n;

        let sum_sq: f32 = finite.iter().map(|x| x * x).sum();
        let rms = (sum_sq / n).sqrt();

        let variance: f32 = finite.iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f32>() / n;
        let std_dev = variance.sqrt();

        let min = finite.iter().fold(f32::INFINITY, |a, &b| a.min(b));
        let max = finite.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));

        Self {
            mean,
            rms,
            std_dev,
            min,
            max,
            peak_to_peak: max - min,
            non_finite,
        }
    }
}
