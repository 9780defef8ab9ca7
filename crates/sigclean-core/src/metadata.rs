//! Stream metadata for multi-channel biosignal acquisition

use serde::{Deserialize, Serialize};
use crate::error::{SigError, SigResult};

/// Maximum channel count accepted for one stream
pub const MAX_CHANNELS: usize = 256;

/// Biosignal classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Electroencephalography
    Eeg,
    /// Electromyography
    Emg,
    /// Electrocardiography
    Ecg,
    /// Anything else sampled as a scalar per channel
    Other,
}

/// Physical unit of the sample values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalUnit {
    Microvolts,
    Millivolts,
    Volts,
}

/// Metadata describing one acquisition stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Kind of biosignal carried by the stream
    pub signal_kind: SignalKind,
    /// Sampling rate in Hz
    pub sampling_rate: f32,
    /// Number of channels
    pub channel_count: usize,
    /// Unit of every sample value
    pub unit: PhysicalUnit,
}

impl StreamMetadata {
    /// Create new stream metadata
    pub fn new(
        signal_kind: SignalKind,
        sampling_rate: f32,
        channel_count: usize,
        unit: PhysicalUnit,
    ) -> SigResult<Self> {
        Self::validate_sampling_rate(sampling_rate)?;
        Self::validate_channel_count(channel_count)?;

        Ok(StreamMetadata {
            signal_kind,
            sampling_rate,
            channel_count,
            unit,
        })
    }

    /// EEG stream in microvolts, the common case for headset acquisition
    pub fn eeg(sampling_rate: f32, channel_count: usize) -> SigResult<Self> {
        Self::new(SignalKind::Eeg, sampling_rate, channel_count, PhysicalUnit::Microvolts)
    }

    /// Validate a sampling rate
    pub fn validate_sampling_rate(rate: f32) -> SigResult<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(crate::config_error!(
                "sampling_rate",
                "must be a positive finite value, got {}",
                rate
            ));
        }
        Ok(())
    }

    /// Validate channel count
    pub fn validate_channel_count(count: usize) -> SigResult<()> {
        if count == 0 || count > MAX_CHANNELS {
            Err(SigError::Configuration {
                parameter: "channel_count",
                reason: format!("must be between 1 and {}, got {}", MAX_CHANNELS, count),
            })
        } else {
            Ok(())
        }
    }

    /// Nyquist frequency of the stream
    pub fn nyquist(&self) -> f32 {
        self.sampling_rate / 2.0
    }
}

impl Default for StreamMetadata {
    fn default() -> Self {
        StreamMetadata {
            signal_kind: SignalKind::Eeg,
            sampling_rate: 250.0,
            channel_count: 8,
            unit: PhysicalUnit::Microvolts,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Eeg => write!(f, "EEG"),
            SignalKind::Emg => write!(f, "EMG"),
            SignalKind::Ecg => write!(f, "ECG"),
            SignalKind::Other => write!(f, "Other"),
        }
    }
}

impl std::fmt::Display for PhysicalUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhysicalUnit::Microvolts => write!(f, "µV"),
            PhysicalUnit::Millivolts => write!(f, "mV"),
            PhysicalUnit::Volts => write!(f, "V"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_validation() {
        assert!(StreamMetadata::eeg(250.0, 8).is_ok());
        assert!(StreamMetadata::eeg(0.0, 8).is_err());
        assert!(StreamMetadata::eeg(f32::NAN, 8).is_err());
        assert!(StreamMetadata::eeg(250.0, 0).is_err());
        assert!(StreamMetadata::eeg(250.0, MAX_CHANNELS + 1).is_err());
    }

    #[test]
    fn test_display() {
        let metadata = StreamMetadata::default();
        assert_eq!(metadata.signal_kind.to_string(), "EEG");
        assert_eq!(metadata.unit.to_string(), "µV");
        assert_eq!(metadata.nyquist(), 125.0);
    }
}
