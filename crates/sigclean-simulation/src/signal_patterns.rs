//! Building blocks for synthetic biosignals and their common artifacts

use serde::{Deserialize, Serialize};
use sigclean_core::{config_error, SigResult};
use std::f64::consts::PI;

/// One additive component of a simulated channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalComponent {
    /// Sinusoid; shifted by the per-channel phase offset
    Sine { frequency: f32, amplitude: f32 },
    /// Constant electrode offset
    DcOffset { level: f32 },
    /// Mains interference, identical on every channel
    Powerline { frequency: f32, amplitude: f32 },
    /// Zero-mean white noise
    GaussianNoise { std_dev: f32 },
    /// Single-sample artifact every `interval` samples
    Spike { interval: u64, amplitude: f32 },
    /// Lost sample (NaN) every `interval` samples
    Dropout { interval: u64 },
}

impl SignalComponent {
    /// Deterministic contribution at `sample_index`; noise is drawn by the simulator
    pub fn value_at(&self, sample_index: u64, sample_rate: f32, phase: f64) -> f32 {
        let time = sample_index as f64 / sample_rate as f64;
        match *self {
            SignalComponent::Sine { frequency, amplitude } => {
                (amplitude as f64 * (2.0 * PI * frequency as f64 * time + phase).sin()) as f32
            }
            SignalComponent::DcOffset { level } => level,
            SignalComponent::Powerline { frequency, amplitude } => {
                (amplitude as f64 * (2.0 * PI * frequency as f64 * time).sin()) as f32
            }
            SignalComponent::Spike { interval, amplitude } => {
                if fires(sample_index, interval) {
                    amplitude
                } else {
                    0.0
                }
            }
            SignalComponent::GaussianNoise { .. } | SignalComponent::Dropout { .. } => 0.0,
        }
    }

    /// Whether this component replaces the sample at `sample_index` with NaN
    pub fn drops(&self, sample_index: u64) -> bool {
        match *self {
            SignalComponent::Dropout { interval } => fires(sample_index, interval),
            _ => false,
        }
    }

    pub fn validate(&self) -> SigResult<()> {
        match *self {
            SignalComponent::Sine { frequency, amplitude }
            | SignalComponent::Powerline { frequency, amplitude } => {
                if !frequency.is_finite() || frequency < 0.0 {
                    return Err(config_error!("frequency", "must be non-negative, got {}", frequency));
                }
                if !amplitude.is_finite() {
                    return Err(config_error!("amplitude", "must be finite, got {}", amplitude));
                }
            }
            SignalComponent::DcOffset { level } => {
                if !level.is_finite() {
                    return Err(config_error!("level", "must be finite, got {}", level));
                }
            }
            SignalComponent::GaussianNoise { std_dev } => {
                if !std_dev.is_finite() || std_dev < 0.0 {
                    return Err(config_error!("std_dev", "must be non-negative, got {}", std_dev));
                }
            }
            SignalComponent::Spike { interval, amplitude } => {
                if interval == 0 {
                    return Err(config_error!("interval", "spike interval must be at least 1"));
                }
                if !amplitude.is_finite() {
                    return Err(config_error!("amplitude", "must be finite, got {}", amplitude));
                }
            }
            SignalComponent::Dropout { interval } => {
                if interval == 0 {
                    return Err(config_error!("interval", "dropout interval must be at least 1"));
                }
            }
        }
        Ok(())
    }

    pub fn description(&self) -> &'static str {
        match self {
            SignalComponent::Sine { .. } => "Sinusoid",
            SignalComponent::DcOffset { .. } => "DC offset",
            SignalComponent::Powerline { .. } => "Powerline interference",
            SignalComponent::GaussianNoise { .. } => "Gaussian noise",
            SignalComponent::Spike { .. } => "Periodic spikes",
            SignalComponent::Dropout { .. } => "Periodic dropouts",
        }
    }

    /// Named component sets for EEG-like test signals, in microvolts
    pub fn presets() -> Vec<(&'static str, Vec<SignalComponent>)> {
        vec![
            ("Clean Alpha", vec![SignalComponent::Sine { frequency: 10.0, amplitude: 20.0 }]),
            (
                "Headset",
                vec![
                    SignalComponent::Sine { frequency: 10.0, amplitude: 20.0 },
                    SignalComponent::Sine { frequency: 21.0, amplitude: 6.0 },
                    SignalComponent::DcOffset { level: 300.0 },
                    SignalComponent::Powerline { frequency: 50.0, amplitude: 40.0 },
                    SignalComponent::GaussianNoise { std_dev: 2.0 },
                ],
            ),
            (
                "Mains 60 Hz",
                vec![
                    SignalComponent::Sine { frequency: 10.0, amplitude: 20.0 },
                    SignalComponent::Powerline { frequency: 60.0, amplitude: 40.0 },
                ],
            ),
            (
                "Artifacts",
                vec![
                    SignalComponent::Sine { frequency: 10.0, amplitude: 20.0 },
                    SignalComponent::DcOffset { level: -150.0 },
                    SignalComponent::Spike { interval: 125, amplitude: 2000.0 },
                    SignalComponent::Dropout { interval: 97 },
                ],
            ),
        ]
    }
}

fn fires(sample_index: u64, interval: u64) -> bool {
    interval > 0 && sample_index > 0 && sample_index % interval == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_and_offset() {
        let sine = SignalComponent::Sine { frequency: 10.0, amplitude: 2.0 };
        assert_eq!(sine.value_at(0, 250.0, 0.0), 0.0);
        // Quarter period at 1 kHz
        assert!((sine.value_at(25, 1000.0, 0.0) - 2.0).abs() < 1e-5);
        // Phase offset shifts the channel
        assert!((sine.value_at(0, 250.0, std::f64::consts::FRAC_PI_2) - 2.0).abs() < 1e-5);

        let offset = SignalComponent::DcOffset { level: 300.0 };
        assert_eq!(offset.value_at(12345, 250.0, 1.0), 300.0);
    }

    #[test]
    fn test_powerline_ignores_phase() {
        let mains = SignalComponent::Powerline { frequency: 50.0, amplitude: 1.0 };
        assert_eq!(mains.value_at(3, 250.0, 0.0), mains.value_at(3, 250.0, 2.0));
    }

    #[test]
    fn test_periodic_artifacts() {
        let spike = SignalComponent::Spike { interval: 10, amplitude: 500.0 };
        let dropout = SignalComponent::Dropout { interval: 4 };

        assert_eq!(spike.value_at(0, 250.0, 0.0), 0.0);
        assert_eq!(spike.value_at(10, 250.0, 0.0), 500.0);
        assert_eq!(spike.value_at(11, 250.0, 0.0), 0.0);

        let dropped: Vec<u64> = (0..13).filter(|&i| dropout.drops(i)).collect();
        assert_eq!(dropped, vec![4, 8, 12]);
        assert!(!spike.drops(10));
    }

    #[test]
    fn test_validation() {
        assert!(SignalComponent::Spike { interval: 0, amplitude: 1.0 }.validate().is_err());
        assert!(SignalComponent::Dropout { interval: 0 }.validate().is_err());
        assert!(SignalComponent::GaussianNoise { std_dev: -1.0 }.validate().is_err());
        assert!(SignalComponent::Sine { frequency: f32::NAN, amplitude: 1.0 }.validate().is_err());

        for (_, components) in SignalComponent::presets() {
            assert!(components.iter().all(|c| c.validate().is_ok()));
        }
    }
}
