//! Per-channel filter chain configuration

use crate::dc_blocker::DEFAULT_RESONANCE;
use crate::design::DesignPolicy;
use serde::{Deserialize, Serialize};
use sigclean_core::{config_error, SigError, SigResult, StreamMetadata};
use std::fmt;

pub const DEFAULT_SAMPLE_RATE: f32 = 250.0;
pub const DEFAULT_NOTCH_BANDWIDTH: f32 = 5.0;
pub const DEFAULT_LOWPASS_CUTOFF: f32 = 100.0;
pub const DEFAULT_BAND_LOWER: f32 = 3.0;
pub const DEFAULT_BAND_UPPER: f32 = 45.0;
pub const DEFAULT_OUTLIER_TOLERANCE: f32 = 0.2;

/// Powerline frequencies targeted by the two notch stages
pub const NOTCH_50_HZ: f32 = 50.0;
pub const NOTCH_60_HZ: f32 = 60.0;

/// Pipeline stages, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scaling,
    OutlierTrim,
    DcBlock,
    Smoothing,
    Notch50,
    Notch60,
    Lowpass,
    Bandpass,
}

impl Stage {
    pub const ORDER: [Stage; 8] = [
        Stage::Scaling,
        Stage::OutlierTrim,
        Stage::DcBlock,
        Stage::Smoothing,
        Stage::Notch50,
        Stage::Notch60,
        Stage::Lowpass,
        Stage::Bandpass,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scaling => "scaling",
            Stage::OutlierTrim => "outlier_trim",
            Stage::DcBlock => "dc_block",
            Stage::Smoothing => "smoothing",
            Stage::Notch50 => "notch50",
            Stage::Notch60 => "notch60",
            Stage::Lowpass => "lowpass",
            Stage::Bandpass => "bandpass",
        };
        f.write_str(name)
    }
}

/// Configuration of one channel's filter chain.
///
/// Treated as an immutable value by the chain: changes go through
/// `ChannelFilterChain::reconfigure`, which validates and rebuilds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Sample rate (Hz) all coefficients are designed for
    pub sample_rate: f32,

    pub enable_scaling: bool,
    /// Gain applied by the scaling stage
    pub scalar: f32,

    pub enable_outlier_trim: bool,
    /// Largest accepted jump from the previous output; 0 disables trimming
    pub outlier_tolerance: f32,

    pub enable_dc_block: bool,
    /// DC blocker resonance `r` in (0, 1)
    pub dc_resonance: f32,

    pub enable_smoothing: bool,

    pub enable_notch50: bool,
    pub enable_notch60: bool,
    /// Width (Hz) of both notches
    pub notch_bandwidth: f32,

    pub enable_lowpass: bool,
    pub lowpass_cutoff: f32,

    pub enable_bandpass: bool,
    pub band_lower: f32,
    pub band_upper: f32,

    /// Band-to-section design policy
    pub design: DesignPolicy,
}

impl Default for ChainConfig {
    /// DC block and 50 Hz notch at 250 Hz, the usual EEG display setup
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            enable_scaling: false,
            scalar: 1.0,
            enable_outlier_trim: false,
            outlier_tolerance: DEFAULT_OUTLIER_TOLERANCE,
            enable_dc_block: true,
            dc_resonance: DEFAULT_RESONANCE,
            enable_smoothing: false,
            enable_notch50: true,
            enable_notch60: false,
            notch_bandwidth: DEFAULT_NOTCH_BANDWIDTH,
            enable_lowpass: false,
            lowpass_cutoff: DEFAULT_LOWPASS_CUTOFF,
            enable_bandpass: false,
            band_lower: DEFAULT_BAND_LOWER,
            band_upper: DEFAULT_BAND_UPPER,
            design: DesignPolicy::default(),
        }
    }
}

impl ChainConfig {
    /// Every stage disabled: `apply(x) == x` for finite `x`
    pub fn passthrough(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            enable_dc_block: false,
            enable_notch50: false,
            ..Self::default()
        }
    }

    /// DC block, both notches and a 3-45 Hz bandpass
    pub fn eeg_display(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            enable_notch60: true,
            enable_bandpass: true,
            ..Self::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_scaling(mut self, scalar: f32) -> Self {
        self.enable_scaling = true;
        self.scalar = scalar;
        self
    }

    pub fn with_outlier_trim(mut self, tolerance: f32) -> Self {
        self.enable_outlier_trim = true;
        self.outlier_tolerance = tolerance;
        self
    }

    pub fn with_dc_block(mut self, resonance: f32) -> Self {
        self.enable_dc_block = true;
        self.dc_resonance = resonance;
        self
    }

    pub fn with_notch_bandwidth(mut self, bandwidth: f32) -> Self {
        self.notch_bandwidth = bandwidth;
        self
    }

    pub fn with_lowpass(mut self, cutoff: f32) -> Self {
        self.enable_lowpass = true;
        self.lowpass_cutoff = cutoff;
        self
    }

    pub fn with_bandpass(mut self, lower: f32, upper: f32) -> Self {
        self.enable_bandpass = true;
        self.band_lower = lower;
        self.band_upper = upper;
        self
    }

    pub fn with_design(mut self, design: DesignPolicy) -> Self {
        self.design = design;
        self
    }

    /// Enable or disable a single stage
    pub fn with_stage(mut self, stage: Stage, enabled: bool) -> Self {
        *self.flag_mut(stage) = enabled;
        self
    }

    pub fn is_enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::Scaling => self.enable_scaling,
            Stage::OutlierTrim => self.enable_outlier_trim,
            Stage::DcBlock => self.enable_dc_block,
            Stage::Smoothing => self.enable_smoothing,
            Stage::Notch50 => self.enable_notch50,
            Stage::Notch60 => self.enable_notch60,
            Stage::Lowpass => self.enable_lowpass,
            Stage::Bandpass => self.enable_bandpass,
        }
    }

    fn flag_mut(&mut self, stage: Stage) -> &mut bool {
        match stage {
            Stage::Scaling => &mut self.enable_scaling,
            Stage::OutlierTrim => &mut self.enable_outlier_trim,
            Stage::DcBlock => &mut self.enable_dc_block,
            Stage::Smoothing => &mut self.enable_smoothing,
            Stage::Notch50 => &mut self.enable_notch50,
            Stage::Notch60 => &mut self.enable_notch60,
            Stage::Lowpass => &mut self.enable_lowpass,
            Stage::Bandpass => &mut self.enable_bandpass,
        }
    }

    /// Enabled stages in execution order
    pub fn enabled_stages(&self) -> Vec<Stage> {
        Stage::ORDER
            .into_iter()
            .filter(|stage| self.is_enabled(*stage))
            .collect()
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate / 2.0
    }

    /// Validate every parameter; stages that design against the Nyquist
    /// limit are only checked when enabled.
    pub fn validate(&self) -> SigResult<()> {
        StreamMetadata::validate_sampling_rate(self.sample_rate)?;

        if !self.scalar.is_finite() {
            return Err(config_error!("scalar", "must be finite, got {}", self.scalar));
        }
        if !self.outlier_tolerance.is_finite() || self.outlier_tolerance < 0.0 {
            return Err(config_error!(
                "outlier_tolerance",
                "must be a non-negative finite value, got {}",
                self.outlier_tolerance
            ));
        }
        if !(self.dc_resonance > 0.0 && self.dc_resonance < 1.0) {
            return Err(config_error!(
                "dc_resonance",
                "must lie in (0, 1), got {}",
                self.dc_resonance
            ));
        }
        if !self.notch_bandwidth.is_finite() || self.notch_bandwidth <= 0.0 {
            return Err(config_error!(
                "notch_bandwidth",
                "must be a positive finite value, got {}",
                self.notch_bandwidth
            ));
        }
        if !self.lowpass_cutoff.is_finite() || self.lowpass_cutoff <= 0.0 {
            return Err(config_error!(
                "lowpass_cutoff",
                "must be a positive finite value, got {}",
                self.lowpass_cutoff
            ));
        }
        if !(self.band_lower > 0.0) || !self.band_upper.is_finite() || self.band_upper <= self.band_lower {
            return Err(config_error!(
                "band_edges",
                "need 0 < lower < upper, got [{}, {}]",
                self.band_lower,
                self.band_upper
            ));
        }
        let q_range = self.design.q_range;
        if !(q_range.min > 0.0) || !q_range.max.is_finite() || q_range.max < q_range.min {
            return Err(config_error!(
                "design.q_range",
                "need 0 < min <= max, got [{}, {}]",
                q_range.min,
                q_range.max
            ));
        }

        let nyquist = self.nyquist();
        let below_nyquist = [
            (self.enable_notch50, NOTCH_50_HZ, "enable_notch50"),
            (self.enable_notch60, NOTCH_60_HZ, "enable_notch60"),
            (self.enable_lowpass, self.lowpass_cutoff, "lowpass_cutoff"),
            (self.enable_bandpass, self.band_upper, "band_upper"),
        ];
        for (enabled, freq, parameter) in below_nyquist {
            if enabled && freq >= nyquist {
                return Err(SigError::Configuration {
                    parameter,
                    reason: format!(
                        "{}Hz is not below the Nyquist frequency {}Hz",
                        freq, nyquist
                    ),
                });
            }
        }

        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> SigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SigError::Serialization {
            reason: format!("Failed to serialize chain configuration: {}", e),
        })
    }

    /// Import and validate configuration from JSON
    pub fn from_json(json: &str) -> SigResult<Self> {
        let config: ChainConfig = serde_json::from_str(json).map_err(|e| SigError::Serialization {
            reason: format!("Failed to deserialize chain configuration: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }
}
