//! Per-channel filter chain
//!
//! Runs the enabled stages in a fixed order on every sample:
//! scaling, outlier trim, DC block, 4-point smoothing, 50 Hz notch,
//! 60 Hz notch, lowpass cascade, bandpass cascade.
//!
//! Every stage carries feedback state, so `apply` must see each sample of
//! its channel exactly once and in arrival order. Reconfiguration takes
//! `&mut self` and therefore can never overlap an `apply` on the same chain.

use crate::biquad::{BiquadSection, ResponseKind};
use crate::config::{ChainConfig, Stage, NOTCH_50_HZ, NOTCH_60_HZ};
use crate::dc_blocker::DcBlocker;
use crate::design;
use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use sigclean_core::{SigError, SigResult};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Identical sections per lowpass and bandpass cascade
pub const CASCADE_SECTIONS: usize = 4;

/// Values held by the smoothing stage
pub const SMOOTHING_WINDOW: usize = 4;

/// Counters describing what a chain has recovered from since its last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDiagnostics {
    /// Samples passed through `apply`
    pub samples_processed: u64,
    /// NaN or infinite inputs replaced by 0
    pub non_finite_inputs: u64,
    /// Non-finite intermediate values that cleared a stage's state
    pub degenerate_outputs: u64,
}

/// Filter groups owned by one chain; always designed from the current config
#[derive(Debug, Clone)]
struct FilterGroups {
    dc_blocker: DcBlocker,
    notch50: BiquadSection,
    notch60: BiquadSection,
    lowpass: [BiquadSection; CASCADE_SECTIONS],
    bandpass: [BiquadSection; CASCADE_SECTIONS],
}

impl FilterGroups {
    /// Design every group. The config is validated before it reaches here;
    /// a design that still fails becomes a pass-through.
    fn design(config: &ChainConfig) -> Self {
        let fs = config.sample_rate;
        let policy = &config.design;

        let dc_blocker = DcBlocker::new(config.dc_resonance).unwrap_or_else(|err| {
            warn!(%err, "dc blocker rejected, using default resonance");
            DcBlocker::default()
        });

        let notch50 = design::notch_section(NOTCH_50_HZ, config.notch_bandwidth, fs, policy)
            .unwrap_or_else(pass_through(ResponseKind::Notch, fs));
        let notch60 = design::notch_section(NOTCH_60_HZ, config.notch_bandwidth, fs, policy)
            .unwrap_or_else(pass_through(ResponseKind::Notch, fs));

        let lowpass = design::lowpass_section(config.lowpass_cutoff, fs)
            .unwrap_or_else(pass_through(ResponseKind::Lowpass, fs));
        let bandpass = design::bandpass_section(config.band_lower, config.band_upper, fs, policy)
            .unwrap_or_else(pass_through(ResponseKind::Bandpass, fs));

        Self {
            dc_blocker,
            notch50,
            notch60,
            lowpass: std::array::from_fn(|_| lowpass.clone()),
            bandpass: std::array::from_fn(|_| bandpass.clone()),
        }
    }

    fn divergences(&self) -> u64 {
        self.dc_blocker.divergence_count()
            + self.notch50.divergence_count()
            + self.notch60.divergence_count()
            + self.lowpass.iter().map(BiquadSection::divergence_count).sum::<u64>()
            + self.bandpass.iter().map(BiquadSection::divergence_count).sum::<u64>()
    }
}

fn pass_through(kind: ResponseKind, sample_rate: f32) -> impl FnOnce(SigError) -> BiquadSection {
    move |err| {
        warn!(%err, %kind, "filter design rejected, using pass-through");
        BiquadSection::identity(kind, sample_rate)
    }
}

/// 4-point smoother.
///
/// Until the window is full each value is buffered and passed on unchanged.
/// From then on the output is the mean of the buffered values, which then
/// replaces the oldest entry.
#[derive(Debug, Clone, Default)]
struct Smoother {
    window: VecDeque<f32>,
    resets: u64,
}

impl Smoother {
    fn apply(&mut self, value: f32) -> f32 {
        if self.window.len() < SMOOTHING_WINDOW {
            self.window.push_back(value);
            return value;
        }

        let mean = self.window.iter().sum::<f32>() / self.window.len() as f32;
        if !mean.is_finite() {
            self.window.clear();
            self.resets += 1;
            return 0.0;
        }

        self.window.pop_front();
        self.window.push_back(mean);
        mean
    }
}

#[inline]
fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Filter chain for a single channel
#[derive(Debug, Clone)]
pub struct ChannelFilterChain {
    config: ChainConfig,
    groups: FilterGroups,
    smoother: Smoother,
    previous_output: f32,
    samples_processed: u64,
    non_finite_inputs: u64,
    overflow_resets: u64,
}

impl ChannelFilterChain {
    /// Build a chain; the configuration is validated first
    pub fn new(config: ChainConfig) -> SigResult<Self> {
        config.validate()?;

        let groups = FilterGroups::design(&config);
        Ok(Self {
            config,
            groups,
            smoother: Smoother::default(),
            previous_output: 0.0,
            samples_processed: 0,
            non_finite_inputs: 0,
            overflow_resets: 0,
        })
    }

    /// Filter one sample through every enabled stage. Always finite.
    pub fn apply(&mut self, raw: f32) -> f32 {
        let cfg = &self.config;

        let mut out = if raw.is_finite() {
            raw
        } else {
            self.non_finite_inputs += 1;
            0.0
        };

        if cfg.enable_scaling {
            out *= cfg.scalar;
            if !out.is_finite() {
                self.overflow_resets += 1;
                out = 0.0;
            }
        }

        if cfg.enable_outlier_trim
            && cfg.outlier_tolerance > 0.0
            && self.previous_output != 0.0
            && (out - self.previous_output).abs() > cfg.outlier_tolerance
        {
            out = self.previous_output;
        }

        if cfg.enable_dc_block {
            out = self.groups.dc_blocker.apply(out);
        }

        if cfg.enable_smoothing {
            out = self.smoother.apply(out);
        }

        if cfg.enable_notch50 {
            out = self.groups.notch50.apply(out);
        }

        if cfg.enable_notch60 {
            out = self.groups.notch60.apply(out);
        }

        if cfg.enable_lowpass {
            for section in self.groups.lowpass.iter_mut() {
                out = section.apply(out);
            }
        }

        if cfg.enable_bandpass {
            for section in self.groups.bandpass.iter_mut() {
                out = section.apply(out);
            }
        }

        let out = finite_or_zero(out);
        self.previous_output = out;
        self.samples_processed = self.samples_processed.wrapping_add(1);
        out
    }

    /// Filter a run of consecutive samples in place
    pub fn apply_slice(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.apply(*sample);
        }
    }

    /// Rebuild every filter group from the current configuration and clear
    /// all state. Configuration is preserved.
    pub fn reset(&mut self) {
        self.groups = FilterGroups::design(&self.config);
        self.smoother = Smoother::default();
        self.previous_output = 0.0;
        self.samples_processed = 0;
        self.non_finite_inputs = 0;
        self.overflow_resets = 0;

        debug!(
            sample_rate = self.config.sample_rate,
            stages = ?self.config.enabled_stages(),
            "filter chain reset"
        );
    }

    /// Swap in a new configuration and reset.
    ///
    /// An invalid configuration is rejected and the chain keeps running
    /// with its previous configuration and state untouched.
    pub fn reconfigure(&mut self, config: ChainConfig) -> SigResult<()> {
        config.validate()?;
        self.config = config;
        self.reset();
        Ok(())
    }

    /// Change the sample rate and reset
    pub fn set_sample_rate(&mut self, sample_rate: f32) -> SigResult<()> {
        let config = self.config.clone().with_sample_rate(sample_rate);
        self.reconfigure(config)
    }

    /// Change the bandpass edges and reset
    pub fn set_bandpass_edges(&mut self, lower: f32, upper: f32) -> SigResult<()> {
        let config = ChainConfig {
            band_lower: lower,
            band_upper: upper,
            ..self.config.clone()
        };
        self.reconfigure(config)
    }

    /// Change the width of both notches and reset
    pub fn set_notch_bandwidth(&mut self, bandwidth: f32) -> SigResult<()> {
        let config = self.config.clone().with_notch_bandwidth(bandwidth);
        self.reconfigure(config)
    }

    /// Enable or disable one stage and reset
    pub fn set_stage_enabled(&mut self, stage: Stage, enabled: bool) -> SigResult<()> {
        let config = self.config.clone().with_stage(stage, enabled);
        self.reconfigure(config)
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate
    }

    /// Output of the most recent `apply`, 0 after a reset
    pub fn previous_output(&self) -> f32 {
        self.previous_output
    }

    /// Samples processed since the last reset
    pub fn sample_count(&self) -> u64 {
        self.samples_processed
    }

    pub fn diagnostics(&self) -> ChainDiagnostics {
        ChainDiagnostics {
            samples_processed: self.samples_processed,
            non_finite_inputs: self.non_finite_inputs,
            degenerate_outputs: self.groups.divergences() + self.smoother.resets + self.overflow_resets,
        }
    }

    pub fn dc_blocker(&self) -> &DcBlocker {
        &self.groups.dc_blocker
    }

    pub fn notch50_section(&self) -> &BiquadSection {
        &self.groups.notch50
    }

    pub fn notch60_section(&self) -> &BiquadSection {
        &self.groups.notch60
    }

    pub fn lowpass_sections(&self) -> &[BiquadSection] {
        &self.groups.lowpass
    }

    pub fn bandpass_sections(&self) -> &[BiquadSection] {
        &self.groups.bandpass
    }

    /// Combined response of the lowpass cascade at `freq` Hz
    pub fn lowpass_cascade_response(&self, freq: f32) -> Complex32 {
        cascade_response(&self.groups.lowpass, freq)
    }

    /// Combined response of the bandpass cascade at `freq` Hz
    pub fn bandpass_cascade_response(&self, freq: f32) -> Complex32 {
        cascade_response(&self.groups.bandpass, freq)
    }
}

fn cascade_response(sections: &[BiquadSection], freq: f32) -> Complex32 {
    sections
        .iter()
        .map(|section| section.frequency_response(freq))
        .fold(Complex32::new(1.0, 0.0), |acc, h| acc * h)
}
