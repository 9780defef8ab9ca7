//! Notch and bandpass design helpers
//!
//! Two lineages of this engine disagree on how a two-edge band becomes a
//! single section: arithmetic vs geometric center frequency, and a Q range of
//! [0.5, 15] vs [0.1, 100]. Both are available as named policies; nothing here
//! picks one implicitly.

use crate::biquad::{BiquadSection, ResponseKind, BUTTERWORTH_Q};
use serde::{Deserialize, Serialize};
use sigclean_core::{config_error, SigResult};

/// How a band's center frequency is derived from its edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenterRule {
    /// `(low + high) / 2`
    ArithmeticMean,
    /// `sqrt(low * high)`, symmetric on a log-frequency axis
    GeometricMean,
}

/// Stability range that computed Q values are clamped into
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QRange {
    pub min: f32,
    pub max: f32,
}

impl QRange {
    /// [0.5, 15]: rejects very wide and very sharp designs
    pub const NARROW: QRange = QRange { min: 0.5, max: 15.0 };
    /// [0.1, 100]
    pub const WIDE: QRange = QRange { min: 0.1, max: 100.0 };

    pub fn clamp(&self, q: f32) -> f32 {
        q.max(self.min).min(self.max)
    }
}

/// Band-to-section design policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DesignPolicy {
    pub center: CenterRule,
    pub q_range: QRange,
}

impl DesignPolicy {
    /// Arithmetic center, Q in [0.5, 15]
    pub const CONSERVATIVE: DesignPolicy = DesignPolicy {
        center: CenterRule::ArithmeticMean,
        q_range: QRange::NARROW,
    };

    /// Geometric center, Q in [0.1, 100]
    pub const GEOMETRIC_WIDE: DesignPolicy = DesignPolicy {
        center: CenterRule::GeometricMean,
        q_range: QRange::WIDE,
    };
}

impl Default for DesignPolicy {
    fn default() -> Self {
        Self::CONSERVATIVE
    }
}

/// Reduce two band edges to a center frequency
pub fn center_frequency(low_edge: f32, high_edge: f32, rule: CenterRule) -> f32 {
    match rule {
        CenterRule::ArithmeticMean => (low_edge + high_edge) / 2.0,
        CenterRule::GeometricMean => (low_edge * high_edge).sqrt(),
    }
}

/// Width of a band
pub fn bandwidth(low_edge: f32, high_edge: f32) -> f32 {
    high_edge - low_edge
}

/// `Q = frequency / bandwidth`, clamped into `range`.
///
/// A non-positive or non-finite bandwidth yields `range.max`, the narrowest
/// stable section, rather than an undefined Q.
pub fn clamp_q(frequency: f32, bandwidth: f32, range: QRange) -> f32 {
    let q = frequency / bandwidth;
    if !(bandwidth > 0.0) || !q.is_finite() {
        return range.max;
    }
    range.clamp(q)
}

/// Notch section at `frequency` rejecting roughly `bandwidth` Hz
pub fn notch_section(
    frequency: f32,
    bandwidth: f32,
    sample_rate: f32,
    policy: &DesignPolicy,
) -> SigResult<BiquadSection> {
    if !(bandwidth > 0.0) || !bandwidth.is_finite() {
        return Err(config_error!("notch_bandwidth", "must be positive, got {}", bandwidth));
    }

    let q = clamp_q(frequency, bandwidth, policy.q_range);
    BiquadSection::new(ResponseKind::Notch, frequency, sample_rate, q, 0.0)
}

/// Bandpass section passing `[low_edge, high_edge]`
pub fn bandpass_section(
    low_edge: f32,
    high_edge: f32,
    sample_rate: f32,
    policy: &DesignPolicy,
) -> SigResult<BiquadSection> {
    if !(low_edge > 0.0) || !high_edge.is_finite() || high_edge <= low_edge {
        return Err(config_error!(
            "band_edges",
            "need 0 < lower < upper, got [{}, {}]",
            low_edge,
            high_edge
        ));
    }

    let center = center_frequency(low_edge, high_edge, policy.center);
    let q = clamp_q(center, bandwidth(low_edge, high_edge), policy.q_range);
    BiquadSection::new(ResponseKind::Bandpass, center, sample_rate, q, 0.0)
}

/// Butterworth-Q lowpass section at `cutoff`
pub fn lowpass_section(cutoff: f32, sample_rate: f32) -> SigResult<BiquadSection> {
    if !(cutoff > 0.0) {
        return Err(config_error!("lowpass_cutoff", "must be positive, got {}", cutoff));
    }
    BiquadSection::new(ResponseKind::Lowpass, cutoff, sample_rate, BUTTERWORTH_Q, 0.0)
}
