//! One-pole DC blocker: `y[n] = x[n] - x[n-1] + r*y[n-1]`

use sigclean_core::{config_error, SigResult};
use std::f32::consts::PI;
use tracing::warn;

/// Resonance used when none is configured
pub const DEFAULT_RESONANCE: f32 = 0.995;

/// First-order high-pass with its cutoff near 0 Hz.
///
/// Higher `r` removes bias more slowly but distorts low-frequency content
/// less; the decay time constant is `1 / (1 - r)` samples.
#[derive(Debug, Clone)]
pub struct DcBlocker {
    r: f32,
    x1: f32,
    y1: f32,
    divergences: u64,
}

impl DcBlocker {
    /// Create a blocker; `r` must lie strictly between 0 and 1
    pub fn new(r: f32) -> SigResult<Self> {
        if !(r > 0.0 && r < 1.0) {
            return Err(config_error!("dc_resonance", "must lie in (0, 1), got {}", r));
        }

        Ok(Self {
            r,
            x1: 0.0,
            y1: 0.0,
            divergences: 0,
        })
    }

    /// Filter one sample, with the same non-finite policy as a biquad section
    #[inline]
    pub fn apply(&mut self, sample: f32) -> f32 {
        let x = if sample.is_finite() { sample } else { 0.0 };
        let y = x - self.x1 + self.r * self.y1;

        if !y.is_finite() {
            self.reset();
            self.divergences += 1;
            warn!(r = self.r, "dc blocker output diverged, state cleared");
            return 0.0;
        }

        self.x1 = x;
        self.y1 = y;
        y
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }

    pub fn resonance(&self) -> f32 {
        self.r
    }

    /// Approximate -3 dB corner for the given sample rate
    pub fn cutoff_hz(&self, sample_rate: f32) -> f32 {
        (1.0 - self.r) * sample_rate / (2.0 * PI)
    }

    /// Samples for a constant offset to decay by 1/e
    pub fn time_constant_samples(&self) -> f32 {
        1.0 / (1.0 - self.r)
    }

    pub fn divergence_count(&self) -> u64 {
        self.divergences
    }
}

impl Default for DcBlocker {
    fn default() -> Self {
        Self {
            r: DEFAULT_RESONANCE,
            x1: 0.0,
            y1: 0.0,
            divergences: 0,
        }
    }
}
