//! sigclean-filters: Real-time per-channel biosignal filtering
//!
//! Biquad sections, a DC blocker, band design helpers and the per-channel
//! chain that orders them, plus a multi-channel bank over sample blocks.

pub mod bank;
pub mod biquad;
pub mod chain;
pub mod config;
pub mod dc_blocker;
pub mod design;
pub mod processor;

pub use bank::ChannelFilterBank;
pub use biquad::{BiquadDesign, BiquadSection, Coefficients, ResponseKind, BUTTERWORTH_Q};
pub use chain::{ChainDiagnostics, ChannelFilterChain, CASCADE_SECTIONS, SMOOTHING_WINDOW};
pub use config::{ChainConfig, Stage};
pub use dc_blocker::DcBlocker;
pub use design::{CenterRule, DesignPolicy, QRange};
pub use processor::{ProcessingMetrics, SignalProcessor};
