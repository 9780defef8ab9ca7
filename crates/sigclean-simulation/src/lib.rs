//! sigclean-simulation: Synthetic biosignal streams for exercising the filters
//!
//! Seeded multi-channel generators with realistic artifacts, and a tokio
//! stream that filters each block as it is produced.

pub mod real_time_stream;
pub mod signal_patterns;
pub mod simulator;

pub use real_time_stream::*;
pub use signal_patterns::*;
pub use simulator::*;
