//! sigclean-core: Foundation types for real-time biosignal filtering
//!
//! Error type, stream metadata and the interleaved sample container shared
//! by the filter engine and its collaborators.

pub mod error;
pub mod metadata;
pub mod sample_block;

pub use error::{SigError, SigResult};
pub use metadata::*;
pub use sample_block::*;
