//! Error handling for the sigclean engine
//!
//! Errors surface only at setup time (construction, reset, reconfiguration).
//! The per-sample path recovers from numeric faults internally and never
//! returns an error.

use core::fmt;

/// Result type alias for sigclean operations
pub type SigResult<T> = Result<T, SigError>;

/// Error type for all sigclean operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SigError {
    /// A configuration parameter is out of range or inconsistent
    Configuration {
        /// Name of the offending parameter
        parameter: &'static str,
        /// Description of the problem
        reason: String,
    },

    /// A filter response kind name that is not one of the supported designs
    UnknownResponseKind {
        /// The name that failed to parse
        name: String,
    },

    /// Sample data does not match its declared layout
    InvalidSignalData {
        /// Description of the data issue
        reason: String,
    },

    /// Block channel count does not match the processor
    ChannelMismatch {
        /// Channels the processor was built for
        expected: usize,
        /// Channels found in the input
        actual: usize,
    },

    /// Block sampling rate does not match the processor
    SamplingRateMismatch {
        /// Rate the processor was designed for (Hz)
        expected: f32,
        /// Rate found in the input (Hz)
        actual: f32,
    },

    /// Serialization/deserialization error
    Serialization {
        /// Serialization error description
        reason: String,
    },
}

impl SigError {
    /// True for errors caused by invalid setup parameters
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SigError::Configuration { .. } | SigError::UnknownResponseKind { .. }
        )
    }
}

impl fmt::Display for SigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigError::Configuration { parameter, reason } => {
                write!(f, "Invalid configuration for '{}': {}", parameter, reason)
            }
            SigError::UnknownResponseKind { name } => {
                write!(f, "Unknown response kind '{}', valid kinds: lowpass, highpass, \
                           bandpass, notch, peak, lowshelf, highshelf", name)
            }
            SigError::InvalidSignalData { reason } => {
                write!(f, "Invalid signal data: {}", reason)
            }
            SigError::ChannelMismatch { expected, actual } => {
                write!(f, "Channel mismatch: expected {} channels, got {}",
                       expected, actual)
            }
            SigError::SamplingRateMismatch { expected, actual } => {
                write!(f, "Sampling rate mismatch: expected {}Hz, got {}Hz",
                       expected, actual)
            }
            SigError::Serialization { reason } => {
                write!(f, "Serialization error: {}", reason)
            }
        }
    }
}

impl std::error::Error for SigError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($parameter:literal, $($arg:tt)+) => {
        $crate::error::SigError::Configuration {
            parameter: $parameter,
            reason: format!($($arg)+),
        }
    };
}
