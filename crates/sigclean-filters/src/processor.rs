//! Block processor trait and timing metrics

use serde::{Deserialize, Serialize};
use sigclean_core::{SampleBlock, SigResult};
use std::time::Instant;

/// Stateful processor over interleaved sample blocks.
///
/// Blocks of one stream must be passed in arrival order; implementations keep
/// filter state across calls.
pub trait SignalProcessor: Send + Sync {
    /// Process a block and return the processed copy
    fn process(&mut self, input: &SampleBlock) -> SigResult<SampleBlock>;

    /// Get processor name/identifier
    fn name(&self) -> &str;

    /// Reset processor internal state
    fn reset(&mut self);

    /// Check if processor can handle the given block
    fn can_process(&self, block: &SampleBlock) -> bool {
        block.channel_count() > 0 && block.sampling_rate() > 0.0
    }
}

/// Timing of one processed block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    /// Wall time spent in `process`, in microseconds
    pub processing_time_us: u64,
    /// Samples per channel in the block
    pub samples_per_channel: usize,
    pub channel_count: usize,
    /// Block duration divided by processing time; above 1 keeps up with real time.
    /// Zero when the elapsed time was too short to measure.
    pub realtime_factor: f32,
    pub success: bool,
    /// Error message if processing failed
    pub error_message: Option<String>,
}

impl ProcessingMetrics {
    /// Start timing a processing operation
    pub fn start_timing() -> ProcessingTimer {
        ProcessingTimer {
            start_time: Instant::now(),
            metrics: ProcessingMetrics {
                success: true,
                ..ProcessingMetrics::default()
            },
        }
    }

    /// Per-sample cost in nanoseconds, over every channel
    pub fn nanos_per_sample(&self) -> f64 {
        let samples = self.samples_per_channel * self.channel_count;
        if samples == 0 {
            return 0.0;
        }
        self.processing_time_us as f64 * 1000.0 / samples as f64
    }
}

/// Helper for timing processing operations
#[derive(Debug)]
pub struct ProcessingTimer {
    start_time: Instant,
    metrics: ProcessingMetrics,
}

impl ProcessingTimer {
    /// Record the shape of the block being processed
    pub fn set_block(&mut self, block: &SampleBlock) {
        self.metrics.samples_per_channel = block.samples_per_channel();
        self.metrics.channel_count = block.channel_count();
    }

    /// Finish timing; `block_duration` is the block's length in seconds
    pub fn finish(mut self, block_duration: f32) -> ProcessingMetrics {
        let elapsed = self.start_time.elapsed();
        self.metrics.processing_time_us = elapsed.as_micros() as u64;

        self.metrics.realtime_factor = realtime_factor(block_duration, elapsed.as_secs_f32());
        self.metrics
    }

    /// Finish with error
    pub fn finish_with_error(mut self, error: &str) -> ProcessingMetrics {
        self.metrics.processing_time_us = self.start_time.elapsed().as_micros() as u64;
        self.metrics.success = false;
        self.metrics.error_message = Some(error.to_string());
        self.metrics
    }
}

/// Zero when the elapsed time is too short to measure
fn realtime_factor(block_duration: f32, elapsed_secs: f32) -> f32 {
    let factor = block_duration / elapsed_secs;
    if elapsed_secs > 0.0 && factor.is_finite() {
        factor
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigclean_core::StreamMetadata;
    use std::time::Duration;

    #[test]
    fn test_processing_metrics() {
        let block = SampleBlock::new(vec![0.0; 500], StreamMetadata::eeg(250.0, 2).unwrap()).unwrap();

        let mut timer = ProcessingMetrics::start_timing();
        timer.set_block(&block);
        std::thread::sleep(Duration::from_millis(1));
        let metrics = timer.finish(block.duration());

        assert!(metrics.processing_time_us > 0);
        assert!(metrics.success);
        assert!(metrics.error_message.is_none());
        assert_eq!(metrics.samples_per_channel, 250);
        assert_eq!(metrics.channel_count, 2);
        assert!(metrics.realtime_factor > 0.0);
        assert!(metrics.nanos_per_sample() > 0.0);
    }

    #[test]
    fn test_failed_metrics() {
        let metrics = ProcessingMetrics::start_timing().finish_with_error("channel mismatch");
        assert!(!metrics.success);
        assert_eq!(metrics.error_message.as_deref(), Some("channel mismatch"));
        assert_eq!(metrics.nanos_per_sample(), 0.0);
    }

    #[test]
    fn test_unmeasurable_time_gives_zero_factor() {
        assert_eq!(realtime_factor(1.0, 0.0), 0.0);
        assert_eq!(realtime_factor(1.0, 1e-45), 0.0);
        assert_eq!(realtime_factor(1.0, 0.5), 2.0);

        let metrics = ProcessingMetrics {
            realtime_factor: realtime_factor(0.1, 0.0),
            ..ProcessingMetrics::default()
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["realtime_factor"], serde_json::json!(0.0));
    }
}
