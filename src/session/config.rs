use std::time::Duration;

use crate::audio::PEAKS_PER_SECOND;
use crate::config::Config;

/// Timing parameters for a recording session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval at which the chunk encoder delivers data.
    /// Also the grace period for late chunks when a pass stops.
    /// Default: 1 second
    pub timeslice: Duration,

    /// Live waveform sampling cadence (default: 20ms)
    pub sample_interval: Duration,

    /// Samples inspected per live peak (default: 2048)
    pub window_size: usize,

    /// Peaks per second for the merged waveform (default: 50)
    pub peaks_per_second: u32,

    /// Elapsed-time notification interval (default: 1 second)
    pub tick_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeslice: Duration::from_secs(1),
            sample_interval: Duration::from_millis(20),
            window_size: 2048,
            peaks_per_second: PEAKS_PER_SECOND,
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            timeslice: config.timeslice(),
            sample_interval: config.sample_interval(),
            window_size: config.visualizer.window_size.max(1),
            peaks_per_second: config.preview.peaks_per_second.max(1),
            tick_interval: config.tick_interval(),
        }
    }
}
