use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Engine configuration.
///
/// Every section has defaults, so a missing file yields `Config::default()`.
/// Values can be overridden through `VOICE_MEMO__<SECTION>__<KEY>` variables.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub recorder: RecorderConfig,
    pub visualizer: VisualizerConfig,
    pub preview: PreviewConfig,
    pub session: SessionTimingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Sample rate requested from input backends
    pub sample_rate: u32,
    /// 1 = mono, 2 = stereo
    pub channels: u16,
    /// Size of each delivered frame block in milliseconds
    pub buffer_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            buffer_duration_ms: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Interval at which encoded chunks are delivered
    pub timeslice_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self { timeslice_ms: 1000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub sample_interval_ms: u64,
    /// Number of most recent samples inspected per live peak
    pub window_size: usize,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 20,
            window_size: 2048,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub peaks_per_second: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            peaks_per_second: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionTimingConfig {
    /// How often elapsed time is reported while recording
    pub tick_interval_ms: u64,
}

impl Default for SessionTimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("VOICE_MEMO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        Ok(settings.try_deserialize()?)
    }

    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.recorder.timeslice_ms.max(1))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.visualizer.sample_interval_ms.max(1))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.session.tick_interval_ms.max(1))
    }
}
