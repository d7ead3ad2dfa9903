//! Engine configuration.
//!
//! Loaded from JSON (every field optional) or assembled with the builder
//! setters. [`EngineConfig::validate`] runs before an engine accepts it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::psg::StereoMode;
use crate::track_info::DEFAULT_TRACK_LENGTH_MS;
use crate::{Error, Result};

/// Output rate used when none is configured.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Configuration for [`PlaybackEngine`](crate::PlaybackEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Play length for tracks whose files carry no length.
    pub default_track_length_ms: u32,
    /// Fade duration used by the automatic fade at the end of the play length.
    pub fade_length_ms: u32,
    /// Continuous near-silence after which a track counts as ended.
    pub silence_timeout_ms: u32,
    /// Frames per block requested by streaming sinks.
    pub block_frames: usize,
    /// Voice placement in the stereo field.
    pub stereo: StereoMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            default_track_length_ms: DEFAULT_TRACK_LENGTH_MS,
            fade_length_ms: 8_000,
            silence_timeout_ms: 6_000,
            block_frames: 1_024,
            stereo: StereoMode::Abc,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(Error::Config(format!(
                "sample_rate {} outside 8000..=192000",
                self.sample_rate
            )));
        }
        if self.default_track_length_ms == 0 {
            return Err(Error::Config("default_track_length_ms must be > 0".into()));
        }
        if self.block_frames == 0 {
            return Err(Error::Config("block_frames must be > 0".into()));
        }
        Ok(())
    }

    /// Set the output sample rate.
    pub fn sample_rate(mut self, hz: u32) -> Self {
        self.sample_rate = hz;
        self
    }

    /// Set the fallback play length.
    pub fn default_track_length_ms(mut self, ms: u32) -> Self {
        self.default_track_length_ms = ms;
        self
    }

    /// Set the automatic fade duration.
    pub fn fade_length_ms(mut self, ms: u32) -> Self {
        self.fade_length_ms = ms;
        self
    }

    /// Set the silence detection window.
    pub fn silence_timeout_ms(mut self, ms: u32) -> Self {
        self.silence_timeout_ms = ms;
        self
    }

    /// Set the streaming block size.
    pub fn block_frames(mut self, frames: usize) -> Self {
        self.block_frames = frames;
        self
    }

    /// Set the stereo placement.
    pub fn stereo(mut self, stereo: StereoMode) -> Self {
        self.stereo = stereo;
        self
    }
}
