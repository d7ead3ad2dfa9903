//! Emulator backend contract and format registry.
//!
//! # Trait Hierarchy
//!
//! - [`BackendFormat`] - static capabilities of a file family: content
//!   sniffing, opening a session and reading metadata without one
//! - [`EmulatorBackend`] - one open file: track selection, rendering and
//!   the per-track transport knobs (mute, tempo, fade, silence detection)
//!
//! Both are object safe; the engine only ever holds `Box<dyn EmulatorBackend>`
//! and [`BackendRegistry`] holds `Box<dyn BackendFormat>` in probe order.

mod output;

#[cfg(feature = "ay-format")]
pub mod ay;
#[cfg(feature = "ym-format")]
pub mod ym;

pub use output::OutputStage;

use crate::config::EngineConfig;
use crate::psg::StereoMode;
use crate::track_info::TrackInfo;
use crate::{Error, Result};

/// Slowest tempo scale a session runs at.
pub const MIN_TEMPO: f64 = 0.02;

/// Fastest tempo scale a session runs at.
pub const MAX_TEMPO: f64 = 4.0;

/// Clamp `scale` into `MIN_TEMPO..=MAX_TEMPO`; `None` for NaN or infinities.
pub fn clamp_tempo(scale: f64) -> Option<f64> {
    scale
        .is_finite()
        .then(|| scale.clamp(MIN_TEMPO, MAX_TEMPO))
}

/// Parameters every backend session is opened with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenOptions {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Voice placement in the stereo field.
    pub stereo: StereoMode,
    /// Continuous near-silence after which a track counts as ended.
    pub silence_timeout_ms: u32,
}

impl OpenOptions {
    /// Options for `sample_rate` with default stereo and silence settings.
    pub fn new(sample_rate: u32) -> Self {
        let defaults = EngineConfig::default();
        Self {
            sample_rate,
            stereo: defaults.stereo,
            silence_timeout_ms: defaults.silence_timeout_ms,
        }
    }
}

impl From<&EngineConfig> for OpenOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            stereo: config.stereo,
            silence_timeout_ms: config.silence_timeout_ms,
        }
    }
}

/// One open file, ready to render.
///
/// A freshly opened session is positioned at the start of track 0.
/// `start_track` resets fade, tempo, mute and silence handling to their
/// defaults; callers that want settings to persist re-apply them afterwards.
pub trait EmulatorBackend: Send {
    /// Short format name ("YM", "AY").
    fn format_name(&self) -> &'static str;

    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Number of tracks in the file (at least 1).
    fn track_count(&self) -> usize;

    /// Number of independently mutable voices.
    fn voice_count(&self) -> usize;

    /// Display name of voice `index`.
    fn voice_name(&self, index: usize) -> Result<String>;

    /// Restart emulation at the beginning of track `index`.
    fn start_track(&mut self, index: usize) -> Result<()>;

    /// Bit `i` set mutes voice `i`; applies from the next render on.
    fn mute_voices(&mut self, mask: u32);

    /// Fill `out` with interleaved stereo frames.
    ///
    /// The whole buffer is always written; after the track has ended the
    /// remainder is silence. A trailing odd sample is zeroed.
    fn render(&mut self, out: &mut [i16]);

    /// Render `frames` stereo frames into a new buffer.
    fn render_frames(&mut self, frames: usize) -> Vec<i16> {
        let mut buffer = vec![0; frames * 2];
        self.render(&mut buffer);
        buffer
    }

    /// Whether the current track has ended (fade complete, silence, or natural end).
    fn is_track_ended(&self) -> bool;

    /// Fade to silence over `ms` starting now.
    fn set_fade(&mut self, ms: u32);

    /// Cancel any fade.
    fn reset_fade(&mut self);

    /// Scale the player call rate. `1.0` is the authored speed; values
    /// outside [`MIN_TEMPO`]..=[`MAX_TEMPO`] are clamped.
    fn set_tempo(&mut self, scale: f64);

    /// Milliseconds rendered since the last `start_track`.
    fn tell(&self) -> u64;

    /// Disable silence-based end detection.
    fn ignore_silence(&mut self, ignore: bool);

    /// Metadata for track `index`.
    fn track_info(&self, index: usize) -> Result<TrackInfo>;
}

/// Static capabilities of one file family.
pub trait BackendFormat: Send + Sync {
    /// Short format name.
    fn name(&self) -> &'static str;

    /// Content sniff. Never fails, never touches global state.
    fn is_compatible(&self, data: &[u8]) -> bool;

    /// Parse `data` and open a session at the start of track 0.
    fn open(&self, data: &[u8], options: &OpenOptions) -> Result<Box<dyn EmulatorBackend>>;

    /// Number of tracks without opening a session.
    fn track_count(&self, data: &[u8]) -> Result<usize>;

    /// Metadata for `track` without opening a session.
    fn track_info(&self, data: &[u8], track: usize) -> Result<TrackInfo>;
}

/// Ordered list of formats; the first compatible format that opens wins.
pub struct BackendRegistry {
    formats: Vec<Box<dyn BackendFormat>>,
}

impl BackendRegistry {
    /// Registry with no formats.
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Registry with every format compiled into the crate.
    pub fn with_default_formats() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "ym-format")]
        registry.register(ym::YmFormat);
        #[cfg(feature = "ay-format")]
        registry.register(ay::AyFormat);
        registry
    }

    /// Append a format at the lowest priority.
    pub fn register(&mut self, format: impl BackendFormat + 'static) -> &mut Self {
        self.formats.push(Box::new(format));
        self
    }

    /// Names in probe order.
    pub fn format_names(&self) -> Vec<&'static str> {
        self.formats.iter().map(|f| f.name()).collect()
    }

    fn claimants<'a>(&'a self, data: &'a [u8]) -> impl Iterator<Item = &'a dyn BackendFormat> {
        self.formats
            .iter()
            .map(|f| f.as_ref())
            .filter(move |f| f.is_compatible(data))
    }

    /// Open `data` with the first format that claims it and succeeds.
    ///
    /// `NoCompatibleBackend` when nothing claims the data; otherwise the
    /// error of the last claimant tried.
    pub fn open(&self, data: &[u8], options: &OpenOptions) -> Result<Box<dyn EmulatorBackend>> {
        self.first_success(data, |format| format.open(data, options))
    }

    /// Track count through the same probe order as [`open`](Self::open).
    pub fn track_count(&self, data: &[u8]) -> Result<usize> {
        self.first_success(data, |format| format.track_count(data))
    }

    /// Static metadata through the same probe order as [`open`](Self::open).
    pub fn track_info(&self, data: &[u8], track: usize) -> Result<TrackInfo> {
        self.first_success(data, |format| format.track_info(data, track))
    }

    fn first_success<T>(
        &self,
        data: &[u8],
        mut attempt: impl FnMut(&dyn BackendFormat) -> Result<T>,
    ) -> Result<T> {
        let mut last_error = None;
        for format in self.claimants(data) {
            match attempt(format) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    log::debug!("{} backend rejected file: {}", format.name(), err);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(Error::NoCompatibleBackend))
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_default_formats()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("formats", &self.format_names())
            .finish()
    }
}
