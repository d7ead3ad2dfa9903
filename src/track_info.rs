//! Per-track metadata shared by every backend.
//!
//! A [`TrackInfo`] is an owned snapshot: title/artist/game/system/year/comment
//! strings plus timing. YM and AY files carry no game or year, so those stay
//! empty for the built-in formats. Timing follows one rule regardless of format: an authored
//! length wins, otherwise a looping track is `intro + loop` long, otherwise
//! the length is unknown and playback falls back to a default.

use serde::{Deserialize, Serialize};

/// Fallback play length for tracks without a known length (2:30).
pub const DEFAULT_TRACK_LENGTH_MS: u32 = 150_000;

/// Metadata for one track of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Track title (may be empty).
    pub title: String,
    /// Composer.
    pub artist: String,
    /// Game or demo the music belongs to.
    pub game: String,
    /// Machine the music was written for.
    pub system: String,
    /// Release year as written in the file.
    pub year: String,
    /// Free-form notes (YM comment, AY misc string).
    pub comment: String,
    /// 0-based index within the file.
    pub track_number: usize,
    /// Non-repeating part in milliseconds.
    pub intro_length_ms: u32,
    /// Repeating part in milliseconds (0 when the track does not loop).
    pub loop_length_ms: u32,
    /// Total length when known.
    pub length_ms: Option<u32>,
    /// Effective duration used for progress and auto-fade.
    pub play_length_ms: u32,
    /// Authored fade-out length, overriding the configured one for auto-fade.
    pub fade_length_ms: Option<u32>,
}

impl TrackInfo {
    /// Empty metadata for track `track_number` with unknown length.
    pub fn new(track_number: usize) -> Self {
        Self {
            title: String::new(),
            artist: String::new(),
            game: String::new(),
            system: String::new(),
            year: String::new(),
            comment: String::new(),
            track_number,
            intro_length_ms: 0,
            loop_length_ms: 0,
            length_ms: None,
            play_length_ms: DEFAULT_TRACK_LENGTH_MS,
            fade_length_ms: None,
        }
    }

    /// Set timing. `authored_ms` of `None` or 0 means the file carries no explicit length.
    pub fn with_timing(mut self, intro_ms: u32, loop_ms: u32, authored_ms: Option<u32>) -> Self {
        self.intro_length_ms = intro_ms;
        self.loop_length_ms = loop_ms;
        self.length_ms = authored_ms
            .filter(|&ms| ms > 0)
            .or_else(|| (loop_ms > 0).then(|| intro_ms.saturating_add(loop_ms)));
        self.with_default_length(DEFAULT_TRACK_LENGTH_MS)
    }

    /// Recompute `play_length_ms` against a different fallback.
    pub fn with_default_length(mut self, default_ms: u32) -> Self {
        self.play_length_ms = self.length_ms.unwrap_or(default_ms);
        self
    }

    /// Whether `play_length_ms` comes from the file rather than the fallback.
    pub fn has_known_length(&self) -> bool {
        self.length_ms.is_some()
    }
}
