//! Playback engine: one open file, one transport, any number of threads.
//!
//! The backend handle and transport live behind a single
//! `Arc<parking_lot::Mutex<_>>`. Control methods take the lock for the
//! duration of one operation; file reading and parsing happen before it is
//! taken, and a replaced backend is dropped after it is released. The audio
//! side renders through a [`Renderer`], which only ever `try_lock`s.
//!
//! ```text
//! Empty --set_file--> Ready --play--> Playing <--pause/play--> Paused
//!                       ^                |
//!                       +----stop/end----+
//! ```

mod renderer;
mod session;

pub use renderer::Renderer;
pub use session::{EngineState, RenderStatus, TransportState};

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{BackendRegistry, OpenOptions, MAX_TEMPO, MIN_TEMPO};
use crate::config::EngineConfig;
use crate::track_info::TrackInfo;
use crate::{Error, Result};
use session::Session;

/// Result of [`PlaybackEngine::advance_on_end`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Current track is still running.
    Continuing,
    /// The track ended and playback moved on to this track.
    NextTrack(usize),
    /// The last track ended; the engine is `Ready`.
    Finished,
}

/// Facade owning the open backend session and the transport.
pub struct PlaybackEngine {
    registry: Arc<BackendRegistry>,
    config: EngineConfig,
    session: Arc<Mutex<Session>>,
}

impl PlaybackEngine {
    /// Engine with default configuration and every built-in format.
    pub fn new() -> Self {
        Self::build(Arc::new(BackendRegistry::with_default_formats()), EngineConfig::default())
    }

    /// Engine with a validated configuration and every built-in format.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        Self::with_registry(BackendRegistry::with_default_formats(), config)
    }

    /// Engine probing formats from a custom registry.
    pub fn with_registry(registry: BackendRegistry, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(Arc::new(registry), config))
    }

    fn build(registry: Arc<BackendRegistry>, config: EngineConfig) -> Self {
        Self {
            registry,
            session: Arc::new(Mutex::new(Session::new(config.clone()))),
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Handle for the audio thread.
    pub fn renderer(&self) -> Renderer {
        Renderer::new(Arc::clone(&self.session))
    }

    /// Open a file from disk. See [`set_file_bytes`](Self::set_file_bytes).
    pub fn set_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        log::info!("loading {}", path.display());
        self.set_file_bytes(&data)
    }

    /// Open in-memory file data, replacing any open file.
    ///
    /// Selects track 0 and moves to `Ready`. Mute, tempo, fade and silence
    /// preferences carry over. On error the previous file stays open.
    pub fn set_file_bytes(&self, data: &[u8]) -> Result<()> {
        let backend = self.registry.open(data, &OpenOptions::from(&self.config))?;
        log::info!(
            "{} backend: {} track(s)",
            backend.format_name(),
            backend.track_count()
        );
        let old = self.session.lock().install(backend);
        drop(old);
        Ok(())
    }

    /// Start track `index`, keeping the current play state.
    pub fn set_track(&self, index: usize) -> Result<()> {
        self.session.lock().start_track(index)
    }

    /// Start or resume playback.
    pub fn play(&self) -> Result<()> {
        let mut session = self.session.lock();
        let state = session.state;
        match state {
            EngineState::Empty => Err(Error::NotReady),
            EngineState::Playing => Ok(()),
            EngineState::Ready | EngineState::Paused => {
                if !session.track_started {
                    let track = session.transport.current_track;
                    session.start_track(track)?;
                }
                session.state = EngineState::Playing;
                log::debug!("playing track {}", session.transport.current_track);
                Ok(())
            }
        }
    }

    /// Pause playback, keeping the position.
    pub fn pause(&self) -> Result<()> {
        let mut session = self.session.lock();
        let state = session.state;
        match state {
            EngineState::Empty => Err(Error::NotReady),
            EngineState::Playing => {
                session.state = EngineState::Paused;
                log::debug!("paused");
                Ok(())
            }
            EngineState::Ready | EngineState::Paused => Ok(()),
        }
    }

    /// Stop playback and rewind the current track.
    pub fn stop(&self) -> Result<()> {
        let mut session = self.session.lock();
        if session.state == EngineState::Empty {
            return Err(Error::NotReady);
        }
        let track = session.transport.current_track;
        session.start_track(track)?;
        session.state = EngineState::Ready;
        log::debug!("stopped");
        Ok(())
    }

    /// Move to the next track; a no-op on the last track.
    pub fn next_track(&self) -> Result<()> {
        let mut session = self.session.lock();
        let count = session.backend()?.track_count();
        let next = session.transport.current_track + 1;
        if next >= count {
            return Ok(());
        }
        session.start_track(next)
    }

    /// Move to the previous track; a no-op on the first track.
    pub fn prev_track(&self) -> Result<()> {
        let mut session = self.session.lock();
        session.backend()?;
        match session.transport.current_track.checked_sub(1) {
            Some(prev) => session.start_track(prev),
            None => Ok(()),
        }
    }

    /// If the current track has ended, continue with the next one.
    ///
    /// Meant to be polled from the control side. Playback resumes on the
    /// next track; after the last one the engine stays `Ready`.
    pub fn advance_on_end(&self) -> Result<Advance> {
        let mut session = self.session.lock();
        let backend = session.backend()?;
        if !backend.is_track_ended() {
            return Ok(Advance::Continuing);
        }
        let count = backend.track_count();
        let next = session.transport.current_track + 1;
        if next >= count {
            session.state = EngineState::Ready;
            session.track_started = false;
            return Ok(Advance::Finished);
        }
        session.start_track(next)?;
        session.state = EngineState::Playing;
        Ok(Advance::NextTrack(next))
    }

    /// Mute voices by bitmask (bit `i` = voice `i`).
    pub fn set_mute_voices(&self, mask: u32) {
        let mut session = self.session.lock();
        session.transport.mute_mask = mask;
        if let Ok(backend) = session.backend_mut() {
            backend.mute_voices(mask);
        }
    }

    /// Fade the current track out over `ms`, and every later track from its start.
    /// 0 behaves like [`reset_fade_time`](Self::reset_fade_time).
    pub fn set_fade_time(&self, ms: u32) {
        if ms == 0 {
            self.reset_fade_time();
            return;
        }
        let mut session = self.session.lock();
        session.transport.fade_ms = ms;
        if let Ok(backend) = session.backend_mut() {
            backend.set_fade(ms);
        }
    }

    /// Cancel fades, including the automatic end-of-track fade.
    pub fn reset_fade_time(&self) {
        let mut session = self.session.lock();
        session.transport.fade_ms = 0;
        session.transport.auto_fade = false;
        if let Ok(backend) = session.backend_mut() {
            backend.reset_fade();
        }
    }

    /// Fade every track out over the configured fade length so that it
    /// reaches silence at its play length.
    pub fn fade_out_at_play_length(&self) {
        self.session.lock().transport.auto_fade = true;
    }

    /// Scale playback speed. Must lie within [`MIN_TEMPO`]..=[`MAX_TEMPO`].
    pub fn set_tempo(&self, scale: f64) -> Result<()> {
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&scale) {
            return Err(Error::Range(format!(
                "tempo {} outside {}..={}",
                scale, MIN_TEMPO, MAX_TEMPO
            )));
        }
        let mut session = self.session.lock();
        session.transport.tempo = scale;
        if let Ok(backend) = session.backend_mut() {
            backend.set_tempo(scale);
        }
        Ok(())
    }

    /// Disable silence-based end detection.
    pub fn ignore_silence(&self, ignore: bool) {
        let mut session = self.session.lock();
        session.transport.ignore_silence = ignore;
        if let Ok(backend) = session.backend_mut() {
            backend.ignore_silence(ignore);
        }
    }

    /// Milliseconds played in the current track, 0 without a file.
    pub fn elapsed_time(&self) -> u64 {
        self.session
            .lock()
            .backend()
            .map(|b| b.tell())
            .unwrap_or(0)
    }

    /// Whether the current track has ended, false without a file.
    pub fn is_track_ended(&self) -> bool {
        self.session
            .lock()
            .backend()
            .map(|b| b.is_track_ended())
            .unwrap_or(false)
    }

    /// Number of voices of the open file.
    pub fn voice_count(&self) -> Result<usize> {
        Ok(self.session.lock().backend()?.voice_count())
    }

    /// Display name of voice `index`.
    pub fn voice_name(&self, index: usize) -> Result<String> {
        self.session.lock().backend()?.voice_name(index)
    }

    /// Format name of the open file's backend.
    pub fn format_name(&self) -> Result<&'static str> {
        Ok(self.session.lock().backend()?.format_name())
    }

    /// Number of tracks of the open file.
    pub fn track_count(&self) -> Result<usize> {
        Ok(self.session.lock().backend()?.track_count())
    }

    /// Metadata of the selected track.
    pub fn current_track_info(&self) -> Result<TrackInfo> {
        self.session.lock().current_track_info()
    }

    /// Selected track index.
    pub fn current_track(&self) -> usize {
        self.session.lock().transport.current_track
    }

    /// Playback state.
    pub fn state(&self) -> EngineState {
        self.session.lock().state
    }

    /// Snapshot of the transport preferences.
    pub fn transport(&self) -> TransportState {
        self.session.lock().transport
    }

    /// Static metadata of a file on disk, without touching the open session.
    pub fn probe_track_info(&self, path: impl AsRef<Path>, track: usize) -> Result<TrackInfo> {
        let data = std::fs::read(path.as_ref())?;
        self.registry
            .track_info(&data, track)
            .map(|info| info.with_default_length(self.config.default_track_length_ms))
    }

    /// Render one buffer from the control side (blocks on the lock).
    pub fn fill_buffer(&self, out: &mut [i16]) -> RenderStatus {
        self.session.lock().render(out)
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}
