//! State guarded by the engine lock: the open backend plus transport.

use crate::backend::EmulatorBackend;
use crate::config::EngineConfig;
use crate::track_info::TrackInfo;
use crate::{Error, Result};

/// Playback state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No file open.
    #[default]
    Empty,
    /// File open, not producing audio.
    Ready,
    /// Buffer requests render the current track.
    Playing,
    /// Position kept, buffer requests render silence.
    Paused,
}

/// User preferences re-applied every time a track starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportState {
    /// Selected track.
    pub current_track: usize,
    /// Bit `i` mutes voice `i`.
    pub mute_mask: u32,
    /// Player call rate multiplier.
    pub tempo: f64,
    /// Fade length started at every track start; 0 disables.
    pub fade_ms: u32,
    /// Silence detection disabled.
    pub ignore_silence: bool,
    /// Fade out when a track reaches its play length.
    pub auto_fade: bool,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            current_track: 0,
            mute_mask: 0,
            tempo: 1.0,
            fade_ms: 0,
            ignore_silence: false,
            auto_fade: false,
        }
    }
}

/// Outcome of one buffer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Audio was rendered.
    Rendered,
    /// Not playing; the buffer holds silence.
    Idle,
    /// The track ended during this buffer; the engine is back in `Ready`.
    Ended,
    /// The control side held the lock; the buffer holds silence.
    Busy,
}

pub(crate) struct Session {
    pub(crate) config: EngineConfig,
    pub(crate) backend: Option<Box<dyn EmulatorBackend>>,
    pub(crate) transport: TransportState,
    pub(crate) state: EngineState,
    /// Whether `start_track` ran for the current track since it was selected or ended.
    pub(crate) track_started: bool,
    play_length_ms: u32,
    /// Auto-fade length of the current track.
    fade_length_ms: u32,
    auto_fade_started: bool,
}

impl Session {
    pub(crate) fn new(config: EngineConfig) -> Self {
        let play_length_ms = config.default_track_length_ms;
        let fade_length_ms = config.fade_length_ms;
        Self {
            config,
            backend: None,
            transport: TransportState::default(),
            state: EngineState::Empty,
            track_started: false,
            play_length_ms,
            fade_length_ms,
            auto_fade_started: false,
        }
    }

    pub(crate) fn backend(&self) -> Result<&dyn EmulatorBackend> {
        self.backend.as_deref().ok_or(Error::NotReady)
    }

    pub(crate) fn backend_mut(&mut self) -> Result<&mut Box<dyn EmulatorBackend>> {
        self.backend.as_mut().ok_or(Error::NotReady)
    }

    /// Swap in a freshly opened backend, returning the previous one.
    pub(crate) fn install(
        &mut self,
        backend: Box<dyn EmulatorBackend>,
    ) -> Option<Box<dyn EmulatorBackend>> {
        let old = self.backend.replace(backend);
        self.transport.current_track = 0;
        self.state = EngineState::Ready;
        self.track_started = false;
        self.auto_fade_started = false;
        old
    }

    /// Start track `index` and re-apply every transport preference.
    pub(crate) fn start_track(&mut self, index: usize) -> Result<()> {
        let default_length = self.config.default_track_length_ms;
        let default_fade = self.config.fade_length_ms;
        let transport = self.transport;
        let backend = self.backend_mut()?;
        let count = backend.track_count();
        if index >= count {
            return Err(Error::track_index(index, count));
        }

        backend.start_track(index)?;
        backend.mute_voices(transport.mute_mask);
        backend.set_tempo(transport.tempo);
        if transport.fade_ms > 0 {
            backend.set_fade(transport.fade_ms);
        }
        backend.ignore_silence(transport.ignore_silence);

        let (play_length_ms, fade_length_ms) = backend
            .track_info(index)
            .map(|info| {
                let fade = info.fade_length_ms.unwrap_or(default_fade);
                (info.with_default_length(default_length).play_length_ms, fade)
            })
            .unwrap_or((default_length, default_fade));

        self.play_length_ms = play_length_ms;
        self.fade_length_ms = fade_length_ms;
        self.auto_fade_started = false;
        self.transport.current_track = index;
        self.track_started = true;
        log::debug!("started track {} (play length {} ms)", index, play_length_ms);
        Ok(())
    }

    pub(crate) fn current_track_info(&self) -> Result<TrackInfo> {
        let backend = self.backend()?;
        backend
            .track_info(self.transport.current_track)
            .map(|info| info.with_default_length(self.config.default_track_length_ms))
    }

    fn maybe_start_auto_fade(&mut self) {
        if !self.transport.auto_fade || self.auto_fade_started {
            return;
        }
        let fade_ms = self.fade_length_ms;
        let fade_at = self.play_length_ms.saturating_sub(fade_ms) as u64;
        if let Some(backend) = self.backend.as_mut() {
            if backend.tell() >= fade_at {
                log::debug!("auto fade over {} ms at {} ms", fade_ms, backend.tell());
                backend.set_fade(fade_ms.max(1));
                self.auto_fade_started = true;
            }
        }
    }

    /// Serve one buffer request.
    pub(crate) fn render(&mut self, out: &mut [i16]) -> RenderStatus {
        if self.state != EngineState::Playing {
            out.fill(0);
            return RenderStatus::Idle;
        }
        self.maybe_start_auto_fade();
        let Some(backend) = self.backend.as_mut() else {
            out.fill(0);
            return RenderStatus::Idle;
        };
        backend.render(out);
        if backend.is_track_ended() {
            log::debug!("track {} ended", self.transport.current_track);
            self.state = EngineState::Ready;
            self.track_started = false;
            return RenderStatus::Ended;
        }
        RenderStatus::Rendered
    }
}
