//! Chiptune playback engine with YM2149/AY emulation
//!
//! Opens chiptune files through a registry of emulator backends, renders
//! interleaved 16-bit stereo audio and exposes a transport (play, pause,
//! stop, track navigation) whose per-track preferences (voice mutes,
//! tempo, fade, silence detection) survive track and file changes.
//!
//! # Features
//! - YM2149 PSG emulation shared by every backend
//! - Atari ST YM register dumps (YM2 to YM6, raw or LHA packed)
//! - ZX Spectrum Project AY files with Z80 player code
//! - Track metadata with a uniform length rule
//! - Lock-guarded engine with a non-blocking audio-thread renderer
//! - WAV export and optional real-time output
//!
//! # Crate feature flags
//! - `ym-format` (default): YM backend (`backend::ym`)
//! - `ay-format` (default): AY backend (`backend::ay`, enables `iz80`)
//! - `streaming` (opt-in): Real-time audio output (enables optional `rodio` dep)
//!
//! # Quick start
//! ```no_run
//! use squarewave::PlaybackEngine;
//!
//! # fn main() -> squarewave::Result<()> {
//! let engine = PlaybackEngine::new();
//! engine.set_file("song.ym")?;
//! engine.set_mute_voices(0b010);
//! engine.play()?;
//!
//! let mut buffer = vec![0i16; 2048];
//! engine.fill_buffer(&mut buffer);
//! println!("{}", engine.current_track_info()?.title);
//! # Ok(())
//! # }
//! ```
//!
//! ## Audio thread
//! ```no_run
//! use squarewave::{PlaybackEngine, RenderStatus};
//!
//! # fn main() -> squarewave::Result<()> {
//! let engine = PlaybackEngine::new();
//! engine.set_file("song.ay")?;
//! engine.play()?;
//! let renderer = engine.renderer();
//! std::thread::spawn(move || {
//!     let mut block = vec![0i16; renderer.block_frames() * 2];
//!     while renderer.fill(&mut block) != RenderStatus::Ended {
//!         // hand `block` to the device
//!     }
//! });
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend; // Emulator backends and format registry
pub mod compression; // LHA/LZH unpacking
pub mod config; // Engine configuration
pub mod engine; // Transport and locking
mod error;
pub mod export; // WAV rendering
pub mod psg; // YM2149 emulation
#[cfg(feature = "streaming")]
pub mod streaming; // Audio output
pub mod track_info; // Track metadata

pub use error::{Error, Result};

pub use backend::{
    BackendFormat, BackendRegistry, EmulatorBackend, OpenOptions, MAX_TEMPO, MIN_TEMPO,
};
pub use config::EngineConfig;
pub use engine::{Advance, EngineState, PlaybackEngine, RenderStatus, Renderer, TransportState};
pub use psg::StereoMode;
#[cfg(feature = "streaming")]
pub use streaming::{AudioDevice, RendererSource};
pub use track_info::TrackInfo;
