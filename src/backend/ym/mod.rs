//! Atari ST YM register dump backend.
//!
//! One track per file. Frames are written to the PSG at the song's frame
//! rate (scaled by tempo) and playback wraps to the loop frame forever, so
//! a YM track only ends through a fade or detected silence.

pub(crate) mod parser;

pub use parser::{detect, parse, YmAttributes, YmMagic, YmSong, YmVersion};

use std::sync::Arc;

use super::{clamp_tempo, BackendFormat, EmulatorBackend, OpenOptions, OutputStage};
use crate::compression::{decompress_if_needed, peek_decompressed};
use crate::psg::{self, Ym2149};
use crate::track_info::TrackInfo;
use crate::{Error, Result};

/// Bytes `detect` needs.
const MAGIC_LEN: usize = 4;

/// R13 value meaning "leave the envelope running".
const ENVELOPE_UNCHANGED: u8 = 0xFF;

/// Format entry for YM files (raw or LHA packed).
#[derive(Debug, Clone, Copy, Default)]
pub struct YmFormat;

impl YmFormat {
    fn load(data: &[u8]) -> Result<YmSong> {
        let raw = decompress_if_needed(data)?;
        parse(&raw)
    }
}

impl BackendFormat for YmFormat {
    fn name(&self) -> &'static str {
        "YM"
    }

    fn is_compatible(&self, data: &[u8]) -> bool {
        match peek_decompressed(data, MAGIC_LEN) {
            Ok(head) => detect(&head).is_some(),
            Err(_) => false,
        }
    }

    fn open(&self, data: &[u8], options: &OpenOptions) -> Result<Box<dyn EmulatorBackend>> {
        let song = Self::load(data)?;
        log::info!(
            "opened {} '{}' by '{}': {} frames @ {} Hz, loop {}",
            song.version.name(),
            song.title,
            song.author,
            song.frames.len(),
            song.frame_rate,
            song.loop_frame
        );
        Ok(Box::new(YmBackend::new(song, options)))
    }

    fn track_count(&self, data: &[u8]) -> Result<usize> {
        Self::load(data).map(|_| 1)
    }

    fn track_info(&self, data: &[u8], track: usize) -> Result<TrackInfo> {
        let song = Self::load(data)?;
        song_track_info(&song, track)
    }
}

fn song_track_info(song: &YmSong, track: usize) -> Result<TrackInfo> {
    if track != 0 {
        return Err(Error::track_index(track, 1));
    }
    let intro = song.frames_to_ms(song.loop_frame);
    let looped = song.frames_to_ms(song.frames.len() - song.loop_frame);
    let mut info = TrackInfo::new(0).with_timing(intro, looped, None);
    info.title = song.title.clone();
    info.artist = song.author.clone();
    info.comment = song.comment.clone();
    info.system = psg::system_for_clock(song.master_clock).to_string();
    Ok(info)
}

/// Open YM session.
pub struct YmBackend {
    song: Arc<YmSong>,
    chip: Ym2149,
    output: OutputStage,
    sample_rate: u32,
    frame_index: usize,
    /// Accumulates `frame_rate * tempo` per sample; a frame is due at `sample_rate`.
    frame_phase: f64,
    tempo: f64,
}

impl YmBackend {
    /// Session for an already parsed song, positioned at frame 0.
    pub fn new(song: YmSong, options: &OpenOptions) -> Self {
        let mut chip = Ym2149::with_clocks(song.master_clock, options.sample_rate);
        chip.set_stereo(options.stereo);
        let mut backend = Self {
            song: Arc::new(song),
            chip,
            output: OutputStage::new(options.sample_rate, options.silence_timeout_ms),
            sample_rate: options.sample_rate.max(1),
            frame_index: 0,
            frame_phase: 0.0,
            tempo: 1.0,
        };
        backend.restart();
        backend
    }

    /// Parsed song.
    pub fn song(&self) -> &YmSong {
        &self.song
    }

    fn restart(&mut self) {
        self.chip.reset();
        self.chip.set_mute_mask(0);
        self.output.restart();
        self.tempo = 1.0;
        self.frame_index = 0;
        self.frame_phase = 0.0;
        self.write_frame(0);
    }

    fn write_frame(&mut self, index: usize) {
        let Some(frame) = self.song.frames.get(index) else {
            return;
        };
        for (reg, &value) in frame.iter().enumerate().take(13) {
            self.chip.write_register(reg as u8, value);
        }
        if frame[13] != ENVELOPE_UNCHANGED {
            self.chip.write_register(13, frame[13]);
        }
    }

    /// Move `count` frames ahead, wrapping into the loop, and write only the
    /// frame landed on.
    fn advance_frames(&mut self, count: usize) {
        let len = self.song.frames.len();
        let loop_len = len.saturating_sub(self.song.loop_frame);
        if loop_len == 0 {
            return;
        }
        let mut index = self.frame_index + count;
        if index >= len {
            index = self.song.loop_frame + (index - len) % loop_len;
        }
        self.frame_index = index;
        self.write_frame(index);
    }
}

impl EmulatorBackend for YmBackend {
    fn format_name(&self) -> &'static str {
        "YM"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn track_count(&self) -> usize {
        1
    }

    fn voice_count(&self) -> usize {
        psg::VOICE_COUNT
    }

    fn voice_name(&self, index: usize) -> Result<String> {
        psg::voice_name(index)
            .map(str::to_string)
            .ok_or_else(|| Error::voice_index(index, psg::VOICE_COUNT))
    }

    fn start_track(&mut self, index: usize) -> Result<()> {
        if index != 0 {
            return Err(Error::track_index(index, 1));
        }
        self.restart();
        Ok(())
    }

    fn mute_voices(&mut self, mask: u32) {
        self.chip.set_mute_mask(mask);
    }

    fn render(&mut self, out: &mut [i16]) {
        let frame_step = self.song.frame_rate as f64 * self.tempo;
        let sample_rate = self.sample_rate as f64;

        let mut frames = out.chunks_exact_mut(2);
        for slot in &mut frames {
            if self.output.is_ended() {
                slot.fill(0);
                continue;
            }
            self.frame_phase += frame_step;
            if self.frame_phase >= sample_rate {
                let due = (self.frame_phase / sample_rate).floor();
                self.frame_phase -= due * sample_rate;
                self.advance_frames(due as usize);
            }
            let processed = self.output.process(self.chip.compute_next_frame());
            slot.copy_from_slice(&processed);
        }
        frames.into_remainder().fill(0);
    }

    fn is_track_ended(&self) -> bool {
        self.output.is_ended()
    }

    fn set_fade(&mut self, ms: u32) {
        self.output.set_fade(ms);
    }

    fn reset_fade(&mut self) {
        self.output.reset_fade();
    }

    fn set_tempo(&mut self, scale: f64) {
        if let Some(tempo) = clamp_tempo(scale) {
            self.tempo = tempo;
        }
    }

    fn tell(&self) -> u64 {
        self.output.elapsed_ms()
    }

    fn ignore_silence(&mut self, ignore: bool) {
        self.output.ignore_silence(ignore);
    }

    fn track_info(&self, index: usize) -> Result<TrackInfo> {
        song_track_info(&self.song, index)
    }
}
