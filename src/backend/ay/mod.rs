//! ZX Spectrum Project AY backend.
//!
//! EMUL containers carry Z80 player code. Each track loads its memory
//! blocks, runs INIT once, then calls INTERRUPT at 50 Hz (scaled by tempo)
//! while the PSG renders the samples in between.

mod error;
mod format;
mod machine;
pub(crate) mod parser;

pub use error::AyError;
pub use format::{AyBlock, AyFile, AyHeader, AyPoints, AySong};
pub use parser::load_ay;

use std::sync::Arc;

use iz80::{Cpu, Machine, Reg16, Reg8};

use super::{clamp_tempo, BackendFormat, EmulatorBackend, OpenOptions, OutputStage};
use crate::psg::{self, Ym2149, ZX_SPECTRUM_CLOCK};
use crate::track_info::TrackInfo;
use crate::{Error, Result};
use machine::AyMachine;

const FRAME_RATE_HZ: f64 = 50.0;
const RETURN_ADDRESS: u16 = 0x0000;
const MAX_INSTRUCTIONS_PER_CALL: usize = 250_000;
const ZX_CPU_CLOCK_HZ: f64 = 3_500_000.0;
/// Longest stretch between two INTERRUPT calls, in seconds of output.
const MAX_FRAME_SECONDS: u32 = 1;
const SYSTEM: &str = "ZX Spectrum";

/// Format entry for ZXAY/EMUL files.
#[derive(Debug, Clone, Copy, Default)]
pub struct AyFormat;

impl BackendFormat for AyFormat {
    fn name(&self) -> &'static str {
        "AY"
    }

    fn is_compatible(&self, data: &[u8]) -> bool {
        data.starts_with(parser::FILE_ID)
    }

    fn open(&self, data: &[u8], options: &OpenOptions) -> Result<Box<dyn EmulatorBackend>> {
        let file = load_ay(data)?;
        log::info!(
            "opened AY by '{}': {} songs",
            file.header.author,
            file.songs.len()
        );
        Ok(Box::new(AyBackend::new(file, options)?))
    }

    fn track_count(&self, data: &[u8]) -> Result<usize> {
        Ok(load_ay(data)?.songs.len())
    }

    fn track_info(&self, data: &[u8], track: usize) -> Result<TrackInfo> {
        song_track_info(&load_ay(data)?, track)
    }
}

fn song_track_info(file: &AyFile, track: usize) -> Result<TrackInfo> {
    let song = file
        .songs
        .get(track)
        .ok_or_else(|| Error::track_index(track, file.songs.len()))?;
    let mut info = TrackInfo::new(track).with_timing(0, 0, song.length_ms());
    info.title = song.name.clone();
    info.artist = file.header.author.clone();
    info.comment = file.header.misc.clone();
    info.system = SYSTEM.to_string();
    info.fade_length_ms = song.fade_ms();
    Ok(info)
}

/// Find INIT when the points table leaves it at 0: the first `CALL nn` in the first block.
fn resolve_init_address(song: &AySong, points: &AyPoints) -> std::result::Result<u16, AyError> {
    if points.init != 0 {
        return Ok(points.init);
    }
    let block = song.blocks.first().ok_or("AY song provides no memory blocks")?;
    block
        .data
        .windows(3)
        .filter(|w| w[0] == 0xCD)
        .map(|w| u16::from_le_bytes([w[1], w[2]]))
        .find(|&addr| addr != 0)
        .ok_or_else(|| "Unable to infer INIT address".into())
}

/// Open AY session.
pub struct AyBackend {
    file: Arc<AyFile>,
    machine: AyMachine,
    cpu: Cpu,
    output: OutputStage,
    sample_rate: u32,
    tempo: f64,
    interrupt_address: u16,
    frame_cache: Vec<[i16; 2]>,
    cache_pos: usize,
    /// Fractional samples carried between 50 Hz frames.
    frame_phase: f64,
}

impl AyBackend {
    /// Session positioned at the start of track 0.
    ///
    /// The header's `first_song_index` is a player hint only; track
    /// selection belongs to the caller.
    pub fn new(file: AyFile, options: &OpenOptions) -> Result<Self> {
        let mut chip = Ym2149::with_clocks(ZX_SPECTRUM_CLOCK, options.sample_rate);
        chip.set_stereo(options.stereo);
        let mut backend = Self {
            file: Arc::new(file),
            machine: AyMachine::new(chip),
            cpu: Cpu::new(),
            output: OutputStage::new(options.sample_rate, options.silence_timeout_ms),
            sample_rate: options.sample_rate.max(1),
            tempo: 1.0,
            interrupt_address: 0,
            frame_cache: Vec::new(),
            cache_pos: 0,
            frame_phase: 0.0,
        };
        backend.start_track(0)?;
        Ok(backend)
    }

    /// Parsed container.
    pub fn file(&self) -> &AyFile {
        &self.file
    }

    fn apply_register_presets(&mut self, preset: u16, stack: u16) {
        let regs = self.cpu.registers();
        for reg in [
            Reg16::AF,
            Reg16::BC,
            Reg16::DE,
            Reg16::HL,
            Reg16::IX,
            Reg16::IY,
        ] {
            regs.set16(reg, preset);
        }
        regs.set16(Reg16::SP, stack);
        regs.set_pc(RETURN_ADDRESS);
        regs.set8(Reg8::I, 3);
    }

    fn emulate_call(&mut self, entry: u16) {
        let regs = self.cpu.registers();
        let mut sp = regs.get16(Reg16::SP);
        sp = sp.wrapping_sub(1);
        self.machine.poke(sp, (RETURN_ADDRESS >> 8) as u8);
        sp = sp.wrapping_sub(1);
        self.machine.poke(sp, RETURN_ADDRESS as u8);
        let regs = self.cpu.registers();
        regs.set16(Reg16::SP, sp);
        regs.set_pc(entry);
    }

    fn at_return(&self) -> bool {
        self.cpu.immutable_registers().pc() == RETURN_ADDRESS
    }

    fn step(&mut self) -> std::result::Result<u64, AyError> {
        if self.machine.requires_cpc_firmware() {
            return Err(AyError::CpcFirmware);
        }
        let before = self.cpu.cycle_count();
        self.cpu.execute_instruction(&mut self.machine);
        Ok(self.cpu.cycle_count().saturating_sub(before))
    }

    fn run_until_return(&mut self, entry: u16, mut budget: usize) -> std::result::Result<(), AyError> {
        while !self.at_return() {
            self.step()?;
            budget = budget
                .checked_sub(1)
                .ok_or(AyError::Runaway { address: entry })?;
        }
        Ok(())
    }

    fn samples_for_next_frame(&mut self) -> usize {
        self.frame_phase += self.sample_rate as f64 / (FRAME_RATE_HZ * self.tempo);
        let samples = self.frame_phase.floor();
        self.frame_phase -= samples;
        let longest = (self.sample_rate * MAX_FRAME_SECONDS) as usize;
        (samples as usize).clamp(1, longest.max(1))
    }

    /// Call INTERRUPT and render one 50 Hz frame of samples into the cache.
    fn render_frame(&mut self) -> std::result::Result<(), AyError> {
        let count = self.samples_for_next_frame();
        let sample_period = 1.0 / self.sample_rate as f64;
        let entry = self.interrupt_address;

        self.emulate_call(entry);
        self.frame_cache.clear();
        let mut cpu_time = 0.0f64;
        let mut next_sample_time = sample_period;
        let mut budget = MAX_INSTRUCTIONS_PER_CALL;

        while self.frame_cache.len() < count {
            while cpu_time < next_sample_time && !self.at_return() {
                cpu_time += self.step()? as f64 / ZX_CPU_CLOCK_HZ;
                budget = budget
                    .checked_sub(1)
                    .ok_or(AyError::Runaway { address: entry })?;
            }
            let frame = self.machine.chip_mut().compute_next_frame();
            self.frame_cache.push(frame);
            next_sample_time += sample_period;
        }

        // routines slower than a (tempo scaled) frame finish before the next call
        self.run_until_return(entry, budget)?;
        self.cache_pos = 0;
        Ok(())
    }

    fn fail(&mut self, err: AyError) {
        log::warn!("AY track ended: {}", err);
        self.output.end_track();
    }
}

impl EmulatorBackend for AyBackend {
    fn format_name(&self) -> &'static str {
        "AY"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn track_count(&self) -> usize {
        self.file.songs.len()
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
        let file = Arc::clone(&self.file);
        let song = file
            .songs
            .get(index)
            .ok_or_else(|| Error::track_index(index, file.songs.len()))?;
        let points = song.points.ok_or_else(|| {
            Error::Format(format!("AY song {} is missing points data", index + 1))
        })?;
        let init = resolve_init_address(song, &points)?;
        self.interrupt_address = if points.interrupt != 0 {
            points.interrupt
        } else {
            init
        };

        self.output.restart();
        self.tempo = 1.0;
        self.frame_cache.clear();
        self.cache_pos = 0;
        self.frame_phase = 0.0;

        self.machine.reset_layout();
        self.machine.chip_mut().set_mute_mask(0);
        for block in &song.blocks {
            self.machine.load_block(block);
        }
        self.cpu = Cpu::new();
        self.apply_register_presets(song.register_preset, points.stack);

        log::debug!("AY track {} '{}' init 0x{:04x}", index, song.name, init);
        self.emulate_call(init);
        if let Err(err) = self.run_until_return(init, MAX_INSTRUCTIONS_PER_CALL) {
            self.fail(err);
        }
        Ok(())
    }

    fn mute_voices(&mut self, mask: u32) {
        self.machine.chip_mut().set_mute_mask(mask);
    }

    fn render(&mut self, out: &mut [i16]) {
        let mut frames = out.chunks_exact_mut(2);
        for slot in &mut frames {
            if self.output.is_ended() {
                slot.fill(0);
                continue;
            }
            if self.cache_pos >= self.frame_cache.len() {
                if let Err(err) = self.render_frame() {
                    self.fail(err);
                    slot.fill(0);
                    continue;
                }
            }
            let raw = self.frame_cache[self.cache_pos];
            self.cache_pos += 1;
            slot.copy_from_slice(&self.output.process(raw));
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
        song_track_info(&self.file, index)
    }
}
