//! YM2149 / AY-3-8910 core.
//!
//! The state machine runs at the master clock divided by 8 (250 kHz for an
//! Atari ST) and each host sample averages every internal tick that elapsed
//! since the previous one.

use super::tables::{ENV_DATA, MASKS, REG_MASK, SHAPE_TO_ENV, YM2149_LOG_LEVELS};
use super::StereoMode;

const DC_ADJUST_HISTORY_BIT: usize = 11; // 2048 values (~46ms at 44Khz)
const DC_ADJUST_HISTORY_SIZE: usize = 1 << DC_ADJUST_HISTORY_BIT;

/// Number of tone voices on the chip.
pub const VOICE_COUNT: usize = 3;

const VOICE_NAMES: [&str; VOICE_COUNT] = ["Channel A", "Channel B", "Channel C"];

/// Simple PRNG for unpredictable power-on state
fn std_lib_rand(seed: &mut u32) -> u16 {
    *seed = seed.wrapping_mul(214013).wrapping_add(2531011);
    ((*seed >> 16) & 0x7fff) as u16
}

/// Display name of a voice, `None` when out of range.
pub fn voice_name(index: usize) -> Option<&'static str> {
    VOICE_NAMES.get(index).copied()
}

/// Running-average DC blocker for one output side.
#[derive(Clone)]
struct DcAdjuster {
    buffer: [u16; DC_ADJUST_HISTORY_SIZE],
    pos: usize,
    sum: u32,
}

impl DcAdjuster {
    fn new() -> Self {
        Self {
            buffer: [0; DC_ADJUST_HISTORY_SIZE],
            pos: 0,
            sum: 0,
        }
    }

    fn clear(&mut self) {
        self.buffer.fill(0);
        self.pos = 0;
        self.sum = 0;
    }

    fn adjust(&mut self, v: u16) -> i16 {
        self.sum -= self.buffer[self.pos] as u32;
        self.sum += v as u32;
        self.buffer[self.pos] = v;
        self.pos = (self.pos + 1) & (DC_ADJUST_HISTORY_SIZE - 1);

        // input never exceeds 15 bits so the result fits an i16
        ((v as i32) - ((self.sum >> DC_ADJUST_HISTORY_BIT) as i32)) as i16
    }
}

/// Programmable sound generator: register writes in, stereo frames out.
#[derive(Clone)]
pub struct Ym2149 {
    current_env_offset: usize, // Offset into ENV_DATA
    master_clock: u32,
    host_replay_rate: u32,
    tone_counter: [u32; VOICE_COUNT],
    tone_period: [u32; VOICE_COUNT],
    tone_edges: u32,

    env_counter: u32,
    env_pos: i32,
    env_period: u32,
    noise_counter: u32,
    noise_period: u32,
    tone_mask: u32,
    noise_mask: u32,
    noise_rnd_rack: u32,
    current_noise_mask: u32,
    regs: [u8; 14],
    inner_cycle: u32,
    noise_half: u32,

    stereo: StereoMode,
    dc_left: DcAdjuster,
    dc_right: DcAdjuster,
    mute_mask: u32,
}

impl Ym2149 {
    /// Create a chip clocked at `master_clock` Hz producing `sample_rate` frames per second.
    pub fn with_clocks(master_clock: u32, sample_rate: u32) -> Self {
        let mut chip = Self {
            current_env_offset: 0,
            master_clock,
            host_replay_rate: sample_rate.max(1),
            tone_counter: [0; VOICE_COUNT],
            tone_period: [0; VOICE_COUNT],
            tone_edges: 0,
            env_counter: 0,
            env_pos: 0,
            env_period: 0,
            noise_counter: 0,
            noise_period: 0,
            tone_mask: 0,
            noise_mask: 0,
            noise_rnd_rack: 1,
            current_noise_mask: 0,
            regs: [0; 14],
            inner_cycle: 0,
            noise_half: 0,
            stereo: StereoMode::default(),
            dc_left: DcAdjuster::new(),
            dc_right: DcAdjuster::new(),
            mute_mask: 0,
        };
        chip.reset();
        chip
    }

    /// Master clock in Hz.
    pub fn master_clock(&self) -> u32 {
        self.master_clock
    }

    /// Select how the three voices are spread over the two output sides.
    pub fn set_stereo(&mut self, stereo: StereoMode) {
        self.stereo = stereo;
    }

    /// Reset the chip to its power-on state. The voice mute mask survives.
    pub fn reset(&mut self) {
        let mut seed = 1u32;

        self.tone_counter = [0; VOICE_COUNT];
        self.tone_period = [0; VOICE_COUNT];

        // internal edge state is unpredictable on real hardware
        self.tone_edges =
            (std_lib_rand(&mut seed) as u32 & ((1 << 10) | (1 << 5) | (1 << 0))) * 0x1f;

        self.noise_rnd_rack = 1;
        self.noise_half = 0;
        self.noise_counter = 0;
        self.current_noise_mask = 0;

        for r in 0..14 {
            let val = if r == 7 { 0x3f } else { 0 };
            self.write_register(r, val);
        }

        self.inner_cycle = 0;
        self.env_pos = 0;
        self.dc_left.clear();
        self.dc_right.clear();
    }

    /// Write a register (0-13). Writes to 14/15 (I/O ports) are ignored.
    pub fn write_register(&mut self, reg: u8, value: u8) {
        let reg = reg as usize;
        if reg >= 14 {
            return;
        }
        self.regs[reg] = value & REG_MASK[reg];

        match reg {
            0..=5 => {
                let voice = reg >> 1;
                self.tone_period[voice] =
                    ((self.regs[voice * 2 + 1] as u32) << 8) | self.regs[voice * 2] as u32;
            }
            6 => {
                self.noise_period = self.regs[6] as u32;
            }
            7 => {
                self.tone_mask = MASKS[(value & 0x7) as usize];
                self.noise_mask = MASKS[((value >> 3) & 0x7) as usize];
            }
            11 | 12 => {
                self.env_period = ((self.regs[12] as u32) << 8) | self.regs[11] as u32;
            }
            13 => {
                let shape = (self.regs[13] & 0x0f) as usize;
                self.current_env_offset = SHAPE_TO_ENV[shape] as usize * 32 * 4;
                self.env_pos = -64;
                self.env_counter = 0;
            }
            _ => {}
        }
    }

    /// Read back a register value (0-13), 0 for anything else.
    pub fn read_register(&self, reg: u8) -> u8 {
        self.regs.get(reg as usize).copied().unwrap_or(0)
    }

    /// Snapshot of registers 0-13.
    pub fn dump_registers(&self) -> [u8; 14] {
        self.regs
    }

    /// Bit `i` set silences voice `i` from the next frame on.
    pub fn set_mute_mask(&mut self, mask: u32) {
        self.mute_mask = mask;
    }

    /// Current voice mute mask.
    pub fn mute_mask(&self) -> u32 {
        self.mute_mask
    }

    /// Tick internal state machine at master clock / 8
    fn tick(&mut self) -> u16 {
        let vmask =
            (self.tone_edges | self.tone_mask) & (self.current_noise_mask | self.noise_mask);

        for v in 0..VOICE_COUNT {
            self.tone_counter[v] += 1;
            if self.tone_counter[v] >= self.tone_period[v] {
                self.tone_edges ^= 0x1f << (v * 5);
                self.tone_counter[v] = 0;
            }
        }

        self.env_counter += 1;
        if self.env_counter >= self.env_period {
            self.env_pos += 1;
            if self.env_pos > 0 {
                self.env_pos &= 63;
            }
            self.env_counter = 0;
        }

        // Noise state machine is running half speed
        self.noise_half ^= 1;
        if self.noise_half != 0 {
            self.noise_counter += 1;
            if self.noise_counter >= self.noise_period {
                self.current_noise_mask =
                    if ((self.noise_rnd_rack ^ (self.noise_rnd_rack >> 2)) & 1) != 0 {
                        !0
                    } else {
                        0
                    };
                self.noise_rnd_rack =
                    (self.noise_rnd_rack >> 1) | ((self.current_noise_mask & 1) << 16);
                self.noise_counter = 0;
            }
        }

        vmask as u16
    }

    fn voice_level(&self, voice: usize, levels: u32) -> u16 {
        if self.mute_mask & (1 << voice) != 0 {
            return 0;
        }
        let index = (levels >> (voice * 5)) & 31;
        let half_shift = if self.tone_period[voice] > 1 { 0 } else { 1 };
        YM2149_LOG_LEVELS[index as usize] >> half_shift
    }

    /// Advance by one host sample and return the `[left, right]` frame.
    pub fn compute_next_frame(&mut self) -> [i16; 2] {
        let ym_clock_one_eighth = self.master_clock / 8;
        let mut high_mask: u16 = 0;

        loop {
            high_mask |= self.tick();
            self.inner_cycle += self.host_replay_rate;
            if self.inner_cycle >= ym_clock_one_eighth {
                break;
            }
        }
        self.inner_cycle -= ym_clock_one_eighth;

        let env_level = ENV_DATA[self.current_env_offset + (self.env_pos + 64) as usize] as u32;

        let mut levels: u32 = 0;
        for voice in 0..VOICE_COUNT {
            let reg = self.regs[8 + voice];
            let level = if (reg & 0x10) != 0 {
                env_level
            } else {
                (reg as u32) << 1
            };
            levels |= level << (voice * 5);
        }
        levels &= high_mask as u32;
        debug_assert!(levels < 0x8000);

        let a = self.voice_level(0, levels);
        let b = self.voice_level(1, levels);
        let c = self.voice_level(2, levels);

        match self.stereo {
            StereoMode::Mono => {
                let mono = self.dc_left.adjust(a + b + c);
                [mono, mono]
            }
            StereoMode::Abc => {
                let left = self.dc_left.adjust(2 * a + b);
                let right = self.dc_right.adjust(2 * c + b);
                [left, right]
            }
        }
    }
}

impl std::fmt::Debug for Ym2149 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ym2149")
            .field("master_clock", &self.master_clock)
            .field("regs", &self.regs)
            .field("tone_period", &self.tone_period)
            .field("env_period", &self.env_period)
            .field("noise_period", &self.noise_period)
            .field("mute_mask", &self.mute_mask)
            .finish()
    }
}
