//! YM2149 / AY-3-8910 programmable sound generator shared by all backends.

mod chip;
mod tables;

pub use chip::{voice_name, Ym2149, VOICE_COUNT};

use serde::{Deserialize, Serialize};

/// Atari ST master clock.
pub const ATARI_ST_CLOCK: u32 = 2_000_000;
/// ZX Spectrum 128 AY clock.
pub const ZX_SPECTRUM_CLOCK: u32 = 1_773_400;
/// Amstrad CPC AY clock.
pub const AMSTRAD_CPC_CLOCK: u32 = 1_000_000;

/// How the three voices are spread over the two output channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StereoMode {
    /// Voice A left, C right, B centred.
    #[default]
    Abc,
    /// All voices on both sides.
    Mono,
}

/// Human readable machine name for a chip clock.
pub fn system_for_clock(master_clock: u32) -> &'static str {
    match master_clock {
        ATARI_ST_CLOCK => "Atari ST",
        AMSTRAD_CPC_CLOCK => "Amstrad CPC",
        1_750_000..=1_800_000 => "ZX Spectrum",
        _ => "YM2149",
    }
}
