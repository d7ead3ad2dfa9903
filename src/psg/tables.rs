//! Lookup tables for the PSG core.
//!
//! Envelope curves are generated at compile time. Each of the 8 distinct
//! envelopes holds 4 phases of 32 steps: the first two phases play once
//! after a shape write, the last two loop.

/// Per-register write masks (unused bits read back as zero).
pub const REG_MASK: [u8; 14] = [
    0xff, 0x0f, 0xff, 0x0f, 0xff, 0x0f, 0x1f, 0xff, 0x1f, 0x1f, 0x1f, 0xff, 0xff, 0x0f,
];

/// Maps the 16 hardware envelope shapes onto the 8 distinct curves.
pub const SHAPE_TO_ENV: [u8; 16] = [0, 0, 0, 0, 1, 1, 1, 1, 2, 0, 3, 4, 5, 6, 7, 1];

/// 5-bit DAC output, 1.5 dB per step, full scale chosen so three voices
/// summed at maximum stay below `i16::MAX`.
pub const YM2149_LOG_LEVELS: [u16; 32] = [
    0, 61, 73, 87, 103, 123, 146, 173, 206, 245, 291, 345, 410, 488, 580, 689, 819, 973, 1157,
    1375, 1634, 1942, 2308, 2743, 3261, 3875, 4606, 5474, 6506, 7732, 9190, 10922,
];

/// Mixer mask per 3-bit enable field: bit `v` set expands to the 5-bit lane of voice `v`.
pub const MASKS: [u32; 8] = build_masks();

/// 8 envelopes x 128 steps.
pub const ENV_DATA: [u8; 8 * 128] = build_envelopes();

#[derive(Clone, Copy)]
enum Phase {
    Down,
    Up,
    Low,
    High,
}

const CURVES: [[Phase; 4]; 8] = {
    use Phase::*;
    [
        [Down, Low, Low, Low],
        [Up, Low, Low, Low],
        [Down, Down, Down, Down],
        [Down, Up, Down, Up],
        [Down, High, High, High],
        [Up, Up, Up, Up],
        [Up, High, High, High],
        [Up, Down, Up, Down],
    ]
};

const fn build_masks() -> [u32; 8] {
    let mut out = [0u32; 8];
    let mut value = 0;
    while value < 8 {
        let mut voice = 0;
        while voice < 3 {
            if value & (1 << voice) != 0 {
                out[value] |= 0x1f << (voice * 5);
            }
            voice += 1;
        }
        value += 1;
    }
    out
}

const fn build_envelopes() -> [u8; 8 * 128] {
    let mut out = [0u8; 8 * 128];
    let mut env = 0;
    while env < 8 {
        let mut phase = 0;
        while phase < 4 {
            let mut step = 0;
            while step < 32 {
                let level = match CURVES[env][phase] {
                    Phase::Down => 31 - step,
                    Phase::Up => step,
                    Phase::Low => 0,
                    Phase::High => 31,
                };
                out[env * 128 + phase * 32 + step] = level as u8;
                step += 1;
            }
            phase += 1;
        }
        env += 1;
    }
    out
}
