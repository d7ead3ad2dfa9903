//! YM register dump parser.
//!
//! Handles every playable Atari ST YM version on already decompressed data:
//! - YM2/YM3: 4 byte magic + 14 registers per frame, interleaved
//! - YM3b: YM3 plus a little-endian loop frame in the last 4 bytes
//! - YM4: `LeOnArD!` header (26 bytes), digidrums, metadata, frames
//! - YM5/YM6: 34 byte header adding master clock, frame rate and extra data

use bitflags::bitflags;

use crate::psg::ATARI_ST_CLOCK;
use crate::{Error, Result};

const MAX_REASONABLE_FRAMES: u32 = 100_000;
const DEFAULT_FRAME_RATE: u16 = 50;
const SIGNATURE: &[u8; 8] = b"LeOnArD!";
const END_MARKER: &[u8; 4] = b"End!";

bitflags! {
    /// Song attribute word of YM4+ headers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct YmAttributes: u32 {
        /// Frames stored register-major (all R0, then all R1, ...).
        const INTERLEAVED = 1;
        /// Digidrum samples are signed.
        const DRUM_SIGNED = 1 << 1;
        /// Digidrum samples are packed 4-bit.
        const DRUM_4BIT = 1 << 2;
    }
}

/// Playable YM revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YmVersion {
    /// Mad Max variant of YM3.
    Ym2,
    /// Plain register dump.
    Ym3,
    /// Register dump with loop point.
    Ym3b,
    /// First revision with metadata.
    Ym4,
    /// Adds clock and frame rate.
    Ym5,
    /// Adds special effects (parsed, not emulated).
    Ym6,
}

impl YmVersion {
    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            YmVersion::Ym2 => "YM2",
            YmVersion::Ym3 => "YM3",
            YmVersion::Ym3b => "YM3b",
            YmVersion::Ym4 => "YM4",
            YmVersion::Ym5 => "YM5",
            YmVersion::Ym6 => "YM6",
        }
    }
}

/// Result of looking at the first 4 bytes of a decompressed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YmMagic {
    /// A revision this parser can play.
    Playable(YmVersion),
    /// Part of the YM family, but not a register dump.
    Unsupported(&'static str),
}

/// Classify the magic of decompressed data.
pub fn detect(data: &[u8]) -> Option<YmMagic> {
    let magic = data.get(0..4)?;
    let kind = match magic {
        b"YM2!" => YmMagic::Playable(YmVersion::Ym2),
        b"YM3!" => YmMagic::Playable(YmVersion::Ym3),
        b"YM3b" => YmMagic::Playable(YmVersion::Ym3b),
        b"YM4!" => YmMagic::Playable(YmVersion::Ym4),
        b"YM5!" => YmMagic::Playable(YmVersion::Ym5),
        b"YM6!" => YmMagic::Playable(YmVersion::Ym6),
        b"YM1!" => YmMagic::Unsupported("YM1"),
        b"MIX1" => YmMagic::Unsupported("MIX1 sample mix"),
        b"YMT1" | b"YMT2" => YmMagic::Unsupported("YM tracker"),
        _ => return None,
    };
    Some(kind)
}

/// A parsed song: frames plus header information.
#[derive(Debug, Clone)]
pub struct YmSong {
    /// File revision.
    pub version: YmVersion,
    /// 16 register values per frame (R14/R15 are zero for 14 register formats).
    pub frames: Vec<[u8; 16]>,
    /// Frame playback restarts at when the end is reached.
    pub loop_frame: usize,
    /// Frames per second.
    pub frame_rate: u16,
    /// PSG clock in Hz.
    pub master_clock: u32,
    /// Header attribute bits.
    pub attributes: YmAttributes,
    /// Song title.
    pub title: String,
    /// Composer.
    pub author: String,
    /// Free-form comment.
    pub comment: String,
}

impl YmSong {
    /// Milliseconds covered by `frames` frames.
    pub fn frames_to_ms(&self, frames: usize) -> u32 {
        (frames as u64 * 1000 / self.frame_rate.max(1) as u64) as u32
    }
}

/// Bounds-checked big-endian reader.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], pos: usize, context: &'static str) -> Self {
        Self { data, pos, context }
    }

    fn truncated(&self, what: &str) -> Error {
        Error::Format(format!("{} truncated in {}", self.context, what))
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.truncated(what))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn be_u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn be_u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn c_string(&mut self) -> Result<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.truncated("metadata strings"))?;
        let text = rest[..len].iter().map(|&b| b as char).collect();
        self.pos += len + 1;
        Ok(text)
    }
}

/// Parse decompressed YM data.
pub fn parse(data: &[u8]) -> Result<YmSong> {
    match detect(data) {
        Some(YmMagic::Playable(version)) => match version {
            YmVersion::Ym2 | YmVersion::Ym3 => parse_ym3(data, version),
            YmVersion::Ym3b => parse_ym3b(data),
            YmVersion::Ym4 | YmVersion::Ym5 | YmVersion::Ym6 => parse_leonard(data, version),
        },
        Some(YmMagic::Unsupported(kind)) => {
            Err(Error::Unsupported(format!("{} files are not playable", kind)))
        }
        None => Err(Error::Format("Not a YM file".into())),
    }
}

fn deinterleave(payload: &[u8], frame_count: usize, regs: usize) -> Vec<[u8; 16]> {
    (0..frame_count)
        .map(|j| {
            let mut frame = [0u8; 16];
            for (k, reg) in frame.iter_mut().enumerate().take(regs) {
                *reg = payload[j + frame_count * k];
            }
            frame
        })
        .collect()
}

fn sequential(payload: &[u8], frame_count: usize, regs: usize) -> Vec<[u8; 16]> {
    payload
        .chunks_exact(regs)
        .take(frame_count)
        .map(|chunk| {
            let mut frame = [0u8; 16];
            frame[..regs].copy_from_slice(chunk);
            frame
        })
        .collect()
}

fn bare_song(version: YmVersion, frames: Vec<[u8; 16]>, loop_frame: usize) -> YmSong {
    YmSong {
        version,
        frames,
        loop_frame,
        frame_rate: DEFAULT_FRAME_RATE,
        master_clock: ATARI_ST_CLOCK,
        attributes: YmAttributes::INTERLEAVED,
        title: String::new(),
        author: String::new(),
        comment: String::new(),
    }
}

fn parse_ym3(data: &[u8], version: YmVersion) -> Result<YmSong> {
    let payload = &data[4..];
    if payload.is_empty() || payload.len() % 14 != 0 {
        return Err(Error::Format(format!(
            "{} data size {} is not a multiple of 14",
            version.name(),
            payload.len()
        )));
    }
    let frame_count = payload.len() / 14;
    Ok(bare_song(version, deinterleave(payload, frame_count, 14), 0))
}

fn parse_ym3b(data: &[u8]) -> Result<YmSong> {
    if data.len() < 4 + 14 + 4 {
        return Err(Error::Format("YM3b file too small".into()));
    }
    let (body, tail) = data.split_at(data.len() - 4);
    let payload = &body[4..];
    if payload.len() % 14 != 0 {
        return Err(Error::Format(format!(
            "YM3b data size {} is not a multiple of 14",
            payload.len()
        )));
    }
    let frame_count = payload.len() / 14;
    let loop_frame = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]) as usize;
    let loop_frame = if loop_frame < frame_count {
        loop_frame
    } else {
        0
    };
    Ok(bare_song(
        YmVersion::Ym3b,
        deinterleave(payload, frame_count, 14),
        loop_frame,
    ))
}

fn parse_leonard(data: &[u8], version: YmVersion) -> Result<YmSong> {
    let name = version.name();
    let mut r = Reader::new(data, 4, name);

    if r.take(8, "header")? != SIGNATURE {
        return Err(Error::Format(format!("Invalid {} signature", name)));
    }
    let frame_count = r.be_u32("header")?;
    if frame_count == 0 {
        return Err(Error::Format(format!("{} has zero frames", name)));
    }
    if frame_count > MAX_REASONABLE_FRAMES {
        return Err(Error::Format(format!(
            "{} frame count {} exceeds limit of {}",
            name, frame_count, MAX_REASONABLE_FRAMES
        )));
    }
    let frame_count = frame_count as usize;
    let attributes = YmAttributes::from_bits_truncate(r.be_u32("header")?);
    let digidrum_count = r.be_u16("header")?;

    let (master_clock, frame_rate, loop_frame, extra_size) = if version == YmVersion::Ym4 {
        let loop_frame = r.be_u32("header")?;
        (ATARI_ST_CLOCK, DEFAULT_FRAME_RATE, loop_frame, 0)
    } else {
        let clock = r.be_u32("header")?;
        let rate = r.be_u16("header")?;
        let loop_frame = r.be_u32("header")?;
        let extra = r.be_u16("header")?;
        (clock, rate, loop_frame, extra)
    };
    r.take(extra_size as usize, "extra data")?;

    for _ in 0..digidrum_count {
        let size = r.be_u32("digidrum size")? as usize;
        r.take(size, "digidrum data")?;
    }

    let title = r.c_string()?;
    let author = r.c_string()?;
    let comment = r.c_string()?;

    // YM4/YM5 dumps exist with either 14 or 16 registers per frame
    let remaining = data.len() - r.pos;
    let regs = if version == YmVersion::Ym6 || remaining >= frame_count * 16 {
        16
    } else {
        14
    };
    let payload = r.take(frame_count * regs, "frame data")?;
    let frames = if attributes.contains(YmAttributes::INTERLEAVED) {
        deinterleave(payload, frame_count, regs)
    } else {
        sequential(payload, frame_count, regs)
    };

    match data.get(r.pos..r.pos + 4) {
        Some(marker) if marker == END_MARKER => {}
        _ => log::warn!("{} file has no End! marker", name),
    }

    let loop_frame = loop_frame as usize;
    Ok(YmSong {
        version,
        frames,
        loop_frame: if loop_frame < frame_count {
            loop_frame
        } else {
            0
        },
        frame_rate: if frame_rate == 0 {
            DEFAULT_FRAME_RATE
        } else {
            frame_rate
        },
        master_clock: if master_clock == 0 {
            ATARI_ST_CLOCK
        } else {
            master_clock
        },
        attributes,
        title,
        author,
        comment,
    })
}
