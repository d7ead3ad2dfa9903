//! Parsed representation of a ZXAY/EMUL container.

/// Parsed AY file.
#[derive(Debug, Clone)]
pub struct AyFile {
    /// File-level strings and song table info.
    pub header: AyHeader,
    /// Songs in file order.
    pub songs: Vec<AySong>,
}

/// File-level header fields.
#[derive(Debug, Clone)]
pub struct AyHeader {
    /// Author string.
    pub author: String,
    /// Misc/notes string.
    pub misc: String,
    /// Zero-based index of the song players start with.
    pub first_song_index: usize,
}

/// One song entry.
#[derive(Debug, Clone)]
pub struct AySong {
    /// Song title ("Song N" when the file has none).
    pub name: String,
    /// Declared length in 1/50 s units (0 when unknown).
    pub song_length_50hz: u16,
    /// Declared fade length in 1/50 s units.
    pub fade_length_50hz: u16,
    /// Value preset into every Z80 register pair (hi/lo).
    pub register_preset: u16,
    /// Stack/INIT/INTERRUPT addresses.
    pub points: Option<AyPoints>,
    /// Memory blocks loaded before INIT.
    pub blocks: Vec<AyBlock>,
}

impl AySong {
    /// Declared length in milliseconds, `None` when the file gives none.
    pub fn length_ms(&self) -> Option<u32> {
        match self.song_length_50hz {
            0 => None,
            frames => Some(frames as u32 * 20),
        }
    }

    /// Declared fade length in milliseconds, `None` when the file gives none.
    pub fn fade_ms(&self) -> Option<u32> {
        match self.fade_length_50hz {
            0 => None,
            frames => Some(frames as u32 * 20),
        }
    }
}

/// Z80 entry points.
#[derive(Debug, Clone, Copy)]
pub struct AyPoints {
    /// Initial stack pointer.
    pub stack: u16,
    /// INIT routine (0 means: first CALL in the first block).
    pub init: u16,
    /// INTERRUPT routine (0 means: INIT doubles as the frame routine).
    pub interrupt: u16,
}

/// Memory block copied into the Z80 address space.
#[derive(Debug, Clone)]
pub struct AyBlock {
    /// Load address.
    pub address: u16,
    /// Payload, already clamped to the 64K space and the file length.
    pub data: Vec<u8>,
}
