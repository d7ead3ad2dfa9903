//! ZXAY/EMUL parser.
//!
//! All pointers in the container are big-endian signed 16-bit offsets
//! relative to the pointer's own position; 0 means "absent".

use super::error::{AyError, Result};
use super::format::{AyBlock, AyFile, AyHeader, AyPoints, AySong};

/// Container magic.
pub const FILE_ID: &[u8; 4] = b"ZXAY";
/// The only container type with embedded Z80 player code.
pub const TYPE_EMUL: &[u8; 4] = b"EMUL";

/// Parse an AY container.
pub fn load_ay(data: &[u8]) -> Result<AyFile> {
    AyParser { data }.parse()
}

struct AyParser<'a> {
    data: &'a [u8],
}

impl AyParser<'_> {
    fn parse(&self) -> Result<AyFile> {
        if self.data.len() < 20 {
            return Err(AyError::UnexpectedEof);
        }
        if &self.data[0..4] != FILE_ID {
            return Err(AyError::InvalidFileId);
        }
        let type_id = &self.data[4..8];
        if type_id != TYPE_EMUL {
            return Err(AyError::UnsupportedType {
                typ: String::from_utf8_lossy(type_id).to_string(),
            });
        }

        let author = self.read_string_pointer(12)?;
        let misc = self.read_string_pointer(14)?;
        let song_count = self.read_u8(16)? as usize + 1;
        let first_song = self.read_u8(17)? as usize;
        let songs_ptr = self
            .resolve_pointer(18)?
            .ok_or(AyError::MissingPointer { offset: 18 })?;

        if first_song >= song_count {
            return Err(AyError::InvalidData {
                msg: format!(
                    "first song index {} outside available {} songs",
                    first_song + 1,
                    song_count
                ),
            });
        }

        let songs = (0..song_count)
            .map(|idx| self.parse_song(idx, songs_ptr + idx * 4))
            .collect::<Result<Vec<_>>>()?;

        Ok(AyFile {
            header: AyHeader {
                author,
                misc,
                first_song_index: first_song,
            },
            songs,
        })
    }

    fn parse_song(&self, idx: usize, entry: usize) -> Result<AySong> {
        self.ensure_range(entry, 4)?;
        let name = match self.resolve_pointer(entry)? {
            Some(ptr) => self.read_nt_string(ptr)?,
            None => format!("Song {}", idx + 1),
        };
        let data = self
            .resolve_pointer(entry + 2)?
            .ok_or(AyError::MissingPointer { offset: entry + 2 })?;

        self.ensure_range(data, 14)?;
        let points = match self.resolve_pointer(data + 10)? {
            Some(ptr) => Some(self.parse_points(ptr)?),
            None => None,
        };
        let blocks = match self.resolve_pointer(data + 12)? {
            Some(ptr) => self.parse_blocks(ptr)?,
            None => Vec::new(),
        };

        Ok(AySong {
            name,
            song_length_50hz: self.read_u16(data + 4)?,
            fade_length_50hz: self.read_u16(data + 6)?,
            register_preset: self.read_u16(data + 8)?,
            points,
            blocks,
        })
    }

    fn parse_points(&self, offset: usize) -> Result<AyPoints> {
        Ok(AyPoints {
            stack: self.read_u16(offset)?,
            init: self.read_u16(offset + 2)?,
            interrupt: self.read_u16(offset + 4)?,
        })
    }

    fn parse_blocks(&self, mut offset: usize) -> Result<Vec<AyBlock>> {
        let mut blocks = Vec::new();
        loop {
            if offset + 2 > self.data.len() {
                return Err(AyError::UnterminatedBlockTable { offset });
            }
            let address = self.read_u16(offset)?;
            if address == 0 {
                break;
            }
            self.ensure_range(offset, 6)?;
            let length = self.read_u16(offset + 2)? as usize;
            let start = self
                .resolve_pointer(offset + 4)?
                .ok_or(AyError::MissingPointer { offset: offset + 4 })?;

            let max_len = 0x10000 - address as usize;
            let end = (start + length.min(max_len)).min(self.data.len());
            blocks.push(AyBlock {
                address,
                data: self.data[start..end].to_vec(),
            });
            offset += 6;
        }
        Ok(blocks)
    }

    fn read_string_pointer(&self, offset: usize) -> Result<String> {
        match self.resolve_pointer(offset)? {
            Some(ptr) => self.read_nt_string(ptr),
            None => Ok(String::new()),
        }
    }

    fn read_u8(&self, offset: usize) -> Result<u8> {
        self.ensure_range(offset, 1)?;
        Ok(self.data[offset])
    }

    fn read_u16(&self, offset: usize) -> Result<u16> {
        self.ensure_range(offset, 2)?;
        Ok(u16::from_be_bytes([self.data[offset], self.data[offset + 1]]))
    }

    fn resolve_pointer(&self, origin: usize) -> Result<Option<usize>> {
        let rel = self.read_u16(origin)? as i16;
        if rel == 0 {
            return Ok(None);
        }
        let target = origin as isize + rel as isize;
        if target < 0 || target >= self.data.len() as isize {
            return Err(AyError::PointerOutOfRange { offset: origin });
        }
        Ok(Some(target as usize))
    }

    fn read_nt_string(&self, start: usize) -> Result<String> {
        let rest = &self.data[start..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(AyError::UnterminatedString { start })?;
        Ok(String::from_utf8_lossy(&rest[..len]).to_string())
    }

    fn ensure_range(&self, offset: usize, size: usize) -> Result<()> {
        match offset.checked_add(size) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(AyError::UnexpectedEof),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Z80 player loaded at 0x8000: INIT clears a byte at 0x9000, INTERRUPT
    /// enables tone A and jumps to the tail.
    const PLAYER: [u8; 24] = [
        // init (0x8000): ld a,0 ; ld (0x9000),a ; ret
        0x3E, 0x00, 0x32, 0x00, 0x90, 0xC9,
        // interrupt (0x8006): ld bc,0xfffd ; ld a,7 ; out (c),a
        0x01, 0xFD, 0xFF, 0x3E, 0x07, 0xED, 0x79,
        //   ld b,0xbf ; ld a,0x3e ; out (c),a
        0x06, 0xBF, 0x3E, 0x3E, 0xED, 0x79,
        //   jp 0x8100
        0xC3, 0x00, 0x81,
        0x00, 0x00,
    ];

    /// Interrupt tail at 0x8100: tone A period 0x11C, volume 15, then counts
    /// the call in the byte at 0x9000.
    pub(crate) const CALL_COUNTER: u16 = 0x9000;
    const PLAYER_TAIL: [u8; 41] = [
        // ld b,0xff ; ld a,0 ; out (c),a ; ld b,0xbf ; ld a,0x1c ; out (c),a
        0x06, 0xFF, 0x3E, 0x00, 0xED, 0x79, 0x06, 0xBF, 0x3E, 0x1C, 0xED, 0x79,
        // ld b,0xff ; ld a,1 ; out (c),a ; ld b,0xbf ; ld a,0x01 ; out (c),a
        0x06, 0xFF, 0x3E, 0x01, 0xED, 0x79, 0x06, 0xBF, 0x3E, 0x01, 0xED, 0x79,
        // ld b,0xff ; ld a,8 ; out (c),a ; ld b,0xbf ; ld a,0x0f ; out (c),a
        0x06, 0xFF, 0x3E, 0x08, 0xED, 0x79, 0x06, 0xBF, 0x3E, 0x0F, 0xED, 0x79,
        // ld hl,0x9000 ; inc (hl) ; ret
        0x21, 0x00, 0x90, 0x34, 0xC9,
    ];

    fn put_rel(buf: &mut [u8], at: usize, target: usize) {
        let rel = (target as isize - at as isize) as i16;
        buf[at..at + 2].copy_from_slice(&rel.to_be_bytes());
    }

    /// Build an EMUL file with `names.len()` songs sharing the test player.
    pub(crate) fn build_ay(names: &[&str], length_50hz: u16) -> Vec<u8> {
        let songs = names.len();
        let mut buf = vec![0u8; 20];
        buf[0..4].copy_from_slice(FILE_ID);
        buf[4..8].copy_from_slice(TYPE_EMUL);
        buf[16] = (songs - 1) as u8;

        let song_table = buf.len();
        buf.resize(song_table + songs * 4, 0);
        put_rel(&mut buf, 18, song_table);

        let author = buf.len();
        buf.extend_from_slice(b"Test Author\0");
        put_rel(&mut buf, 12, author);

        let misc = buf.len();
        buf.extend_from_slice(b"Ocean 1987\0");
        put_rel(&mut buf, 14, misc);

        for (idx, name) in names.iter().enumerate() {
            let name_at = buf.len();
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);

            let data_at = buf.len();
            buf.resize(data_at + 14, 0);
            buf[data_at..data_at + 4].copy_from_slice(&[0, 1, 2, 3]);
            buf[data_at + 4..data_at + 6].copy_from_slice(&length_50hz.to_be_bytes());
            buf[data_at + 6..data_at + 8].copy_from_slice(&50u16.to_be_bytes());

            let points_at = buf.len();
            buf.extend_from_slice(&0xF000u16.to_be_bytes());
            buf.extend_from_slice(&0x8000u16.to_be_bytes());
            buf.extend_from_slice(&0x8006u16.to_be_bytes());
            put_rel(&mut buf, data_at + 10, points_at);

            let blocks_at = buf.len();
            buf.resize(blocks_at + 14, 0);
            put_rel(&mut buf, data_at + 12, blocks_at);
            let code_at = buf.len();
            buf.extend_from_slice(&PLAYER);
            let tail_at = buf.len();
            buf.extend_from_slice(&PLAYER_TAIL);

            buf[blocks_at..blocks_at + 2].copy_from_slice(&0x8000u16.to_be_bytes());
            buf[blocks_at + 2..blocks_at + 4].copy_from_slice(&(PLAYER.len() as u16).to_be_bytes());
            put_rel(&mut buf, blocks_at + 4, code_at);
            buf[blocks_at + 6..blocks_at + 8].copy_from_slice(&0x8100u16.to_be_bytes());
            buf[blocks_at + 8..blocks_at + 10]
                .copy_from_slice(&(PLAYER_TAIL.len() as u16).to_be_bytes());
            put_rel(&mut buf, blocks_at + 10, tail_at);
            // terminator at blocks_at + 12 stays zero

            let entry = song_table + idx * 4;
            put_rel(&mut buf, entry, name_at);
            put_rel(&mut buf, entry + 2, data_at);
        }
        buf
    }

    #[test]
    fn test_parse_songs() {
        let data = build_ay(&["Intro", "Level 1", "Boss"], 500);
        let file = load_ay(&data).unwrap();
        assert_eq!(file.header.author, "Test Author");
        assert_eq!(file.header.misc, "Ocean 1987");
        assert_eq!(file.songs[1].fade_ms(), Some(1_000));
        assert_eq!(file.songs.len(), 3);
        assert_eq!(file.songs[2].name, "Boss");
        assert_eq!(file.songs[0].length_ms(), Some(10_000));
        let points = file.songs[1].points.unwrap();
        assert_eq!(points.init, 0x8000);
        assert_eq!(points.interrupt, 0x8006);
        assert_eq!(file.songs[0].blocks.len(), 2);
        assert_eq!(file.songs[0].blocks[1].address, 0x8100);
    }

    #[test]
    fn test_rejects_other_types() {
        let mut data = build_ay(&["x"], 0);
        data[4..8].copy_from_slice(b"AMAD");
        assert!(matches!(
            load_ay(&data),
            Err(AyError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let data = build_ay(&["x"], 0);
        assert!(matches!(load_ay(&data[..10]), Err(AyError::UnexpectedEof)));
        assert!(load_ay(&data[..40]).is_err());
    }

    #[test]
    fn test_bad_magic() {
        let mut data = build_ay(&["x"], 0);
        data[0] = b'Q';
        assert!(matches!(load_ay(&data), Err(AyError::InvalidFileId)));
    }
}
