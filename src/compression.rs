//! LHA/LZH decompression for packed chiptune files
//!
//! Most YM files in the wild are LH5 archives holding a single member.
//! Decompression happens in memory with the `delharc` crate; data without an
//! LHA header passes through unchanged.

use crate::{Error, Result};
use std::borrow::Cow;
use std::io::Read;

/// LHA level 0-2 headers place the method id within the first 40 bytes.
const LHA_SEARCH_LIMIT: usize = 40;

/// Pattern is "-lh?-"
const LHA_SIGNATURE_LENGTH: usize = 5;

/// Upper bound for a decompressed member, guards against decompression bombs.
const MAX_DECOMPRESSED_SIZE: usize = 16 * 1024 * 1024;

fn find_lha_signature(data: &[u8]) -> Option<usize> {
    if data.len() < LHA_SIGNATURE_LENGTH + 2 {
        return None;
    }
    let search_limit = LHA_SEARCH_LIMIT.min(data.len() - LHA_SIGNATURE_LENGTH);

    (1..=search_limit).find(|&i| {
        matches!(
            &data[i..i + LHA_SIGNATURE_LENGTH],
            [b'-', b'l', b'h', b'0'..=b'7', b'-']
        )
    })
}

/// True when `data` looks like an LHA archive (`-lh[0-7]-` method id in the header).
pub fn is_lha_compressed(data: &[u8]) -> bool {
    find_lha_signature(data).is_some()
}

/// Short description of the compression method, `None` for plain data.
pub fn lha_method(data: &[u8]) -> Option<String> {
    find_lha_signature(data).map(|offset| format!("LH{}", data[offset + 3] as char))
}

/// Decompress the first archive member if `data` is LHA, borrow it unchanged otherwise.
pub fn decompress_if_needed(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    if !is_lha_compressed(data) {
        return Ok(Cow::Borrowed(data));
    }

    let reader = delharc::LhaDecodeReader::new(data)
        .map_err(|e| Error::Decompression(format!("Failed to parse LHA header: {}", e)))?;

    let mut decompressed = Vec::new();
    reader
        .take(MAX_DECOMPRESSED_SIZE as u64)
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::Decompression(format!("LHA decompression failed: {}", e)))?;

    if decompressed.len() >= MAX_DECOMPRESSED_SIZE {
        return Err(Error::Decompression(
            "Decompressed data exceeded maximum safe size".into(),
        ));
    }

    log::debug!(
        "decompressed {} -> {} bytes ({})",
        data.len(),
        decompressed.len(),
        lha_method(data).unwrap_or_default()
    );
    Ok(Cow::Owned(decompressed))
}

/// First `len` bytes of the (decompressed) payload without inflating the rest.
pub fn peek_decompressed(data: &[u8], len: usize) -> Result<Cow<'_, [u8]>> {
    if !is_lha_compressed(data) {
        return Ok(Cow::Borrowed(&data[..len.min(data.len())]));
    }

    let reader = delharc::LhaDecodeReader::new(data)
        .map_err(|e| Error::Decompression(format!("Failed to parse LHA header: {}", e)))?;

    let mut head = Vec::with_capacity(len);
    reader
        .take(len as u64)
        .read_to_end(&mut head)
        .map_err(|e| Error::Decompression(format!("LHA decompression failed: {}", e)))?;
    Ok(Cow::Owned(head))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Level 0 `-lh0-` (stored) archive holding `payload`; `claimed` is the
    /// original size written to the header.
    pub(crate) fn stored_lha(payload: &[u8], claimed: u32) -> Vec<u8> {
        let name = b"song.ym";
        let mut header = Vec::new();
        header.extend_from_slice(b"-lh0-");
        header.extend_from_slice(&claimed.to_le_bytes()); // packed size
        header.extend_from_slice(&claimed.to_le_bytes()); // original size
        header.extend_from_slice(&[0; 4]); // timestamp
        header.push(0x20); // attributes
        header.push(0); // level
        header.push(name.len() as u8);
        header.extend_from_slice(name);
        header.extend_from_slice(&[0, 0]); // data crc
        let checksum = header.iter().fold(0u8, |sum, &b| sum.wrapping_add(b));

        let mut data = vec![header.len() as u8, checksum];
        data.extend_from_slice(&header);
        data.extend_from_slice(payload);
        data.push(0);
        data
    }

    #[test]
    fn test_lha_magic_detection() {
        let lha_data = b"\x20\x2d\x6c\x68\x35\x2d\x15";
        assert!(is_lha_compressed(lha_data));
        assert_eq!(lha_method(lha_data).as_deref(), Some("LH5"));

        assert!(!is_lha_compressed(b"YM3!"));
        assert!(!is_lha_compressed(b"YM6!"));
        assert!(!is_lha_compressed(&[]));
    }

    #[test]
    fn test_lha_invalid_compression_levels() {
        assert!(!is_lha_compressed(b"\x20\x2d\x6c\x68\x38\x2d\x15"));
        assert!(!is_lha_compressed(b"\x20\x2d\x6c\x68\x35\x00\x15"));
    }

    #[test]
    fn test_lha_false_positive_resistance() {
        let mut data = b"YM6!LeOnArD!".to_vec();
        data.extend_from_slice(b"Title: Song-lh edition");
        assert!(!is_lha_compressed(&data));
    }

    #[test]
    fn test_plain_data_is_borrowed() {
        let data = b"YM3!\x00\x01\x02";
        let out = decompress_if_needed(data).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, data);
    }

    #[test]
    fn test_truncated_archive_is_an_error() {
        let data = b"\x20\x2d\x6c\x68\x35\x2d\x15";
        assert!(decompress_if_needed(data).is_err());
    }

    #[test]
    fn test_stored_archive_round_trip() {
        let archive = stored_lha(b"YM3!\x00\x01", 6);
        assert_eq!(lha_method(&archive).as_deref(), Some("LH0"));
        assert_eq!(&*decompress_if_needed(&archive).unwrap(), b"YM3!\x00\x01");
    }

    #[test]
    fn test_peek_reads_only_the_head() {
        // header claims 1 MiB, only 8 bytes follow
        let archive = stored_lha(b"YM6!LeOn", 1 << 20);
        assert_eq!(&*peek_decompressed(&archive, 4).unwrap(), b"YM6!");
        assert!(decompress_if_needed(&archive).is_err());

        let plain = b"YM5!LeOnArD!";
        let head = peek_decompressed(plain, 4).unwrap();
        assert!(matches!(head, Cow::Borrowed(_)));
        assert_eq!(&*head, b"YM5!");
        assert_eq!(&*peek_decompressed(b"YM", 4).unwrap(), b"YM");
    }
}
