//! Parse and runtime errors of the AY backend.

use thiserror::Error;

use crate::Error as EngineError;

/// Result alias for AY parsing and Z80 execution.
pub type Result<T> = std::result::Result<T, AyError>;

/// Errors that may occur while parsing or replaying AY files.
#[derive(Debug, Error)]
pub enum AyError {
    /// File does not start with the expected `ZXAY` marker.
    #[error("AY file must start with ZXAY header")]
    InvalidFileId,
    /// Container type other than `EMUL`.
    #[error("unsupported AY type '{typ}'")]
    UnsupportedType {
        /// Type identifier encountered inside the header.
        typ: String,
    },
    /// Buffer too small to contain the requested structure.
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// A required relative pointer is zero.
    #[error("missing pointer at offset 0x{offset:04x}")]
    MissingPointer {
        /// Offset of the pointer field inside the file.
        offset: usize,
    },
    /// Relative pointer points outside of the file.
    #[error("pointer at offset 0x{offset:04x} points outside AY file")]
    PointerOutOfRange {
        /// Offset of the pointer field inside the file.
        offset: usize,
    },
    /// Null-terminated string runs into EOF.
    #[error("unterminated string at offset 0x{start:04x}")]
    UnterminatedString {
        /// Start offset for the unterminated string.
        start: usize,
    },
    /// Block table reached EOF before its terminator.
    #[error("unterminated block table at offset 0x{offset:04x}")]
    UnterminatedBlockTable {
        /// Offset where block parsing stopped.
        offset: usize,
    },
    /// Player code needs Amstrad CPC firmware, which is not emulated.
    #[error("track requires Amstrad CPC firmware")]
    CpcFirmware,
    /// Z80 routine did not return within its instruction budget.
    #[error("routine at 0x{address:04x} did not return")]
    Runaway {
        /// Entry point of the routine.
        address: u16,
    },
    /// Generic validation error.
    #[error("{msg}")]
    InvalidData {
        /// Human-readable explanation of the validation failure.
        msg: String,
    },
}

impl From<&str> for AyError {
    fn from(s: &str) -> Self {
        AyError::InvalidData { msg: s.to_string() }
    }
}

impl From<AyError> for EngineError {
    fn from(err: AyError) -> Self {
        match err {
            AyError::UnsupportedType { .. } | AyError::CpcFirmware => {
                EngineError::Unsupported(err.to_string())
            }
            other => EngineError::Format(other.to_string()),
        }
    }
}
