//! Error types for file opening, transport control and export

/// Error type for all engine and backend operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Content is malformed or truncated
    #[error("Format error: {0}")]
    Format(String),

    /// Content is well formed but uses a variant no backend can play
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// No registered backend recognized the file
    #[error("No compatible backend for this file")]
    NoCompatibleBackend,

    /// Track or voice index outside the valid range
    #[error("{what} index {index} out of range (count {count})")]
    Index {
        /// What was being indexed ("track", "voice")
        what: &'static str,
        /// Requested index
        index: usize,
        /// Number of valid entries
        count: usize,
    },

    /// Parameter outside its accepted domain
    #[error("Out of range: {0}")]
    Range(String),

    /// Operation requires an open file
    #[error("No file is open")]
    NotReady,

    /// Decompression error (LHA/LZH)
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// WAV writer failure
    #[error("Export error: {0}")]
    Export(#[from] hound::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn track_index(index: usize, count: usize) -> Self {
        Error::Index {
            what: "track",
            index,
            count,
        }
    }

    pub(crate) fn voice_index(index: usize, count: usize) -> Self {
        Error::Index {
            what: "voice",
            index,
            count,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_message() {
        let err = Error::track_index(5, 3);
        assert_eq!(err.to_string(), "track index 5 out of range (count 3)");
    }

    #[test]
    fn test_string_conversion() {
        let err: Error = "boom".into();
        assert!(matches!(err, Error::Other(ref s) if s == "boom"));
    }
}
