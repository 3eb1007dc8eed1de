#![forbid(unsafe_code)]

/// Errors produced by the pfxkit crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input is not a PKCS#12 container (malformed or truncated).
    #[error("failed to decode PKCS#12 container: {reason}")]
    Decode { reason: String, code: Option<u64> },

    /// The container decoded but its contents could not be recovered,
    /// usually a wrong password or a corrupted MAC.
    #[error("failed to extract PKCS#12 contents (wrong password?): {reason}")]
    Extract { reason: String, code: Option<u64> },

    #[error("failed to encode PKCS#12 container: {reason}")]
    Encode { reason: String, code: Option<u64> },

    #[error("PKCS#12 container has been disposed")]
    Disposed,

    #[error("failed to inspect PKCS#12 structure: {0}")]
    Inspect(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The first error code reported by the native library, if any.
    pub fn library_code(&self) -> Option<u64> {
        match self {
            Self::Decode { code, .. } | Self::Extract { code, .. } | Self::Encode { code, .. } => {
                *code
            }
            _ => None,
        }
    }

    /// Whether this error came from the decode step.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Whether this error came from the extraction step.
    pub fn is_extract(&self) -> bool {
        matches!(self, Self::Extract { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
