//! Error types for bandpack

use thiserror::Error;

/// Bandpack error types
#[derive(Debug, Error)]
pub enum PackError {
    /// Encountered unexpected end of input in the middle of a value or band.
    #[error("Unexpected end of input")]
    UnexpectedEof,
    /// A value cannot be represented by the coding chosen to carry it.
    #[error("Value {value} out of range for coding {coding}")]
    ValueOutOfRange {
        /// Offending value.
        value: i32,
        /// Human-readable coding descriptor, e.g. `(5,64,1)`.
        coding: String,
    },
    /// Coding parameters do not describe a valid BHSD coding.
    #[error("Invalid coding: {0}")]
    InvalidCoding(String),
    /// Lead byte of a meta-coding is not recognized by any coding family.
    #[error("Bad meta-coding op {0}")]
    BadMetaCoding(u8),
    /// A meta-coding specifier ran past the end of the band headers.
    #[error("Truncated meta-coding")]
    TruncatedMetaCoding,
    /// A configured limit was exceeded.
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),
    /// Band lookup by name failed.
    #[error("Unknown band: {0}")]
    UnknownBand(String),
    /// A reference band has no constant-pool index bound to it.
    #[error("No index for band {0}")]
    MissingIndex(String),
    /// A decoded reference falls outside its index.
    #[error("Reference {value} out of range in {band} (limit {limit})")]
    BadReference {
        /// Band carrying the reference.
        band: String,
        /// Decoded reference code.
        value: i32,
        /// Exclusive upper bound.
        limit: usize,
    },
    /// Attribute layout definition conflict.
    #[error("Attribute definition error: {0}")]
    AttributeDefinition(String),
    /// The archive class version was initialized twice.
    #[error("Highest class version already initialized: {0}")]
    VersionAlreadySet(String),
    /// Internal invariant was violated (phase order, band exhaustion, ...).
    #[error("Invariant violation: {0}")]
    Invariant(String),
    /// I/O operation failed while reading or writing bands.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization of a diagnostic report failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, PackError>;

impl PackError {
    /// Map a short read onto [`PackError::UnexpectedEof`], keep other I/O errors.
    pub fn from_read(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            PackError::UnexpectedEof
        } else {
            PackError::Io(err)
        }
    }
}
