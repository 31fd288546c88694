//! Hold error types for log decoding and the log source abstraction.

/// Errors produced while decoding a single raw log.
///
/// Decode errors are always scoped to one log; callers skip the offending
/// log and continue with the rest of the batch.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The log carried no topics, so no discriminator to dispatch on.
    #[error("Log has no discriminator topic")]
    MissingDiscriminator,

    /// No schema registered for the emitting address.
    #[error("No schema registered for source address: {0}")]
    UnknownSource(String),

    /// The discriminator did not match any event of the source's schema.
    #[error("Unknown event discriminator {discriminator} for source {address}")]
    UnknownEvent {
        /// Emitting contract address.
        address: String,
        /// Unmatched discriminator topic.
        discriminator: String,
    },

    /// The log's topics or data did not match the schema's layout.
    #[error("Invalid log data: {0}")]
    InvalidData(String),

    /// Hexadecimal decoding failure.
    #[error("Hex decode error: {0}")]
    HexError(#[from] hex::FromHexError),

    /// UTF-8 conversion error.
    #[error("UTF-8 Conversion Error: {0}")]
    FromUtf8Error(#[from] std::string::FromUtf8Error),
}

/// Errors produced while loading decoding schemas from contract metadata.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Io Error.
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata file could not be parsed.
    #[error("Metadata parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two schemas were registered for the same address.
    #[error("Duplicate schema for source address: {0}")]
    DuplicateSource(String),
}
