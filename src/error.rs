//! Error types for the motemem address-space resolver.
//!
//! This module provides structured error handling using thiserror. Every
//! fatal condition carries enough context (file, symbol, computed values) to
//! explain why a module could not be initialised.

use thiserror::Error;

/// Main error type for motemem operations.
#[derive(Debug, Error)]
pub enum MoteError {
    /// The calibration symbol is missing from the parsed data/bss sections
    #[error("Reference symbol '{symbol}' not found in data or bss sections")]
    ReferenceSymbolNotFound { symbol: String },

    /// Map file missing/unreadable, or the parse command produced no output
    #[error("No artifact data: {source_name}")]
    NoArtifactData { source_name: String },

    /// The parse command could not be started or did not finish
    #[error("External command '{command}' failed: {reason}")]
    ExternalCommandFailed { command: String, reason: String },

    /// Two sections of one snapshot share addresses
    #[error(
        "Sections '{first}' [{first_start:#x}, {first_end:#x}) and '{second}' [{second_start:#x}, {second_end:#x}) overlap"
    )]
    AddressRangeOverlap {
        first: String,
        first_start: u64,
        first_end: u64,
        second: String,
        second_start: u64,
        second_end: u64,
    },

    /// A configured rule is not a valid regular expression
    #[error("Invalid pattern for {key}: {source}")]
    InvalidPattern {
        key: String,
        #[source]
        source: regex::Error,
    },

    /// Configuration is inconsistent or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The core communicator refused or short-changed a byte transfer
    #[error("Transfer of {length} bytes at raw address {address:#x} failed: {message}")]
    Transfer {
        address: u64,
        length: u32,
        message: String,
    },

    /// Variable lookup by name failed
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// Access outside every section of a memory
    #[error("Address range [{address:#x}, +{length}) is not covered by a single section")]
    AddressOutOfRange { address: u64, length: usize },

    /// Operation timeout
    #[error("Operation timeout after {seconds}s")]
    Timeout { seconds: u64 },

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration documents that fail to deserialize
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for motemem operations
pub type Result<T> = std::result::Result<T, MoteError>;

impl MoteError {
    /// Whether this error aborts module initialisation.
    ///
    /// Lookup failures on an already built memory are recoverable by the
    /// caller; everything produced while building a snapshot is not.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            MoteError::UnknownVariable(_) | MoteError::AddressOutOfRange { .. }
        )
    }
}
