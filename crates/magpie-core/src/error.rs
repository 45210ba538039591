//! Error types shared across the collection pipeline.
//!
//! Errors carry constant messages with structured context fields; callers log
//! or match on them without parsing strings.

use std::error::Error;

use thiserror::Error;

use crate::model::InfoHash;

/// Errors produced while constructing or parsing domain identifiers.
#[derive(Debug, Error)]
pub enum ModelError {
    /// An infohash had the wrong byte length.
    #[error("invalid infohash length")]
    InvalidInfoHash {
        /// Number of bytes actually supplied.
        actual: usize,
    },
    /// An infohash hex rendering could not be parsed.
    #[error("invalid infohash hex")]
    InvalidHex {
        /// The offending input.
        input: String,
    },
    /// A thumbnail subpath escaped the collection directory.
    #[error("invalid thumbnail subpath")]
    InvalidSubpath {
        /// The offending subpath.
        subpath: String,
    },
}

/// Failures reported by the file-transfer transport.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The transfer did not complete within the transport's deadline.
    #[error("file transfer timed out")]
    Timeout,
    /// The remote peer rejected the transfer.
    #[error("file transfer refused by remote")]
    Refused {
        /// Reason reported by the remote, when available.
        reason: String,
    },
    /// The transport failed locally.
    #[error("file transfer failed")]
    Failed {
        /// Description of the local failure.
        reason: String,
    },
}

/// Failures reported by the magnet resolver.
#[derive(Debug, Error)]
pub enum MagnetError {
    /// The DHT lookup did not produce a descriptor in time.
    #[error("magnet retrieval timed out")]
    Timeout {
        /// Infohash the lookup was resolving.
        infohash: InfoHash,
    },
    /// The lookup failed outright.
    #[error("magnet retrieval failed")]
    Failed {
        /// Infohash the lookup was resolving.
        infohash: InfoHash,
        /// Description of the failure.
        reason: String,
    },
}

impl MagnetError {
    /// Infohash the failed lookup was resolving.
    #[must_use]
    pub const fn infohash(&self) -> InfoHash {
        match self {
            Self::Timeout { infohash } | Self::Failed { infohash, .. } => *infohash,
        }
    }
}

/// Failure decoding fetched bytes into a torrent descriptor.
#[derive(Debug, Error)]
#[error("descriptor decode failed")]
pub struct CodecError {
    /// Description of the malformation.
    pub reason: String,
}

impl CodecError {
    /// Build a decode error from any displayable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failure reported by the torrent metadata database.
#[derive(Debug, Error)]
#[error("metadata store operation failed")]
pub struct StoreError {
    /// Store operation that failed.
    pub operation: &'static str,
    /// Underlying database failure.
    #[source]
    pub source: Box<dyn Error + Send + Sync>,
}

impl StoreError {
    /// Wrap an underlying database failure with the operation name.
    pub fn new(
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }
}

/// Convenience alias for metadata store results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Rejected coordinator settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A settings field held an unusable value.
    #[error("invalid settings value")]
    Invalid {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the rejection.
        reason: &'static str,
    },
}
