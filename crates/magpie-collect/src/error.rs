//! Error types for the acquisition coordinator.

use thiserror::Error;

use magpie_core::SettingsError;

/// Errors surfaced by the coordinator facade.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The coordinator worker has shut down and no longer accepts commands.
    #[error("collector is shut down")]
    Closed,
    /// The supplied settings were rejected before the worker started.
    #[error("collector settings rejected")]
    Settings {
        /// Validation failure naming the offending field.
        #[source]
        source: SettingsError,
    },
}

impl From<SettingsError> for CollectError {
    fn from(source: SettingsError) -> Self {
        Self::Settings { source }
    }
}

/// Convenience alias for coordinator results.
pub type CollectResult<T> = Result<T, CollectError>;
