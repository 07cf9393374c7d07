//! Error types for the Toshiba AC integration

use thiserror::Error;

use crate::lifecycle::InvalidTransition;

/// Errors reported by a device manager
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceManagerError {
    /// Cloud or device unreachable
    #[error("connection error: {0}")]
    Connection(String),

    /// Credentials or SAS token rejected
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Connection could not be closed cleanly
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

/// Result type for integration operations
pub type ToshibaAcResult<T> = Result<T, ToshibaAcError>;

/// Errors surfaced by the entry lifecycle
#[derive(Debug, Error)]
pub enum ToshibaAcError {
    /// Entry data lacks or mistypes a required credential
    #[error("invalid entry data: {0}")]
    InvalidEntryData(#[from] serde_json::Error),

    /// The entry already has a device manager
    #[error("a device manager is already registered for entry {0}")]
    AlreadyRegistered(String),

    /// Connecting failed on the given attempt (1 = stored token, 2 = fresh token)
    #[error("connection failed on attempt {attempt}: {source}")]
    Connectivity {
        attempt: u8,
        #[source]
        source: DeviceManagerError,
    },

    /// The host could not unload every platform of the entry
    #[error("platforms of entry {0} could not be unloaded")]
    PlatformTeardown(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}
