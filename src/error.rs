//! Custom error types for the driver.
//!
//! This module defines `WfsError`, the error type for everything that fails on
//! the host side of the driver boundary. Vendor return codes are *not* errors
//! in this sense: every low-level operation hands back a decoded
//! [`Status`](crate::status::Status) and lets the caller decide what to do
//! with it.
//!
//! ## Error Hierarchy
//!
//! - **`NotANumber`** / **`StringTooLong`**: raised by the type marshaller
//!   when a host value cannot be placed in a wire cell. Nothing reaches the
//!   vendor library.
//! - **`LibraryNotFound`** / **`MissingSymbol`**: the `WFS_32`/`WFS_64`
//!   library (or one of its entry points) could not be resolved.
//! - **`Connection`**: `connect` found no free instrument, the instrument was
//!   already in use, or `init` handed back a null session.
//! - **`Config`** / **`ConfigValidation`**: settings failed to load or were
//!   loaded but make no sense.
//! - **`Logging`**: the log filter did not parse or a subscriber was already
//!   installed by someone else.
//! - **`WorkerUnavailable`** / **`Cancelled`**: the offloaded worker has shut
//!   down, or a request was withdrawn before the worker reached it.

use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type WfsResult<T> = std::result::Result<T, WfsError>;

/// Host-side failures of the driver.
#[derive(Error, Debug)]
pub enum WfsError {
    #[error("not a number: {0}")]
    NotANumber(String),

    #[error("string of {len} bytes does not fit a {capacity}-byte buffer")]
    StringTooLong { len: usize, capacity: usize },

    #[error("WFS library not found: {0}")]
    LibraryNotFound(String),

    #[error("WFS library entry point missing: {0}")]
    MissingSymbol(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    ConfigValidation(String),

    #[error("Logging setup error: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WFS worker is no longer running")]
    WorkerUnavailable,

    #[error("request withdrawn before dispatch")]
    Cancelled,
}

impl From<figment::Error> for WfsError {
    fn from(err: figment::Error) -> Self {
        WfsError::Config(Box::new(err))
    }
}

impl From<wfs_sys::LoadError> for WfsError {
    fn from(err: wfs_sys::LoadError) -> Self {
        match err {
            wfs_sys::LoadError::LibraryNotFound { .. } => {
                WfsError::LibraryNotFound(err.to_string())
            }
            wfs_sys::LoadError::MissingSymbol { .. } => WfsError::MissingSymbol(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WfsError::StringTooLong {
            len: 513,
            capacity: 512,
        };
        assert_eq!(
            err.to_string(),
            "string of 513 bytes does not fit a 512-byte buffer"
        );

        let err = WfsError::Connection("instrument in use".to_string());
        assert_eq!(err.to_string(), "Connection error: instrument in use");

        let err = WfsError::ConfigValidation("bad level".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration validation error: bad level"
        );
    }

    #[test]
    fn test_load_error_conversion() {
        let err: WfsError = wfs_sys::load(Some(std::path::Path::new("/nonexistent/libWFS.so")))
            .unwrap_err()
            .into();
        assert!(matches!(err, WfsError::LibraryNotFound(msg) if msg.contains(wfs_sys::LIBRARY_NAME)));
    }
}
