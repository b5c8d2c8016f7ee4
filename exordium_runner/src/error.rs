//! Unified error handling for the launcher.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong between the command line and the jump to
/// offset zero. The payload itself has no error surface here: once control
/// transfers, the launcher only learns whether the memory came back freed.
#[derive(Error)]
pub enum RunnerError {
    /// Failed to read the payload file.
    #[error("cannot read payload '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The payload file exists but is empty.
    #[error("payload '{path}' is empty")]
    EmptyPayload { path: PathBuf },

    /// Returned when a Win32 API call fails.
    /// Contains the function name and the error code (GetLastError).
    #[error("Win32 API '{0}' failed with error code: {1}")]
    Win32(&'static str, u32),

    /// An entry argument that is neither decimal nor 0x-prefixed hex.
    #[error("invalid entry argument '{0}': expected a decimal or 0x-prefixed integer")]
    Argument(String),
}

impl std::fmt::Debug for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}
