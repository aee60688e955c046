//! Core error types. Per the error-handling design, only a usage error is
//! ever fatal; everything below is logged at the call site and swallowed.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The extent-query utility produced output that does not match the
    /// expected grammar (unexpected header, missing fields, numeric parse
    /// error, or a finalize line naming a file we never asked about).
    #[error("invalid extent-query output for {dir}: {reason}")]
    InvalidExtentOutput { dir: PathBuf, reason: String },

    /// The extent-query utility could not be launched at all (missing
    /// binary, permission denied, etc).
    #[error("failed to launch extent-query utility in {dir}: {source}")]
    LaunchFailure {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
