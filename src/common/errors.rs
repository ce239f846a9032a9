//! Core error taxonomy.
//!
//! Plain IO failures travel as `std::io::Error` inside `anyhow` context
//! chains; the variants here are the conditions callers need to tell apart.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    /// A path resolved outside the repository root. Fatal.
    #[error("{path:?} is not beneath the repository root ({root:?})")]
    PathEscape { path: PathBuf, root: PathBuf },

    /// An image, handle, or video adjunct is missing on disk.
    #[error("{0} not found")]
    NotFound(String),

    /// A source id the configuration store does not know.
    #[error("unknown camera '{0}'")]
    UnknownCamera(String),

    /// An on-disk name or layout that violates the repository convention.
    #[error("corrupt repository entry: {0}")]
    Corruption(String),

    /// The external video encoder could not be run or exited nonzero.
    #[error("encoder failed: {0}")]
    EncoderFailure(String),
}
