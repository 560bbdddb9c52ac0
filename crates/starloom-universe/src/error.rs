//! Error types for the starloom-universe crate.
//!
//! Problems inside the content itself (bad keys, unknown names, cyclic
//! phrases) are reported with a node trace and never become an `Err`. The
//! variants here cover the cases where a whole file could not be read.

use std::path::PathBuf;

use starloom_data::ParseError;

/// Errors that can occur while loading game content.
#[derive(Debug, thiserror::Error)]
pub enum UniverseError {
    /// A source directory could not be listed.
    #[error("failed to list content in {path}: {source}")]
    Io {
        /// The directory being listed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A data file could not be read or tokenized.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A background parse task panicked or was cancelled.
    #[error("data file parse task failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
