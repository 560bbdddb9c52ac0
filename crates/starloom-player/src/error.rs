//! Error types for the starloom-player crate.

use std::path::PathBuf;

use starloom_data::ParseError;

/// Errors that can occur while saving or loading a pilot.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The save file could not be written or read.
    #[error("failed to access save file {path}: {source}")]
    Io {
        /// The save file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The save file is not a well-formed data file.
    #[error("save file {path} is malformed: {source}")]
    Parse {
        /// The save file.
        path: PathBuf,
        /// The parse failure.
        source: ParseError,
    },

    /// The save file lacks a record every pilot must have.
    #[error("save file {path} has no {what}")]
    Missing {
        /// The save file.
        path: PathBuf,
        /// The missing record, e.g. `pilot` or `date`.
        what: &'static str,
    },
}

/// Why a data-driven test did not pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TestError {
    /// No test has this name.
    #[error("no test named \"{0}\"")]
    UnknownTest(String),

    /// An `inject` step names test data that does not exist or is not a
    /// saved game.
    #[error("test data \"{0}\" is missing or is not a saved game")]
    BadTestData(String),

    /// An `assert` step failed.
    #[error("assertion failed at step {step}: {condition}")]
    AssertionFailed {
        /// Index of the failing step.
        step: usize,
        /// The failing condition set, as written.
        condition: String,
    },

    /// A `branch` names a label that does not exist.
    #[error("branch to unknown label \"{0}\"")]
    UnknownLabel(String),

    /// `call` steps nested too deeply, probably a test calling itself.
    #[error("test calls nest deeper than {0} levels")]
    CallDepth(usize),

    /// The test ran more steps than it can without looping forever.
    #[error("test exceeded {0} steps")]
    StepLimit(usize),

    /// The step needs a user interface.
    #[error("step {0} needs interactive input, which is not supported")]
    Unsupported(usize),
}
