//! Error types for the `starloom-data` crate.

use std::path::PathBuf;

/// Errors that make a whole data file unreadable.
///
/// Problems inside an otherwise well-formed file (an unknown keyword, a
/// token that is not a number) are not errors at this level: loaders report
/// them with [`DataNode::print_trace`](crate::DataNode::print_trace) and
/// keep going.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A quoted token never found its closing quote.
    #[error("{source_name}:{line}: unterminated quoted token")]
    UnterminatedQuote {
        /// File name or other label of the text being parsed.
        source_name: String,
        /// One-based line number.
        line: usize,
    },

    /// Tabs and spaces were mixed in the indentation.
    #[error("{source_name}:{line}: mixed tabs and spaces in indentation")]
    MixedIndentation {
        /// File name or other label of the text being parsed.
        source_name: String,
        /// One-based line number.
        line: usize,
    },

    /// A line was indented more than one level deeper than its parent.
    #[error("{source_name}:{line}: indentation jumps by more than one level")]
    IndentJump {
        /// File name or other label of the text being parsed.
        source_name: String,
        /// One-based line number.
        line: usize,
    },
}
