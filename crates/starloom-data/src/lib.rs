//! The indented, quoted, whitespace-separated data language that describes
//! every piece of game content and every save file.
//!
//! A data file is a forest of records. Each line holds one record: a list of
//! tokens. Indentation (one tab per level) makes a line a child of the
//! nearest shallower line above it. Tokens containing whitespace are wrapped
//! in double quotes, or in backticks if they contain a double quote. `#`
//! starts a comment.
//!
//! # Modules
//!
//! - [`node`] -- [`DataNode`]: tokens, children, source position, and
//!   authoring diagnostics ([`DataNode::print_trace`]).
//! - [`file`] -- [`DataFile`]: the lexer and indentation parser.
//! - [`writer`] -- [`DataWriter`]: serialisation back to text.
//! - [`number`] -- Number recognition and formatting shared by the parser
//!   and writer.
//! - [`error`] -- [`ParseError`].

pub mod error;
pub mod file;
pub mod node;
pub mod number;
pub mod writer;

pub use error::ParseError;
pub use file::DataFile;
pub use node::DataNode;
pub use number::{format_number, is_number, parse_number};
pub use writer::DataWriter;
