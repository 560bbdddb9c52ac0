//! Error types for the `starloom-conditions` crate.

/// A condition line that could not be understood.
///
/// Loaders report these with a trace on the offending node and drop the
/// line; they never abort a load.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    /// An operator token that is not part of the language.
    #[error("unrecognized operator \"{op}\"")]
    UnknownOperator {
        /// The offending token.
        op: String,
    },

    /// An expression that is empty, unbalanced, or has a dangling operator.
    #[error("malformed expression: {reason}")]
    MalformedExpression {
        /// What went wrong.
        reason: String,
    },

    /// A token in name position that cannot name a condition.
    #[error("\"{name}\" is not a valid condition name")]
    InvalidName {
        /// The offending token.
        name: String,
    },
}
