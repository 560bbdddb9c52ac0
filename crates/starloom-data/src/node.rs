//! [`DataNode`]: one record of a data file and its children.
//!
//! Nodes read from a file remember their line number, their file, and a
//! rendered copy of every ancestor line, so that a loader deep inside a
//! definition can print a diagnostic showing the full path back to the
//! top-level record. Nodes built in code have none of these.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::number;
use crate::writer::DataWriter;

/// An ancestor line, already rendered for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TraceLine {
    line: usize,
    text: String,
}

/// One record: a non-empty list of tokens plus any indented children.
#[derive(Debug, Clone, Default)]
pub struct DataNode {
    tokens: Vec<String>,
    children: Vec<Self>,
    line: usize,
    source: Option<Arc<str>>,
    lineage: Arc<Vec<TraceLine>>,
}

impl DataNode {
    /// Build a node in code from its tokens.
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Build a node as the parser does, with its position in a file.
    pub(crate) fn parsed(
        tokens: Vec<String>,
        line: usize,
        source: Option<Arc<str>>,
        lineage: Arc<Vec<TraceLine>>,
    ) -> Self {
        Self {
            tokens,
            children: Vec::new(),
            line,
            source,
            lineage,
        }
    }

    /// The lineage to hand to this node's children: its own lineage plus
    /// its own line.
    pub(crate) fn child_lineage(&self) -> Arc<Vec<TraceLine>> {
        if self.tokens.is_empty() {
            return Arc::clone(&self.lineage);
        }
        let mut lineage = Vec::with_capacity(self.lineage.len().saturating_add(1));
        lineage.extend(self.lineage.iter().cloned());
        lineage.push(TraceLine {
            line: self.line,
            text: self.render_tokens(),
        });
        Arc::new(lineage)
    }

    // ------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------

    /// Number of tokens on this line.
    pub fn size(&self) -> usize {
        self.tokens.len()
    }

    /// All tokens on this line.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Token `index`, or the empty string with a trace if there is none.
    pub fn token(&self, index: usize) -> &str {
        if let Some(token) = self.tokens.get(index) {
            token
        } else {
            self.print_trace(&format!("Error: requested token index ({index}) is out of bounds:"));
            ""
        }
    }

    /// The first token, or the empty string.
    pub fn key(&self) -> &str {
        self.tokens.first().map_or("", String::as_str)
    }

    /// Whether token `index` exists and is a number.
    pub fn is_number(&self, index: usize) -> bool {
        self.tokens.get(index).is_some_and(|t| number::is_number(t))
    }

    /// Token `index` as a number.
    ///
    /// A missing or non-numeric token is reported with a trace and reads
    /// as zero.
    pub fn value(&self, index: usize) -> f64 {
        match self.tokens.get(index) {
            None => {
                self.print_trace(&format!("Error: requested token index ({index}) is out of bounds:"));
                0.
            }
            Some(token) => number::parse_number(token).unwrap_or_else(|| {
                self.print_trace(&format!("Cannot convert value \"{token}\" to a number:"));
                0.
            }),
        }
    }

    /// Whether token `index` is one of `true`, `false`, `1`, `0`.
    pub fn is_bool(&self, index: usize) -> bool {
        matches!(
            self.tokens.get(index).map(String::as_str),
            Some("true" | "false" | "1" | "0")
        )
    }

    /// Token `index` as a boolean. Anything else traces and reads as false.
    pub fn bool_value(&self, index: usize) -> bool {
        match self.tokens.get(index).map(String::as_str) {
            Some("true" | "1") => true,
            Some("false" | "0") => false,
            Some(token) => {
                self.print_trace(&format!("Cannot convert value \"{token}\" to a boolean:"));
                false
            }
            None => {
                self.print_trace(&format!("Error: requested token index ({index}) is out of bounds:"));
                false
            }
        }
    }

    /// Whether token `index` can name a condition.
    pub fn is_condition_name(&self, index: usize) -> bool {
        self.tokens.get(index).is_some_and(|t| is_condition_name(t))
    }

    /// Append a token.
    pub fn push_token(&mut self, token: impl Into<String>) {
        self.tokens.push(token.into());
    }

    // ------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------

    /// Indented child records, in file order.
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Whether this node has any children.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Append a child record.
    pub fn add_child(&mut self, child: Self) {
        self.children.push(child);
    }

    /// Mutable access to the children, for building trees in code.
    pub fn children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }

    // ------------------------------------------------------------------
    // Position and diagnostics
    // ------------------------------------------------------------------

    /// One-based line number, or zero for nodes built in code.
    pub const fn line(&self) -> usize {
        self.line
    }

    /// The file this node came from, if any.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Log `message` followed by this node's location: the file, every
    /// ancestor line, and this line, each prefixed with its line number and
    /// indented two spaces per level.
    ///
    /// Returns the logged text.
    pub fn print_trace(&self, message: &str) -> String {
        let mut text = String::new();
        if !message.is_empty() {
            text.push_str(message);
            text.push('\n');
        }
        if let Some(source) = &self.source {
            let _ = writeln!(text, "file \"{source}\"");
        }
        let mut depth = 0usize;
        for ancestor in self.lineage.iter() {
            let _ = writeln!(
                text,
                "L{}: {}{}",
                ancestor.line,
                " ".repeat(depth.saturating_mul(2)),
                ancestor.text
            );
            depth = depth.saturating_add(1);
        }
        if !self.tokens.is_empty() {
            let _ = writeln!(
                text,
                "L{}: {}{}",
                self.line,
                " ".repeat(depth.saturating_mul(2)),
                self.render_tokens()
            );
        }
        while text.ends_with('\n') {
            text.pop();
        }
        tracing::warn!(
            source = self.source.as_deref().unwrap_or(""),
            line = self.line,
            "{text}"
        );
        text
    }

    /// This line's tokens joined and quoted as they would be written.
    pub fn render_tokens(&self) -> String {
        self.tokens
            .iter()
            .map(|t| DataWriter::quote(t))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Two nodes are equal when their tokens and children are, wherever they
/// came from.
impl PartialEq for DataNode {
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens && self.children == other.children
    }
}

impl Eq for DataNode {}

/// Whether `token` can name a condition: not empty, not a number, and not
/// made only of operator symbols.
pub fn is_condition_name(token: &str) -> bool {
    !token.is_empty()
        && !number::is_number(token)
        && !token.chars().all(|c| "=<>!+-*/%&|?()".contains(c))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::DataFile;

    #[test]
    fn value_of_non_number_is_zero() {
        let node = DataNode::new(["speed", "fast"]);
        assert_eq!(node.value(1), 0.);
        assert_eq!(node.value(7), 0.);
        assert_eq!(DataNode::new(["speed", "2.5"]).value(1), 2.5);
    }

    #[test]
    fn bools() {
        let node = DataNode::new(["x", "true", "0", "maybe"]);
        assert!(node.is_bool(1));
        assert!(node.bool_value(1));
        assert!(!node.bool_value(2));
        assert!(!node.is_bool(3));
        assert!(!node.bool_value(3));
    }

    #[test]
    fn condition_names() {
        assert!(is_condition_name("reputation: Republic"));
        assert!(is_condition_name("visited planet: Earth"));
        assert!(!is_condition_name("12"));
        assert!(!is_condition_name(""));
        assert!(!is_condition_name("+="));
    }

    #[test]
    fn trace_shows_ancestry() {
        let file = DataFile::parse(
            "ship \"Fast Ship\"\n\tattributes\n\t\tspeed quick\n",
            "ships.txt",
        )
        .unwrap();
        let speed = &file.root().children()[0].children()[0].children()[0];
        let trace = speed.print_trace("Bad speed:");
        assert_eq!(
            trace,
            "Bad speed:\nfile \"ships.txt\"\nL1: ship \"Fast Ship\"\nL2:   attributes\nL3:     speed quick"
        );
    }

    #[test]
    fn equality_ignores_position() {
        let parsed = DataFile::parse("a b\n\tc\n", "x").unwrap();
        let mut built = DataNode::new(["a", "b"]);
        built.add_child(DataNode::new(["c"]));
        assert_eq!(parsed.root().children()[0], built);
    }
}
