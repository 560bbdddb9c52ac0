//! [`DataFile`]: read text into a tree of [`DataNode`]s.
//!
//! # Invariants
//!
//! - A line's depth is its count of leading tabs. A file indented with
//!   spaces instead uses the width of its first indented line as one level.
//! - A file may not mix tabs and spaces in indentation.
//! - A child is exactly one level deeper than its parent.
//! - Blank and comment-only lines never affect structure.

use std::path::Path;
use std::sync::Arc;

use crate::error::ParseError;
use crate::node::DataNode;

/// A parsed data file: a virtual root whose children are the top-level
/// records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataFile {
    root: DataNode,
}

/// The indentation character seen so far in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndentStyle {
    Tabs,
    Spaces { width: usize },
}

impl DataFile {
    /// Read and parse the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parse `text`. `source_name` labels nodes and errors.
    pub fn parse(text: &str, source_name: &str) -> Result<Self, ParseError> {
        let source: Arc<str> = Arc::from(source_name);
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut root = DataNode::default();
        // Open nodes, outermost first, with their depth.
        let mut stack: Vec<(usize, DataNode)> = Vec::new();
        let mut style: Option<IndentStyle> = None;

        for (index, raw) in text.split('\n').enumerate() {
            let line_number = index.saturating_add(1);
            let line = raw.strip_suffix('\r').unwrap_or(raw);

            let body = line.trim_start_matches([' ', '\t']);
            let indent = line
                .get(..line.len().saturating_sub(body.len()))
                .unwrap_or("");
            let tokens = tokenize(body).ok_or_else(|| ParseError::UnterminatedQuote {
                source_name: source_name.to_owned(),
                line: line_number,
            })?;
            if tokens.is_empty() {
                continue;
            }

            let depth = indent_depth(indent, &mut style).ok_or_else(|| {
                ParseError::MixedIndentation {
                    source_name: source_name.to_owned(),
                    line: line_number,
                }
            })?;

            close_deeper(&mut stack, &mut root, depth);
            let parent_depth = stack.last().map_or(0, |(d, _)| d.saturating_add(1));
            if depth > parent_depth {
                return Err(ParseError::IndentJump {
                    source_name: source_name.to_owned(),
                    line: line_number,
                });
            }

            let lineage = stack
                .last()
                .map_or_else(|| root.child_lineage(), |(_, parent)| parent.child_lineage());
            let node = DataNode::parsed(tokens, line_number, Some(Arc::clone(&source)), lineage);
            stack.push((depth, node));
        }
        close_deeper(&mut stack, &mut root, 0);

        tracing::trace!(
            source = source_name,
            records = root.children().len(),
            "parsed data file"
        );
        Ok(Self { root })
    }

    /// Wrap an already-built tree.
    pub const fn from_root(root: DataNode) -> Self {
        Self { root }
    }

    /// The virtual root. Its children are the top-level records.
    pub const fn root(&self) -> &DataNode {
        &self.root
    }

    /// Take the tree out of the file.
    pub fn into_root(self) -> DataNode {
        self.root
    }

    /// Top-level records in file order.
    pub fn nodes(&self) -> &[DataNode] {
        self.root.children()
    }
}

/// Pop every open node at `depth` or deeper, attaching each to its parent.
fn close_deeper(stack: &mut Vec<(usize, DataNode)>, root: &mut DataNode, depth: usize) {
    while stack.last().is_some_and(|(d, _)| *d >= depth) {
        let Some((_, node)) = stack.pop() else { break };
        match stack.last_mut() {
            Some((_, parent)) => parent.add_child(node),
            None => root.add_child(node),
        }
    }
}

/// Depth of an indentation prefix, or `None` if it mixes tabs and spaces
/// (within the line or against the file's established style).
fn indent_depth(indent: &str, style: &mut Option<IndentStyle>) -> Option<usize> {
    if indent.is_empty() {
        return Some(0);
    }
    let tabs = indent.chars().filter(|c| *c == '\t').count();
    let spaces = indent.len().saturating_sub(tabs);
    if tabs > 0 && spaces > 0 {
        return None;
    }
    match (*style, tabs > 0) {
        (None, true) => {
            *style = Some(IndentStyle::Tabs);
            Some(tabs)
        }
        (None, false) => {
            *style = Some(IndentStyle::Spaces { width: spaces });
            Some(1)
        }
        (Some(IndentStyle::Tabs), true) => Some(tabs),
        (Some(IndentStyle::Spaces { width }), false) => Some(spaces.div_ceil(width.max(1))),
        _ => None,
    }
}

/// Split one line (indentation already removed) into tokens.
///
/// Returns `None` on an unterminated quote.
fn tokenize(body: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut rest = body;
    loop {
        rest = rest.trim_start_matches(char::is_whitespace);
        let Some(first) = rest.chars().next() else {
            break;
        };
        if first == '#' {
            break;
        }
        if first == '"' || first == '`' {
            let inner = rest.get(first.len_utf8()..)?;
            let end = inner.find(first)?;
            tokens.push(inner.get(..end)?.to_owned());
            rest = inner.get(end.saturating_add(first.len_utf8())..)?;
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            tokens.push(rest.get(..end)?.to_owned());
            rest = rest.get(end..)?;
        }
    }
    Some(tokens)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_records() {
        let file = DataFile::parse(
            "ship Kestrel\n\tattributes\n\t\tmass 120\n\t\"engine slot\" 2\nsystem Sol\n",
            "t",
        )
        .unwrap();
        let nodes = file.nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].tokens(), ["ship", "Kestrel"]);
        assert_eq!(nodes[0].children().len(), 2);
        assert_eq!(nodes[0].children()[0].children()[0].value(1), 120.0);
        assert_eq!(nodes[0].children()[1].token(0), "engine slot");
        assert_eq!(nodes[1].line(), 5);
    }

    #[test]
    fn quotes_and_comments() {
        let file = DataFile::parse("say `he said \"hi\"` # a comment\n# whole line\nx#y\n", "t")
            .unwrap();
        assert_eq!(file.nodes()[0].tokens(), ["say", "he said \"hi\""]);
        assert_eq!(file.nodes()[1].tokens(), ["x#y"]);
        assert_eq!(file.nodes().len(), 2);
    }

    #[test]
    fn empty_quoted_token_is_kept() {
        let file = DataFile::parse("name \"\"\n", "t").unwrap();
        assert_eq!(file.nodes()[0].tokens(), ["name", ""]);
    }

    #[test]
    fn comment_lines_do_not_affect_structure() {
        let file = DataFile::parse("a\n# note\n\t\t# deep note\n\tb\n\n\tc\n", "t").unwrap();
        assert_eq!(file.nodes()[0].children().len(), 2);
    }

    #[test]
    fn crlf_and_bom() {
        let file = DataFile::parse("\u{feff}a 1\r\n\tb 2\r\n", "t").unwrap();
        assert_eq!(file.nodes()[0].tokens(), ["a", "1"]);
        assert_eq!(file.nodes()[0].children()[0].tokens(), ["b", "2"]);
    }

    #[test]
    fn space_indentation() {
        let file = DataFile::parse("a\n    b\n        c\n    d\n", "t").unwrap();
        let a = &file.nodes()[0];
        assert_eq!(a.children().len(), 2);
        assert_eq!(a.children()[0].children()[0].key(), "c");
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        let err = DataFile::parse("a \"open\n", "t").unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedQuote { line: 1, .. }));
    }

    #[test]
    fn mixed_indentation_is_an_error() {
        let err = DataFile::parse("a\n\tb\n    c\n", "t").unwrap_err();
        assert!(matches!(err, ParseError::MixedIndentation { line: 3, .. }));
        let err = DataFile::parse("a\n\t b\n", "t").unwrap_err();
        assert!(matches!(err, ParseError::MixedIndentation { line: 2, .. }));
    }

    #[test]
    fn indent_jump_is_an_error() {
        let err = DataFile::parse("a\n\t\tb\n", "t").unwrap_err();
        assert!(matches!(err, ParseError::IndentJump { line: 2, .. }));
        let err = DataFile::parse("\tb\n", "t").unwrap_err();
        assert!(matches!(err, ParseError::IndentJump { line: 1, .. }));
    }
}
