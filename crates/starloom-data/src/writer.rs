//! [`DataWriter`]: serialise records back into the data language.
//!
//! Output from the writer parses back to the same tree: every token is
//! quoted exactly as much as it needs to be.

use std::path::Path;

use crate::node::DataNode;
use crate::number::format_number;

/// Accumulates data-file text with tab indentation.
#[derive(Debug, Clone, Default)]
pub struct DataWriter {
    out: String,
    indent: usize,
    /// Whether a line has been started with [`write_token`](Self::write_token)
    /// and not yet ended.
    open_line: bool,
}

impl DataWriter {
    /// An empty writer at depth zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Quote a token so that the lexer reads it back unchanged.
    ///
    /// Tokens containing a double quote are wrapped in backticks. Tokens
    /// that are empty, contain whitespace, or begin with a backtick or `#`
    /// are wrapped in double quotes.
    pub fn quote(token: &str) -> String {
        if token.contains('"') {
            format!("`{token}`")
        } else if token.is_empty()
            || token.contains(char::is_whitespace)
            || token.starts_with('`')
            || token.starts_with('#')
        {
            format!("\"{token}\"")
        } else {
            token.to_owned()
        }
    }

    /// Append one token to the current line, starting it if needed.
    pub fn write_token(&mut self, token: &str) {
        if self.open_line {
            self.out.push(' ');
        } else {
            self.push_indent();
            self.open_line = true;
        }
        self.out.push_str(&Self::quote(token));
    }

    /// Append a number token to the current line.
    pub fn write_number(&mut self, value: f64) {
        self.write_token(&format_number(value));
    }

    /// Append `tokens` to the current line and end it.
    pub fn write<I, T>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        for token in tokens {
            self.write_token(token.as_ref());
        }
        self.end_line();
    }

    /// Write `key value` where `value` is a number.
    pub fn write_key_value(&mut self, key: &str, value: f64) {
        self.write_token(key);
        self.write_number(value);
        self.end_line();
    }

    /// Finish the current line, if one is open.
    pub fn end_line(&mut self) {
        if self.open_line {
            self.out.push('\n');
            self.open_line = false;
        }
    }

    /// Indent following lines one level deeper.
    pub fn begin_child(&mut self) {
        self.end_line();
        self.indent = self.indent.saturating_add(1);
    }

    /// Return to the enclosing level.
    pub fn end_child(&mut self) {
        self.end_line();
        self.indent = self.indent.saturating_sub(1);
    }

    /// Write a `#` comment. A comment after tokens on an open line goes at
    /// the end of that line.
    pub fn write_comment(&mut self, text: &str) {
        if self.open_line {
            self.out.push_str(" # ");
        } else {
            self.push_indent();
            self.out.push_str("# ");
        }
        self.out.push_str(text);
        self.out.push('\n');
        self.open_line = false;
    }

    /// Write a node and all of its children.
    pub fn write_node(&mut self, node: &DataNode) {
        self.write(node.tokens());
        if node.has_children() {
            self.begin_child();
            for child in node.children() {
                self.write_node(child);
            }
            self.end_child();
        }
    }

    /// The text written so far.
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Finish and take the text.
    pub fn into_string(mut self) -> String {
        self.end_line();
        self.out
    }

    /// Finish and write the text to `path`.
    pub fn save(mut self, path: &Path) -> std::io::Result<()> {
        self.end_line();
        std::fs::write(path, self.out)
    }

    fn push_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push('\t');
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::DataFile;

    #[test]
    fn quoting_rules() {
        assert_eq!(DataWriter::quote("a"), "a");
        assert_eq!(DataWriter::quote(""), "\"\"");
        assert_eq!(DataWriter::quote("two words"), "\"two words\"");
        assert_eq!(DataWriter::quote("\""), "`\"`");
        assert_eq!(DataWriter::quote("`"), "\"`\"");
        assert_eq!(DataWriter::quote("#tag"), "\"#tag\"");
        assert_eq!(DataWriter::quote("a#b"), "a#b");
    }

    #[test]
    fn writes_indented_children() {
        let mut writer = DataWriter::new();
        writer.write(["ship", "Fast Ship"]);
        writer.begin_child();
        writer.write_key_value("mass", 12.5);
        writer.write_comment("done");
        writer.end_child();
        writer.write_token("hello there");
        writer.write_comment("trailing");
        writer.write(["next"]);
        assert_eq!(
            writer.into_string(),
            "ship \"Fast Ship\"\n\tmass 12.5\n\t# done\n\"hello there\" # trailing\nnext\n"
        );
    }

    #[test]
    fn round_trips_awkward_tokens() {
        let text = "a \"\" `say \"hi\"` \"`tick\" \"#hash\" \"two words\"\n\tb 1\n\t\tc\nd\n";
        let file = DataFile::parse(text, "t").unwrap();
        let mut writer = DataWriter::new();
        for node in file.nodes() {
            writer.write_node(node);
        }
        let reparsed = DataFile::parse(&writer.into_string(), "t").unwrap();
        assert_eq!(file, reparsed);
    }
}
