//! `add` / `remove` / `override` prefixes for partial edits of an entity that
//! is being defined a second time.
//!
//! For a line `[add|remove|override] <key> [values...]`:
//!
//! - `add` appends to the key's current values,
//! - `remove <key>` clears the key, `remove <key> <value>` removes one value,
//! - `override` clears the key and then sets it,
//! - an unprefixed line clears list-valued keys the first time the key is
//!   seen in this definition, then appends.

use std::collections::BTreeSet;

use starloom_data::DataNode;

/// What a line asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EditMode {
    /// Plain or `override`: set, clearing first as needed.
    Set,
    /// `add`: append.
    Add,
    /// `remove`: clear the key, or drop the listed values.
    Remove,
}

/// One line split into its mode, key, and value tokens.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Edit<'a> {
    pub mode: EditMode,
    pub key: &'a str,
    pub values: &'a [String],
    /// The key's current values must be cleared before this line applies.
    pub clear: bool,
}

impl Edit<'_> {
    /// The first value, or the empty string.
    pub fn value(&self) -> &str {
        self.values.first().map_or("", String::as_str)
    }

    /// Whether the line names at least one value.
    pub fn has_value(&self) -> bool {
        !self.values.is_empty()
    }
}

/// Tracks which list keys a definition has already overwritten.
#[derive(Debug, Default)]
pub(crate) struct EditTracker {
    overwritten: BTreeSet<String>,
    list_keys: &'static [&'static str],
}

impl EditTracker {
    /// A tracker for an entity whose list-valued keys are `list_keys`.
    pub fn new(list_keys: &'static [&'static str]) -> Self {
        Self {
            overwritten: BTreeSet::new(),
            list_keys,
        }
    }

    /// Split `child` into an [`Edit`]. Returns `None` (after a trace) for a
    /// prefix with no key.
    pub fn split<'a>(&mut self, child: &'a DataNode) -> Option<Edit<'a>> {
        let tokens = child.tokens();
        let (mode, forced_clear, rest) = match tokens {
            [first, rest @ ..] if first == "add" => (EditMode::Add, false, rest),
            [first, rest @ ..] if first == "remove" => (EditMode::Remove, false, rest),
            [first, rest @ ..] if first == "override" => (EditMode::Set, true, rest),
            all => (EditMode::Set, false, all),
        };
        let Some((key, values)) = rest.split_first() else {
            child.print_trace(&format!("Skipping {} with no key given:", child.token(0)));
            return None;
        };
        let clear = match mode {
            EditMode::Add => false,
            EditMode::Remove => values.is_empty(),
            EditMode::Set => {
                let list = self.list_keys.contains(&key.as_str());
                let first = list && self.overwritten.insert(key.clone());
                forced_clear || first
            }
        };
        Some(Edit {
            mode,
            key,
            values,
            clear,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn first_plain_list_line_clears() {
        let mut tracker = EditTracker::new(&["link"]);
        let first = DataNode::new(["link", "Alpha"]);
        let second = DataNode::new(["link", "Beta"]);
        assert!(tracker.split(&first).unwrap().clear);
        assert!(!tracker.split(&second).unwrap().clear);
    }

    #[test]
    fn prefixes() {
        let mut tracker = EditTracker::new(&["link"]);
        let add = DataNode::new(["add", "link", "Alpha"]);
        let edit = tracker.split(&add).unwrap();
        assert_eq!((edit.mode, edit.key, edit.clear), (EditMode::Add, "link", false));

        let remove_all = DataNode::new(["remove", "link"]);
        let edit = tracker.split(&remove_all).unwrap();
        assert_eq!((edit.mode, edit.clear), (EditMode::Remove, true));

        let remove_one = DataNode::new(["remove", "link", "Alpha"]);
        assert!(!tracker.split(&remove_one).unwrap().clear);

        let over = DataNode::new(["override", "government", "Pirate"]);
        let edit = tracker.split(&over).unwrap();
        assert_eq!((edit.mode, edit.key, edit.value(), edit.clear), (EditMode::Set, "government", "Pirate", true));
    }

    #[test]
    fn bare_prefix_is_skipped() {
        let mut tracker = EditTracker::new(&[]);
        assert!(tracker.split(&DataNode::new(["add"])).is_none());
    }
}
