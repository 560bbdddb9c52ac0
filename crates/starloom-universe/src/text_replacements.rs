//! `<placeholder>` substitution and the global `substitutions` table.
//!
//! A `substitutions` root lists placeholders and their texts:
//!
//! ```text
//! substitutions
//! 	"<bar>" "Drinks"
//! 	"<bar>" "Tea"
//! 		has "tea ban lifted"
//! ```
//!
//! Each arm may carry conditions. The last arm whose conditions hold wins.

use std::collections::BTreeMap;

use starloom_conditions::{ConditionSet, ConditionsStore};
use starloom_data::{DataNode, DataWriter};

/// A mapping from `<placeholder>` to its text.
pub type Substitutions = BTreeMap<String, String>;

/// Replace every `<key>` in `source` that appears in `subs`. One pass, left
/// to right: inserted text is not scanned again. Unknown keys are left
/// as written.
pub fn replace(source: &str, subs: &Substitutions) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find('<') {
        let (before, tail) = rest.split_at(start);
        out.push_str(before);
        let candidate = tail
            .find('>')
            .and_then(|end| tail.get(..=end))
            .and_then(|key| subs.get(key).map(|value| (key.len(), value)));
        if let Some((len, value)) = candidate {
            out.push_str(value);
            rest = tail.get(len..).unwrap_or("");
        } else {
            out.push('<');
            rest = tail.get(1..).unwrap_or("");
        }
    }
    out.push_str(rest);
    out
}

/// Format a credit amount with thousands separators, e.g. `12,500 credits`.
pub fn format_credits(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len().saturating_add(digits.len() / 3));
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len().saturating_sub(i)) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    let unit = if amount.unsigned_abs() == 1 { "credit" } else { "credits" };
    format!("{sign}{grouped} {unit}")
}

/// Join names as prose: `A`, `A and B`, `A, B, and C`.
pub fn join_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} and {b}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Arm {
    conditions: ConditionSet,
    text: String,
}

/// Conditional text for `<placeholder>` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextReplacements {
    arms: BTreeMap<String, Vec<Arm>>,
}

impl TextReplacements {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the children of a `substitutions` node. A key that does not
    /// look like `<...>` is reported and skipped.
    pub fn load(&mut self, node: &DataNode) {
        for child in node.children() {
            if child.size() < 2 {
                child.print_trace("Skipping substitution key with no replacement:");
                continue;
            }
            let key = child.token(0);
            if !(key.starts_with('<') && key.ends_with('>') && key.len() > 2) {
                child.print_trace("Substitution keys must be of the form \"<key>\":");
                continue;
            }
            self.arms.entry(key.to_owned()).or_default().push(Arm {
                conditions: ConditionSet::from_node(child),
                text: child.token(1).to_owned(),
            });
        }
    }

    /// Add every arm of `other` after this table's own.
    pub fn merge(&mut self, other: &Self) {
        for (key, arms) in &other.arms {
            self.arms.entry(key.clone()).or_default().extend(arms.iter().cloned());
        }
    }

    /// Whether no key is defined.
    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }

    /// Resolve every key against `store`, adding the winners to `subs`
    /// without replacing keys `subs` already has.
    pub fn substitutions(&self, store: &ConditionsStore, subs: &mut Substitutions) {
        for (key, arms) in &self.arms {
            if subs.contains_key(key) {
                continue;
            }
            if let Some(arm) = arms.iter().rev().find(|arm| arm.conditions.test(store)) {
                subs.insert(key.clone(), arm.text.clone());
            }
        }
    }

    /// `source` with every known placeholder resolved against `store`.
    pub fn substitute(&self, source: &str, store: &ConditionsStore) -> String {
        let mut subs = Substitutions::new();
        self.substitutions(store, &mut subs);
        replace(source, &subs)
    }

    /// Write the table as a `substitutions` block.
    pub fn save(&self, writer: &mut DataWriter) {
        if self.arms.is_empty() {
            return;
        }
        writer.write(["substitutions"]);
        writer.begin_child();
        for (key, arms) in &self.arms {
            for arm in arms {
                writer.write([key.as_str(), arm.text.as_str()]);
                if !arm.conditions.is_empty() {
                    writer.begin_child();
                    arm.conditions.save(writer);
                    writer.end_child();
                }
            }
        }
        writer.end_child();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use starloom_data::DataFile;

    fn subs(pairs: &[(&str, &str)]) -> Substitutions {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    #[test]
    fn single_pass_replace() {
        let map = subs(&[("<a>", "<b>"), ("<b>", "bee")]);
        assert_eq!(replace("x <a> y <b> <c>", &map), "x <b> y bee <c>");
    }

    #[test]
    fn unmatched_brackets_survive() {
        let map = subs(&[("<a>", "A")]);
        assert_eq!(replace("1 < 2 and <a>", &map), "1 < 2 and A");
        assert_eq!(replace("<<a>>", &map), "<A>");
        assert_eq!(replace("trailing <", &map), "trailing <");
    }

    #[test]
    fn credits_are_grouped() {
        assert_eq!(format_credits(0), "0 credits");
        assert_eq!(format_credits(1), "1 credit");
        assert_eq!(format_credits(999), "999 credits");
        assert_eq!(format_credits(1000), "1,000 credits");
        assert_eq!(format_credits(-1_234_567), "-1,234,567 credits");
    }

    #[test]
    fn lists_read_as_prose() {
        let names = |v: &[&str]| v.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>();
        assert_eq!(join_list(&names(&["A"])), "A");
        assert_eq!(join_list(&names(&["A", "B"])), "A and B");
        assert_eq!(join_list(&names(&["A", "B", "C"])), "A, B, and C");
    }

    #[test]
    fn last_true_arm_wins() {
        let file = DataFile::parse(
            "substitutions\n\t\"<bar>\" Drinks\n\t\"<bar>\" Tea\n\t\thas tea\n\tbad key\n",
            "t",
        )
        .unwrap();
        let mut table = TextReplacements::new();
        table.load(&file.nodes()[0]);

        let without = ConditionsStore::new();
        assert_eq!(table.substitute("<bar>", &without), "Drinks");
        let with = ConditionsStore::from_values([("tea", 1)]);
        assert_eq!(table.substitute("<bar>", &with), "Tea");
    }
}
