//! Small keyed records: `gamerules`, `category` and `rating` lists.

use std::collections::BTreeMap;

use starloom_data::DataNode;

/// Named ordered lists, e.g. ship categories or combat rating titles.
pub type NamedLists = BTreeMap<String, Vec<String>>;

/// Read a `category <kind>` or `rating <kind>` root. Categories accumulate
/// across definitions; a rating list is replaced by each definition.
pub fn load_list(lists: &mut NamedLists, node: &DataNode, accumulate: bool) {
    if node.size() < 2 {
        node.print_trace("Skipping list with no name:");
        return;
    }
    let list = lists.entry(node.token(1).to_owned()).or_default();
    if !accumulate {
        list.clear();
    }
    for child in node.children() {
        let item = child.token(0);
        if !list.iter().any(|existing| existing == item) {
            list.push(item.to_owned());
        }
    }
}

/// Tunable rules of the simulation, kept as their raw tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameRules {
    values: BTreeMap<String, String>,
}

impl GameRules {
    /// Apply a `gamerules` root. Later values win.
    pub fn load(&mut self, node: &DataNode) {
        for child in node.children() {
            if child.size() >= 2 {
                self.values.insert(child.key().to_owned(), child.token(1).to_owned());
            } else {
                child.print_trace("Skipping game rule with no value:");
            }
        }
    }

    /// A numeric rule, or `default` when unset or not a number.
    pub fn number(&self, key: &str, default: f64) -> f64 {
        self.values
            .get(key)
            .and_then(|v| starloom_data::parse_number(v))
            .unwrap_or(default)
    }

    /// A yes/no rule, or `default` when unset.
    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.values.get(key).map_or(default, |v| v == "true" || v == "1")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;
    use starloom_data::DataFile;

    #[test]
    fn categories_accumulate_ratings_replace() {
        let file = DataFile::parse(
            "category ship\n\tTransport\n\tFighter\n\
             category ship\n\tFighter\n\tDrone\n\
             rating combat\n\tHarmless\n\
             rating combat\n\tDeadly\n",
            "t",
        )
        .unwrap();
        let mut categories = NamedLists::new();
        let mut ratings = NamedLists::new();
        for node in file.nodes() {
            if node.key() == "category" {
                load_list(&mut categories, node, true);
            } else {
                load_list(&mut ratings, node, false);
            }
        }
        assert_eq!(categories["ship"], ["Transport", "Fighter", "Drone"]);
        assert_eq!(ratings["combat"], ["Deadly"]);
    }

    #[test]
    fn rules_parse_numbers_and_flags() {
        let file = DataFile::parse("gamerules\n\t\"person spawn period\" 3600\n\t\"universal ramscoop\" false\n", "t").unwrap();
        let mut rules = GameRules::default();
        rules.load(&file.nodes()[0]);
        assert_eq!(rules.number("person spawn period", 0.0), 3600.0);
        assert!(!rules.flag("universal ramscoop", true));
        assert!(rules.flag("missing", true));
    }
}
