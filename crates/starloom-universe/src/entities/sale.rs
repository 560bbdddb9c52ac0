//! `shipyard` and `outfitter` stock lists.

use std::collections::BTreeSet;

use starloom_core::{Handle, Set};
use starloom_data::DataNode;

/// A named list of things for sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale<T> {
    /// Items on offer.
    pub items: BTreeSet<Handle<T>>,
}

impl<T> Default for Sale<T> {
    fn default() -> Self {
        Self {
            items: BTreeSet::new(),
        }
    }
}

impl<T: Default> Sale<T> {
    /// Apply one definition. `clear` empties the list, `remove <name>`
    /// drops one item, and any other line adds the item it names.
    pub fn load(&mut self, node: &DataNode, items: &mut Set<T>) {
        for child in node.children() {
            match child.tokens() {
                [only] if only == "clear" => self.items.clear(),
                [keyword, name] if keyword == "remove" => {
                    if let Some(handle) = items.find(name) {
                        self.items.remove(&handle);
                    }
                }
                [keyword, name] if keyword == "add" => {
                    self.items.insert(items.get(name));
                }
                [name] => {
                    self.items.insert(items.get(name));
                }
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }
}

impl<T> Sale<T> {
    /// Whether `item` is on offer.
    pub fn has(&self, item: Handle<T>) -> bool {
        self.items.contains(&item)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::entities::Outfit;
    use starloom_data::DataFile;

    #[test]
    fn later_definitions_edit_the_list() {
        let file = DataFile::parse(
            "outfitter Basics\n\tLaser\n\tShield\n\
             outfitter Basics\n\tremove Laser\n\tBunk\n",
            "t",
        )
        .unwrap();
        let mut outfits: Set<Outfit> = Set::new();
        let mut sale: Sale<Outfit> = Sale::default();
        for node in file.nodes() {
            sale.load(node, &mut outfits);
        }
        let names: Vec<&str> = sale.items.iter().map(|h| outfits.name_of(*h)).collect();
        assert_eq!(names, ["Shield", "Bunk"]);
    }
}
