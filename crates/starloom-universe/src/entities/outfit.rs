//! Outfits: installable equipment and the cargo items missions trade in.

use std::collections::BTreeMap;

use starloom_data::DataNode;

/// An outfit definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outfit {
    /// Name shown to the player, if it differs from the key.
    pub display_name: String,
    /// Plural display name.
    pub plural: String,
    /// Category, e.g. `Guns` or `Special`.
    pub category: String,
    /// Price in credits.
    pub cost: i64,
    /// Mass in tons.
    pub mass: f64,
    /// Numeric attributes such as `illegal`, `atrocity`, `cargo space`.
    pub attributes: BTreeMap<String, f64>,
    /// Description paragraphs.
    pub description: String,
}

impl Outfit {
    /// Apply one `outfit <name>` definition. Keys given here replace the
    /// old values; keys not mentioned keep theirs.
    pub fn load(&mut self, node: &DataNode) {
        let mut description_reset = false;
        for child in node.children() {
            let key = child.key();
            match key {
                "display name" if child.size() >= 2 => child.token(1).clone_into(&mut self.display_name),
                "plural" if child.size() >= 2 => child.token(1).clone_into(&mut self.plural),
                "category" if child.size() >= 2 => child.token(1).clone_into(&mut self.category),
                "cost" if child.size() >= 2 => {
                    self.cost = starloom_conditions::expression::to_i64(child.value(1));
                }
                "mass" if child.size() >= 2 => self.mass = child.value(1),
                "description" if child.size() >= 2 => {
                    if !description_reset {
                        self.description.clear();
                        description_reset = true;
                    }
                    if !self.description.is_empty() {
                        self.description.push('\n');
                    }
                    self.description.push_str(child.token(1));
                }
                _ if child.size() >= 2 && child.is_number(1) => {
                    self.attributes.insert(key.to_owned(), child.value(1));
                }
                // Weapon blocks, sprites and sounds are flight concerns.
                _ => {}
            }
        }
    }

    /// The value of a numeric attribute, or zero.
    pub fn attribute(&self, name: &str) -> f64 {
        self.attributes.get(name).copied().unwrap_or(0.0)
    }

    /// The name to show, falling back to `key`.
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        if self.display_name.is_empty() {
            key
        } else {
            &self.display_name
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;
    use starloom_data::DataFile;

    #[test]
    fn numeric_keys_become_attributes() {
        let file = DataFile::parse(
            "outfit Bunk\n\tcategory Systems\n\tcost 3000\n\tmass 5\n\tbunks 2\n\tillegal 500\n\tdescription Cosy.\n\tsprite x\n",
            "t",
        )
        .unwrap();
        let mut outfit = Outfit::default();
        outfit.load(&file.nodes()[0]);
        assert_eq!(outfit.category, "Systems");
        assert_eq!(outfit.cost, 3000);
        assert_eq!(outfit.attribute("bunks"), 2.0);
        assert_eq!(outfit.attribute("illegal"), 500.0);
        assert_eq!(outfit.attribute("sprite"), 0.0);
        assert_eq!(outfit.display_name("Bunk"), "Bunk");
    }
}
