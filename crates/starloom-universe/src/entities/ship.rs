//! Ship models and their variants.
//!
//! `ship <model>` defines a model. `ship <model> <variant>` defines a
//! variant named `<variant>` that starts from the model's definition and
//! replaces what it lists. Variants are completed by
//! [`ShipModel::inherit`] once every file is loaded.

use std::collections::BTreeMap;

use starloom_core::{Handle, Set};
use starloom_data::DataNode;

use super::Outfit;

/// A ship model or variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipModel {
    /// The model this variant derives from.
    pub base: Option<Handle<Self>>,
    /// Name shown to the player.
    pub display_name: String,
    /// Category, e.g. `Light Freighter`.
    pub category: String,
    /// Hull price in credits.
    pub cost: i64,
    /// Hull attributes such as `cargo space`, `bunks`, `mass`.
    pub attributes: BTreeMap<String, f64>,
    /// Installed outfits and counts.
    pub outfits: Vec<(Handle<Outfit>, i64)>,
    /// Description paragraphs.
    pub description: String,
    outfits_given: bool,
}

impl ShipModel {
    /// Apply one `ship` definition.
    pub fn load(&mut self, node: &DataNode, outfits: &mut Set<Outfit>) {
        for child in node.children() {
            match child.key() {
                "display name" if child.size() >= 2 => child.token(1).clone_into(&mut self.display_name),
                "attributes" => self.load_attributes(child),
                "outfits" => {
                    self.outfits.clear();
                    self.outfits_given = true;
                    for grand in child.children() {
                        let count = if grand.size() >= 2 {
                            starloom_conditions::expression::to_i64(grand.value(1))
                        } else {
                            1
                        };
                        self.outfits.push((outfits.get(grand.token(0)), count));
                    }
                }
                "description" if child.size() >= 2 => {
                    if !self.description.is_empty() {
                        self.description.push('\n');
                    }
                    self.description.push_str(child.token(1));
                }
                // Sprites, hardpoints, engines and the like are flight data.
                _ => {}
            }
        }
    }

    fn load_attributes(&mut self, node: &DataNode) {
        for child in node.children() {
            match child.key() {
                "category" if child.size() >= 2 => child.token(1).clone_into(&mut self.category),
                "cost" if child.size() >= 2 => {
                    self.cost = starloom_conditions::expression::to_i64(child.value(1));
                }
                key if child.size() >= 2 && child.is_number(1) => {
                    self.attributes.insert(key.to_owned(), child.value(1));
                }
                _ => {}
            }
        }
    }

    /// Fill in what a variant left unspecified from its base model.
    pub fn inherit(&mut self, base: &Self) {
        if self.category.is_empty() {
            self.category.clone_from(&base.category);
        }
        if self.cost == 0 {
            self.cost = base.cost;
        }
        if self.display_name.is_empty() {
            self.display_name.clone_from(&base.display_name);
        }
        for (key, value) in &base.attributes {
            self.attributes.entry(key.clone()).or_insert(*value);
        }
        if !self.outfits_given {
            self.outfits.clone_from(&base.outfits);
        }
        if self.description.is_empty() {
            self.description.clone_from(&base.description);
        }
    }

    /// A hull attribute plus the contribution of every installed outfit.
    pub fn attribute(&self, name: &str, outfits: &Set<Outfit>) -> f64 {
        let hull = self.attributes.get(name).copied().unwrap_or(0.0);
        self.outfits.iter().fold(hull, |sum, (outfit, count)| {
            let per = outfits.value(*outfit).map_or(0.0, |o| o.attribute(name));
            #[allow(clippy::cast_precision_loss)]
            let count = *count as f64;
            per.mul_add(count, sum)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;
    use starloom_data::DataFile;

    #[test]
    fn outfits_add_to_hull_attributes() {
        let file = DataFile::parse(
            "outfit Pod\n\t\"cargo space\" 10\n\
             ship Hauler\n\tattributes\n\t\tcategory \"Light Freighter\"\n\t\t\"cargo space\" 50\n\toutfits\n\t\tPod 2\n",
            "t",
        )
        .unwrap();
        let mut outfits: Set<Outfit> = Set::new();
        let pod = outfits.get("Pod");
        outfits.get_mut("Pod").unwrap().load(&file.nodes()[0]);
        outfits.mark_defined(pod);

        let mut ship = ShipModel::default();
        ship.load(&file.nodes()[1], &mut outfits);
        assert_eq!(ship.category, "Light Freighter");
        assert_eq!(ship.attribute("cargo space", &outfits), 70.0);
    }

    #[test]
    fn variants_inherit_unset_fields() {
        let mut base = ShipModel {
            category: "Transport".to_owned(),
            cost: 100,
            ..ShipModel::default()
        };
        base.attributes.insert("bunks".to_owned(), 4.0);
        let mut variant = ShipModel::default();
        variant.attributes.insert("bunks".to_owned(), 6.0);
        variant.inherit(&base);
        assert_eq!(variant.category, "Transport");
        assert_eq!(variant.cost, 100);
        assert_eq!(variant.attributes["bunks"], 6.0);
    }
}
