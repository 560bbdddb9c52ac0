//! Fleets: weighted groups of ship models flown by one government.

use rand::Rng;
use starloom_core::{Handle, WeightedList};
use starloom_data::DataNode;

use super::{Government, ShipModel};
use crate::edit::{EditMode, EditTracker};
use crate::phrase::Phrase;
use crate::universe::UniverseObjects;

/// A fleet definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fleet {
    /// Government the ships fly for.
    pub government: Option<Handle<Government>>,
    /// Phrase that names the ships.
    pub names: Option<Handle<Phrase>>,
    /// Personality flags.
    pub personality: Vec<String>,
    /// Possible compositions, one list of models each.
    pub variants: WeightedList<Vec<Handle<ShipModel>>>,
}

impl Fleet {
    /// Apply one `fleet <name>` definition.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        let mut tracker = EditTracker::new(&["variant"]);
        for child in node.children() {
            let Some(edit) = tracker.split(child) else {
                continue;
            };
            match edit.key {
                "government" if edit.has_value() => {
                    self.government = Some(universe.governments.get(edit.value()));
                }
                "names" if edit.has_value() => {
                    self.names = Some(universe.phrases.get(edit.value()));
                }
                "personality" => {
                    self.personality = edit.values.to_vec();
                    for grand in child.children() {
                        self.personality.extend(grand.tokens().iter().cloned());
                    }
                }
                "variant" => {
                    let ships = load_variant(child, universe);
                    if edit.mode == EditMode::Remove {
                        // A bare `remove variant` drops them all.
                        if ships.is_empty() {
                            self.variants.clear();
                        } else {
                            self.variants.erase_if(|v| *v == ships);
                        }
                    } else {
                        if edit.clear {
                            self.variants.clear();
                        }
                        let weight = if edit.has_value() {
                            starloom_conditions::expression::to_i64(child.value(child.size().saturating_sub(1)))
                        } else {
                            1
                        };
                        self.variants.push(ships, weight);
                    }
                }
                // Cargo, commodities and formation are flight concerns.
                "cargo" | "commodities" | "outfitters" | "fighters" | "formation" => {}
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }

    /// Pick one composition.
    pub fn pick_variant<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&[Handle<ShipModel>]> {
        self.variants.pick(rng).map(Vec::as_slice)
    }
}

fn load_variant(node: &DataNode, universe: &mut UniverseObjects) -> Vec<Handle<ShipModel>> {
    let mut ships = Vec::new();
    for child in node.children() {
        let model = universe.ships.get(child.token(0));
        let count = if child.size() >= 2 {
            usize::try_from(starloom_conditions::expression::to_i64(child.value(1))).unwrap_or(0)
        } else {
            1
        };
        ships.extend(std::iter::repeat_n(model, count));
    }
    ships
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const TRADERS: &str = "\
fleet Traders
\tgovernment Merchant
\tnames \"merchant names\"
\tpersonality timid
\t\tescort
\tvariant 3
\t\tHauler 2
\tvariant
\t\tSparrow
\tcargo 2
";

    fn universe(text: &str) -> UniverseObjects {
        let mut universe = UniverseObjects::new();
        universe.load_text(text, "fleets.txt").unwrap();
        universe
    }

    #[test]
    fn variants_carry_counts_and_weights() {
        let universe = universe(TRADERS);
        let fleet = universe.fleets.find_value("Traders").unwrap();
        let hauler = universe.ships.find("Hauler").unwrap();
        let sparrow = universe.ships.find("Sparrow").unwrap();
        assert_eq!(fleet.government, universe.governments.find("Merchant"));
        assert_eq!(fleet.names, universe.phrases.find("merchant names"));
        assert_eq!(fleet.personality, vec!["timid".to_owned(), "escort".to_owned()]);

        let variants: Vec<(Vec<Handle<ShipModel>>, u64)> =
            fleet.variants.iter().map(|(ships, weight)| (ships.clone(), weight)).collect();
        assert_eq!(variants, vec![(vec![hauler, hauler], 3), (vec![sparrow], 1)]);

        let mut rng = StdRng::seed_from_u64(4);
        assert!(fleet.pick_variant(&mut rng).is_some());
    }

    #[test]
    fn variants_can_be_removed_one_at_a_time() {
        let mut universe = universe(TRADERS);
        universe.load_text("fleet Traders\n\tremove variant\n\t\tSparrow\n", "edit.txt").unwrap();
        assert_eq!(universe.fleets.find_value("Traders").unwrap().variants.len(), 1);

        universe.load_text("fleet Traders\n\tremove variant\n", "edit.txt").unwrap();
        assert!(universe.fleets.find_value("Traders").unwrap().variants.is_empty());
    }

    #[test]
    fn a_plain_variant_line_replaces_earlier_ones() {
        let mut universe = universe(TRADERS);
        universe.load_text("fleet Traders\n\tvariant\n\t\tSparrow 4\n", "edit.txt").unwrap();
        let fleet = universe.fleets.find_value("Traders").unwrap();
        assert_eq!(fleet.variants.len(), 1);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(fleet.pick_variant(&mut rng).unwrap().len(), 4);
    }
}
