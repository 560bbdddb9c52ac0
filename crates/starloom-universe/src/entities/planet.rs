//! Planets and stations: the places the player can land.

use std::collections::BTreeSet;

use starloom_core::Handle;
use starloom_data::DataNode;

use super::{Government, Outfit, Sale, ShipModel, System};
use crate::edit::{EditMode, EditTracker};
use crate::universe::UniverseObjects;

const LIST_KEYS: &[&str] = &["attributes", "description", "spaceport"];

const PRESENTATION_KEYS: &[&str] = &["landscape", "port", "wormhole"];

/// A landable body.
#[derive(Debug, Clone, PartialEq)]
pub struct Planet {
    /// The system this planet orbits in. Set by the system's `object` line.
    pub system: Option<Handle<System>>,
    /// Free-form tags matched by location filters.
    pub attributes: BTreeSet<String>,
    /// Landing description, one paragraph per line.
    pub description: String,
    /// Spaceport text. A planet with no spaceport text has no spaceport.
    pub spaceport: String,
    /// Owner, when it differs from the system's.
    pub government: Option<Handle<Government>>,
    /// Reputation needed to land.
    pub required_reputation: f64,
    /// Fraction of the player's credits a bribe costs.
    pub bribe: f64,
    /// Chance per visit of a cargo scan.
    pub security: f64,
    /// Daily tribute paid once dominated.
    pub tribute: i64,
    /// Ship stock.
    pub shipyards: BTreeSet<Handle<Sale<ShipModel>>>,
    /// Outfit stock.
    pub outfitters: BTreeSet<Handle<Sale<Outfit>>>,
    /// Music track.
    pub music: String,
    /// Whether a `planet` definition has been read.
    pub defined: bool,
}

impl Default for Planet {
    fn default() -> Self {
        Self {
            system: None,
            attributes: BTreeSet::new(),
            description: String::new(),
            spaceport: String::new(),
            government: None,
            required_reputation: 0.0,
            bribe: 0.01,
            security: 0.25,
            tribute: 0,
            shipyards: BTreeSet::new(),
            outfitters: BTreeSet::new(),
            music: String::new(),
            defined: false,
        }
    }
}

impl Planet {
    /// Apply one `planet <name>` definition.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        self.defined = true;
        let mut tracker = EditTracker::new(LIST_KEYS);
        for child in node.children() {
            let Some(mut edit) = tracker.split(child) else {
                continue;
            };
            // `<key> clear` is an older spelling of `remove <key>`.
            if edit.mode == EditMode::Set && edit.value() == "clear" {
                edit.mode = EditMode::Remove;
                edit.values = &[];
                edit.clear = true;
            }
            if edit.clear {
                self.clear_key(edit.key);
                if edit.mode == EditMode::Remove {
                    continue;
                }
            }
            if !edit.has_value() {
                child.print_trace("Expected key to have a value:");
                continue;
            }
            let remove = edit.mode == EditMode::Remove;
            let number = || child.value(child.size().saturating_sub(1));
            match edit.key {
                "attributes" => {
                    for value in edit.values {
                        if remove {
                            self.attributes.remove(value);
                        } else {
                            self.attributes.insert(value.clone());
                        }
                    }
                }
                "description" | "spaceport" => {
                    let text = if edit.key == "description" {
                        &mut self.description
                    } else {
                        &mut self.spaceport
                    };
                    if remove {
                        text.clear();
                    } else {
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        text.push_str(edit.value());
                    }
                }
                "shipyard" => {
                    let sale = universe.shipyards.get(edit.value());
                    if remove {
                        self.shipyards.remove(&sale);
                    } else {
                        self.shipyards.insert(sale);
                    }
                }
                "outfitter" => {
                    let sale = universe.outfitters.get(edit.value());
                    if remove {
                        self.outfitters.remove(&sale);
                    } else {
                        self.outfitters.insert(sale);
                    }
                }
                "government" => {
                    self.government = (!remove).then(|| universe.governments.get(edit.value()));
                }
                "music" => edit.value().clone_into(&mut self.music),
                "required reputation" => self.required_reputation = number(),
                "bribe" => self.bribe = number(),
                "security" => self.security = number(),
                "tribute" => {
                    self.tribute = starloom_conditions::expression::to_i64(number());
                }
                key if PRESENTATION_KEYS.contains(&key) => {}
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }

    fn clear_key(&mut self, key: &str) {
        match key {
            "attributes" => self.attributes.clear(),
            "description" => self.description.clear(),
            "spaceport" => self.spaceport.clear(),
            "shipyard" => self.shipyards.clear(),
            "outfitter" => self.outfitters.clear(),
            "government" => self.government = None,
            "music" => self.music.clear(),
            "required reputation" => self.required_reputation = 0.0,
            "bribe" => self.bribe = 0.0,
            "security" => self.security = 0.0,
            "tribute" => self.tribute = 0,
            _ => {}
        }
    }

    /// Whether the planet has a spaceport.
    pub fn has_spaceport(&self) -> bool {
        !self.spaceport.is_empty()
    }

    /// Whether anyone lives here.
    pub fn is_inhabited(&self) -> bool {
        self.has_spaceport() && !self.attributes.contains("uninhabited")
    }

    /// Whether a pilot with `reputation` with the owner may land.
    pub fn can_land(&self, reputation: f64) -> bool {
        reputation >= self.required_reputation
    }

    /// The planet's owner: its own government, or its system's.
    pub fn owner(&self, universe: &UniverseObjects) -> Option<Handle<Government>> {
        self.government.or_else(|| {
            self.system
                .and_then(|s| universe.systems.value(s))
                .and_then(|s| s.government)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const CONTENT: &str = "\
system Sol
\tgovernment Republic
\tobject Earth
\tobject Ceres
planet Earth
\tattributes urban rich
\tspaceport \"Docks.\"
\tspaceport \"Cranes.\"
\trequired reputation 5
\tbribe 0.05
\ttribute 800
\tlandscape land/earth
planet Ceres
\tgovernment Miners
\tspaceport \"Tunnels.\"
\tattributes uninhabited
";

    fn universe() -> UniverseObjects {
        let mut universe = UniverseObjects::new();
        universe.load_text(CONTENT, "planets.txt").unwrap();
        universe.finish_loading();
        universe
    }

    #[test]
    fn text_lines_join_and_numbers_load() {
        let universe = universe();
        let earth = universe.planets.find_value("Earth").unwrap();
        assert!(earth.defined);
        assert_eq!(earth.spaceport, "Docks.\nCranes.");
        assert!(earth.attributes.contains("urban") && earth.attributes.contains("rich"));
        assert!((earth.bribe - 0.05).abs() < 1e-9);
        assert_eq!(earth.tribute, 800);
        // Defaults survive when not given.
        assert!((earth.security - 0.25).abs() < 1e-9);
    }

    #[test]
    fn landing_needs_reputation() {
        let universe = universe();
        let earth = universe.planets.find_value("Earth").unwrap();
        assert!(!earth.can_land(4.0));
        assert!(earth.can_land(5.0));
    }

    #[test]
    fn owner_falls_back_to_the_system() {
        let universe = universe();
        let earth = universe.planets.find_value("Earth").unwrap();
        let ceres = universe.planets.find_value("Ceres").unwrap();
        assert_eq!(earth.owner(&universe), universe.governments.find("Republic"));
        assert_eq!(ceres.owner(&universe), universe.governments.find("Miners"));
        assert!(earth.is_inhabited());
        assert!(!ceres.is_inhabited());
    }

    #[test]
    fn clear_removes_a_spaceport() {
        let mut universe = universe();
        universe.load_text("planet Earth\n\tspaceport clear\n\tremove attributes rich\n", "edit.txt").unwrap();
        let earth = universe.planets.find_value("Earth").unwrap();
        assert!(!earth.has_spaceport());
        assert!(earth.attributes.contains("urban"));
        assert!(!earth.attributes.contains("rich"));
        // Values not mentioned in the edit are kept.
        assert_eq!(earth.tribute, 800);
    }
}
