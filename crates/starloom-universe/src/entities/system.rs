//! Star systems: position, owner, hyperspace links, and the planets in orbit.

use std::collections::{BTreeMap, BTreeSet};

use starloom_core::Handle;
use starloom_data::{DataNode, DataWriter};

use super::{Fleet, Government, Planet};
use crate::edit::{EditMode, EditTracker};
use crate::universe::UniverseObjects;

/// Keys a plain redefinition overwrites instead of appending to.
const LIST_KEYS: &[&str] = &["attributes", "fleet", "link", "object", "trade"];

/// Keys that only matter to rendering or flight. Accepted and ignored.
const PRESENTATION_KEYS: &[&str] = &[
    "arrival",
    "asteroids",
    "belt",
    "departure",
    "haze",
    "hazard",
    "invisible fence",
    "jump range",
    "minables",
    "no raids",
    "ramscoop",
    "starfield density",
];

/// A periodic fleet spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemFleet {
    /// The fleet to spawn.
    pub fleet: Handle<Fleet>,
    /// Mean days between spawns.
    pub period: i64,
}

/// A star system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct System {
    /// Map position.
    pub position: (f64, f64),
    /// Owning government.
    pub government: Option<Handle<Government>>,
    /// Systems reachable by one hyperspace jump.
    pub links: BTreeSet<Handle<Self>>,
    /// Free-form tags matched by location filters.
    pub attributes: BTreeSet<String>,
    /// Named stellar objects, in orbit order.
    pub objects: Vec<Handle<Planet>>,
    /// Fleets that spawn here.
    pub fleets: Vec<SystemFleet>,
    /// Base commodity prices.
    pub trade: BTreeMap<String, i64>,
    /// Music track.
    pub music: String,
    /// Habitable-zone radius.
    pub habitable: f64,
    /// Hidden from the map and never picked by filters.
    pub hidden: bool,
}

impl System {
    /// Apply one `system <name>` definition. `this` is the handle the
    /// system is stored under, used for links and planet back-references.
    pub fn load(&mut self, this: Handle<Self>, node: &DataNode, universe: &mut UniverseObjects) {
        let mut tracker = EditTracker::new(LIST_KEYS);
        for child in node.children() {
            let Some(edit) = tracker.split(child) else {
                continue;
            };
            if edit.clear {
                self.clear_key(this, edit.key, universe);
                if edit.mode == EditMode::Remove {
                    continue;
                }
            }
            let remove = edit.mode == EditMode::Remove;
            match edit.key {
                "hidden" => self.hidden = !remove,
                "object" => {
                    if remove {
                        let name = edit.value();
                        if let Some(planet) = universe.planets.find(name) {
                            self.objects.retain(|p| *p != planet);
                            detach_planet(universe, planet, this);
                        }
                    } else {
                        self.load_object(this, child, universe);
                    }
                }
                _ if !edit.has_value() => {
                    child.print_trace("Expected key to have a value:");
                }
                "pos" if edit.values.len() >= 2 => {
                    self.position = (value_at(child, edit, 0), value_at(child, edit, 1));
                }
                "government" => {
                    self.government = if remove {
                        None
                    } else {
                        Some(universe.governments.get(edit.value()))
                    };
                }
                "music" => {
                    if remove {
                        self.music.clear();
                    } else {
                        edit.value().clone_into(&mut self.music);
                    }
                }
                "habitable" => self.habitable = if remove { 0.0 } else { value_at(child, edit, 0) },
                "attributes" => {
                    for value in edit.values {
                        if remove {
                            self.attributes.remove(value);
                        } else {
                            self.attributes.insert(value.clone());
                        }
                    }
                }
                "link" => {
                    let other = universe.systems.get(edit.value());
                    if remove {
                        self.links.remove(&other);
                        if let Some(system) = universe.systems.value_mut(other) {
                            system.links.remove(&this);
                        }
                    } else if other != this {
                        self.links.insert(other);
                        if let Some(system) = universe.systems.value_mut(other) {
                            system.links.insert(this);
                        }
                    }
                }
                "fleet" => {
                    let fleet = universe.fleets.get(edit.value());
                    if remove {
                        self.fleets.retain(|f| f.fleet != fleet);
                    } else {
                        let period = if edit.values.len() >= 2 {
                            starloom_conditions::expression::to_i64(value_at(child, edit, 1))
                        } else {
                            1
                        };
                        self.fleets.push(SystemFleet { fleet, period });
                    }
                }
                "trade" => {
                    if remove {
                        self.trade.remove(edit.value());
                    } else if edit.values.len() >= 2 {
                        let price = starloom_conditions::expression::to_i64(value_at(child, edit, 1));
                        self.trade.insert(edit.value().to_owned(), price);
                    } else {
                        child.print_trace("Expected a commodity and a price:");
                    }
                }
                key if PRESENTATION_KEYS.contains(&key) => {}
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }

    fn clear_key(&mut self, this: Handle<Self>, key: &str, universe: &mut UniverseObjects) {
        match key {
            "government" => self.government = None,
            "music" => self.music.clear(),
            "attributes" => self.attributes.clear(),
            "link" => {
                for other in std::mem::take(&mut self.links) {
                    if let Some(system) = universe.systems.value_mut(other) {
                        system.links.remove(&this);
                    }
                }
            }
            "fleet" => self.fleets.clear(),
            "trade" => self.trade.clear(),
            "hidden" => self.hidden = false,
            "object" => {
                for planet in std::mem::take(&mut self.objects) {
                    detach_planet(universe, planet, this);
                }
            }
            _ => {}
        }
    }

    /// Register the planet named by an `object` line, then any nested
    /// objects. Unnamed objects are scenery.
    fn load_object(&mut self, this: Handle<Self>, node: &DataNode, universe: &mut UniverseObjects) {
        let name_index = if node.key() == "add" { 2 } else { 1 };
        if node.size() > name_index {
            let planet = universe.planets.get(node.token(name_index));
            if let Some(existing) = universe.planets.value(planet).and_then(|p| p.system) {
                if existing != this {
                    node.print_trace(&format!(
                        "Planet \"{}\" is already in system \"{}\":",
                        node.token(name_index),
                        universe.systems.name_of(existing)
                    ));
                }
            }
            if let Some(value) = universe.planets.value_mut(planet) {
                value.system = Some(this);
            }
            if !self.objects.contains(&planet) {
                self.objects.push(planet);
            }
        }
        for child in node.children().iter().filter(|c| c.key() == "object") {
            self.load_object(this, child, universe);
        }
    }

    /// Whether this system has at least one planet with a spaceport.
    pub fn has_spaceport(&self, universe: &UniverseObjects) -> bool {
        self.objects
            .iter()
            .filter_map(|p| universe.planets.value(*p))
            .any(super::Planet::has_spaceport)
    }

    /// Write this system back as a definition.
    pub fn save(&self, name: &str, writer: &mut DataWriter, universe: &UniverseObjects) {
        writer.write(["system", name]);
        writer.begin_child();
        writer.write_token("pos");
        writer.write_number(self.position.0);
        writer.write_number(self.position.1);
        writer.end_line();
        if let Some(government) = self.government {
            writer.write(["government", universe.governments.name_of(government)]);
        }
        if !self.attributes.is_empty() {
            let mut tokens = vec!["attributes".to_owned()];
            tokens.extend(self.attributes.iter().cloned());
            writer.write(tokens);
        }
        for link in &self.links {
            writer.write(["link", universe.systems.name_of(*link)]);
        }
        for planet in &self.objects {
            writer.write(["object", universe.planets.name_of(*planet)]);
        }
        for fleet in &self.fleets {
            writer.write([
                "fleet".to_owned(),
                universe.fleets.name_of(fleet.fleet).to_owned(),
                fleet.period.to_string(),
            ]);
        }
        for (commodity, price) in &self.trade {
            writer.write(["trade".to_owned(), commodity.clone(), price.to_string()]);
        }
        if !self.music.is_empty() {
            writer.write(["music", self.music.as_str()]);
        }
        if self.hidden {
            writer.write(["hidden"]);
        }
        writer.end_child();
    }
}

fn detach_planet(universe: &mut UniverseObjects, planet: Handle<Planet>, system: Handle<System>) {
    if let Some(value) = universe.planets.value_mut(planet) {
        if value.system == Some(system) {
            value.system = None;
        }
    }
}

/// The value `offset` places after the key, as a number.
fn value_at(node: &DataNode, edit: crate::edit::Edit<'_>, offset: usize) -> f64 {
    let base = node.size().saturating_sub(edit.values.len());
    node.value(base.saturating_add(offset))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const SOL: &str = "\
system Sol
\tpos 3 -4
\tgovernment Republic
\tattributes core
\tlink Alpha
\tobject Earth
\t\tobject Luna
\tobject Mars
\tremove object Mars
\tfleet Traders 300
\tfleet Pirates
\ttrade Food 250
\tmusic ambient/sol
\thaze _menu/haze
system Alpha
planet Earth
\tspaceport \"Docks.\"
planet Luna
planet Mars
";

    fn universe(text: &str) -> UniverseObjects {
        let mut universe = UniverseObjects::new();
        universe.load_text(text, "systems.txt").unwrap();
        universe.finish_loading();
        universe
    }

    #[test]
    fn objects_nest_and_can_be_removed() {
        let universe = universe(SOL);
        let sol_handle = universe.systems.find("Sol").unwrap();
        let sol = universe.systems.value(sol_handle).unwrap();
        let earth = universe.planets.find("Earth").unwrap();
        let luna = universe.planets.find("Luna").unwrap();
        assert_eq!(sol.objects, vec![earth, luna]);
        assert_eq!(universe.planets.value(luna).unwrap().system, Some(sol_handle));
        assert_eq!(universe.planets.find_value("Mars").unwrap().system, None);
        assert!(sol.has_spaceport(&universe));
    }

    #[test]
    fn fleets_trade_and_position_load() {
        let universe = universe(SOL);
        let sol = universe.systems.find_value("Sol").unwrap();
        assert_eq!(sol.position, (3.0, -4.0));
        assert_eq!(sol.government, universe.governments.find("Republic"));
        let periods: Vec<i64> = sol.fleets.iter().map(|f| f.period).collect();
        assert_eq!(periods, vec![300, 1]);
        assert_eq!(sol.trade.get("Food"), Some(&250));
        assert_eq!(sol.music, "ambient/sol");
        assert!(sol.attributes.contains("core"));
    }

    #[test]
    fn removing_a_link_unlinks_both_ends() {
        let mut universe = universe(SOL);
        universe.load_text("system Alpha\n\tremove link Sol\n", "edit.txt").unwrap();
        assert!(universe.systems.find_value("Sol").unwrap().links.is_empty());
        assert!(universe.systems.find_value("Alpha").unwrap().links.is_empty());
    }

    #[test]
    fn saved_systems_reload_unchanged() {
        let mut universe = universe(SOL);
        let handle = universe.systems.find("Sol").unwrap();
        let before = universe.systems.value(handle).unwrap().clone();
        let mut writer = DataWriter::new();
        before.save("Sol", &mut writer, &universe);
        universe.load_text(writer.as_str(), "saved.txt").unwrap();
        assert_eq!(universe.systems.value(handle).unwrap(), &before);
    }
}
