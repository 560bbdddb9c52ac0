//! [`PlayerShip`]: one ship in the player's fleet.
//!
//! A ship is a model plus the outfits installed on it. Attributes add the
//! model's hull values to every installed outfit, so installing or removing
//! an outfit changes cargo space, bunks and crew at once. The ship keeps a
//! [`Capacity`] snapshot of those three, refreshed whenever it changes in
//! the presence of the universe.

use std::collections::BTreeMap;

use starloom_conditions::expression::to_i64;
use starloom_core::Handle;
use starloom_data::{DataNode, DataWriter};
use starloom_universe::UniverseObjects;
use starloom_universe::entities::{Outfit, Planet, ShipModel, System};

/// Cargo, passenger and crew figures for one ship.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capacity {
    /// Tons of cargo space.
    pub cargo: i64,
    /// Bunks left for passengers.
    pub bunks: i64,
    /// Crew needed to fly the ship.
    pub crew: i64,
}

/// A ship the player owns.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerShip {
    /// The ship's model.
    pub model: Handle<ShipModel>,
    /// The name the player gave it.
    pub name: String,
    /// Where the ship is.
    pub system: Option<Handle<System>>,
    /// Planet the ship is landed or parked on.
    pub planet: Option<Handle<Planet>>,
    /// Whether the ship stays behind when the fleet takes off.
    pub parked: bool,
    outfits: BTreeMap<Handle<Outfit>, i64>,
    capacity: Capacity,
}

impl PlayerShip {
    /// A new ship of `model` with the model's stock outfits.
    pub fn new(model: Handle<ShipModel>, name: &str, universe: &UniverseObjects) -> Self {
        let mut outfits = BTreeMap::new();
        if let Some(data) = universe.ships.value(model) {
            for (outfit, count) in &data.outfits {
                let entry: &mut i64 = outfits.entry(*outfit).or_default();
                *entry = entry.saturating_add(*count);
            }
        }
        let mut ship = Self {
            model,
            name: name.to_owned(),
            system: None,
            planet: None,
            parked: false,
            outfits,
            capacity: Capacity::default(),
        };
        ship.refresh(universe);
        ship
    }

    /// Recompute the capacity snapshot.
    pub fn refresh(&mut self, universe: &UniverseObjects) {
        self.capacity = Capacity {
            cargo: self.cargo_space(universe),
            bunks: self.passenger_bunks(universe),
            crew: self.required_crew(universe),
        };
    }

    /// Capacity as of the last refresh.
    pub const fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Hull value of `attribute` plus what every installed outfit adds.
    pub fn attribute(&self, attribute: &str, universe: &UniverseObjects) -> f64 {
        let hull = universe
            .ships
            .value(self.model)
            .and_then(|m| m.attributes.get(attribute).copied())
            .unwrap_or(0.);
        self.outfits.iter().fold(hull, |sum, (outfit, count)| {
            let per = universe.outfits.value(*outfit).map_or(0., |o| o.attribute(attribute));
            #[allow(clippy::cast_precision_loss)]
            let count = *count as f64;
            per.mul_add(count, sum)
        })
    }

    /// Tons of cargo space.
    pub fn cargo_space(&self, universe: &UniverseObjects) -> i64 {
        to_i64(self.attribute("cargo space", universe)).max(0)
    }

    /// Crew needed to fly the ship.
    pub fn required_crew(&self, universe: &UniverseObjects) -> i64 {
        to_i64(self.attribute("required crew", universe)).max(0)
    }

    /// Bunks left over for passengers once the crew is aboard.
    pub fn passenger_bunks(&self, universe: &UniverseObjects) -> i64 {
        to_i64(self.attribute("bunks", universe))
            .saturating_sub(self.required_crew(universe))
            .max(0)
    }

    /// Copies of `outfit` installed.
    pub fn outfit(&self, outfit: Handle<Outfit>) -> i64 {
        self.outfits.get(&outfit).copied().unwrap_or(0)
    }

    /// Every installed outfit with its count.
    pub fn outfits(&self) -> impl Iterator<Item = (Handle<Outfit>, i64)> + '_ {
        self.outfits.iter().map(|(outfit, count)| (*outfit, *count))
    }

    /// Install `count` more copies of `outfit`.
    pub fn add_outfit(&mut self, outfit: Handle<Outfit>, count: i64) {
        if count <= 0 {
            return;
        }
        let entry = self.outfits.entry(outfit).or_default();
        *entry = entry.saturating_add(count);
    }

    /// Uninstall up to `count` copies of `outfit`. Returns how many were
    /// removed.
    pub fn remove_outfit(&mut self, outfit: Handle<Outfit>, count: i64) -> i64 {
        let Some(entry) = self.outfits.get_mut(&outfit) else {
            return 0;
        };
        let removed = count.clamp(0, *entry);
        *entry = entry.saturating_sub(removed);
        if *entry == 0 {
            self.outfits.remove(&outfit);
        }
        removed
    }

    /// The worst fine for installed outfits. `None` means an atrocity.
    pub fn illegal_outfit_fine(&self, universe: &UniverseObjects) -> Option<i64> {
        let mut worst = 0_i64;
        for outfit in self.outfits.keys() {
            let Some(data) = universe.outfits.value(*outfit) else {
                continue;
            };
            if data.attribute("atrocity") > 0. || data.attribute("illegal") < 0. {
                return None;
            }
            worst = worst.max(to_i64(data.attribute("illegal")));
        }
        Some(worst)
    }

    /// What the ship would count for as an asset: a quarter of the hull
    /// and outfit cost.
    pub fn depreciated_value(&self, universe: &UniverseObjects) -> i64 {
        let hull = universe.ships.value(self.model).map_or(0, |m| m.cost);
        let outfits = self.outfits.iter().fold(0_i64, |sum, (outfit, count)| {
            let cost = universe.outfits.value(*outfit).map_or(0, |o| o.cost);
            sum.saturating_add(cost.saturating_mul(*count))
        });
        hull.saturating_add(outfits) / 4
    }

    /// Read a `ship <model>` block.
    pub fn load(node: &DataNode, universe: &mut UniverseObjects) -> Self {
        let model = universe.ships.get(node.token(1));
        let mut ship = Self {
            model,
            name: String::new(),
            system: None,
            planet: None,
            parked: false,
            outfits: BTreeMap::new(),
            capacity: Capacity::default(),
        };
        for child in node.children() {
            let has = |n: usize| child.size() >= n;
            match child.key() {
                "name" if has(2) => child.token(1).clone_into(&mut ship.name),
                "system" if has(2) => ship.system = Some(universe.systems.get(child.token(1))),
                "planet" if has(2) => ship.planet = Some(universe.planets.get(child.token(1))),
                "parked" => ship.parked = true,
                "outfits" => {
                    for grand in child.children() {
                        let outfit = universe.outfits.get(grand.token(0));
                        let count = if grand.size() >= 2 { to_i64(grand.value(1)) } else { 1 };
                        ship.add_outfit(outfit, count);
                    }
                }
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
        ship.refresh(universe);
        ship
    }

    /// Write a `ship <model>` block.
    pub fn save(&self, writer: &mut DataWriter, universe: &UniverseObjects) {
        writer.write(["ship", universe.ships.name_of(self.model)]);
        writer.begin_child();
        if !self.name.is_empty() {
            writer.write(["name", self.name.as_str()]);
        }
        if let Some(system) = self.system {
            writer.write(["system", universe.systems.name_of(system)]);
        }
        if let Some(planet) = self.planet {
            writer.write(["planet", universe.planets.name_of(planet)]);
        }
        if self.parked {
            writer.write(["parked"]);
        }
        if !self.outfits.is_empty() {
            writer.write(["outfits"]);
            writer.begin_child();
            for (outfit, count) in &self.outfits {
                writer.write([universe.outfits.name_of(*outfit).to_owned(), count.to_string()]);
            }
            writer.end_child();
        }
        writer.end_child();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;
    use starloom_data::DataFile;

    fn universe() -> UniverseObjects {
        let mut universe = UniverseObjects::new();
        universe
            .load_text(
                "outfit Pod\n\t\"cargo space\" 10\n\tcost 1000\n\
                 outfit Ripper\n\tillegal 3000\n\
                 outfit Skull\n\tatrocity 1\n\
                 ship Hauler\n\tattributes\n\t\tcost 40000\n\t\t\"cargo space\" 50\n\t\tbunks 6\n\t\t\"required crew\" 2\n\toutfits\n\t\tPod 2\n",
                "fleet",
            )
            .unwrap();
        universe
    }

    #[test]
    fn installed_outfits_add_to_the_hull() {
        let universe = universe();
        let hauler = universe.ships.find("Hauler").unwrap();
        let pod = universe.outfits.find("Pod").unwrap();
        let mut ship = PlayerShip::new(hauler, "Dray", &universe);
        assert_eq!(ship.cargo_space(&universe), 70);
        assert_eq!(ship.passenger_bunks(&universe), 4);
        assert_eq!(ship.capacity(), Capacity { cargo: 70, bunks: 4, crew: 2 });
        assert_eq!(ship.remove_outfit(pod, 5), 2);
        assert_eq!(ship.cargo_space(&universe), 50);
        assert_eq!(ship.capacity().cargo, 70);
        ship.refresh(&universe);
        assert_eq!(ship.capacity().cargo, 50);
    }

    #[test]
    fn illegal_and_atrocity_outfits() {
        let universe = universe();
        let hauler = universe.ships.find("Hauler").unwrap();
        let mut ship = PlayerShip::new(hauler, "Dray", &universe);
        assert_eq!(ship.illegal_outfit_fine(&universe), Some(0));
        ship.add_outfit(universe.outfits.find("Ripper").unwrap(), 1);
        assert_eq!(ship.illegal_outfit_fine(&universe), Some(3000));
        ship.add_outfit(universe.outfits.find("Skull").unwrap(), 1);
        assert_eq!(ship.illegal_outfit_fine(&universe), None);
    }

    #[test]
    fn save_and_load_keep_the_ship() {
        let mut universe = universe();
        let hauler = universe.ships.find("Hauler").unwrap();
        let mut ship = PlayerShip::new(hauler, "Dray", &universe);
        ship.parked = true;
        let mut writer = DataWriter::new();
        ship.save(&mut writer, &universe);
        let file = DataFile::parse(&writer.into_string(), "fleet").unwrap();
        let loaded = PlayerShip::load(&file.nodes()[0], &mut universe);
        assert_eq!(loaded, ship);
    }
}
