//! [`LocationFilter`]: which systems and planets a mission, NPC, news item
//! or person may use.
//!
//! ```text
//! source
//! 	attributes "rich" "urban"
//! 	near Sol 2 5
//! 	not
//! 		planet Earth
//! ```
//!
//! Every constraint must hold. Each `attributes` line is one group, and a
//! location must carry at least one attribute from every group. `near` and
//! `distance` count hyperspace jumps.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::IndexedRandom;
use starloom_core::Handle;
use starloom_data::{DataNode, DataWriter};

use crate::entities::{Government, Planet, System};
use crate::universe::UniverseObjects;

/// A jump range around a fixed system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Near {
    /// The system distances are measured from.
    pub center: Handle<System>,
    /// Fewest jumps allowed.
    pub min: u32,
    /// Most jumps allowed.
    pub max: u32,
}

/// A predicate over systems, planets and ships.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationFilter {
    /// Allowed planets. Empty allows any.
    pub planets: BTreeSet<Handle<Planet>>,
    /// Allowed systems. Empty allows any.
    pub systems: BTreeSet<Handle<System>>,
    /// Allowed owners. Empty allows any.
    pub governments: BTreeSet<Handle<Government>>,
    /// Attribute groups; each must intersect the location's attributes.
    pub attributes: Vec<BTreeSet<String>>,
    /// Jump range around a named system.
    pub near: Option<Near>,
    /// Jump range around the origin. Converted to `near` by
    /// [`set_origin`](Self::set_origin).
    pub distance: Option<(u32, u32)>,
    /// Filters that must not match.
    pub not: Vec<Self>,
    /// Filters that at least one linked system must match.
    pub neighbors: Vec<Self>,
}

fn jumps(value: f64) -> u32 {
    u32::try_from(starloom_conditions::expression::to_i64(value).max(0)).unwrap_or(u32::MAX)
}

impl LocationFilter {
    /// Load a filter from the children of `node`.
    pub fn from_node(node: &DataNode, universe: &mut UniverseObjects) -> Self {
        let mut filter = Self::default();
        filter.load(node, universe);
        filter
    }

    /// Add the constraints in the children of `node`.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        for child in node.children() {
            let key = child.key();
            if key == "not" || key == "neighbor" {
                // Alone on its line, the keyword opens a nested filter.
                // Otherwise it applies to the rest of the line.
                let nested = if child.size() == 1 {
                    Self::from_node(child, universe)
                } else {
                    let mut nested = Self::default();
                    nested.load_line(child, 1, universe);
                    nested
                };
                if key == "not" {
                    self.not.push(nested);
                } else {
                    self.neighbors.push(nested);
                }
            } else {
                self.load_line(child, 0, universe);
            }
        }
    }

    fn load_line(&mut self, child: &DataNode, offset: usize, universe: &mut UniverseObjects) {
        let key = child.token(offset);
        let first = offset.saturating_add(1);
        let names = || {
            child
                .tokens()
                .get(first..)
                .unwrap_or(&[])
                .iter()
                .chain(child.children().iter().flat_map(|grand| grand.tokens().iter()))
                .cloned()
                .collect::<Vec<_>>()
        };
        let size = child.size().saturating_sub(offset);
        match key {
            "not" | "neighbor" => {
                child.print_trace(
                    "Skipping unsupported use of 'not' and 'neighbor'. These keywords must be nested if used together.",
                );
            }
            "planet" => {
                for name in names() {
                    self.planets.insert(universe.planets.get(&name));
                }
            }
            "system" => {
                for name in names() {
                    self.systems.insert(universe.systems.get(&name));
                }
            }
            "government" => {
                for name in names() {
                    self.governments.insert(universe.governments.get(&name));
                }
            }
            "attributes" => {
                let group: BTreeSet<String> = names().into_iter().collect();
                if !group.is_empty() {
                    self.attributes.push(group);
                }
            }
            "near" if size >= 2 => {
                let center = universe.systems.get(child.token(first));
                let (min, max) = match size {
                    3 => (0, jumps(child.value(first.saturating_add(1)))),
                    4 => (
                        jumps(child.value(first.saturating_add(1))),
                        jumps(child.value(first.saturating_add(2))),
                    ),
                    _ => (0, 1),
                };
                self.near = Some(Near { center, min, max });
            }
            "distance" if size >= 2 => {
                self.distance = Some(if size == 2 {
                    (0, jumps(child.value(first)))
                } else {
                    (jumps(child.value(first)), jumps(child.value(first.saturating_add(1))))
                });
            }
            _ => {
                child.print_trace("Unrecognized location filter:");
            }
        }
    }

    /// Whether the filter places no constraint at all.
    pub fn is_empty(&self) -> bool {
        self.planets.is_empty()
            && self.systems.is_empty()
            && self.governments.is_empty()
            && self.attributes.is_empty()
            && self.near.is_none()
            && self.distance.is_none()
            && self.not.is_empty()
            && self.neighbors.is_empty()
    }

    /// Whether `planet` matches, with `origin` as the reference for
    /// `distance`. A planet outside any system never matches.
    pub fn matches_planet(
        &self,
        planet: Handle<Planet>,
        origin: Option<Handle<System>>,
        universe: &UniverseObjects,
    ) -> bool {
        let Some(value) = universe.planets.value(planet) else {
            return false;
        };
        let Some(system) = value.system else {
            return false;
        };
        if !self.governments.is_empty()
            && !value.owner(universe).is_some_and(|g| self.governments.contains(&g))
        {
            return false;
        }
        if !self.planets.is_empty() && !self.planets.contains(&planet) {
            return false;
        }
        if !self
            .attributes
            .iter()
            .all(|group| !group.is_disjoint(&value.attributes))
        {
            return false;
        }
        if self.not.iter().any(|f| f.matches_planet(planet, origin, universe)) {
            return false;
        }
        self.matches_system_inner(system, origin, universe, true)
    }

    /// Whether `system` matches. Attribute groups are satisfied by the
    /// system's own attributes or those of any planet in it.
    pub fn matches_system(
        &self,
        system: Handle<System>,
        origin: Option<Handle<System>>,
        universe: &UniverseObjects,
    ) -> bool {
        self.matches_system_inner(system, origin, universe, false)
    }

    fn matches_system_inner(
        &self,
        system: Handle<System>,
        origin: Option<Handle<System>>,
        universe: &UniverseObjects,
        did_planet: bool,
    ) -> bool {
        let Some(value) = universe.systems.value(system) else {
            return false;
        };
        if !self.systems.is_empty() && !self.systems.contains(&system) {
            return false;
        }
        if !did_planet {
            if !self.governments.is_empty()
                && !value.government.is_some_and(|g| self.governments.contains(&g))
            {
                return false;
            }
            for group in &self.attributes {
                let planet_match = value
                    .objects
                    .iter()
                    .filter_map(|p| universe.planets.value(*p))
                    .any(|p| !group.is_disjoint(&p.attributes));
                if group.is_disjoint(&value.attributes) && !planet_match {
                    return false;
                }
            }
            if self.not.iter().any(|f| f.matches_system(system, origin, universe)) {
                return false;
            }
        }
        if !self.matches_neighbors(system, origin, universe) {
            return false;
        }
        if let Some(near) = self.near {
            if !within(universe, near.center, system, near.min, near.max) {
                return false;
            }
        }
        if let (Some(origin), Some((min, max))) = (origin, self.distance) {
            if !within(universe, origin, system, min, max) {
                return false;
            }
        }
        true
    }

    fn matches_neighbors(
        &self,
        hub: Handle<System>,
        origin: Option<Handle<System>>,
        universe: &UniverseObjects,
    ) -> bool {
        let Some(value) = universe.systems.value(hub) else {
            return self.neighbors.is_empty();
        };
        self.neighbors.iter().all(|filter| {
            value
                .links
                .iter()
                .any(|link| filter.matches_system(*link, origin, universe))
        })
    }

    /// Whether a ship of `government` currently in `system` matches. Only
    /// the system, government, `not`, `neighbor` and `near` constraints
    /// apply.
    pub fn matches_ship(
        &self,
        government: Option<Handle<Government>>,
        system: Option<Handle<System>>,
        universe: &UniverseObjects,
    ) -> bool {
        if !self.systems.is_empty() && !system.is_some_and(|s| self.systems.contains(&s)) {
            return false;
        }
        if !self.governments.is_empty() && !government.is_some_and(|g| self.governments.contains(&g)) {
            return false;
        }
        if self.not.iter().any(|f| f.matches_ship(government, system, universe)) {
            return false;
        }
        let Some(system) = system else {
            return self.neighbors.is_empty() && self.near.is_none();
        };
        if !self.matches_neighbors(system, Some(system), universe) {
            return false;
        }
        self.near
            .is_none_or(|near| within(universe, near.center, system, near.min, near.max))
    }

    /// A copy with `distance` turned into `near origin`. Nested filters are
    /// converted too. A filter that already has `near` keeps it.
    pub fn set_origin(&self, origin: Handle<System>) -> Self {
        let mut out = self.clone();
        if let Some((min, max)) = out.distance.take() {
            if out.near.is_none() {
                out.near = Some(Near {
                    center: origin,
                    min,
                    max,
                });
            }
        }
        out.not = self.not.iter().map(|f| f.set_origin(origin)).collect();
        out.neighbors = self.neighbors.iter().map(|f| f.set_origin(origin)).collect();
        out
    }

    /// A random matching system that is defined and not hidden.
    pub fn pick_system<R: Rng + ?Sized>(
        &self,
        origin: Option<Handle<System>>,
        universe: &UniverseObjects,
        rng: &mut R,
    ) -> Option<Handle<System>> {
        let options: Vec<Handle<System>> = universe
            .systems
            .iter()
            .filter(|(_, handle, system)| universe.systems.is_defined(*handle) && !system.hidden)
            .map(|(_, handle, _)| handle)
            .filter(|handle| self.matches_system(*handle, origin, universe))
            .collect();
        options.choose(rng).copied()
    }

    /// A random matching planet with a spaceport, excluding `exclude`.
    pub fn pick_planet<R: Rng + ?Sized>(
        &self,
        origin: Option<Handle<System>>,
        exclude: &BTreeSet<Handle<Planet>>,
        universe: &UniverseObjects,
        rng: &mut R,
    ) -> Option<Handle<Planet>> {
        let options: Vec<Handle<Planet>> = universe
            .planets
            .iter()
            .filter(|(_, handle, planet)| {
                planet.has_spaceport() && planet.system.is_some() && !exclude.contains(handle)
            })
            .map(|(_, handle, _)| handle)
            .filter(|handle| self.matches_planet(*handle, origin, universe))
            .collect();
        options.choose(rng).copied()
    }

    /// Write the filter under `key`, mirroring the loaded form.
    pub fn save(&self, key: &str, writer: &mut DataWriter, universe: &UniverseObjects) {
        if self.is_empty() {
            return;
        }
        writer.write([key]);
        writer.begin_child();
        self.save_body(writer, universe);
        writer.end_child();
    }

    /// Write the filter lines at the current depth.
    pub fn save_body(&self, writer: &mut DataWriter, universe: &UniverseObjects) {
        for filter in &self.not {
            writer.write(["not"]);
            writer.begin_child();
            filter.save_body(writer, universe);
            writer.end_child();
        }
        for filter in &self.neighbors {
            writer.write(["neighbor"]);
            writer.begin_child();
            filter.save_body(writer, universe);
            writer.end_child();
        }
        if !self.planets.is_empty() {
            let mut tokens = vec!["planet"];
            tokens.extend(self.planets.iter().map(|p| universe.planets.name_of(*p)));
            writer.write(tokens);
        }
        if !self.systems.is_empty() {
            let mut tokens = vec!["system"];
            tokens.extend(self.systems.iter().map(|s| universe.systems.name_of(*s)));
            writer.write(tokens);
        }
        if !self.governments.is_empty() {
            let mut tokens = vec!["government"];
            tokens.extend(self.governments.iter().map(|g| universe.governments.name_of(*g)));
            writer.write(tokens);
        }
        for group in &self.attributes {
            let mut tokens = vec!["attributes"];
            tokens.extend(group.iter().map(String::as_str));
            writer.write(tokens);
        }
        if let Some(near) = self.near {
            writer.write([
                "near".to_owned(),
                universe.systems.name_of(near.center).to_owned(),
                near.min.to_string(),
                near.max.to_string(),
            ]);
        }
        if let Some((min, max)) = self.distance {
            writer.write(["distance".to_owned(), min.to_string(), max.to_string()]);
        }
    }
}

fn within(universe: &UniverseObjects, from: Handle<System>, to: Handle<System>, min: u32, max: u32) -> bool {
    universe.jump_distance(from, to, max).is_some_and(|d| d >= min)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use starloom_data::DataFile;

    // A - B - C - D in a line. Alpha (A) is rich and urban, Beta (B) is
    // rich, Delta (D) is urban but has no spaceport.
    const GALAXY: &str = "\
system A
\tgovernment Republic
\tlink B
\tobject Alpha
system B
\tlink C
\tobject Beta
system C
\tlink D
\tattributes frontier
system D
\tobject Delta
planet Alpha
\tspaceport \"Busy.\"
\tattributes rich urban
planet Beta
\tspaceport \"Quiet.\"
\tattributes rich
planet Delta
\tattributes urban
government Republic
";

    fn galaxy() -> UniverseObjects {
        let mut universe = UniverseObjects::new();
        universe.load_text(GALAXY, "galaxy.txt").unwrap();
        universe.finish_loading();
        universe
    }

    fn filter(text: &str, universe: &mut UniverseObjects) -> LocationFilter {
        let file = DataFile::parse(text, "filter.txt").unwrap();
        LocationFilter::from_node(&file.nodes()[0], universe)
    }

    fn system(universe: &UniverseObjects, name: &str) -> Handle<System> {
        universe.systems.find(name).unwrap()
    }

    fn planet(universe: &UniverseObjects, name: &str) -> Handle<Planet> {
        universe.planets.find(name).unwrap()
    }

    #[test]
    fn near_bounds_are_inclusive() {
        let mut universe = galaxy();
        let ring = filter("source\n\tnear A 1 2\n", &mut universe);
        let matching: Vec<bool> = ["A", "B", "C", "D"]
            .iter()
            .map(|name| ring.matches_system(system(&universe, name), None, &universe))
            .collect();
        assert_eq!(matching, vec![false, true, true, false]);

        let adjacent = filter("source\n\tnear A\n", &mut universe);
        assert_eq!(adjacent.near.map(|n| (n.min, n.max)), Some((0, 1)));
        assert!(adjacent.matches_system(system(&universe, "A"), None, &universe));
        assert!(adjacent.matches_system(system(&universe, "B"), None, &universe));
        assert!(!adjacent.matches_system(system(&universe, "C"), None, &universe));
    }

    #[test]
    fn distance_counts_from_the_origin() {
        let mut universe = galaxy();
        let one_jump = filter("source\n\tdistance 1 1\n", &mut universe);
        let b = system(&universe, "B");
        assert!(one_jump.matches_system(system(&universe, "C"), Some(b), &universe));
        assert!(one_jump.matches_system(system(&universe, "A"), Some(b), &universe));
        assert!(!one_jump.matches_system(b, Some(b), &universe));
        assert!(!one_jump.matches_system(system(&universe, "D"), Some(b), &universe));
        // Without an origin there is nothing to measure from.
        assert!(one_jump.matches_system(system(&universe, "D"), None, &universe));

        let fixed = one_jump.set_origin(b);
        assert_eq!(fixed.distance, None);
        assert_eq!(fixed.near, Some(Near { center: b, min: 1, max: 1 }));
        assert!(!fixed.matches_system(system(&universe, "D"), None, &universe));
    }

    #[test]
    fn not_and_neighbor_compose() {
        let mut universe = galaxy();
        let beside_d = filter("source\n\tneighbor system D\n", &mut universe);
        assert!(beside_d.matches_system(system(&universe, "C"), None, &universe));
        assert!(!beside_d.matches_system(system(&universe, "B"), None, &universe));

        let not_b = filter("source\n\tnot system B\n", &mut universe);
        assert!(!not_b.matches_system(system(&universe, "B"), None, &universe));
        assert!(not_b.matches_system(system(&universe, "A"), None, &universe));

        // Next to an urban system, but not that system's own neighbor C.
        let nested = filter(
            "source\n\tneighbor\n\t\tattributes urban\n\tnot\n\t\tsystem C\n",
            &mut universe,
        );
        let matching: Vec<bool> = ["A", "B", "C", "D"]
            .iter()
            .map(|name| nested.matches_system(system(&universe, name), None, &universe))
            .collect();
        assert_eq!(matching, vec![false, true, false, false]);
    }

    #[test]
    fn attributes_match_systems_through_their_planets() {
        let mut universe = galaxy();
        let urban = filter("source\n\tattributes urban\n", &mut universe);
        assert!(urban.matches_system(system(&universe, "A"), None, &universe));
        assert!(urban.matches_system(system(&universe, "D"), None, &universe));
        assert!(!urban.matches_system(system(&universe, "B"), None, &universe));

        let both = filter("source\n\tattributes rich\n\tattributes urban\n", &mut universe);
        assert!(both.matches_planet(planet(&universe, "Alpha"), None, &universe));
        assert!(!both.matches_planet(planet(&universe, "Beta"), None, &universe));

        let frontier = filter("source\n\tattributes frontier\n", &mut universe);
        assert!(frontier.matches_system(system(&universe, "C"), None, &universe));
    }

    #[test]
    fn planets_inherit_their_system_owner() {
        let mut universe = galaxy();
        let republic = filter("source\n\tgovernment Republic\n", &mut universe);
        assert!(republic.matches_planet(planet(&universe, "Alpha"), None, &universe));
        assert!(!republic.matches_planet(planet(&universe, "Beta"), None, &universe));

        let government = universe.governments.find("Republic");
        assert!(republic.matches_ship(government, Some(system(&universe, "C")), &universe));
        assert!(!republic.matches_ship(None, Some(system(&universe, "A")), &universe));
    }

    #[test]
    fn ships_outside_any_system_fail_range_checks() {
        let mut universe = galaxy();
        let near = filter("source\n\tnear A 0 3\n", &mut universe);
        assert!(near.matches_ship(None, Some(system(&universe, "D")), &universe));
        assert!(!near.matches_ship(None, None, &universe));
        assert!(LocationFilter::default().matches_ship(None, None, &universe));
    }

    #[test]
    fn picked_planets_skip_exclusions() {
        let mut universe = galaxy();
        let rich = filter("source\n\tattributes rich\n", &mut universe);
        let alpha = planet(&universe, "Alpha");
        let beta = planet(&universe, "Beta");
        let mut rng = StdRng::seed_from_u64(5);
        let mut exclude = BTreeSet::from([alpha]);
        assert_eq!(rich.pick_planet(None, &exclude, &universe, &mut rng), Some(beta));
        exclude.insert(beta);
        assert_eq!(rich.pick_planet(None, &exclude, &universe, &mut rng), None);

        // Delta matches but has no spaceport.
        let urban = filter("source\n\tattributes urban\n\tnot planet Alpha\n", &mut universe);
        assert_eq!(urban.pick_planet(None, &BTreeSet::new(), &universe, &mut rng), None);
    }

    #[test]
    fn undefined_systems_are_never_picked() {
        let mut universe = galaxy();
        let nowhere = filter("source\n\tsystem Nowhere\n", &mut universe);
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(nowhere.pick_system(None, &universe, &mut rng), None);

        let frontier = filter("source\n\tattributes frontier\n", &mut universe);
        assert_eq!(frontier.pick_system(None, &universe, &mut rng), Some(system(&universe, "C")));
    }

    #[test]
    fn saved_filters_reload_equal() {
        let mut universe = galaxy();
        let original = filter(
            "source\n\tnear A 1 2\n\tattributes rich\n\tgovernment Republic\n\tnot\n\t\tplanet Alpha\n\tneighbor system D\n",
            &mut universe,
        );
        let mut writer = DataWriter::new();
        original.save("source", &mut writer, &universe);
        let reloaded = filter(writer.as_str(), &mut universe);
        assert_eq!(reloaded, original);

        let mut empty = DataWriter::new();
        LocationFilter::default().save("source", &mut empty, &universe);
        assert!(empty.as_str().is_empty());
    }
}
