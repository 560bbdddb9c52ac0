//! [`GameEvent`]: a dated bundle of universe changes and condition writes.
//!
//! ```text
//! event "pirate takeover"
//! 	date 16 11 3013
//! 	system Sol
//! 		government Pirate
//! 	unlink Sol Alpha
//! 	visit Alpha
//! 	"pirates in sol" = 1
//! ```
//!
//! Children whose key is a change keyword are kept verbatim and fed back
//! through [`UniverseObjects::change`](crate::universe::UniverseObjects::change)
//! when the event fires. Any other unrecognised child is a condition
//! assignment.

use std::collections::BTreeSet;

use starloom_conditions::ConditionAssignments;
use starloom_core::{Handle, Set};
use starloom_data::{DataNode, DataWriter};
use starloom_types::Date;

use crate::context::PlayerContext;
use crate::entities::{Planet, System};
use crate::universe::UniverseObjects;

/// Root keywords an event may carry as changes.
pub const CHANGE_KEYWORDS: &[&str] = &[
    "fleet",
    "galaxy",
    "government",
    "link",
    "news",
    "outfitter",
    "planet",
    "shipyard",
    "substitutions",
    "system",
    "unlink",
    "wormhole",
];

/// Whether `key` starts a change node.
pub fn is_change_keyword(key: &str) -> bool {
    CHANGE_KEYWORDS.contains(&key)
}

/// A scheduled or triggered bundle of changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameEvent {
    /// The event's name. Empty for an event that was referred to but never
    /// defined.
    pub name: String,
    /// When the event fires, if it was given a fixed date.
    pub date: Date,
    /// Condition writes applied when the event fires.
    pub conditions: ConditionAssignments,
    /// Universe changes, verbatim.
    pub changes: Vec<DataNode>,
    /// Systems the player learns about.
    pub systems_to_visit: BTreeSet<Handle<System>>,
    /// Systems the player forgets.
    pub systems_to_unvisit: BTreeSet<Handle<System>>,
    /// Planets the player learns about.
    pub planets_to_visit: BTreeSet<Handle<Planet>>,
    /// Planets the player forgets.
    pub planets_to_unvisit: BTreeSet<Handle<Planet>>,
    /// A disabled event does nothing and is not saved.
    pub disabled: bool,
}

impl GameEvent {
    /// Load an `event` definition.
    pub fn load(&mut self, node: &DataNode, systems: &mut Set<System>, planets: &mut Set<Planet>) {
        if node.size() >= 2 {
            node.token(1).clone_into(&mut self.name);
        }
        for child in node.children() {
            let key = child.key();
            match key {
                "date" if child.size() >= 4 => {
                    self.date = Date::new(to_i32(child.value(1)), to_i32(child.value(2)), to_i32(child.value(3)));
                }
                "visit" | "unvisit" if child.size() >= 3 && child.token(1) == "planet" => {
                    let planet = planets.get(child.token(2));
                    let (add, remove) = if key == "visit" {
                        (&mut self.planets_to_visit, &mut self.planets_to_unvisit)
                    } else {
                        (&mut self.planets_to_unvisit, &mut self.planets_to_visit)
                    };
                    remove.remove(&planet);
                    add.insert(planet);
                }
                "visit" | "unvisit" if child.size() >= 2 => {
                    let system = systems.get(child.token(1));
                    let (add, remove) = if key == "visit" {
                        (&mut self.systems_to_visit, &mut self.systems_to_unvisit)
                    } else {
                        (&mut self.systems_to_unvisit, &mut self.systems_to_visit)
                    };
                    remove.remove(&system);
                    add.insert(system);
                }
                "condition" | "conditions" if child.size() == 1 => self.conditions.load(child),
                _ if is_change_keyword(key) => self.changes.push(child.clone()),
                _ => {
                    self.conditions.add_line(child);
                }
            }
        }
    }

    /// Fire the event: write its conditions, update what the player knows,
    /// and hand back the universe changes for the caller to apply with the
    /// rest of the day's batch. A disabled event does nothing.
    pub fn apply(&self, player: &mut dyn PlayerContext) -> Vec<DataNode> {
        if self.disabled {
            return Vec::new();
        }
        self.conditions.apply(player.conditions_mut());
        if !self.name.is_empty() {
            player.conditions_mut().set(&format!("event: {}", self.name), 1);
        }
        for system in &self.systems_to_visit {
            player.visit_system(*system, true);
        }
        for system in &self.systems_to_unvisit {
            player.visit_system(*system, false);
        }
        for planet in &self.planets_to_visit {
            player.visit_planet(*planet, true);
        }
        for planet in &self.planets_to_unvisit {
            player.visit_planet(*planet, false);
        }
        self.changes.clone()
    }

    /// Names this event will define when it fires, as `(kind, name)`.
    pub fn deferred_definitions(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for change in &self.changes {
            match change.key() {
                "link" | "unlink" if change.size() >= 3 => {
                    out.push(("system".to_owned(), change.token(1).to_owned()));
                    out.push(("system".to_owned(), change.token(2).to_owned()));
                }
                "substitutions" => {}
                key if change.size() >= 2 => out.push((key.to_owned(), change.token(1).to_owned())),
                _ => {}
            }
            if change.key() == "system" {
                // Planets placed by a system change are defined along with it.
                for object in change.children().iter().filter(|c| c.key() == "object" && c.size() >= 2) {
                    out.push(("planet".to_owned(), object.token(1).to_owned()));
                }
            }
        }
        out
    }

    /// Write the event so that it can be reloaded as a pending event.
    pub fn save(&self, writer: &mut DataWriter, universe: &UniverseObjects) {
        if self.disabled {
            return;
        }
        writer.write(["event", self.name.as_str()]);
        writer.begin_child();
        if self.date.is_set() {
            writer.write([
                "date".to_owned(),
                self.date.day().to_string(),
                self.date.month().to_string(),
                self.date.year().to_string(),
            ]);
        }
        for system in &self.systems_to_visit {
            writer.write(["visit", universe.systems.name_of(*system)]);
        }
        for system in &self.systems_to_unvisit {
            writer.write(["unvisit", universe.systems.name_of(*system)]);
        }
        for planet in &self.planets_to_visit {
            writer.write(["visit", "planet", universe.planets.name_of(*planet)]);
        }
        for planet in &self.planets_to_unvisit {
            writer.write(["unvisit", "planet", universe.planets.name_of(*planet)]);
        }
        if !self.conditions.is_empty() {
            writer.write(["conditions"]);
            writer.begin_child();
            self.conditions.save(writer);
            writer.end_child();
        }
        for change in &self.changes {
            writer.write_node(change);
        }
        writer.end_child();
    }
}

fn to_i32(value: f64) -> i32 {
    i32::try_from(starloom_conditions::expression::to_i64(value)).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use starloom_data::DataFile;

    fn load(text: &str) -> GameEvent {
        let file = DataFile::parse(text, "t").unwrap();
        let mut systems = Set::new();
        let mut planets = Set::new();
        let mut event = GameEvent::default();
        event.load(&file.nodes()[0], &mut systems, &mut planets);
        event
    }

    #[test]
    fn children_are_sorted_into_parts() {
        let event = load(
            "event takeover\n\tdate 3 1 3013\n\tsystem Sol\n\t\tgovernment Pirate\n\
             \tlink Sol Alpha\n\tvisit Alpha\n\tvisit planet Earth\n\t\"pirates\" = 1\n\
             \tconditions\n\t\tset \"sol lost\"\n",
        );
        assert_eq!(event.name, "takeover");
        assert_eq!(event.date, Date::new(3, 1, 3013));
        assert_eq!(event.changes.len(), 2);
        assert_eq!(event.conditions.assignments().len(), 2);
        assert_eq!(event.systems_to_visit.len(), 1);
        assert_eq!(event.planets_to_visit.len(), 1);
    }

    #[test]
    fn deferred_definitions_name_changed_entities() {
        let event = load("event e\n\tsystem New\n\t\tobject Outpost\n\tlink A B\n\tfleet Raiders\n");
        let deferred = event.deferred_definitions();
        assert!(deferred.contains(&("system".to_owned(), "New".to_owned())));
        assert!(deferred.contains(&("planet".to_owned(), "Outpost".to_owned())));
        assert!(deferred.contains(&("system".to_owned(), "B".to_owned())));
        assert!(deferred.contains(&("fleet".to_owned(), "Raiders".to_owned())));
    }

    #[test]
    fn a_dated_event_survives_a_save() {
        let mut universe = UniverseObjects::new();
        universe
            .load_text(
                "event takeover\n\tdate 3 1 3013\n\tsystem Sol\n\t\tgovernment Pirate\n\tunlink Sol Alpha\n\
                 \tvisit Alpha\n\tunvisit planet Earth\n\t\"pirates\" = 1\n",
                "events.txt",
            )
            .unwrap();
        let event = universe.events.find_value("takeover").unwrap().clone();
        let mut writer = DataWriter::new();
        event.save(&mut writer, &universe);
        assert!(writer.as_str().contains("date 3 1 3013"), "{}", writer.as_str());

        let file = DataFile::parse(writer.as_str(), "saved.txt").unwrap();
        let mut reloaded = GameEvent::default();
        reloaded.load(&file.nodes()[0], &mut universe.systems, &mut universe.planets);
        assert_eq!(reloaded, event);

        let mut disabled = event;
        disabled.disabled = true;
        let mut empty = DataWriter::new();
        disabled.save(&mut empty, &universe);
        assert!(empty.as_str().is_empty());
    }

    #[test]
    fn every_change_keyword_applies_and_reverts() {
        const BASE: &str = "\
system Sol
\tgovernment Republic
\tlink Alpha
\tobject Earth
system Alpha
system Beta
planet Earth
\tdescription Blue.
government Republic
fleet Traders
\tgovernment Republic
shipyard Basics
\tHauler
outfitter Parts
\tLaser
ship Hauler
ship Sparrow
outfit Laser
outfit Engine
";
        type Check = fn(&UniverseObjects) -> bool;
        let cases: [(&str, Check); 12] = [
            ("fleet Traders\n\tgovernment Pirate\n", |u| {
                u.fleets.find_value("Traders").is_some_and(|f| f.government == u.governments.find("Pirate"))
            }),
            ("galaxy \"Milky Way\"\n\tpos 0 0\n", |u| u.record("galaxy", "Milky Way").is_some()),
            ("government Republic\n\t\"display name\" \"Free Worlds\"\n", |u| {
                u.governments.find_value("Republic").is_some_and(|g| g.display_name == "Free Worlds")
            }),
            ("link Alpha Beta\n", |u| {
                let beta = u.systems.find("Beta");
                u.systems.find_value("Alpha").is_some_and(|a| beta.is_some_and(|b| a.links.contains(&b)))
            }),
            ("news Gossip\n\tmessage\n\t\tword\n\t\t\tHello\n", |u| {
                u.news.find_value("Gossip").is_some_and(|n| n.message.is_some())
            }),
            ("outfitter Parts\n\tEngine\n", |u| {
                let engine = u.outfits.find("Engine");
                u.outfitters.find_value("Parts").is_some_and(|s| engine.is_some_and(|e| s.has(e)))
            }),
            ("planet Earth\n\tdescription Green.\n", |u| {
                u.planets.find_value("Earth").is_some_and(|p| p.description == "Green.")
            }),
            ("shipyard Basics\n\tSparrow\n", |u| {
                let sparrow = u.ships.find("Sparrow");
                u.shipyards.find_value("Basics").is_some_and(|s| sparrow.is_some_and(|m| s.has(m)))
            }),
            ("substitutions\n\t<weather> rain\n", |u| !u.substitutions.is_empty()),
            ("system Sol\n\tgovernment Pirate\n", |u| {
                u.systems.find_value("Sol").is_some_and(|s| s.government == u.governments.find("Pirate"))
            }),
            ("unlink Sol Alpha\n", |u| {
                let alpha = u.systems.find("Alpha");
                u.systems.find_value("Sol").is_some_and(|s| alpha.is_some_and(|a| !s.links.contains(&a)))
            }),
            ("wormhole Rift\n\tlink Sol Alpha\n", |u| u.record("wormhole", "Rift").is_some()),
        ];

        let mut defaults = UniverseObjects::new();
        defaults.load_text(BASE, "base.txt").unwrap();
        defaults.finish_loading();
        for (text, changed) in cases {
            let mut universe = defaults.clone();
            assert!(!changed(&universe), "already changed: {text}");
            let mut event = GameEvent::default();
            let mut definition = String::from("event change\n");
            for line in text.lines() {
                definition.push('\t');
                definition.push_str(line);
                definition.push('\n');
            }
            let file = DataFile::parse(&definition, "event.txt").unwrap();
            event.load(&file.nodes()[0], &mut universe.systems, &mut universe.planets);
            assert_eq!(event.changes.len(), 1, "{text}");

            universe.apply_changes(&event.changes);
            assert!(changed(&universe), "not applied: {text}");
            universe.revert(&defaults);
            assert!(!changed(&universe), "not reverted: {text}");
        }
    }
}
