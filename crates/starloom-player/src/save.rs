//! Saved games.
//!
//! A save file is an ordinary data file. Each top-level record holds one
//! part of the pilot; unknown records are reported and skipped so older
//! saves keep loading.
//!
//! # Invariants
//!
//! - Saving then loading against the same content gives back the same
//!   pilot: date, position, credits and debts, cargo, ships, missions,
//!   conditions, pending events and logbook.
//! - Universe changes made by events are saved with the pilot and replayed
//!   on load, before anything else reads the universe.

use std::cmp::Reverse;
use std::path::Path;

use starloom_conditions::expression::to_i64;
use starloom_data::{DataFile, DataNode, DataWriter};
use starloom_types::Date;
use starloom_universe::game_event::GameEvent;
use starloom_universe::{Mission, UniverseObjects};

use crate::calendar::PendingEvent;
use crate::error::SaveError;
use crate::fleet::PlayerShip;
use crate::player::PlayerInfo;

fn to_i32(value: f64) -> i32 {
    i32::try_from(to_i64(value)).unwrap_or(0)
}

fn date_tokens(date: &Date) -> [String; 3] {
    [date.day().to_string(), date.month().to_string(), date.year().to_string()]
}

impl PlayerInfo {
    // ------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------

    /// Write the pilot to `path`.
    pub fn save(&self, path: &Path, universe: &UniverseObjects) -> Result<(), SaveError> {
        let writer = self.to_writer(universe);
        writer.save(path).map_err(|source| SaveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), pilot = %self.name(), "game saved");
        Ok(())
    }

    /// The pilot as save-file text.
    pub fn to_save_text(&self, universe: &UniverseObjects) -> String {
        self.to_writer(universe).into_string()
    }

    fn to_writer(&self, universe: &UniverseObjects) -> DataWriter {
        let mut out = DataWriter::new();
        out.write_comment(&format!("Saved {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));
        out.write(["pilot", self.first_name.as_str(), self.last_name.as_str()]);
        if self.date.is_set() {
            let [day, month, year] = date_tokens(&self.date);
            out.write(["date".to_owned(), day, month, year]);
        }
        if let Some(system) = self.system {
            out.write(["system", universe.systems.name_of(system)]);
        }
        if let Some(planet) = self.planet {
            out.write(["planet", universe.planets.name_of(planet)]);
        }
        for system in &self.travel_plan {
            out.write(["travel", universe.systems.name_of(*system)]);
        }
        if let Some(planet) = self.travel_destination {
            out.write(["travel destination", universe.planets.name_of(planet)]);
        }

        self.politics.save(&mut out, universe);
        self.account.save(&mut out);
        self.cargo.save(&mut out, universe);
        for ship in &self.ships {
            ship.save(&mut out, universe);
        }

        for mission in &self.missions {
            mission.save(&mut out, "mission", universe);
        }
        for mission in &self.available_jobs {
            mission.save(&mut out, "available job", universe);
        }
        for mission in &self.available_missions {
            mission.save(&mut out, "available mission", universe);
        }

        self.conditions.save(&mut out);
        for event in self.pending_events() {
            event.save(&mut out, universe);
        }
        if !self.changes.is_empty() {
            out.write(["changes"]);
            out.begin_child();
            for change in &self.changes {
                out.write_node(change);
            }
            out.end_child();
        }

        for system in &self.visited_systems {
            out.write(["visited", universe.systems.name_of(*system)]);
        }
        for planet in &self.visited_planets {
            out.write(["visited planet", universe.planets.name_of(*planet)]);
        }
        for system in &self.marked {
            out.write(["marked", universe.systems.name_of(*system)]);
        }

        self.save_logbook(&mut out);
        out
    }

    fn save_logbook(&self, out: &mut DataWriter) {
        if self.logbook.is_empty() && self.special_logs.is_empty() {
            return;
        }
        out.write(["logbook"]);
        out.begin_child();
        for (date, text) in &self.logbook {
            out.write(date_tokens(date));
            out.begin_child();
            for line in text.split("\n\t") {
                out.write([line]);
            }
            out.end_child();
        }
        for (category, headings) in &self.special_logs {
            for (heading, text) in headings {
                out.write([category.as_str(), heading.as_str()]);
                out.begin_child();
                for line in text.split("\n\t") {
                    out.write([line]);
                }
                out.end_child();
            }
        }
        out.end_child();
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Read a pilot from `path`. Content must already be loaded; events
    /// recorded in the save change `universe` again.
    pub fn load(path: &Path, universe: &mut UniverseObjects, seed: u64) -> Result<Self, SaveError> {
        let file = DataFile::load(path).map_err(|source| SaveError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_nodes(file.nodes(), path, universe, seed)
    }

    /// Read a pilot from save-file text. `source` names it in errors.
    pub fn from_save_text(
        text: &str,
        source: &Path,
        universe: &mut UniverseObjects,
        seed: u64,
    ) -> Result<Self, SaveError> {
        let file = DataFile::parse(text, &source.display().to_string()).map_err(|error| SaveError::Parse {
            path: source.to_path_buf(),
            source: error,
        })?;
        Self::from_nodes(file.nodes(), source, universe, seed)
    }

    /// Read a pilot from the top-level records of a save file.
    pub fn from_nodes(
        nodes: &[DataNode],
        source: &Path,
        universe: &mut UniverseObjects,
        seed: u64,
    ) -> Result<Self, SaveError> {
        let missing = |what| SaveError::Missing {
            path: source.to_path_buf(),
            what,
        };
        let mut player = Self::new(seed);
        player.politics.reset(universe);
        let mut has_pilot = false;

        // Changes first: everything else may name what they create.
        for node in nodes.iter().filter(|n| n.key() == "changes") {
            universe.apply_changes(node.children());
            player.changes.extend(node.children().iter().cloned());
        }

        for node in nodes {
            let has = |n: usize| node.size() >= n;
            match node.key() {
                "pilot" if has(3) => {
                    node.token(1).clone_into(&mut player.first_name);
                    node.token(2).clone_into(&mut player.last_name);
                    has_pilot = true;
                }
                "date" if has(4) => {
                    player.date = Date::new(to_i32(node.value(1)), to_i32(node.value(2)), to_i32(node.value(3)));
                }
                "system" if has(2) => player.system = Some(universe.systems.get(node.token(1))),
                "planet" if has(2) => player.planet = Some(universe.planets.get(node.token(1))),
                "travel" if has(2) => player.travel_plan.push_back(universe.systems.get(node.token(1))),
                "travel destination" if has(2) => {
                    player.travel_destination = Some(universe.planets.get(node.token(1)));
                }
                "reputation with" => player.politics.load(node, universe),
                "account" => player.account.load(node),
                "cargo" => player.cargo.load(node, universe),
                "ship" if has(2) => player.ships.push(PlayerShip::load(node, universe)),
                "mission" | "available job" | "available mission" => {
                    let mut mission = Mission::default();
                    mission.load(node, universe);
                    mission.set_id(player.next_id());
                    match node.key() {
                        "mission" => {
                            mission.mark_accepted();
                            player.cargo.add_mission_cargo(&mission);
                            player.missions.push(mission);
                        }
                        "available job" => player.available_jobs.push(mission),
                        _ => player.available_missions.push(mission),
                    }
                }
                "conditions" => player.conditions.load(node),
                "event" => {
                    let mut event = GameEvent::default();
                    event.load(node, &mut universe.systems, &mut universe.planets);
                    let sequence = player.event_sequence;
                    player.event_sequence = sequence.saturating_add(1);
                    player.events.push(Reverse(PendingEvent {
                        date: event.date.clone(),
                        sequence,
                        event,
                    }));
                }
                "changes" => {}
                "visited" if has(2) => {
                    player.visited_systems.insert(universe.systems.get(node.token(1)));
                }
                "visited planet" if has(2) => {
                    player.visited_planets.insert(universe.planets.get(node.token(1)));
                }
                "marked" if has(2) => {
                    player.marked.insert(universe.systems.get(node.token(1)));
                }
                "logbook" => player.load_logbook(node),
                _ => {
                    node.print_trace("Skipping unrecognized attribute:");
                }
            }
        }

        if !has_pilot {
            return Err(missing("pilot"));
        }
        if !player.date.is_set() {
            return Err(missing("date"));
        }
        player.update_auto_conditions(universe);
        player.freshly_loaded = true;
        tracing::info!(
            path = %source.display(),
            pilot = %player.name(),
            date = %player.date,
            missions = player.missions.len(),
            "game loaded"
        );
        Ok(player)
    }

    fn load_logbook(&mut self, node: &DataNode) {
        for child in node.children() {
            let text = child
                .children()
                .iter()
                .map(|line| line.token(0))
                .collect::<Vec<_>>()
                .join("\n\t");
            if child.size() >= 3 && child.is_number(0) && child.is_number(1) && child.is_number(2) {
                let date = Date::new(to_i32(child.value(0)), to_i32(child.value(1)), to_i32(child.value(2)));
                self.logbook.push((date, text));
            } else if child.size() >= 2 {
                self.special_logs
                    .entry(child.token(0).to_owned())
                    .or_default()
                    .insert(child.token(1).to_owned(), text);
            } else {
                child.print_trace("Skipping unrecognized attribute:");
            }
        }
    }
}
