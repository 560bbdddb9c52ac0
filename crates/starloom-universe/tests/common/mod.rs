//! A minimal [`PlayerContext`] for exercising content without the player
//! crate.

#![allow(dead_code, clippy::unwrap_used, clippy::indexing_slicing)]

use std::collections::BTreeMap;

use starloom_conditions::ConditionsStore;
use starloom_core::Handle;
use starloom_data::DataFile;
use starloom_types::Date;
use starloom_universe::entities::{Outfit, Planet, ShipModel, System};
use starloom_universe::game_event::GameEvent;
use starloom_universe::{PlayerContext, Presentation, UniverseObjects};

/// Records everything the runtime asks of it.
#[derive(Debug, Default)]
pub struct StubPlayer {
    pub date: Date,
    pub conditions: ConditionsStore,
    pub system: Option<Handle<System>>,
    pub planet: Option<Handle<Planet>>,
    pub credits: i64,
    pub fines: i64,
    pub outfits: BTreeMap<Handle<Outfit>, i64>,
    pub ships: Vec<(Handle<ShipModel>, String)>,
    pub cargo_free: i64,
    pub bunks_free: i64,
    pub log: Vec<String>,
    pub queued: Vec<(GameEvent, Date)>,
    pub failed: Vec<String>,
    pub presented: Vec<Presentation>,
}

impl StubPlayer {
    pub fn new() -> Self {
        Self {
            date: Date::new(16, 11, 3013),
            cargo_free: 100,
            bunks_free: 10,
            ..Self::default()
        }
    }
}

impl PlayerContext for StubPlayer {
    fn date(&self) -> Date {
        self.date.clone()
    }
    fn conditions(&self) -> &ConditionsStore {
        &self.conditions
    }
    fn conditions_mut(&mut self) -> &mut ConditionsStore {
        &mut self.conditions
    }
    fn system(&self) -> Option<Handle<System>> {
        self.system
    }
    fn planet(&self) -> Option<Handle<Planet>> {
        self.planet
    }
    fn credits(&self) -> i64 {
        self.credits
    }
    fn add_credits(&mut self, amount: i64) {
        self.credits = self.credits.saturating_add(amount);
    }
    fn add_fine(&mut self, amount: i64) {
        self.fines = self.fines.saturating_add(amount);
    }
    fn add_debt(&mut self, amount: i64, _interest: Option<f64>, _term: i64) {
        self.credits = self.credits.saturating_add(amount);
    }
    fn outfit_count(&self, outfit: Handle<Outfit>) -> i64 {
        self.outfits.get(&outfit).copied().unwrap_or(0)
    }
    fn gift_outfit(&mut self, _universe: &UniverseObjects, outfit: Handle<Outfit>, count: i64) {
        let entry = self.outfits.entry(outfit).or_default();
        *entry = entry.saturating_add(count).max(0);
    }
    fn gift_ship(&mut self, _universe: &UniverseObjects, model: Handle<ShipModel>, name: &str) {
        self.ships.push((model, name.to_owned()));
    }
    fn take_ship(&mut self, model: Handle<ShipModel>, name: &str) -> bool {
        let found = self
            .ships
            .iter()
            .position(|(m, n)| *m == model && (name.is_empty() || n == name));
        found.map(|i| self.ships.remove(i)).is_some()
    }
    fn has_ship(&self, model: Handle<ShipModel>, name: &str) -> bool {
        self.ships.iter().any(|(m, n)| *m == model && (name.is_empty() || n == name))
    }
    fn cargo_free(&self) -> i64 {
        self.cargo_free
    }
    fn bunks_free(&self) -> i64 {
        self.bunks_free
    }
    fn add_log_entry(&mut self, _category: Option<(&str, &str)>, text: &str) {
        self.log.push(text.to_owned());
    }
    fn queue_event(&mut self, event: GameEvent, date: Date) {
        self.queued.push((event, date));
    }
    fn fail_mission(&mut self, name: &str) {
        self.failed.push(name.to_owned());
    }
    fn visit_system(&mut self, _system: Handle<System>, _visited: bool) {}
    fn visit_planet(&mut self, _planet: Handle<Planet>, _visited: bool) {}
    fn present(&mut self, presentation: Presentation) {
        self.presented.push(presentation);
    }
    fn first_name(&self) -> String {
        "Ada".to_owned()
    }
    fn last_name(&self) -> String {
        "Reyes".to_owned()
    }
}

/// Load `text` into a fresh universe and finish loading.
pub fn universe(text: &str) -> UniverseObjects {
    let mut universe = UniverseObjects::new();
    universe.load_text(text, "test.txt").unwrap();
    universe.finish_loading();
    universe
}

/// The first root node of `text`.
pub fn node(text: &str) -> starloom_data::DataNode {
    DataFile::parse(text, "test").unwrap().nodes()[0].clone()
}
