//! [`PlayerInfo`]: the pilot, and the one place runtime changes land.
//!
//! Content never owns the player. Missions, events and conversations act
//! through the [`PlayerContext`] implementation here, which keeps the
//! account, cargo, fleet and logbook consistent behind the trait.
//!
//! # Invariants
//!
//! - Mission instance ids are unique for the life of the pilot, across
//!   accepted, offered and finished missions.
//! - Derived conditions (`credits`, `reputation: <government>`, ...) are
//!   served by providers. They are never written to the plain condition map
//!   and never saved.
//! - While a mission's trigger runs, the mission is out of the mission list;
//!   requests it makes about other missions are applied once it is back.

use std::collections::{BTreeMap, BTreeSet, BinaryHeap, VecDeque};
use std::cmp::Reverse;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use starloom_conditions::{ConditionProvider, ConditionsStore, DerivedTable};
use starloom_core::Handle;
use starloom_data::DataNode;
use starloom_types::Date;
use starloom_universe::entities::{Outfit, Planet, ShipModel, StartConditions, System};
use starloom_universe::game_event::GameEvent;
use starloom_universe::{ActionOutcome, Mission, PlayerContext, Presentation, UniverseObjects};

use crate::account::{Account, DebtKind};
use crate::calendar::PendingEvent;
use crate::cargo::CargoHold;
use crate::fleet::PlayerShip;
use crate::politics::Politics;

/// Derived conditions that match one exact name.
const EXACT_CONDITIONS: [&str; 11] = [
    "credits",
    "net worth",
    "credit score",
    "unpaid mortgages",
    "unpaid fines",
    "unpaid salaries",
    "day",
    "month",
    "year",
    "cargo space",
    "passenger space",
];

/// Derived conditions covering every name with the prefix.
const PREFIX_CONDITIONS: [&str; 2] = [REPUTATION_PREFIX, "ships: "];

/// Derived reputation conditions. Writing one changes the reputation.
const REPUTATION_PREFIX: &str = "reputation: ";

/// A provider for one exact name, reading from the shared table.
struct ExactName {
    table: DerivedTable,
    name: &'static str,
}

impl ConditionProvider for ExactName {
    fn get(&self, name: &str) -> i64 {
        self.table.value(name)
    }

    fn has(&self, name: &str) -> bool {
        name == self.name
    }
}

/// Everything about the pilot.
#[derive(Debug)]
pub struct PlayerInfo {
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) date: Date,
    pub(crate) system: Option<Handle<System>>,
    pub(crate) planet: Option<Handle<Planet>>,
    pub(crate) conditions: ConditionsStore,
    pub(crate) derived: DerivedTable,
    pub(crate) account: Account,
    pub(crate) cargo: CargoHold,
    pub(crate) ships: Vec<PlayerShip>,
    pub(crate) politics: Politics,

    pub(crate) missions: Vec<Mission>,
    pub(crate) available_jobs: Vec<Mission>,
    pub(crate) available_missions: Vec<Mission>,
    pub(crate) boarding_missions: Vec<Mission>,
    pub(crate) done_missions: Vec<Mission>,
    pub(crate) next_mission_id: u64,
    pub(crate) fail_requests: Vec<String>,

    pub(crate) events: BinaryHeap<Reverse<PendingEvent>>,
    pub(crate) event_sequence: u64,
    pub(crate) changes: Vec<DataNode>,

    pub(crate) visited_systems: BTreeSet<Handle<System>>,
    pub(crate) visited_planets: BTreeSet<Handle<Planet>>,
    pub(crate) marked: BTreeSet<Handle<System>>,
    pub(crate) travel_plan: VecDeque<Handle<System>>,
    pub(crate) travel_destination: Option<Handle<Planet>>,

    pub(crate) logbook: Vec<(Date, String)>,
    pub(crate) special_logs: BTreeMap<String, BTreeMap<String, String>>,
    pub(crate) presentations: VecDeque<Presentation>,

    pub(crate) rng: StdRng,
    pub(crate) is_dead: bool,
    pub(crate) should_launch: bool,
    pub(crate) freshly_loaded: bool,
}

impl PlayerInfo {
    /// A pilot with nothing: no name, no date, no ships. `seed` drives
    /// every random choice the player makes.
    pub fn new(seed: u64) -> Self {
        let derived = DerivedTable::new();
        let mut conditions = ConditionsStore::new();
        for name in EXACT_CONDITIONS {
            let provider = ExactName {
                table: derived.clone(),
                name,
            };
            conditions.set_provider(name, Arc::new(provider));
        }
        for prefix in PREFIX_CONDITIONS {
            conditions.set_provider(prefix, Arc::new(derived.clone()));
        }
        Self {
            first_name: String::new(),
            last_name: String::new(),
            date: Date::default(),
            system: None,
            planet: None,
            conditions,
            derived,
            account: Account::new(),
            cargo: CargoHold::new(),
            ships: Vec::new(),
            politics: Politics::new(),
            missions: Vec::new(),
            available_jobs: Vec::new(),
            available_missions: Vec::new(),
            boarding_missions: Vec::new(),
            done_missions: Vec::new(),
            next_mission_id: 1,
            fail_requests: Vec::new(),
            events: BinaryHeap::new(),
            event_sequence: 0,
            changes: Vec::new(),
            visited_systems: BTreeSet::new(),
            visited_planets: BTreeSet::new(),
            marked: BTreeSet::new(),
            travel_plan: VecDeque::new(),
            travel_destination: None,
            logbook: Vec::new(),
            special_logs: BTreeMap::new(),
            presentations: VecDeque::new(),
            rng: StdRng::seed_from_u64(seed),
            is_dead: false,
            should_launch: false,
            freshly_loaded: false,
        }
    }

    /// A new pilot starting out under `start`.
    pub fn from_start(start: &StartConditions, universe: &UniverseObjects, first: &str, last: &str, seed: u64) -> Self {
        let mut player = Self::new(seed);
        first.clone_into(&mut player.first_name);
        last.clone_into(&mut player.last_name);
        player.date = start.date.clone();
        player.planet = start.planet;
        player.system = start
            .system
            .or_else(|| start.planet.and_then(|p| universe.planets.value(p)).and_then(|p| p.system));
        player.account.add_credits(start.credits);
        if start.mortgage > 0 {
            player.account.add_mortgage(start.mortgage);
        }
        start.conditions.apply(&mut player.conditions);
        for (model, name) in &start.ships {
            player.gift_ship(universe, *model, name);
        }
        player.politics.reset(universe);
        if let Some(system) = player.system {
            player.visited_systems.insert(system);
        }
        if let Some(planet) = player.planet {
            player.visited_planets.insert(planet);
        }
        player.update_auto_conditions(universe);
        if let Some(conversation) = start.conversation.as_ref().and_then(|c| c.resolve(universe)) {
            player.present(Presentation::Conversation {
                conversation: conversation.clone(),
                mission: None,
                is_offer: false,
            });
        }
        tracing::info!(
            pilot = %format!("{first} {last}"),
            date = %player.date,
            credits = player.account.credits(),
            "new pilot"
        );
        player
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Today's date.
    pub const fn today(&self) -> &Date {
        &self.date
    }

    /// The pilot's full name.
    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Rename the pilot.
    pub fn set_name(&mut self, first: &str, last: &str) {
        first.clone_into(&mut self.first_name);
        last.clone_into(&mut self.last_name);
    }

    /// Current system.
    pub const fn current_system(&self) -> Option<Handle<System>> {
        self.system
    }

    /// Planet the player is landed on.
    pub const fn current_planet(&self) -> Option<Handle<Planet>> {
        self.planet
    }

    /// The account.
    pub const fn account(&self) -> &Account {
        &self.account
    }

    /// The account, for paying off debts early.
    pub const fn account_mut(&mut self) -> &mut Account {
        &mut self.account
    }

    /// The fleet's shared cargo hold.
    pub const fn cargo(&self) -> &CargoHold {
        &self.cargo
    }

    /// The cargo hold, for trading.
    pub const fn cargo_mut(&mut self) -> &mut CargoHold {
        &mut self.cargo
    }

    /// Every ship the player owns. The first one is the flagship.
    pub fn ships(&self) -> &[PlayerShip] {
        &self.ships
    }

    /// Reputations and the day's diplomatic state.
    pub const fn politics(&self) -> &Politics {
        &self.politics
    }

    /// Politics, for changing.
    pub const fn politics_mut(&mut self) -> &mut Politics {
        &mut self.politics
    }

    /// Accepted missions, priority missions first.
    pub fn missions(&self) -> &[Mission] {
        &self.missions
    }

    /// An accepted mission by instance id.
    pub fn mission(&self, id: u64) -> Option<&Mission> {
        self.missions.iter().find(|m| m.id() == id)
    }

    /// Jobs on this planet's job board.
    pub fn available_jobs(&self) -> &[Mission] {
        &self.available_jobs
    }

    /// Missions waiting to be offered on this planet.
    pub fn available_missions(&self) -> &[Mission] {
        &self.available_missions
    }

    /// Missions that finished since the player last took off.
    pub fn done_missions(&self) -> &[Mission] {
        &self.done_missions
    }

    /// Whether the player has been to `system`.
    pub fn has_visited(&self, system: Handle<System>) -> bool {
        self.visited_systems.contains(&system)
    }

    /// Whether the player has landed on `planet`.
    pub fn has_visited_planet(&self, planet: Handle<Planet>) -> bool {
        self.visited_planets.contains(&planet)
    }

    /// Systems marked on the map by missions.
    pub const fn marked_systems(&self) -> &BTreeSet<Handle<System>> {
        &self.marked
    }

    /// Systems still to jump through, next first.
    pub const fn travel_plan(&self) -> &VecDeque<Handle<System>> {
        &self.travel_plan
    }

    /// Plan a route through `systems`, landing on `destination` at the end.
    pub fn set_travel_plan(&mut self, systems: Vec<Handle<System>>, destination: Option<Handle<Planet>>) {
        self.travel_plan = systems.into();
        self.travel_destination = destination;
    }

    /// Dated logbook entries, oldest first.
    pub fn logbook(&self) -> &[(Date, String)] {
        &self.logbook
    }

    /// Logbook entries filed by category and heading.
    pub const fn special_logs(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.special_logs
    }

    /// Universe changes applied so far, in order.
    pub fn changes(&self) -> &[DataNode] {
        &self.changes
    }

    /// Events still to come, soonest first.
    pub fn pending_events(&self) -> Vec<&GameEvent> {
        let mut pending: Vec<&PendingEvent> = self.events.iter().map(|Reverse(p)| p).collect();
        pending.sort();
        pending.into_iter().map(|p| &p.event).collect()
    }

    /// Hand everything queued for the presentation layer over, oldest
    /// first.
    pub fn take_presentations(&mut self) -> Vec<Presentation> {
        self.presentations.drain(..).collect()
    }

    /// Whether the pilot has died.
    pub const fn is_dead(&self) -> bool {
        self.is_dead
    }

    /// Whether a conversation outcome asked the player to take off now.
    /// Reading the flag clears it.
    pub const fn take_should_launch(&mut self) -> bool {
        let launch = self.should_launch;
        self.should_launch = false;
        launch
    }

    // ------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------

    pub(crate) const fn next_id(&mut self) -> u64 {
        let id = self.next_mission_id;
        self.next_mission_id = self.next_mission_id.saturating_add(1);
        id
    }

    /// Size the cargo hold to the ships that fly with the player. A pilot
    /// without ships has no limits.
    pub(crate) fn sync_capacity(&mut self) {
        let flying: Vec<_> = self.ships.iter().filter(|s| !s.parked).map(PlayerShip::capacity).collect();
        let bunks = flying.iter().fold(0_i64, |sum, c| sum.saturating_add(c.bunks));
        if flying.is_empty() {
            self.cargo.set_limits(None, None);
        } else {
            let cargo = flying.iter().fold(0_i64, |sum, c| sum.saturating_add(c.cargo));
            self.cargo.set_limits(Some(cargo), Some(bunks));
        }
        self.derived.set("cargo space", self.cargo.size().unwrap_or(0));
        self.derived.set("passenger space", bunks);
    }

    /// Daily salaries for every crew member but the pilot.
    pub(crate) fn crew_salaries(&self) -> i64 {
        let crew = self
            .ships
            .iter()
            .filter(|s| !s.parked)
            .fold(0_i64, |sum, s| sum.saturating_add(s.capacity().crew));
        crew.saturating_sub(1).max(0).saturating_mul(100)
    }

    /// Refresh the derived conditions that follow the account.
    pub(crate) fn refresh_account_conditions(&self) {
        let unpaid = |kind: DebtKind| {
            self.account
                .mortgages()
                .iter()
                .filter(|m| m.kind() == kind)
                .fold(0_i64, |sum, m| sum.saturating_add(m.principal()))
        };
        self.derived.set("credits", self.account.credits());
        self.derived.set("net worth", self.account.net_worth());
        self.derived.set("credit score", self.account.credit_score());
        self.derived.set("unpaid mortgages", unpaid(DebtKind::Mortgage));
        self.derived.set("unpaid fines", unpaid(DebtKind::Fine));
        self.derived.set("unpaid salaries", self.account.salaries_owed());
    }

    /// Recompute every derived condition.
    pub fn update_auto_conditions(&mut self, universe: &UniverseObjects) {
        let mut values = BTreeMap::new();
        for (name, government, _) in universe.governments.iter() {
            let reputation = starloom_conditions::expression::to_i64(self.politics.reputation(government));
            values.insert(format!("reputation: {name}"), reputation);
        }
        for ship in &self.ships {
            if let Some(model) = universe.ships.value(ship.model) {
                let entry = values.entry(format!("ships: {}", model.category)).or_insert(0_i64);
                *entry = entry.saturating_add(1);
            }
        }
        values.insert("day".to_owned(), i64::from(self.date.day()));
        values.insert("month".to_owned(), i64::from(self.date.month()));
        values.insert("year".to_owned(), i64::from(self.date.year()));
        self.derived.replace(values);
        self.refresh_account_conditions();
        self.sync_capacity();
    }

    /// Apply what a trigger asked for. `caller` is the mission that fired.
    pub(crate) fn apply_outcome(&mut self, caller: Option<u64>, outcome: ActionOutcome) {
        if outcome.fail_caller {
            if let Some(mission) = caller.and_then(|id| self.missions.iter_mut().find(|m| m.id() == id)) {
                mission.fail();
            }
        }
        for system in outcome.mark {
            self.marked.insert(system);
        }
        for system in &outcome.unmark {
            self.marked.remove(system);
        }
    }

    /// Catch up after an action ran: fail the missions it asked to fail
    /// and move reputation it wrote as conditions into politics. Other
    /// writes to derived conditions are dropped.
    pub(crate) fn settle(&mut self, universe: &UniverseObjects) {
        for name in std::mem::take(&mut self.fail_requests) {
            for mission in self.missions.iter_mut().filter(|m| m.identifier() == name) {
                mission.fail();
            }
        }

        let written = self.conditions.take_pending();
        if written.is_empty() {
            return;
        }
        for (name, value) in written {
            let Some(government) = name.strip_prefix(REPUTATION_PREFIX) else {
                tracing::warn!(condition = %name, value, "derived condition is read-only; write dropped");
                continue;
            };
            match universe.governments.find(government) {
                Some(government) => {
                    #[allow(clippy::cast_precision_loss)]
                    let value = value as f64;
                    self.politics.set_reputation(government, value, universe);
                }
                None => tracing::warn!(condition = %name, "reputation for an unknown government"),
            }
        }
        self.update_auto_conditions(universe);
    }
}

// ---------------------------------------------------------------------------
// PlayerContext
// ---------------------------------------------------------------------------

impl PlayerContext for PlayerInfo {
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
        self.account.credits()
    }

    fn add_credits(&mut self, amount: i64) {
        self.account.add_credits(amount);
        self.refresh_account_conditions();
    }

    fn add_fine(&mut self, amount: i64) {
        self.account.add_fine(amount);
        self.refresh_account_conditions();
    }

    fn add_debt(&mut self, amount: i64, interest: Option<f64>, term: i64) {
        self.account.add_debt(amount, interest, term);
        self.refresh_account_conditions();
    }

    fn outfit_count(&self, outfit: Handle<Outfit>) -> i64 {
        self.ships
            .iter()
            .fold(self.cargo.outfit(outfit), |sum, s| sum.saturating_add(s.outfit(outfit)))
    }

    fn gift_outfit(&mut self, universe: &UniverseObjects, outfit: Handle<Outfit>, count: i64) {
        if count > 0 {
            if let Some(flagship) = self.ships.first_mut() {
                flagship.add_outfit(outfit, count);
                flagship.refresh(universe);
            } else {
                self.cargo.add_outfit(outfit, count, &universe.outfits);
            }
        } else {
            let mut remaining = count.saturating_neg();
            remaining = remaining.saturating_sub(self.cargo.remove_outfit(outfit, remaining));
            for ship in &mut self.ships {
                if remaining <= 0 {
                    break;
                }
                remaining = remaining.saturating_sub(ship.remove_outfit(outfit, remaining));
                ship.refresh(universe);
            }
        }
        self.sync_capacity();
    }

    fn gift_ship(&mut self, universe: &UniverseObjects, model: Handle<ShipModel>, name: &str) {
        let mut ship = PlayerShip::new(model, name, universe);
        ship.system = self.system;
        ship.planet = self.planet;
        tracing::debug!(model = universe.ships.name_of(model), name, "ship gifted");
        self.ships.push(ship);
        self.sync_capacity();
    }

    fn take_ship(&mut self, model: Handle<ShipModel>, name: &str) -> bool {
        let found = self
            .ships
            .iter()
            .position(|s| s.model == model && (name.is_empty() || s.name == name));
        let Some(index) = found else {
            return false;
        };
        self.ships.remove(index);
        self.sync_capacity();
        true
    }

    fn has_ship(&self, model: Handle<ShipModel>, name: &str) -> bool {
        self.ships
            .iter()
            .any(|s| s.model == model && (name.is_empty() || s.name == name))
    }

    fn cargo_free(&self) -> i64 {
        self.cargo.free()
    }

    fn bunks_free(&self) -> i64 {
        self.cargo.bunks_free()
    }

    fn add_log_entry(&mut self, category: Option<(&str, &str)>, text: &str) {
        match category {
            None => self.logbook.push((self.date.clone(), text.to_owned())),
            Some((category, heading)) => {
                let entry = self
                    .special_logs
                    .entry(category.to_owned())
                    .or_default()
                    .entry(heading.to_owned())
                    .or_default();
                if !entry.is_empty() {
                    entry.push_str("\n\t");
                }
                entry.push_str(text);
            }
        }
    }

    fn queue_event(&mut self, mut event: GameEvent, date: Date) {
        event.date = date.clone();
        let sequence = self.event_sequence;
        self.event_sequence = self.event_sequence.saturating_add(1);
        tracing::debug!(event = %event.name, %date, "event queued");
        self.events.push(Reverse(PendingEvent { date, sequence, event }));
    }

    fn fail_mission(&mut self, name: &str) {
        self.fail_requests.push(name.to_owned());
    }

    fn visit_system(&mut self, system: Handle<System>, visited: bool) {
        if visited {
            self.visited_systems.insert(system);
        } else {
            self.visited_systems.remove(&system);
        }
    }

    fn visit_planet(&mut self, planet: Handle<Planet>, visited: bool) {
        if visited {
            self.visited_planets.insert(planet);
        } else {
            self.visited_planets.remove(&planet);
        }
    }

    fn present(&mut self, presentation: Presentation) {
        self.presentations.push_back(presentation);
    }

    fn first_name(&self) -> String {
        self.first_name.clone()
    }

    fn last_name(&self) -> String {
        self.last_name.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn universe() -> UniverseObjects {
        let mut universe = UniverseObjects::new();
        universe
            .load_text(
                "government Republic\n\t\"player reputation\" 12\n\
                 system Sol\n\tobject Earth\nplanet Earth\n\tspaceport `Docks.`\n\
                 outfit Pod\n\t\"cargo space\" 10\n\
                 ship Hauler\n\tattributes\n\t\tcategory \"Light Freighter\"\n\t\t\"cargo space\" 20\n\t\tbunks 3\n\t\t\"required crew\" 1\n\
                 start\n\tdate 16 11 3013\n\tsystem Sol\n\tplanet Earth\n\taccount\n\t\tcredits 5000\n\t\tmortgage\n\t\t\tprincipal 100000\n\
                 \tconditions\n\t\t\"intro done\"\n\tship Hauler \"Dray\"\n",
                "player",
            )
            .unwrap();
        universe.finish_loading();
        universe
    }

    fn pilot(universe: &UniverseObjects) -> PlayerInfo {
        let start = universe.starts.find_value("").unwrap();
        PlayerInfo::from_start(start, universe, "Ada", "Reyes", 7)
    }

    #[test]
    fn starting_pilot_takes_everything_from_the_start() {
        let universe = universe();
        let player = pilot(&universe);
        assert_eq!(player.today(), &Date::new(16, 11, 3013));
        assert_eq!(player.current_system(), universe.systems.find("Sol"));
        assert_eq!(player.credits(), 105_000);
        assert_eq!(player.ships().len(), 1);
        assert_eq!(player.conditions().get("intro done"), 1);
        assert!(player.has_visited(universe.systems.find("Sol").unwrap()));
    }

    #[test]
    fn derived_conditions_track_the_player() {
        let universe = universe();
        let mut player = pilot(&universe);
        assert_eq!(player.conditions().get("credits"), 105_000);
        assert_eq!(player.conditions().get("reputation: Republic"), 12);
        assert_eq!(player.conditions().get("ships: Light Freighter"), 1);
        assert_eq!(player.conditions().get("year"), 3013);
        assert_eq!(player.conditions().get("cargo space"), 20);
        assert_eq!(player.conditions().get("unpaid mortgages"), 100_000);

        player.add_credits(-5000);
        assert_eq!(player.conditions().get("credits"), 100_000);
        assert_eq!(player.conditions().primary("credits"), None);
        player.conditions_mut().set("credits earned", 3);
        assert_eq!(player.conditions().get("credits earned"), 3);
    }

    #[test]
    fn gifted_outfits_enlarge_the_hold() {
        let universe = universe();
        let mut player = pilot(&universe);
        let pod = universe.outfits.find("Pod").unwrap();
        player.gift_outfit(&universe, pod, 2);
        assert_eq!(player.outfit_count(pod), 2);
        assert_eq!(player.cargo_free(), 40);
        player.gift_outfit(&universe, pod, -1);
        assert_eq!(player.outfit_count(pod), 1);
        assert_eq!(player.cargo_free(), 30);
    }

    #[test]
    fn ships_come_and_go() {
        let universe = universe();
        let mut player = pilot(&universe);
        let hauler = universe.ships.find("Hauler").unwrap();
        player.gift_ship(&universe, hauler, "Second");
        assert_eq!(player.cargo_free(), 40);
        assert!(player.take_ship(hauler, "Second"));
        assert!(!player.take_ship(hauler, "Second"));
        assert!(player.has_ship(hauler, ""));
        assert_eq!(player.cargo_free(), 20);
    }

    #[test]
    fn special_log_entries_append() {
        let universe = universe();
        let mut player = pilot(&universe);
        player.add_log_entry(Some(("People", "Ada")), "Met her.");
        player.add_log_entry(Some(("People", "Ada")), "Again.");
        player.add_log_entry(None, "A day.");
        assert_eq!(player.special_logs()["People"]["Ada"], "Met her.\n\tAgain.");
        assert_eq!(player.logbook().len(), 1);
    }
}
