//! [`Mission`]: templates loaded from content, instances the player holds.
//!
//! A template is turned into an instance by [`Mission::instantiate`], which
//! picks concrete places, rolls cargo and passenger counts, computes the
//! deadline and expands every text. Instances are what [`Mission::save`]
//! writes; reloading a saved instance goes through the same [`Mission::load`].
//!
//! # Invariants
//!
//! - Once `complete`, `fail` or `abort` has fired, every later trigger is a
//!   no-op.
//! - A trigger whose action cannot be done changes nothing.
//! - Each `on enter` action runs at most once per instance.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use starloom_conditions::ConditionSet;
use starloom_core::Handle;
use starloom_data::{DataNode, DataWriter};
use starloom_types::{Date, MissionLocation, MissionTrigger, ShipEvents};

use crate::context::{PlayerContext, Presentation, ShipSummary};
use crate::entities::{Planet, System};
use crate::game_action::ActionOutcome;
use crate::location_filter::LocationFilter;
use crate::mission_action::MissionAction;
use crate::npc::Npc;
use crate::text_replacements::{Substitutions, join_list, replace};
use crate::universe::UniverseObjects;

/// What a fired trigger asks of the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fired {
    /// Side effects of the action on other missions.
    pub outcome: ActionOutcome,
    /// An offer with nothing to show: accept it immediately.
    pub accept_now: bool,
}

/// Which `on enter` action has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Entered {
    System(Handle<System>),
    Generic(usize),
}

/// A mission template or instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Mission {
    name: String,
    display_name: String,
    description: String,
    blocked: String,
    id: u64,

    deadline: Date,
    deadline_base: i64,
    deadline_multiplier: i64,

    cargo: String,
    cargo_size: i64,
    cargo_limit: i64,
    cargo_prob: f64,
    passengers: i64,
    passenger_limit: i64,
    passenger_prob: f64,
    illegal_fine: i64,
    illegal_message: String,
    stealth: bool,

    visible: bool,
    priority: bool,
    minor: bool,
    autosave: bool,
    location: MissionLocation,
    repeat: i64,
    clearance: String,
    clearance_filter: LocationFilter,
    full_clearance: bool,
    failed: bool,
    accepted: bool,
    finished: Option<MissionTrigger>,

    to_offer: ConditionSet,
    to_accept: ConditionSet,
    to_complete: ConditionSet,
    to_fail: ConditionSet,

    source: Option<Handle<Planet>>,
    source_filter: LocationFilter,
    destination: Option<Handle<Planet>>,
    destination_filter: LocationFilter,
    waypoints: BTreeSet<Handle<System>>,
    visited_waypoints: BTreeSet<Handle<System>>,
    waypoint_filters: Vec<LocationFilter>,
    stopovers: BTreeSet<Handle<Planet>>,
    visited_stopovers: BTreeSet<Handle<Planet>>,
    stopover_filters: Vec<LocationFilter>,

    npcs: Vec<Npc>,
    actions: BTreeMap<MissionTrigger, MissionAction>,
    on_enter: BTreeMap<Handle<System>, MissionAction>,
    generic_on_enter: Vec<MissionAction>,
    did_enter: BTreeSet<Entered>,
}

impl Default for Mission {
    fn default() -> Self {
        Self {
            name: String::new(),
            display_name: String::new(),
            description: String::new(),
            blocked: String::new(),
            id: 0,
            deadline: Date::default(),
            deadline_base: 0,
            deadline_multiplier: 0,
            cargo: String::new(),
            cargo_size: 0,
            cargo_limit: 0,
            cargo_prob: 0.,
            passengers: 0,
            passenger_limit: 0,
            passenger_prob: 0.,
            illegal_fine: 0,
            illegal_message: String::new(),
            stealth: false,
            visible: true,
            priority: false,
            minor: false,
            autosave: false,
            location: MissionLocation::Spaceport,
            repeat: 1,
            clearance: String::new(),
            clearance_filter: LocationFilter::default(),
            full_clearance: true,
            failed: false,
            accepted: false,
            finished: None,
            to_offer: ConditionSet::new(),
            to_accept: ConditionSet::new(),
            to_complete: ConditionSet::new(),
            to_fail: ConditionSet::new(),
            source: None,
            source_filter: LocationFilter::default(),
            destination: None,
            destination_filter: LocationFilter::default(),
            waypoints: BTreeSet::new(),
            visited_waypoints: BTreeSet::new(),
            waypoint_filters: Vec::new(),
            stopovers: BTreeSet::new(),
            visited_stopovers: BTreeSet::new(),
            stopover_filters: Vec::new(),
            npcs: Vec::new(),
            actions: BTreeMap::new(),
            on_enter: BTreeMap::new(),
            generic_on_enter: Vec::new(),
            did_enter: BTreeSet::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Mission {
    /// Load a `mission <name>` block, from content or from a saved game.
    /// Missions do not merge: a second definition of the same name is
    /// reported and ignored.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        if node.size() < 2 {
            node.print_trace("No name specified for mission:");
            return;
        }
        if !self.name.is_empty() {
            node.print_trace("Duplicate definition of mission:");
            return;
        }
        node.token(1).clone_into(&mut self.name);

        for child in node.children() {
            let key = child.key();
            let size = child.size();
            match key {
                "name" if size >= 2 => child.token(1).clone_into(&mut self.display_name),
                "description" if size >= 2 => child.token(1).clone_into(&mut self.description),
                "blocked" if size >= 2 => child.token(1).clone_into(&mut self.blocked),
                "deadline" if size >= 4 => {
                    self.deadline = Date::new(int(child.value(1)), int(child.value(2)), int(child.value(3)));
                }
                "deadline" => {
                    if size == 1 {
                        self.deadline_multiplier = self.deadline_multiplier.saturating_add(2);
                    }
                    if size >= 2 {
                        self.deadline_base = self.deadline_base.saturating_add(to_i64(child.value(1)));
                    }
                    if size >= 3 {
                        self.deadline_multiplier = self.deadline_multiplier.saturating_add(to_i64(child.value(2)));
                    }
                }
                "cargo" if size >= 3 => {
                    child.token(1).clone_into(&mut self.cargo);
                    self.cargo_size = to_i64(child.value(2));
                    if size >= 4 {
                        self.cargo_limit = to_i64(child.value(3));
                    }
                    if size >= 5 {
                        self.cargo_prob = child.value(4);
                    }
                    for grand in child.children() {
                        if self.parse_contraband(grand) {
                            grand.print_trace("Warning: \"stealth\" and \"illegal\" are now mission-level properties:");
                        } else {
                            grand.print_trace("Skipping unrecognized attribute:");
                        }
                    }
                }
                "passengers" if size >= 2 => {
                    self.passengers = to_i64(child.value(1));
                    if size >= 3 {
                        self.passenger_limit = to_i64(child.value(2));
                    }
                    if size >= 4 {
                        self.passenger_prob = child.value(3);
                    }
                }
                "illegal" | "stealth" => {
                    if !self.parse_contraband(child) {
                        child.print_trace("Skipping unrecognized attribute:");
                    }
                }
                "invisible" => self.visible = false,
                "priority" => self.priority = true,
                "minor" => self.minor = true,
                "autosave" => self.autosave = true,
                "repeat" => self.repeat = if size == 1 { 0 } else { to_i64(child.value(1)) },
                "clearance" => {
                    self.clearance = if size == 1 { "auto".to_owned() } else { child.token(1).to_owned() };
                    if child.has_children() {
                        self.clearance_filter.load(child, universe);
                    }
                }
                "infiltrating" => self.full_clearance = false,
                "failed" => self.failed = true,
                "to" if size >= 2 => match child.token(1) {
                    "offer" => self.to_offer.load(child),
                    "accept" => self.to_accept.load(child),
                    "complete" => self.to_complete.load(child),
                    "fail" => self.to_fail.load(child),
                    _ => {
                        child.print_trace("Skipping unrecognized attribute:");
                    }
                },
                "source" if size >= 2 => {
                    self.source = Some(universe.planets.get(child.token(1)));
                    mixed_specificity(child, "planet", 2);
                }
                "source" => self.source_filter.load(child, universe),
                "destination" if size == 2 => {
                    self.destination = Some(universe.planets.get(child.token(1)));
                    mixed_specificity(child, "planet", 2);
                }
                "destination" => self.destination_filter.load(child, universe),
                "waypoint" if size >= 2 => {
                    let visited = size >= 3 && child.token(2) == "visited";
                    let system = universe.systems.get(child.token(1));
                    if visited {
                        self.visited_waypoints.insert(system);
                    } else {
                        self.waypoints.insert(system);
                    }
                    mixed_specificity(child, "system", 2 + usize::from(visited));
                }
                "waypoint" if child.has_children() => {
                    self.waypoint_filters.push(LocationFilter::from_node(child, universe));
                }
                "stopover" if size >= 2 => {
                    let visited = size >= 3 && child.token(2) == "visited";
                    let planet = universe.planets.get(child.token(1));
                    if visited {
                        self.visited_stopovers.insert(planet);
                    } else {
                        self.stopovers.insert(planet);
                    }
                    mixed_specificity(child, "planet", 2 + usize::from(visited));
                }
                "stopover" if child.has_children() => {
                    self.stopover_filters.push(LocationFilter::from_node(child, universe));
                }
                "npc" => self.npcs.push(Npc::load(child, universe)),
                "on" if size >= 2 && child.token(1) == "enter" => {
                    let action = MissionAction::load(child, universe);
                    match action.system {
                        Some(system) => {
                            self.on_enter.insert(system, action);
                        }
                        None => self.generic_on_enter.push(action),
                    }
                }
                "on" if size >= 2 => match MissionTrigger::from_token(child.token(1)) {
                    Some(trigger) => {
                        self.actions.insert(trigger, MissionAction::load(child, universe));
                    }
                    None => {
                        child.print_trace("Skipping unrecognized attribute:");
                    }
                },
                _ => match MissionLocation::from_token(key).filter(|_| size == 1) {
                    Some(location) => self.location = location,
                    None => {
                        child.print_trace("Skipping unrecognized attribute:");
                    }
                },
            }
        }

        if self.display_name.is_empty() {
            self.display_name.clone_from(&self.name);
        }
    }

    fn parse_contraband(&mut self, node: &DataNode) -> bool {
        match (node.key(), node.size()) {
            ("illegal", 2) => self.illegal_fine = to_i64(node.value(1)),
            ("illegal", 3) => {
                self.illegal_fine = to_i64(node.value(1));
                node.token(2).clone_into(&mut self.illegal_message);
            }
            ("stealth", _) => self.stealth = true,
            _ => return false,
        }
        true
    }
}

fn mixed_specificity(node: &DataNode, kind: &str, expected: usize) {
    if node.size() > expected {
        node.print_trace(&format!("Warning: use a location filter to choose from multiple {kind}s:"));
    }
    if node.has_children() {
        node.print_trace(&format!("Warning: location filter ignored due to use of explicit {kind}:"));
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl Mission {
    /// The identifier used in condition names. Never substituted.
    pub fn identifier(&self) -> &str {
        &self.name
    }

    /// The name shown to the player.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The description shown in the mission list.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Instance id, assigned by the player when the instance is created.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Assign the instance id.
    pub const fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    /// Whether the mission appears in the mission list.
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether this mission suppresses ordinary offers.
    pub const fn has_priority(&self) -> bool {
        self.priority
    }

    /// Whether this mission is only offered when nothing else is.
    pub const fn is_minor(&self) -> bool {
        self.minor
    }

    /// Whether accepting should trigger an autosave.
    pub const fn recommends_autosave(&self) -> bool {
        self.autosave
    }

    /// Where the mission is offered.
    pub const fn location(&self) -> MissionLocation {
        self.location
    }

    /// Whether the mission can only be taken once at a time.
    pub const fn is_unique(&self) -> bool {
        self.repeat == 1
    }

    /// Planet the mission ends on.
    pub const fn destination(&self) -> Option<Handle<Planet>> {
        self.destination
    }

    /// Systems still to pass through.
    pub const fn waypoints(&self) -> &BTreeSet<Handle<System>> {
        &self.waypoints
    }

    /// Planets still to land on.
    pub const fn stopovers(&self) -> &BTreeSet<Handle<Planet>> {
        &self.stopovers
    }

    /// Mission cargo name.
    pub fn cargo(&self) -> &str {
        &self.cargo
    }

    /// Mission cargo in tons.
    pub const fn cargo_size(&self) -> i64 {
        self.cargo_size
    }

    /// Passenger count.
    pub const fn passengers(&self) -> i64 {
        self.passengers
    }

    /// Fine for carrying this cargo if scanned, and the message shown.
    pub fn illegal_cargo(&self) -> (i64, &str) {
        (self.illegal_fine, &self.illegal_message)
    }

    /// Whether being scanned fails the mission.
    pub const fn fails_if_discovered(&self) -> bool {
        self.stealth
    }

    /// The deadline, unset when there is none.
    pub const fn deadline(&self) -> &Date {
        &self.deadline
    }

    /// The NPCs.
    pub fn npcs(&self) -> &[Npc] {
        &self.npcs
    }

    /// The action bound to `trigger`.
    pub fn action(&self, trigger: MissionTrigger) -> Option<&MissionAction> {
        self.actions.get(&trigger)
    }

    /// The terminal trigger that has fired, if any.
    pub const fn finished(&self) -> Option<MissionTrigger> {
        self.finished
    }

    /// The first content this mission uses that is not fully defined.
    pub fn validate(&self, universe: &UniverseObjects) -> Option<String> {
        let planets = self.source.iter().chain(&self.destination).chain(&self.stopovers);
        if let Some(planet) = planets.into_iter().find(|p| !universe.planets.is_defined(**p)) {
            return Some(format!("planet \"{}\"", universe.planets.name_of(*planet)));
        }
        if let Some(system) = self.waypoints.iter().find(|s| !universe.systems.is_defined(**s)) {
            return Some(format!("system \"{}\"", universe.systems.name_of(*system)));
        }
        if let Some(system) = self.on_enter.keys().find(|s| !universe.systems.is_defined(**s)) {
            return Some(format!("system \"{}\"", universe.systems.name_of(*system)));
        }
        self.actions
            .values()
            .chain(self.on_enter.values())
            .chain(&self.generic_on_enter)
            .find_map(|action| action.validate(universe))
            .or_else(|| self.npcs.iter().find_map(|npc| npc.validate(universe)))
    }

    /// Whether everything this mission refers to exists.
    pub fn is_valid(&self, universe: &UniverseObjects) -> bool {
        self.validate(universe).is_none()
    }

    /// Whether the mission may be offered now. For boarding and assisting
    /// missions, `boarding` is the ship in question.
    pub fn can_offer(
        &self,
        player: &dyn PlayerContext,
        boarding: Option<&ShipSummary>,
        universe: &UniverseObjects,
    ) -> bool {
        if matches!(self.location, MissionLocation::Boarding | MissionLocation::Assisting) {
            let Some(ship) = boarding else {
                return false;
            };
            if !self.source_filter.is_empty() && !self.source_filter.matches_ship(ship.government, ship.system, universe) {
                return false;
            }
        } else {
            let planet = player.planet();
            if self.source.is_some() && self.source != planet {
                return false;
            }
            if !self.source_filter.is_empty()
                && !planet.is_some_and(|p| self.source_filter.matches_planet(p, None, universe))
            {
                return false;
            }
        }

        let store = player.conditions();
        if !self.to_offer.test(store) {
            return false;
        }
        if !self.to_fail.is_empty() && self.to_fail.test(store) {
            return false;
        }
        if self.repeat != 0 && store.get(&format!("{}: offered", self.name)) >= self.repeat {
            return false;
        }
        [MissionTrigger::Offer, MissionTrigger::Accept, MissionTrigger::Decline]
            .iter()
            .filter_map(|t| self.actions.get(t))
            .all(|action| action.can_be_done(player, universe))
    }

    /// Whether the player has room for the cargo and passengers.
    pub fn has_space(&self, player: &dyn PlayerContext) -> bool {
        self.cargo_size <= player.cargo_free() && self.passengers <= player.bunks_free()
    }

    /// Whether an offered mission may be accepted.
    pub fn can_accept(&self, player: &dyn PlayerContext) -> bool {
        self.to_accept.test(player.conditions()) && self.has_space(player)
    }

    /// Whether landing here completes the mission.
    pub fn can_complete(&self, player: &dyn PlayerContext, universe: &UniverseObjects) -> bool {
        player.planet().is_some() && player.planet() == self.destination && self.is_satisfied(player, universe)
    }

    /// Whether everything but reaching the destination is done.
    pub fn is_satisfied(&self, player: &dyn PlayerContext, universe: &UniverseObjects) -> bool {
        if !self.waypoints.is_empty() || !self.stopovers.is_empty() {
            return false;
        }
        if !self.to_complete.test(player.conditions()) {
            return false;
        }
        if self
            .actions
            .get(&MissionTrigger::Complete)
            .is_some_and(|action| !action.can_be_done(player, universe))
        {
            return false;
        }
        let system = player.system();
        self.npcs.iter().all(|npc| npc.has_succeeded(system))
    }

    /// Whether the mission has failed, by condition, by NPC or by mark.
    pub fn has_failed(&self, player: &dyn PlayerContext) -> bool {
        (!self.to_fail.is_empty() && self.to_fail.test(player.conditions()))
            || self.npcs.iter().any(Npc::has_failed)
            || self.failed
    }

    /// Whether the mission has been marked failed.
    pub const fn is_failed(&self) -> bool {
        self.failed
    }

    /// Mark the mission failed.
    pub const fn fail(&mut self) {
        self.failed = true;
    }

    /// Whether ACCEPT has fired for this instance.
    pub const fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Mark an instance as already accepted, as when it is read back from
    /// a saved game.
    pub const fn mark_accepted(&mut self) {
        self.accepted = true;
    }

    /// Mark the mission failed if its deadline is before `today`. Returns
    /// whether it was newly marked.
    pub fn check_deadline(&mut self, today: &Date) -> bool {
        if !self.failed && self.deadline.is_set() && self.deadline < *today {
            self.failed = true;
            return true;
        }
        false
    }

    /// Whether this mission grants landing clearance on `planet`.
    pub fn has_clearance(&self, planet: Handle<Planet>, universe: &UniverseObjects) -> bool {
        if self.clearance.is_empty() {
            return false;
        }
        if self.destination == Some(planet) || self.stopovers.contains(&planet) || self.visited_stopovers.contains(&planet)
        {
            return true;
        }
        !self.clearance_filter.is_empty() && self.clearance_filter.matches_planet(planet, None, universe)
    }

    /// The hail text for clearance; `auto` needs no hail.
    pub fn clearance_message(&self) -> &str {
        &self.clearance
    }

    /// Whether clearance includes the planet's services.
    pub const fn has_full_clearance(&self) -> bool {
        self.full_clearance
    }

    /// The message explaining that the player lacks room for this mission.
    /// Returned once; later calls give `None`.
    pub fn blocked_message(&mut self, player: &dyn PlayerContext) -> Option<String> {
        if self.blocked.is_empty() {
            return None;
        }
        let cargo_needed = self.cargo_size.saturating_sub(player.cargo_free());
        let bunks_needed = self.passengers.saturating_sub(player.bunks_free());
        if cargo_needed <= 0 && bunks_needed <= 0 {
            return None;
        }
        let mut capacity = Vec::new();
        if bunks_needed > 0 {
            capacity.push(if bunks_needed == 1 { "another bunk".to_owned() } else { format!("{bunks_needed} more bunks") });
        }
        if cargo_needed > 0 {
            capacity.push(if cargo_needed == 1 {
                "another ton of cargo space".to_owned()
            } else {
                format!("{cargo_needed} more tons of cargo space")
            });
        }
        let mut subs = Substitutions::new();
        subs.insert("<first>".to_owned(), player.first_name());
        subs.insert("<last>".to_owned(), player.last_name());
        subs.insert("<capacity>".to_owned(), capacity.join(" and "));
        let message = replace(&self.blocked, &subs);
        self.blocked.clear();
        Some(message)
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

impl Mission {
    /// Fire `trigger`. Returns `None` when nothing happened: the mission
    /// is already finished, a stopover trigger is not for this planet or
    /// not the last one, or the bound action cannot be done.
    pub fn do_trigger(
        &mut self,
        trigger: MissionTrigger,
        player: &mut dyn PlayerContext,
        universe: &UniverseObjects,
    ) -> Option<Fired> {
        if self.finished.is_some() || (trigger == MissionTrigger::Accept && self.accepted) {
            return None;
        }
        if trigger == MissionTrigger::Stopover {
            let planet = player.planet()?;
            if !self.stopovers.contains(&planet) {
                return None;
            }
            let system = player.system();
            if self.npcs.iter().any(|npc| npc.is_left_behind(system)) {
                player.present(Presentation::Message(
                    "This is a stop for one of your missions, but you have left a ship behind.".to_owned(),
                ));
                return None;
            }
            self.stopovers.remove(&planet);
            self.visited_stopovers.insert(planet);
            if !self.stopovers.is_empty() {
                return None;
            }
        }

        if self
            .actions
            .get(&trigger)
            .is_some_and(|a| !a.can_be_done(&*player, universe))
        {
            tracing::debug!(mission = %self.name, %trigger, "trigger skipped, action cannot be done");
            return None;
        }

        self.record(trigger, player);
        if trigger == MissionTrigger::Accept {
            self.accepted = true;
            self.update_npcs(player);
        }
        if trigger.is_terminal() {
            self.finished = Some(trigger);
        }

        let mut fired = Fired::default();
        match self.actions.get(&trigger) {
            Some(action) if trigger == MissionTrigger::Offer && self.location == MissionLocation::Job => {
                fired.outcome = action.action().do_action(player, universe);
            }
            Some(action) => {
                fired.outcome = action.do_action(player, universe, Some(self.id), self.is_unique());
                fired.accept_now = trigger == MissionTrigger::Offer && !action.presents_something();
            }
            None => fired.accept_now = trigger == MissionTrigger::Offer && self.location != MissionLocation::Job,
        }
        tracing::debug!(mission = %self.name, %trigger, "mission trigger fired");
        Some(fired)
    }

    fn record(&self, trigger: MissionTrigger, player: &mut dyn PlayerContext) {
        let store = player.conditions_mut();
        let mut bump = |suffix: &str, delta: i64| {
            store.add(&format!("{}: {suffix}", self.name), delta);
        };
        match trigger {
            MissionTrigger::Accept => {
                bump("offered", 1);
                bump("active", 1);
            }
            MissionTrigger::Decline => {
                bump("offered", 1);
                bump("declined", 1);
            }
            MissionTrigger::Defer => {
                bump("offered", 1);
                bump("deferred", 1);
            }
            MissionTrigger::Fail => {
                bump("active", -1);
                bump("failed", 1);
            }
            MissionTrigger::Abort => {
                bump("active", -1);
                bump("failed", 1);
                bump("aborted", 1);
            }
            MissionTrigger::Complete => {
                bump("active", -1);
                bump("done", 1);
            }
            _ => {}
        }
    }

    /// Re-evaluate every NPC's spawn and despawn conditions.
    pub fn update_npcs(&mut self, player: &dyn PlayerContext) {
        for npc in &mut self.npcs {
            npc.update_spawning(player.conditions());
        }
    }

    /// The player's flagship arrived in `system`: clear a waypoint, run the
    /// matching `on enter` action and bring escorts along.
    pub fn enter_system(
        &mut self,
        system: Handle<System>,
        player: &mut dyn PlayerContext,
        universe: &UniverseObjects,
    ) -> ActionOutcome {
        let mut outcome = ActionOutcome::default();
        if self.finished.is_some() {
            return outcome;
        }
        if self.waypoints.remove(&system) {
            self.visited_waypoints.insert(system);
            if let Some(fired) = self.do_trigger(MissionTrigger::Waypoint, player, universe) {
                outcome.merge(fired.outcome);
            }
        }
        for npc in &mut self.npcs {
            npc.follow(system);
        }

        let specific = self
            .on_enter
            .get(&system)
            .filter(|action| !self.did_enter.contains(&Entered::System(system)) && action.can_be_done(&*player, universe));
        if let Some(action) = specific {
            outcome.merge(action.do_action(player, universe, Some(self.id), self.is_unique()));
            self.did_enter.insert(Entered::System(system));
        } else {
            let generic = self.generic_on_enter.iter().enumerate().find(|(index, action)| {
                !self.did_enter.contains(&Entered::Generic(*index)) && action.can_be_done(&*player, universe)
            });
            if let Some((index, action)) = generic {
                outcome.merge(action.do_action(player, universe, Some(self.id), self.is_unique()));
                self.did_enter.insert(Entered::Generic(index));
            }
        }
        self.update_npcs(player);
        outcome
    }

    /// Forward a ship event to NPC `npc`, ship `ship`.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_ship_event(
        &mut self,
        npc: usize,
        ship: usize,
        event: ShipEvents,
        by_player: bool,
        player: &mut dyn PlayerContext,
        universe: &UniverseObjects,
    ) -> ActionOutcome {
        let id = self.id;
        match self.npcs.get_mut(npc) {
            Some(npc) if self.finished.is_none() => npc.handle_event(ship, event, by_player, player, universe, Some(id)),
            _ => ActionOutcome::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Instantiation
// ---------------------------------------------------------------------------

impl Mission {
    /// Freeze this template into an instance for the player's current
    /// location. Returns `None` when a filter matches nothing or no
    /// destination can be found.
    pub fn instantiate<R: Rng + ?Sized>(
        &self,
        player: &dyn PlayerContext,
        boarding_ship: Option<&str>,
        universe: &UniverseObjects,
        rng: &mut R,
    ) -> Option<Self> {
        let origin = player.system();
        let mut result = Self {
            name: self.name.clone(),
            visible: self.visible,
            priority: self.priority,
            minor: self.minor,
            autosave: self.autosave,
            location: self.location,
            repeat: self.repeat,
            waypoints: self.waypoints.clone(),
            ..Self::default()
        };

        for filter in &self.waypoint_filters {
            result.waypoints.insert(filter.pick_system(origin, universe, rng)?);
        }
        if let Some(origin) = origin {
            if result.waypoints.remove(&origin) {
                result.visited_waypoints.insert(origin);
            }
        }

        result.stopovers = self
            .stopovers
            .iter()
            .copied()
            .filter(|p| universe.planets.value(*p).is_some_and(|planet| planet.system.is_some()))
            .collect();
        for filter in &self.stopover_filters {
            let planet = filter.pick_planet(origin, &result.stopovers, universe, rng)?;
            result.stopovers.insert(planet);
        }

        result.destination = self.destination;
        if result.destination.is_none() && !self.destination_filter.is_empty() {
            result.destination = Some(self.destination_filter.pick_planet(origin, &BTreeSet::new(), universe, rng)?);
        }
        let destination_system = result.destination.and_then(|p| universe.planets.value(p)).and_then(|p| p.system);
        let (destination, destination_system) = match destination_system {
            Some(system) => (result.destination?, system),
            None => {
                let planet = player.planet()?;
                (planet, universe.planets.value(planet)?.system?)
            }
        };
        result.destination = Some(destination);

        if !self.cargo.is_empty() {
            result.cargo = self.pick_cargo(origin, destination_system, universe, rng);
        }
        result.cargo_size = roll(self.cargo_size, self.cargo_limit, self.cargo_prob, rng);
        result.passengers = roll(self.passengers, self.passenger_limit, self.passenger_prob, rng);
        result.illegal_fine = self.illegal_fine;
        result.illegal_message.clone_from(&self.illegal_message);
        result.stealth = self.stealth;

        let jumps = estimate_jumps(origin, &result, destination_system, universe);
        let payload = result.cargo_size.saturating_add(result.passengers.saturating_mul(10));
        if self.deadline_base != 0 || self.deadline_multiplier != 0 {
            let days = self.deadline_base.saturating_add(self.deadline_multiplier.saturating_mul(jumps));
            result.deadline = player.date().plus_days(i32::try_from(days).unwrap_or(i32::MAX));
        }

        result.to_offer = self.to_offer.clone();
        result.to_accept = self.to_accept.clone();
        result.to_complete = self.to_complete.clone();
        result.to_fail = self.to_fail.clone();

        let mut subs = result.substitutions(player, boarding_ship, destination_system, universe);

        result.npcs = self
            .npcs
            .iter()
            .map(|npc| npc.instantiate(&mut subs, origin, Some(destination_system), universe, rng))
            .collect();

        // The complete action goes first so `<payment>` is known to the rest.
        if let Some(action) = self.actions.get(&MissionTrigger::Complete) {
            let action = action.instantiate(&mut subs, origin, jumps, payload, universe, rng);
            result.actions.insert(MissionTrigger::Complete, action);
        }
        for (trigger, action) in self.actions.iter().filter(|(t, _)| **t != MissionTrigger::Complete) {
            result.actions.insert(*trigger, action.instantiate(&mut subs, origin, jumps, payload, universe, rng));
        }
        for (system, action) in &self.on_enter {
            result.on_enter.insert(*system, action.instantiate(&mut subs, origin, jumps, payload, universe, rng));
        }
        result.generic_on_enter = self
            .generic_on_enter
            .iter()
            .map(|action| action.instantiate(&mut subs, origin, jumps, payload, universe, rng))
            .collect();

        result.display_name = replace(&self.display_name, &subs);
        result.description = replace(&self.description, &subs);
        result.clearance = replace(&self.clearance, &subs);
        result.blocked = replace(&self.blocked, &subs);
        result.clearance_filter = self.clearance_filter.clone();
        result.full_clearance = self.full_clearance;
        Some(result)
    }

    fn pick_cargo<R: Rng + ?Sized>(
        &self,
        origin: Option<Handle<System>>,
        destination: Handle<System>,
        universe: &UniverseObjects,
        rng: &mut R,
    ) -> String {
        let commodity = if self.cargo == "random" {
            pick_commodity(origin, destination, universe, rng)
        } else {
            universe.trade.commodity(&self.cargo)
        };
        commodity
            .and_then(|c| {
                let index = rng.random_range(0..c.items.len().max(1));
                c.items.get(index).cloned()
            })
            .unwrap_or_else(|| self.cargo.clone())
    }

    fn substitutions(
        &self,
        player: &dyn PlayerContext,
        boarding_ship: Option<&str>,
        destination_system: Handle<System>,
        universe: &UniverseObjects,
    ) -> Substitutions {
        let mut subs = Substitutions::new();
        universe.substitutions.substitutions(player.conditions(), &mut subs);
        let tons = format!("{} {}", self.cargo_size, if self.cargo_size == 1 { "ton" } else { "tons" });
        subs.insert("<commodity>".to_owned(), self.cargo.clone());
        subs.insert("<cargo>".to_owned(), format!("{tons} of {}", self.cargo));
        subs.insert("<tons>".to_owned(), tons);
        subs.insert("<bunks>".to_owned(), self.passengers.to_string());
        subs.insert(
            "<passengers>".to_owned(),
            if self.passengers == 1 { "passenger" } else { "passengers" }.to_owned(),
        );
        subs.insert(
            "<fare>".to_owned(),
            if self.passengers == 1 { "a passenger".to_owned() } else { format!("{} passengers", self.passengers) },
        );
        if let Some(planet) = player.planet() {
            subs.insert("<origin>".to_owned(), universe.planets.name_of(planet).to_owned());
        } else if let Some(ship) = boarding_ship {
            subs.insert("<origin>".to_owned(), ship.to_owned());
        }
        let planet = self.destination.map_or("", |p| universe.planets.name_of(p)).to_owned();
        let system = universe.systems.name_of(destination_system).to_owned();
        subs.insert("<destination>".to_owned(), format!("{planet} in the {system} system"));
        subs.insert("<planet>".to_owned(), planet);
        subs.insert("<system>".to_owned(), system);
        subs.insert("<date>".to_owned(), self.deadline.to_display_string());
        subs.insert("<day>".to_owned(), self.deadline.long_string());
        if !self.stopovers.is_empty() {
            let names: Vec<String> = self
                .stopovers
                .iter()
                .map(|p| {
                    let system = universe.planets.value(*p).and_then(|planet| planet.system);
                    format!(
                        "{} in the {} system",
                        universe.planets.name_of(*p),
                        system.map_or("", |s| universe.systems.name_of(s))
                    )
                })
                .collect();
            subs.insert("<stopovers>".to_owned(), join_list(&names));
        }
        if !self.waypoints.is_empty() {
            let names: Vec<String> = self.waypoints.iter().map(|s| universe.systems.name_of(*s).to_owned()).collect();
            subs.insert("<waypoints>".to_owned(), join_list(&names));
        }
        subs.insert("<first>".to_owned(), player.first_name());
        subs.insert("<last>".to_owned(), player.last_name());
        subs
    }
}

/// Greedy tour length: nearest remaining waypoint or stopover first, then
/// the destination.
fn estimate_jumps(
    origin: Option<Handle<System>>,
    mission: &Mission,
    destination: Handle<System>,
    universe: &UniverseObjects,
) -> i64 {
    let Some(mut here) = origin else {
        return 0;
    };
    let distance = |from, to| universe.jump_distance(from, to, u32::MAX).map_or(0, i64::from);
    let mut remaining: Vec<Handle<System>> = mission.waypoints.iter().copied().collect();
    remaining.extend(
        mission
            .stopovers
            .iter()
            .filter_map(|p| universe.planets.value(*p).and_then(|planet| planet.system)),
    );
    let mut jumps = 0_i64;
    loop {
        let nearest = remaining
            .iter()
            .enumerate()
            .map(|(i, s)| (i, distance(here, *s)))
            .min_by_key(|(_, days)| *days);
        let Some((index, days)) = nearest else {
            break;
        };
        here = remaining.swap_remove(index);
        jumps = jumps.saturating_add(days);
    }
    jumps.saturating_add(distance(here, destination))
}

/// A commodity worth carrying from `from` to `to`: every 100 credits of
/// profit doubles the weight.
fn pick_commodity<'a, R: Rng + ?Sized>(
    from: Option<Handle<System>>,
    to: Handle<System>,
    universe: &'a UniverseObjects,
    rng: &mut R,
) -> Option<&'a crate::entities::Commodity> {
    let price = |system: Option<Handle<System>>, name: &str| {
        system
            .and_then(|s| universe.systems.value(s))
            .and_then(|s| s.trade.get(name).copied())
            .unwrap_or(0)
    };
    let mut choices = starloom_core::WeightedList::default();
    for commodity in &universe.trade.commodities {
        let profit = price(Some(to), &commodity.name).saturating_sub(price(from, &commodity.name));
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let weight = (100. * 2_f64.powf(profit as f64 * 0.01)).min(1e12) as i64;
        choices.push(commodity, weight.max(1));
    }
    choices.pick(rng).copied()
}

/// Roll a quantity: a Polya draw when `prob` is set, a uniform pick up to
/// `limit` otherwise.
fn roll<R: Rng + ?Sized>(base: i64, limit: i64, prob: f64, rng: &mut R) -> i64 {
    if base == 0 && limit == 0 {
        return 0;
    }
    if prob > 0. {
        return polya(limit, prob, rng).saturating_add(base);
    }
    if limit > base {
        return rng.random_range(base..=limit);
    }
    base
}

/// Failures before `k` successes with success chance `p`.
fn polya<R: Rng + ?Sized>(k: i64, p: f64, rng: &mut R) -> i64 {
    let p = p.clamp(0.01, 1.);
    let mut successes = 0_i64;
    let mut failures = 0_i64;
    while successes < k && failures < 10_000 {
        if rng.random_bool(p) {
            successes = successes.saturating_add(1);
        } else {
            failures = failures.saturating_add(1);
        }
    }
    failures
}

// ---------------------------------------------------------------------------
// Saving
// ---------------------------------------------------------------------------

impl Mission {
    /// Write an instance under `tag` (`mission` or `available job`, ...).
    /// Despawned NPCs and `on enter` actions that already ran are left out.
    pub fn save(&self, writer: &mut DataWriter, tag: &str, universe: &UniverseObjects) {
        writer.write([tag, self.name.as_str()]);
        writer.begin_child();
        writer.write(["name", self.display_name.as_str()]);
        if !self.description.is_empty() {
            writer.write(["description", self.description.as_str()]);
        }
        if !self.blocked.is_empty() {
            writer.write(["blocked", self.blocked.as_str()]);
        }
        if self.deadline.is_set() {
            writer.write([
                "deadline".to_owned(),
                self.deadline.day().to_string(),
                self.deadline.month().to_string(),
                self.deadline.year().to_string(),
            ]);
        }
        if self.cargo_size != 0 {
            writer.write(["cargo".to_owned(), self.cargo.clone(), self.cargo_size.to_string()]);
        }
        if self.passengers != 0 {
            writer.write(["passengers".to_owned(), self.passengers.to_string()]);
        }
        if self.illegal_fine != 0 {
            writer.write(["illegal".to_owned(), self.illegal_fine.to_string(), self.illegal_message.clone()]);
        }
        let flags = [
            (self.stealth, "stealth"),
            (!self.visible, "invisible"),
            (self.priority, "priority"),
            (self.minor, "minor"),
            (self.autosave, "autosave"),
        ];
        for (_, flag) in flags.iter().filter(|(set, _)| *set) {
            writer.write([*flag]);
        }
        if self.location != MissionLocation::Spaceport {
            writer.write([self.location.token()]);
        }
        if !self.clearance.is_empty() {
            writer.write(["clearance", self.clearance.as_str()]);
            if !self.clearance_filter.is_empty() {
                writer.begin_child();
                self.clearance_filter.save_body(writer, universe);
                writer.end_child();
            }
        }
        if !self.full_clearance {
            writer.write(["infiltrating"]);
        }
        if self.failed {
            writer.write(["failed"]);
        }
        if self.repeat != 1 {
            writer.write(["repeat".to_owned(), self.repeat.to_string()]);
        }
        self.to_offer.save_block(writer, &["to", "offer"]);
        self.to_accept.save_block(writer, &["to", "accept"]);
        self.to_complete.save_block(writer, &["to", "complete"]);
        self.to_fail.save_block(writer, &["to", "fail"]);
        if let Some(destination) = self.destination {
            writer.write(["destination", universe.planets.name_of(destination)]);
        }
        for system in &self.waypoints {
            writer.write(["waypoint", universe.systems.name_of(*system)]);
        }
        for system in &self.visited_waypoints {
            writer.write(["waypoint", universe.systems.name_of(*system), "visited"]);
        }
        for planet in &self.stopovers {
            writer.write(["stopover", universe.planets.name_of(*planet)]);
        }
        for planet in &self.visited_stopovers {
            writer.write(["stopover", universe.planets.name_of(*planet), "visited"]);
        }
        for npc in self.npcs.iter().filter(|npc| !npc.passed_despawn()) {
            npc.save(writer, universe);
        }
        for action in self.actions.values() {
            action.save(writer, universe);
        }
        for (system, action) in &self.on_enter {
            if !self.did_enter.contains(&Entered::System(*system)) {
                action.save(writer, universe);
            }
        }
        for (index, action) in self.generic_on_enter.iter().enumerate() {
            if !self.did_enter.contains(&Entered::Generic(index)) {
                action.save(writer, universe);
            }
        }
        writer.end_child();
    }
}

fn to_i64(value: f64) -> i64 {
    starloom_conditions::expression::to_i64(value)
}

fn int(value: f64) -> i32 {
    i32::try_from(to_i64(value)).unwrap_or(0)
}
