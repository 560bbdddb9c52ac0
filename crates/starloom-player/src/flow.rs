//! Moving around and dealing in missions: jumping, landing, taking off,
//! offers, jobs, and the events that end a mission.
//!
//! # Invariants
//!
//! - A mission leaves the accepted list exactly once, through
//!   [`PlayerInfo::remove_mission`], which fires its terminal trigger,
//!   unloads its cargo and files it with the finished missions.
//! - Landing settles every mission first (stopovers, failures,
//!   completions) and only then creates the missions this planet offers.

use rand::Rng;
use starloom_core::Handle;
use starloom_types::{MissionLocation, MissionTrigger, Outcome, ShipEvents};
use starloom_universe::entities::{Planet, System};
use starloom_universe::text_replacements::{Substitutions, replace};
use starloom_universe::{Mission, PlayerContext, Presentation, ShipSummary, UniverseObjects};

use crate::player::PlayerInfo;
use crate::politics::{Contraband, Verdict};

impl PlayerInfo {
    // ------------------------------------------------------------------
    // Travel
    // ------------------------------------------------------------------

    /// The flagship arrived in `system`.
    pub fn enter_system(&mut self, system: Handle<System>, universe: &UniverseObjects) {
        self.system = Some(system);
        self.planet = None;
        self.visited_systems.insert(system);
        for ship in self.ships.iter_mut().filter(|s| !s.parked) {
            ship.system = Some(system);
            ship.planet = None;
        }
        if self.travel_plan.front() == Some(&system) {
            self.travel_plan.pop_front();
        }
        tracing::debug!(system = universe.systems.name_of(system), "entered system");

        let mut missions = std::mem::take(&mut self.missions);
        let mut outcomes = Vec::new();
        for mission in &mut missions {
            outcomes.push((mission.id(), mission.enter_system(system, self, universe)));
        }
        self.missions = missions;
        for (id, outcome) in outcomes {
            self.apply_outcome(Some(id), outcome);
        }
        self.settle(universe);
    }

    /// Make the next jump of the travel plan. A jump takes a day. Returns
    /// the system arrived in, or `None` when the plan is used up.
    pub fn travel(&mut self, universe: &mut UniverseObjects) -> Option<Handle<System>> {
        let next = *self.travel_plan.front()?;
        if self.planet.is_some() {
            self.take_off(universe);
        }
        self.advance_day(universe);
        self.enter_system(next, universe);
        Some(next)
    }

    /// Fly the whole travel plan and land on its destination, if it has
    /// one and landing is allowed. Returns whether the player landed.
    pub fn fly_travel_plan(&mut self, universe: &mut UniverseObjects) -> bool {
        while self.travel(universe).is_some() {}
        match self.travel_destination {
            Some(destination) => self.land_on(destination, universe),
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Landing
    // ------------------------------------------------------------------

    /// Whether the player may land on `planet` now, through reputation,
    /// a bribe, domination, or a mission's clearance.
    pub fn can_land(&self, planet: Handle<Planet>, universe: &UniverseObjects) -> bool {
        self.politics.can_land(planet, universe) || self.missions.iter().any(|m| m.has_clearance(planet, universe))
    }

    /// Land on `planet`. Returns `false`, changing nothing, if landing is
    /// not allowed.
    pub fn land_on(&mut self, planet: Handle<Planet>, universe: &UniverseObjects) -> bool {
        if !self.politics.can_land(planet, universe) {
            let clearance = self
                .missions
                .iter()
                .find(|m| m.has_clearance(planet, universe))
                .map(|m| (m.clearance_message().to_owned(), m.has_full_clearance()));
            let Some((message, full)) = clearance else {
                tracing::debug!(planet = universe.planets.name_of(planet), "landing refused");
                return false;
            };
            self.politics.bribe_planet(planet, full);
            if message != "auto" {
                self.present(Presentation::Message(message));
            }
        }

        let Some(data) = universe.planets.value(planet) else {
            return false;
        };
        if let Some(system) = data.system {
            if self.system != Some(system) {
                self.enter_system(system, universe);
            }
        }
        self.planet = Some(planet);
        self.visited_planets.insert(planet);
        for ship in self.ships.iter_mut().filter(|s| !s.parked) {
            ship.planet = Some(planet);
        }
        if self.travel_destination == Some(planet) {
            self.travel_destination = None;
        }
        tracing::info!(planet = universe.planets.name_of(planet), date = %self.date, "landed");

        self.update_auto_conditions(universe);
        self.step_missions(universe);
        if !self.freshly_loaded {
            self.create_missions(universe);
        }
        self.freshly_loaded = false;

        if data.is_inhabited() && !self.politics.has_dominated(planet) {
            if let Some(government) = data.owner(universe) {
                self.face_security(government, data.security, universe);
            }
        }
        let music = (!data.music.is_empty()).then(|| data.music.clone());
        self.present(Presentation::Music(music));
        self.update_auto_conditions(universe);
        true
    }

    /// Leave the planet. Offers and jobs stay behind.
    pub fn take_off(&mut self, universe: &UniverseObjects) {
        if let Some(planet) = self.planet.take() {
            tracing::info!(planet = universe.planets.name_of(planet), "took off");
        }
        for ship in self.ships.iter_mut().filter(|s| !s.parked) {
            ship.planet = None;
        }
        self.should_launch = false;
        self.available_jobs.clear();
        self.available_missions.clear();
        self.boarding_missions.clear();
        self.done_missions.clear();
        self.update_auto_conditions(universe);
    }

    /// The planet's authorities scan the fleet.
    fn face_security(
        &mut self,
        government: Handle<starloom_universe::entities::Government>,
        security: f64,
        universe: &UniverseObjects,
    ) {
        let mut scanned = Contraband::default();
        for mission in &self.missions {
            let (fine, message) = mission.illegal_cargo();
            if fine > 0 && scanned.cargo.as_ref().is_none_or(|(worst, _)| fine > *worst) {
                let reason = if message.is_empty() {
                    " for carrying illegal cargo.".to_owned()
                } else {
                    format!(".\n\t{message}")
                };
                scanned.cargo = Some((fine, reason));
            }
        }
        match self.cargo.illegal_outfit_fine(&universe.outfits) {
            None => scanned.atrocity = true,
            Some(fine) if fine > 0 && scanned.cargo.as_ref().is_none_or(|(worst, _)| fine > *worst) => {
                scanned.cargo = Some((fine, " for carrying illegal cargo.".to_owned()));
            }
            Some(_) => {}
        }
        for ship in &self.ships {
            match ship.illegal_outfit_fine(universe) {
                None => scanned.atrocity = true,
                Some(fine) => scanned.outfits = scanned.outfits.max(fine),
            }
        }
        if scanned == Contraband::default() {
            return;
        }

        match self.politics.fine(government, security, &scanned, universe, &mut self.rng) {
            Verdict::Clear => {}
            Verdict::Fined { amount, message } => {
                tracing::info!(amount, "fined");
                self.add_fine(amount);
                self.present(Presentation::Message(message));
                if scanned.cargo.is_some() {
                    for mission in &mut self.missions {
                        if mission.illegal_cargo().0 > 0 && mission.fails_if_discovered() {
                            mission.fail();
                        }
                    }
                }
            }
            Verdict::Death { message, conversation } => {
                tracing::warn!("death sentence");
                self.present(Presentation::Message(message));
                let conversation = conversation.and_then(|c| universe.conversations.value(c)).cloned();
                match conversation {
                    Some(conversation) => self.present(Presentation::Conversation {
                        conversation,
                        mission: None,
                        is_offer: false,
                    }),
                    None => self.is_dead = true,
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Settling missions
    // ------------------------------------------------------------------

    /// Run stopovers, failures, completions and visits for the planet
    /// just landed on.
    pub(crate) fn step_missions(&mut self, universe: &UniverseObjects) {
        let ids: Vec<u64> = self.missions.iter().map(Mission::id).collect();
        let mut visit_text = String::new();
        let mut visits = 0_usize;
        for id in ids {
            self.fire(id, MissionTrigger::Stopover, universe);
            let Some(mission) = self.mission(id) else {
                continue;
            };
            if mission.has_failed(self) {
                self.remove_mission(MissionTrigger::Fail, id, universe);
            } else if mission.can_complete(self, universe) {
                self.remove_mission(MissionTrigger::Complete, id, universe);
            } else if mission.destination().is_some() && mission.destination() == self.planet && !self.freshly_loaded {
                let aggregate = !mission.is_unique() && mission.is_visible();
                let text = mission
                    .action(MissionTrigger::Visit)
                    .map(|a| a.dialog_text().to_owned())
                    .unwrap_or_default();
                self.fire(id, MissionTrigger::Visit, universe);
                if aggregate {
                    if visit_text.is_empty() && !text.is_empty() {
                        let mut subs = Substitutions::new();
                        subs.insert("<first>".to_owned(), self.first_name.clone());
                        subs.insert("<last>".to_owned(), self.last_name.clone());
                        visit_text = replace(&text, &subs);
                    }
                    visits = visits.saturating_add(1);
                }
            }
        }
        if !visit_text.is_empty() {
            if visits > 1 {
                let others = visits.saturating_sub(1);
                let noun = if others > 1 { "missions" } else { "mission" };
                visit_text.push_str(&format!(
                    "\n\t(You have {others} other unfinished {noun} at this location.)"
                ));
            }
            self.present(Presentation::Dialog {
                text: visit_text,
                mission: None,
                is_offer: false,
            });
        }

        // One mission's actions may have settled another.
        let ids: Vec<u64> = self.missions.iter().map(Mission::id).collect();
        for id in ids {
            let Some(mission) = self.mission(id) else {
                continue;
            };
            if mission.has_failed(self) {
                self.remove_mission(MissionTrigger::Fail, id, universe);
            } else if mission.can_complete(self, universe) {
                self.remove_mission(MissionTrigger::Complete, id, universe);
            }
        }

        let active: Vec<u64> = self.missions.iter().map(Mission::id).collect();
        self.cargo.retain_missions(&active);
    }

    /// Fire `trigger` on accepted mission `id`.
    pub(crate) fn fire(&mut self, id: u64, trigger: MissionTrigger, universe: &UniverseObjects) {
        let Some(index) = self.missions.iter().position(|m| m.id() == id) else {
            return;
        };
        let mut mission = self.missions.remove(index);
        let fired = mission.do_trigger(trigger, self, universe);
        let position = index.min(self.missions.len());
        self.missions.insert(position, mission);
        if let Some(fired) = fired {
            self.apply_outcome(Some(id), fired.outcome);
        }
        self.settle(universe);
    }

    /// Take mission `id` off the accepted list, fire `trigger` and unload
    /// its cargo.
    pub fn remove_mission(&mut self, trigger: MissionTrigger, id: u64, universe: &UniverseObjects) {
        let Some(index) = self.missions.iter().position(|m| m.id() == id) else {
            return;
        };
        let mut mission = self.missions.remove(index);
        let fired = mission.do_trigger(trigger, self, universe);
        self.cargo.remove_mission_cargo(id);
        tracing::info!(mission = mission.identifier(), %trigger, "mission removed");
        self.done_missions.push(mission);
        if let Some(fired) = fired {
            self.apply_outcome(None, fired.outcome);
        }
        self.settle(universe);
    }

    /// Fire `on fail` for every mission that has failed.
    pub(crate) fn remove_failed_missions(&mut self, universe: &UniverseObjects) {
        let failed: Vec<u64> = self
            .missions
            .iter()
            .filter(|m| m.has_failed(self))
            .map(Mission::id)
            .collect();
        for id in failed {
            self.remove_mission(MissionTrigger::Fail, id, universe);
        }
    }

    /// Give up on mission `id`.
    pub fn abort_mission(&mut self, id: u64, universe: &UniverseObjects) {
        self.remove_mission(MissionTrigger::Abort, id, universe);
    }

    // ------------------------------------------------------------------
    // Offers
    // ------------------------------------------------------------------

    /// Instantiate every mission this planet offers. Jobs go to the job
    /// board; the rest wait in the spaceport, priority missions first.
    pub fn create_missions(&mut self, universe: &UniverseObjects) {
        self.boarding_missions.clear();
        let skip_jobs = self
            .planet
            .and_then(|p| universe.planets.value(p))
            .is_some_and(|p| !p.is_inhabited());
        let mut has_priority = false;
        for (name, _, template) in universe.missions.iter() {
            let location = template.location();
            if matches!(location, MissionLocation::Boarding | MissionLocation::Assisting) {
                continue;
            }
            if skip_jobs && location == MissionLocation::Job {
                continue;
            }
            if universe.is_disabled("mission", name) {
                continue;
            }
            let roll = self.rng.random_range(0..100);
            self.conditions.set("random", roll);
            if !template.can_offer(self, None, universe) {
                continue;
            }
            let mut rng = self.rng.clone();
            let instance = template.instantiate(self, None, universe, &mut rng);
            self.rng = rng;
            let Some(mut instance) = instance else {
                continue;
            };
            if instance.has_failed(self) {
                continue;
            }
            instance.set_id(self.next_id());
            if location == MissionLocation::Job {
                self.available_jobs.push(instance);
            } else {
                has_priority |= instance.has_priority();
                self.available_missions.push(instance);
            }
        }
        self.available_missions.sort_by_key(|m| !m.has_priority());

        if has_priority {
            self.available_missions
                .retain(|m| m.has_priority() || m.location() != MissionLocation::Spaceport);
        } else if self.available_missions.len() > 1 {
            // Minor missions only show up when nothing competes with them.
            let mut index = 0;
            while let Some(mission) = self.available_missions.get(index) {
                if mission.is_minor() {
                    self.available_missions.remove(index);
                    if self.available_missions.len() <= 1 {
                        break;
                    }
                } else {
                    index = index.saturating_add(1);
                }
            }
        }
        tracing::debug!(
            jobs = self.available_jobs.len(),
            missions = self.available_missions.len(),
            "missions created"
        );
    }

    /// Offer the first mission waiting at `location` that can be offered
    /// now. Fires its `on offer` action; a mission with nothing to show is
    /// accepted on the spot. Returns the mission's id.
    pub fn offer_mission(&mut self, location: MissionLocation, universe: &UniverseObjects) -> Option<u64> {
        if self.ships.is_empty() {
            return None;
        }
        let index = self.available_missions.iter().position(|m| {
            m.location() == location && m.can_offer(self, None, universe) && m.has_space(self)
        })?;
        let mission = self.available_missions.remove(index);
        self.available_missions.insert(0, mission);
        self.fire_offer(false, universe)
    }

    /// Look for a mission offered by boarding (an enemy) or assisting (a
    /// friendly) `ship`, and offer it.
    pub fn boarding_mission(
        &mut self,
        ship: &ShipSummary,
        ship_name: &str,
        is_enemy: bool,
        universe: &UniverseObjects,
    ) -> Option<u64> {
        self.boarding_missions.clear();
        let location = if is_enemy { MissionLocation::Boarding } else { MissionLocation::Assisting };
        for (_, _, template) in universe.missions.iter().filter(|(_, _, m)| m.location() == location) {
            let roll = self.rng.random_range(0..100);
            self.conditions.set("random", roll);
            if !template.can_offer(self, Some(ship), universe) {
                continue;
            }
            let mut rng = self.rng.clone();
            let instance = template.instantiate(self, Some(ship_name), universe, &mut rng);
            self.rng = rng;
            let Some(mut instance) = instance else {
                continue;
            };
            if instance.has_failed(self) {
                continue;
            }
            instance.set_id(self.next_id());
            self.boarding_missions.push(instance);
            return self.fire_offer(true, universe);
        }
        None
    }

    /// Fire `on offer` for the front of the offer list.
    fn fire_offer(&mut self, boarding: bool, universe: &UniverseObjects) -> Option<u64> {
        let list = if boarding { &mut self.boarding_missions } else { &mut self.available_missions };
        if list.is_empty() {
            return None;
        }
        let mut mission = list.remove(0);
        let id = mission.id();
        let fired = mission.do_trigger(MissionTrigger::Offer, self, universe);
        let list = if boarding { &mut self.boarding_missions } else { &mut self.available_missions };
        list.insert(0, mission);
        if fired.is_some_and(|f| f.accept_now) {
            self.handle_offer_outcome(id, Outcome::Accept, universe);
        }
        Some(id)
    }

    /// The player answered the offer of mission `id`.
    pub fn handle_offer_outcome(&mut self, id: u64, outcome: Outcome, universe: &UniverseObjects) {
        self.should_launch |= self.planet.is_some() && outcome.requires_launch();
        let Some(mission) = self.take_offer(id) else {
            tracing::warn!(id, "outcome for a mission that is not on offer");
            return;
        };
        match outcome {
            Outcome::Accept | Outcome::Launch => self.accept(mission, universe),
            Outcome::Decline | Outcome::Flee => self.dismiss(mission, MissionTrigger::Decline, universe),
            Outcome::Defer | Outcome::Depart => self.dismiss(mission, MissionTrigger::Defer, universe),
            Outcome::Die | Outcome::Explode => {
                tracing::warn!(mission = mission.identifier(), "offer ended in death");
                self.is_dead = true;
            }
        }
    }

    fn take_offer(&mut self, id: u64) -> Option<Mission> {
        if let Some(index) = self.available_missions.iter().position(|m| m.id() == id) {
            return Some(self.available_missions.remove(index));
        }
        let index = self.boarding_missions.iter().position(|m| m.id() == id)?;
        Some(self.boarding_missions.remove(index))
    }

    /// Take job `id` from the job board. Returns `false` if there is no
    /// such job or the player cannot take it.
    pub fn accept_job(&mut self, id: u64, universe: &UniverseObjects) -> bool {
        let Some(index) = self.available_jobs.iter().position(|m| m.id() == id) else {
            return false;
        };
        if self.available_jobs.get(index).is_none_or(|m| !m.can_accept(self)) {
            return false;
        }
        let mut mission = self.available_jobs.remove(index);
        self.cargo.add_mission_cargo(&mission);
        let mut outcomes = Vec::new();
        if let Some(fired) = mission.do_trigger(MissionTrigger::Offer, self, universe) {
            outcomes.push(fired.outcome);
        }
        if let Some(fired) = mission.do_trigger(MissionTrigger::Accept, self, universe) {
            outcomes.push(fired.outcome);
        }
        if mission.is_unique() {
            self.missions.insert(0, mission);
        } else {
            self.missions.push(mission);
        }
        for outcome in outcomes {
            self.apply_outcome(Some(id), outcome);
        }
        self.settle(universe);
        true
    }

    fn accept(&mut self, mut mission: Mission, universe: &UniverseObjects) {
        let id = mission.id();
        self.cargo.add_mission_cargo(&mission);
        let fired = mission.do_trigger(MissionTrigger::Accept, self, universe);
        if mission.recommends_autosave() {
            tracing::info!(mission = mission.identifier(), "autosave recommended");
        }
        let position = if mission.has_priority() {
            self.missions.iter().position(|m| !m.has_priority()).unwrap_or(self.missions.len())
        } else {
            self.missions.len()
        };
        self.missions.insert(position, mission);
        if let Some(fired) = fired {
            self.apply_outcome(Some(id), fired.outcome);
        }
        self.settle(universe);
    }

    fn dismiss(&mut self, mut mission: Mission, trigger: MissionTrigger, universe: &UniverseObjects) {
        if let Some(fired) = mission.do_trigger(trigger, self, universe) {
            self.apply_outcome(None, fired.outcome);
        }
        self.settle(universe);
    }

    // ------------------------------------------------------------------
    // Ship events
    // ------------------------------------------------------------------

    /// Something happened to ship `ship` of NPC `npc` in mission
    /// `mission`.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_ship_event(
        &mut self,
        mission: u64,
        npc: usize,
        ship: usize,
        events: ShipEvents,
        by_player: bool,
        universe: &UniverseObjects,
    ) {
        let Some(index) = self.missions.iter().position(|m| m.id() == mission) else {
            return;
        };
        let mut instance = self.missions.remove(index);
        let outcome = instance.handle_ship_event(npc, ship, events, by_player, self, universe);
        let position = index.min(self.missions.len());
        self.missions.insert(position, instance);
        self.apply_outcome(Some(mission), outcome);
        self.settle(universe);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const CONTENT: &str = "\
government Republic
\t\"player reputation\" 1
system Sol
\tgovernment Republic
\tlink Alpha
\tobject Earth
system Alpha
\tgovernment Republic
\tlink Sol
\tobject Mars
planet Earth
\tspaceport `Docks.`
planet Mars
\tspaceport `Dust.`
ship Hauler
\tattributes
\t\tcategory Freighter
\t\t\"cargo space\" 20
\t\tbunks 4
\t\t\"required crew\" 1
mission Courier
\tjob
\tsource Earth
\tdestination Mars
\tpassengers 2
\ton complete
\t\tpayment 500
mission Minor
\tminor
\tsource Earth
\tdestination Mars
mission Story
\tsource Earth
\tdestination Mars
start
\tdate 1 1 3014
\tsystem Sol
\tplanet Earth
\tship Hauler Dray
";

    fn setup() -> (UniverseObjects, PlayerInfo) {
        let mut universe = UniverseObjects::new();
        universe.load_text(CONTENT, "flow").unwrap();
        universe.finish_loading();
        let start = universe.starts.find_value("").unwrap().clone();
        let player = PlayerInfo::from_start(&start, &universe, "Ada", "Reyes", 3);
        (universe, player)
    }

    #[test]
    fn landing_creates_jobs_and_hides_competing_minor_missions() {
        let (universe, mut player) = setup();
        let earth = universe.planets.find("Earth").unwrap();
        assert!(player.land_on(earth, &universe));
        assert_eq!(player.available_jobs().len(), 1);
        let names: Vec<&str> = player.available_missions().iter().map(Mission::identifier).collect();
        assert_eq!(names, ["Story"]);
    }

    #[test]
    fn accepted_job_completes_on_arrival() {
        let (mut universe, mut player) = setup();
        let earth = universe.planets.find("Earth").unwrap();
        let mars = universe.planets.find("Mars").unwrap();
        let alpha = universe.systems.find("Alpha").unwrap();
        player.land_on(earth, &universe);
        let id = player.available_jobs()[0].id();
        assert!(player.accept_job(id, &universe));
        assert_eq!(player.bunks_free(), 1);
        assert_eq!(player.conditions().get("Courier: active"), 1);

        player.set_travel_plan(vec![alpha], Some(mars));
        assert!(player.fly_travel_plan(&mut universe));
        assert!(player.missions().is_empty());
        assert_eq!(player.done_missions().len(), 1);
        assert_eq!(player.conditions().get("Courier: done"), 1);
        assert_eq!(player.bunks_free(), 3);
    }

    #[test]
    fn offers_without_dialogs_are_accepted_at_once() {
        let (universe, mut player) = setup();
        let earth = universe.planets.find("Earth").unwrap();
        player.land_on(earth, &universe);
        let id = player.offer_mission(MissionLocation::Spaceport, &universe).unwrap();
        assert!(player.mission(id).is_some());
        assert!(player.available_missions().is_empty());
        assert_eq!(player.conditions().get("Story: offered"), 1);
    }

    #[test]
    fn aborting_counts_as_failure() {
        let (universe, mut player) = setup();
        let earth = universe.planets.find("Earth").unwrap();
        player.land_on(earth, &universe);
        let id = player.offer_mission(MissionLocation::Spaceport, &universe).unwrap();
        player.abort_mission(id, &universe);
        assert!(player.missions().is_empty());
        assert_eq!(player.conditions().get("Story: aborted"), 1);
        assert_eq!(player.conditions().get("Story: failed"), 1);
        assert_eq!(player.conditions().get("Story: active"), 0);
    }

    #[test]
    fn declining_drops_the_offer() {
        let (universe, mut player) = setup();
        let earth = universe.planets.find("Earth").unwrap();
        player.land_on(earth, &universe);
        let id = player.available_missions()[0].id();
        player.handle_offer_outcome(id, Outcome::Decline, &universe);
        assert!(player.available_missions().is_empty());
        assert!(player.missions().is_empty());
        assert_eq!(player.conditions().get("Story: declined"), 1);
    }
}
