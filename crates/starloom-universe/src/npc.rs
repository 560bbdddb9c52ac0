//! [`Npc`]: ships a mission spawns, with objectives the player must meet.
//!
//! ```text
//! npc kill
//! 	government Pirate
//! 	system destination
//! 	fleet "Small Pirates" 2
//! 	on kill
//! 		dialog "The pirates are gone."
//! ```
//!
//! Header tokens set the objectives: `kill`, `board`, `assist`, `disable`,
//! `scan cargo`, `scan outfits`, `capture` and `provoke` must happen to
//! every ship, `save` forbids destruction, `evade` requires the ships to be
//! left behind, and `accompany` requires them to travel with the player.
//!
//! # Invariants
//!
//! - A capture also counts as a destruction for this NPC's bookkeeping.
//! - Events a non-player actor causes never count toward player-only
//!   objectives.
//! - Each `on <event>` action runs at most once per instance.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use starloom_conditions::{ConditionSet, ConditionsStore};
use starloom_core::Handle;
use starloom_data::{DataNode, DataWriter};
use starloom_types::ShipEvents;

use crate::context::{PlayerContext, Presentation};
use crate::conversation::ConversationRef;
use crate::entities::{Fleet, Government, Planet, ShipModel, System};
use crate::game_action::{ActionOutcome, PARAGRAPH_BREAK, parse_text_node};
use crate::location_filter::LocationFilter;
use crate::mission_action::MissionAction;
use crate::phrase::PhraseRef;
use crate::text_replacements::{Substitutions, replace};
use crate::universe::UniverseObjects;

/// One ship of an NPC and the events it has been through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcShip {
    /// Hull.
    pub model: Handle<ShipModel>,
    /// Ship name.
    pub name: String,
    /// Events recorded against this ship.
    pub events: ShipEvents,
}

/// An NPC block of a mission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Npc {
    succeed_if: ShipEvents,
    fail_if: ShipEvents,
    must_evade: bool,
    must_accompany: bool,

    /// System the ships start in.
    pub system: Option<Handle<System>>,
    at_destination: bool,
    location: LocationFilter,
    /// Planet the ships start landed on.
    pub planet: Option<Handle<Planet>>,
    /// Government the ships fly for.
    pub government: Option<Handle<Government>>,
    personality: Vec<String>,

    dialog_text: String,
    dialog_phrase: Option<PhraseRef>,
    conversation: Option<ConversationRef>,

    to_spawn: ConditionSet,
    to_despawn: ConditionSet,
    passed_spawn: bool,
    passed_despawn: bool,

    /// The ships.
    pub ships: Vec<NpcShip>,
    fleets: Vec<Fleet>,
    stock_fleets: Vec<Handle<Fleet>>,

    actions: BTreeMap<String, MissionAction>,
    fired: BTreeSet<String>,
}

/// Events that fire an `on` action as soon as any ship sees them. The rest
/// wait until every ship has.
const ANY_SHIP_TRIGGERS: &[&str] = &["assist", "board", "encounter", "provoke", "scan cargo", "scan outfits"];

impl Npc {
    /// Load an `npc` block.
    pub fn load(node: &DataNode, universe: &mut UniverseObjects) -> Self {
        let mut npc = Self::default();
        for token in node.tokens().iter().skip(1) {
            match token.as_str() {
                "save" => npc.fail_if |= ShipEvents::DESTROY,
                "kill" => npc.succeed_if |= ShipEvents::DESTROY,
                "evade" => npc.must_evade = true,
                "accompany" => {
                    npc.must_accompany = true;
                    npc.fail_if |= ShipEvents::DESTROY;
                }
                other => match ShipEvents::from_token(other) {
                    Some(event) => npc.succeed_if |= event,
                    None => {
                        node.print_trace(&format!("Skipping unrecognized NPC objective \"{other}\":"));
                    }
                },
            }
        }
        if npc.fail_if.intersects(ShipEvents::DESTROY) && npc.succeed_if.intersects(ShipEvents::KILL) {
            node.print_trace("Warning: conflicting NPC mission objective to save and destroy or capture.");
        }
        if npc.must_evade && npc.succeed_if.intersects(ShipEvents::KILL) {
            node.print_trace("Warning: redundant NPC mission objective to evade and destroy or capture.");
        }

        for child in node.children() {
            let key = child.key();
            let has_value = child.size() >= 2;
            match key {
                "system" if has_value && child.token(1) == "destination" => npc.at_destination = true,
                "system" if has_value => npc.system = Some(universe.systems.get(child.token(1))),
                "system" => npc.location.load(child, universe),
                "planet" if has_value => npc.planet = Some(universe.planets.get(child.token(1))),
                "succeed" if has_value => npc.succeed_if = ShipEvents::from_bits(bits(child.value(1))),
                "fail" if has_value => npc.fail_if = ShipEvents::from_bits(bits(child.value(1))),
                "evade" => npc.must_evade = true,
                "accompany" => npc.must_accompany = true,
                "government" if has_value => npc.government = Some(universe.governments.get(child.token(1))),
                "personality" => {
                    npc.personality = child.tokens().iter().skip(1).cloned().collect();
                    for grand in child.children() {
                        npc.personality.extend(grand.tokens().iter().cloned());
                    }
                }
                "dialog" => npc.load_dialog(child, universe),
                "conversation" if child.has_children() || has_value => {
                    npc.conversation = Some(ConversationRef::load(child, universe));
                }
                "to" if has_value && child.token(1) == "spawn" => npc.to_spawn.load(child),
                "to" if has_value && child.token(1) == "despawn" => npc.to_despawn.load(child),
                "spawned" => npc.passed_spawn = true,
                "despawned" => npc.passed_despawn = true,
                "ship" if has_value => {
                    let events = child
                        .children()
                        .iter()
                        .find(|g| g.key() == "actions" && g.size() >= 2)
                        .map_or(ShipEvents::NONE, |g| ShipEvents::from_bits(bits(g.value(1))));
                    npc.ships.push(NpcShip {
                        model: universe.ships.get(child.token(1)),
                        name: child.token(if child.size() > 2 { 2 } else { 1 }).to_owned(),
                        events,
                    });
                }
                "fleet" if child.has_children() => {
                    let mut fleet = Fleet::default();
                    fleet.load(child, universe);
                    let count = if has_value { count(child.value(1)) } else { 1 };
                    npc.fleets.extend(std::iter::repeat_n(fleet, count));
                }
                "fleet" if has_value => {
                    let fleet = universe.fleets.get(child.token(1));
                    let count = if child.size() >= 3 { count(child.value(2)) } else { 1 };
                    npc.stock_fleets.extend(std::iter::repeat_n(fleet, count));
                }
                "on" if has_value => {
                    let action = MissionAction::load(child, universe);
                    npc.actions.insert(action.trigger.clone(), action);
                }
                "fired" if has_value => {
                    npc.fired.insert(child.token(1).to_owned());
                }
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
        npc
    }

    fn load_dialog(&mut self, child: &DataNode, universe: &mut UniverseObjects) {
        if child.size() >= 2 && child.token(1) == "phrase" {
            if !child.has_children() && child.size() == 3 {
                self.dialog_phrase = Some(PhraseRef::Named(universe.phrases.get(child.token(2))));
            } else {
                child.print_trace("Skipping unsupported dialog phrase syntax:");
            }
        } else if let Some(grand) = child.children().first().filter(|g| child.size() == 1 && g.key() == "phrase") {
            self.dialog_phrase = Some(PhraseRef::load(grand, &mut universe.phrases));
        } else {
            parse_text_node(child, 1, &mut self.dialog_text);
        }
    }

    /// Latch the spawn and despawn conditions. Despawning is only checked
    /// once the NPC has spawned, and neither ever reverts.
    pub fn update_spawning(&mut self, store: &ConditionsStore) {
        if !self.passed_spawn {
            self.passed_spawn = self.to_spawn.test(store);
        }
        if self.passed_spawn && !self.to_despawn.is_empty() && !self.passed_despawn {
            self.passed_despawn = self.to_despawn.test(store);
        }
    }

    /// Whether the NPC is currently in play.
    pub const fn is_active(&self) -> bool {
        self.passed_spawn && !self.passed_despawn
    }

    /// Whether the despawn conditions have been met.
    pub const fn passed_despawn(&self) -> bool {
        self.passed_despawn
    }

    /// Whether these ships travel with the player.
    pub const fn must_accompany(&self) -> bool {
        self.must_accompany
    }

    /// Move escorted ships that can still fly along with the player.
    pub fn follow(&mut self, system: Handle<System>) {
        if self.must_accompany && self.is_active() && self.ships.iter().any(|ship| !is_immobile(ship)) {
            self.system = Some(system);
        }
    }

    /// Whether an escort that can still fly is somewhere other than
    /// `player_system`.
    pub fn is_left_behind(&self, player_system: Option<Handle<System>>) -> bool {
        self.must_accompany
            && self.is_active()
            && self.system.is_some()
            && self.system != player_system
            && self.ships.iter().any(|ship| !is_immobile(ship))
    }

    /// Whether the objectives are met. An NPC that is not in play counts as
    /// succeeded.
    pub fn has_succeeded(&self, player_system: Option<Handle<System>>) -> bool {
        if !self.is_active() {
            return true;
        }
        if self.has_failed() {
            return false;
        }
        if self.must_evade || self.must_accompany {
            let derelict = self.personality.iter().any(|p| p == "derelict");
            let is_here = self.system.is_none() || self.system == player_system;
            for ship in &self.ships {
                let immobile = is_immobile(ship) || (derelict && !ship.events.intersects(ShipEvents::ASSIST));
                if (is_here && !immobile) != self.must_accompany {
                    return false;
                }
            }
        }
        self.succeed_if.is_empty() || self.ships.iter().all(|ship| ship.events.contains(self.succeed_if))
    }

    /// Whether an objective can no longer be met.
    pub fn has_failed(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.ships.iter().any(|ship| {
            ship.events.intersects(self.fail_if)
                || (!ship.events.contains(self.succeed_if) && ship.events.intersects(ShipEvents::DESTROY))
        })
    }

    /// Record `event` against ship `index`. Reports a change of success
    /// state to the player and runs any `on` action whose event has now
    /// happened.
    pub fn handle_event(
        &mut self,
        index: usize,
        event: ShipEvents,
        by_player: bool,
        player: &mut dyn PlayerContext,
        universe: &UniverseObjects,
        mission: Option<u64>,
    ) -> ActionOutcome {
        self.update_spawning(player.conditions());
        if !self.is_active() {
            return ActionOutcome::default();
        }
        let player_system = player.system();
        let succeeded = self.has_succeeded(player_system);
        let failed = self.has_failed();

        let mut event = event;
        if event.intersects(ShipEvents::CAPTURE) {
            event |= ShipEvents::DESTROY;
        }
        if !by_player {
            event = event.without(ShipEvents::PLAYER_ONLY);
        }
        let Some(ship) = self.ships.get_mut(index) else {
            return ActionOutcome::default();
        };
        if event == ShipEvents::ASSIST {
            ship.events = ship.events.without(ShipEvents::DISABLE);
        }
        ship.events |= event;

        if self.has_failed() && !failed {
            player.present(Presentation::Message("Mission failed.".to_owned()));
        } else if self.has_succeeded(player_system) && !succeeded {
            if let Some(conversation) = self.conversation.as_ref().and_then(|c| c.resolve(universe)) {
                player.present(Presentation::Conversation {
                    conversation: conversation.clone(),
                    mission,
                    is_offer: false,
                });
            } else if !self.dialog_text.is_empty() {
                player.present(Presentation::Dialog {
                    text: self.dialog_text.clone(),
                    mission,
                    is_offer: false,
                });
            }
        }

        let mut outcome = ActionOutcome::default();
        let due: Vec<String> = self
            .actions
            .keys()
            .filter(|trigger| !self.fired.contains(*trigger) && self.trigger_met(trigger))
            .cloned()
            .collect();
        for trigger in due {
            if let Some(action) = self.actions.get(&trigger) {
                outcome.merge(action.do_action(player, universe, mission, true));
            }
            self.fired.insert(trigger);
        }
        outcome
    }

    fn trigger_met(&self, trigger: &str) -> bool {
        let Some(mask) = ShipEvents::from_token(trigger) else {
            return false;
        };
        if self.ships.is_empty() {
            return false;
        }
        if ANY_SHIP_TRIGGERS.contains(&trigger) {
            self.ships.iter().any(|ship| ship.events.intersects(mask))
        } else {
            self.ships.iter().all(|ship| ship.events.intersects(mask))
        }
    }

    /// Freeze this template for a mission instance: pick the starting
    /// system, turn fleets into ships and expand the text.
    pub fn instantiate<R: Rng + ?Sized>(
        &self,
        subs: &mut Substitutions,
        origin: Option<Handle<System>>,
        destination: Option<Handle<System>>,
        universe: &UniverseObjects,
        rng: &mut R,
    ) -> Self {
        let mut result = Self {
            succeed_if: self.succeed_if,
            fail_if: self.fail_if,
            must_evade: self.must_evade,
            must_accompany: self.must_accompany,
            government: self.government.or_else(|| universe.governments.find("Escort")),
            personality: self.personality.clone(),
            to_spawn: self.to_spawn.clone(),
            to_despawn: self.to_despawn.clone(),
            passed_spawn: self.passed_spawn,
            passed_despawn: self.passed_despawn,
            ships: self.ships.clone(),
            ..Self::default()
        };

        result.system = self
            .system
            .or_else(|| (!self.location.is_empty()).then(|| self.location.pick_system(origin, universe, rng)).flatten())
            .or(if self.at_destination { destination.or(origin) } else { origin });
        result.planet = self
            .planet
            .filter(|p| universe.planets.value(*p).is_some_and(|planet| planet.system == result.system));

        for fleet in self.fleets.iter().chain(self.stock_fleets.iter().filter_map(|h| universe.fleets.value(*h))) {
            let Some(variant) = fleet.pick_variant(rng) else {
                continue;
            };
            for model in variant {
                let name = fleet
                    .names
                    .and_then(|names| universe.phrases.value(names))
                    .map(|phrase| phrase.get(&universe.phrases, rng))
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| universe.ships.name_of(*model).to_owned());
                result.ships.push(NpcShip {
                    model: *model,
                    name,
                    events: ShipEvents::NONE,
                });
            }
        }

        if let Some(first) = result.ships.first() {
            subs.insert("<npc>".to_owned(), first.name.clone());
        }
        let dialog = match &self.dialog_phrase {
            Some(phrase) => phrase.get(&universe.phrases, rng),
            None => self.dialog_text.clone(),
        };
        if !dialog.is_empty() {
            result.dialog_text = replace(&dialog, subs);
        }
        result.conversation = self
            .conversation
            .as_ref()
            .and_then(|c| c.resolve(universe))
            .map(|c| ConversationRef::Inline(Box::new(c.instantiate(subs, 0, 0, universe, rng))));
        result.actions = self
            .actions
            .iter()
            .map(|(trigger, action)| (trigger.clone(), action.instantiate(subs, origin, 0, 0, universe, rng)))
            .collect();
        result
    }

    /// The first content this NPC uses that is not fully defined.
    pub fn validate(&self, universe: &UniverseObjects) -> Option<String> {
        if let Some(ship) = self.ships.iter().find(|s| !universe.ships.is_defined(s.model)) {
            return Some(format!("ship \"{}\"", universe.ships.name_of(ship.model)));
        }
        if let Some(fleet) = self.stock_fleets.iter().find(|f| !universe.fleets.is_defined(**f)) {
            return Some(format!("fleet \"{}\"", universe.fleets.name_of(*fleet)));
        }
        self.actions.values().find_map(|action| action.validate(universe))
    }

    /// Write an instantiated NPC.
    pub fn save(&self, writer: &mut DataWriter, universe: &UniverseObjects) {
        writer.write(["npc"]);
        writer.begin_child();
        if !self.succeed_if.is_empty() {
            writer.write(["succeed".to_owned(), self.succeed_if.bits().to_string()]);
        }
        if !self.fail_if.is_empty() {
            writer.write(["fail".to_owned(), self.fail_if.bits().to_string()]);
        }
        if self.must_evade {
            writer.write(["evade"]);
        }
        if self.must_accompany {
            writer.write(["accompany"]);
        }
        if self.passed_spawn {
            writer.write(["spawned"]);
        } else {
            self.to_spawn.save_block(writer, &["to", "spawn"]);
        }
        if self.passed_despawn {
            writer.write(["despawned"]);
        } else {
            self.to_despawn.save_block(writer, &["to", "despawn"]);
        }
        if let Some(system) = self.system {
            writer.write(["system", universe.systems.name_of(system)]);
        }
        if let Some(planet) = self.planet {
            writer.write(["planet", universe.planets.name_of(planet)]);
        }
        if let Some(government) = self.government {
            writer.write(["government", universe.governments.name_of(government)]);
        }
        if !self.personality.is_empty() {
            let mut tokens = vec!["personality"];
            tokens.extend(self.personality.iter().map(String::as_str));
            writer.write(tokens);
        }
        if !self.dialog_text.is_empty() {
            writer.write(["dialog"]);
            writer.begin_child();
            for line in self.dialog_text.split(PARAGRAPH_BREAK) {
                writer.write([line]);
            }
            writer.end_child();
        }
        if let Some(conversation) = &self.conversation {
            conversation.save(writer, universe);
        }
        for ship in &self.ships {
            writer.write(["ship", universe.ships.name_of(ship.model), ship.name.as_str()]);
            if !ship.events.is_empty() {
                writer.begin_child();
                writer.write(["actions".to_owned(), ship.events.bits().to_string()]);
                writer.end_child();
            }
        }
        for action in self.actions.values() {
            action.save(writer, universe);
        }
        for trigger in &self.fired {
            writer.write(["fired", trigger.as_str()]);
        }
        writer.end_child();
    }
}

const fn is_immobile(ship: &NpcShip) -> bool {
    ship.events
        .intersects(ShipEvents::from_bits(ShipEvents::DISABLE.bits() | ShipEvents::CAPTURE.bits() | ShipEvents::DESTROY.bits()))
}

fn bits(value: f64) -> u32 {
    u32::try_from(starloom_conditions::expression::to_i64(value)).unwrap_or(0)
}

fn count(value: f64) -> usize {
    usize::try_from(starloom_conditions::expression::to_i64(value)).unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use starloom_data::DataFile;

    fn load(text: &str, universe: &mut UniverseObjects) -> Npc {
        let file = DataFile::parse(text, "t").unwrap();
        let mut npc = Npc::load(&file.nodes()[0], universe);
        npc.update_spawning(&ConditionsStore::new());
        npc
    }

    #[test]
    fn header_sets_objectives() {
        let mut universe = UniverseObjects::default();
        let npc = load("npc kill board\n\tship Sparrow \"Red One\"\n", &mut universe);
        assert_eq!(npc.succeed_if, ShipEvents::DESTROY | ShipEvents::BOARD);
        assert_eq!(npc.ships[0].name, "Red One");
        assert!(npc.is_active());
        assert!(!npc.has_succeeded(None));
    }

    #[test]
    fn save_fails_when_the_ship_dies() {
        let mut universe = UniverseObjects::default();
        let mut npc = load("npc save\n\tship Sparrow Wren\n", &mut universe);
        npc.ships[0].events |= ShipEvents::DESTROY;
        assert!(npc.has_failed());
        assert!(!npc.has_succeeded(None));
    }

    #[test]
    fn unspawned_npc_is_ignored() {
        let mut universe = UniverseObjects::default();
        let file = DataFile::parse("npc kill\n\tto spawn\n\t\tnever\n\tship Sparrow\n", "t").unwrap();
        let mut npc = Npc::load(&file.nodes()[0], &mut universe);
        npc.update_spawning(&ConditionsStore::new());
        assert!(!npc.is_active());
        assert!(npc.has_succeeded(None));
        assert!(!npc.has_failed());
    }

    #[test]
    fn saved_ship_events_reload() {
        let mut universe = UniverseObjects::default();
        let npc = load("npc kill\n\tship Sparrow Wren\n\t\tactions 64\n", &mut universe);
        assert!(npc.has_succeeded(None));
    }
}
