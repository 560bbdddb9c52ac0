//! Spaceport news items and named persons.

use rand::Rng;
use starloom_conditions::{ConditionSet, ConditionsStore};
use starloom_core::Handle;
use starloom_data::DataNode;

use super::{Government, Planet, ShipModel, System};
use crate::location_filter::LocationFilter;
use crate::phrase::PhraseRef;
use crate::universe::UniverseObjects;

/// A rumour shown in a spaceport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct News {
    /// Where the item may appear.
    pub location: LocationFilter,
    /// When the item may appear.
    pub to_show: ConditionSet,
    /// Who is speaking.
    pub speaker: Option<PhraseRef>,
    /// What they say.
    pub message: Option<PhraseRef>,
    /// Portrait sprites to pick from.
    pub portraits: Vec<String>,
}

impl News {
    /// Apply one `news <name>` definition.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        for child in node.children() {
            match child.key() {
                "location" => self.location.load(child, universe),
                "to" if child.size() >= 2 && child.token(1) == "show" => self.to_show.load(child),
                "name" => self.speaker = Some(PhraseRef::load(child, &mut universe.phrases)),
                "message" => self.message = Some(PhraseRef::load(child, &mut universe.phrases)),
                "portrait" => {
                    self.portraits
                        .extend(child.tokens().iter().skip(1).cloned());
                    for grand in child.children() {
                        self.portraits.extend(grand.tokens().iter().cloned());
                    }
                }
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }

    /// Whether the item can be shown on `planet` right now.
    pub fn matches(&self, planet: Handle<Planet>, store: &ConditionsStore, universe: &UniverseObjects) -> bool {
        self.message.is_some()
            && self.to_show.test(store)
            && self.location.matches_planet(planet, None, universe)
    }

    /// The speaker and the message, expanded.
    pub fn pick<R: Rng + ?Sized>(&self, universe: &UniverseObjects, rng: &mut R) -> (String, String) {
        let speaker = self
            .speaker
            .as_ref()
            .map(|p| p.get(&universe.phrases, rng))
            .unwrap_or_default();
        let message = self
            .message
            .as_ref()
            .map(|p| p.get(&universe.phrases, rng))
            .unwrap_or_default();
        (speaker, message)
    }
}

/// A unique named pilot who roams the galaxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    /// Systems the person may appear in.
    pub location: LocationFilter,
    /// Relative spawn weight.
    pub frequency: i64,
    /// Government the person flies for.
    pub government: Option<Handle<Government>>,
    /// Personality flags.
    pub personality: Vec<String>,
    /// The person's ships.
    pub ships: Vec<Handle<ShipModel>>,
    /// Hail phrase.
    pub hail: Option<PhraseRef>,
    /// When the person may appear.
    pub to_spawn: ConditionSet,
    /// Set once the person has been destroyed, or by `disable person`.
    pub disabled: bool,
}

impl Default for Person {
    fn default() -> Self {
        Self {
            location: LocationFilter::default(),
            frequency: 100,
            government: None,
            personality: Vec::new(),
            ships: Vec::new(),
            hail: None,
            to_spawn: ConditionSet::new(),
            disabled: false,
        }
    }
}

impl Person {
    /// Apply one `person <name>` definition.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        for child in node.children() {
            match child.key() {
                "system" | "location" => {
                    self.location = LocationFilter::default();
                    if child.size() >= 2 {
                        self.location.systems.insert(universe.systems.get(child.token(1)));
                    }
                    self.location.load(child, universe);
                }
                "frequency" if child.size() >= 2 => {
                    self.frequency = starloom_conditions::expression::to_i64(child.value(1));
                }
                "government" if child.size() >= 2 => {
                    self.government = Some(universe.governments.get(child.token(1)));
                }
                "personality" => {
                    self.personality = child.tokens().iter().skip(1).cloned().collect();
                    for grand in child.children() {
                        self.personality.extend(grand.tokens().iter().cloned());
                    }
                }
                "ship" if child.size() >= 2 => self.ships.push(universe.ships.get(child.token(1))),
                "phrase" | "hail" => self.hail = Some(PhraseRef::load(child, &mut universe.phrases)),
                "to" if child.size() >= 2 && child.token(1) == "spawn" => self.to_spawn.load(child),
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }

    /// Whether the person may spawn in `system` right now.
    pub fn can_spawn(&self, system: Handle<System>, store: &ConditionsStore, universe: &UniverseObjects) -> bool {
        !self.disabled
            && !self.ships.is_empty()
            && self.to_spawn.test(store)
            && self.location.matches_system(system, None, universe)
    }
}
