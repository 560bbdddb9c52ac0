//! The player's standing with every government.
//!
//! Reputation is a number per government that rises and falls with what
//! the player does. Penalties spread: offending one government also
//! changes the player's standing with every government that has an
//! attitude toward it, in proportion to that attitude. On top of the
//! permanent numbers sit day-long states (provoked, bribed, fined) that
//! [`Politics::reset_daily`] clears.
//!
//! # Invariants
//!
//! - Attitudes weaker than [`MIN_ATTITUDE`] never change reputation.
//! - A government fines the player at most once per day.
//! - Every stored reputation respects its government's bounds.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use starloom_conditions::expression::to_i64;
use starloom_core::Handle;
use starloom_data::{DataNode, DataWriter};
use starloom_types::ShipEvents;
use starloom_universe::UniverseObjects;
use starloom_universe::conversation::Conversation;
use starloom_universe::entities::{Government, Planet};

/// Attitudes weaker than this do not carry reputation changes across.
pub const MIN_ATTITUDE: f64 = 0.05;

/// What a security scan turned up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contraband {
    /// Largest fine for illegal cargo found, with the reason text.
    pub cargo: Option<(i64, String)>,
    /// Largest fine for illegal outfits found.
    pub outfits: i64,
    /// Whether anything counted as an atrocity.
    pub atrocity: bool,
}

/// The result of [`Politics::fine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing happened.
    Clear,
    /// The player owes `amount` credits.
    Fined {
        /// The fine, already scaled by the government's leniency.
        amount: i64,
        /// The message shown to the player.
        message: String,
    },
    /// The player committed an atrocity and will be executed.
    Death {
        /// The message shown to the player.
        message: String,
        /// The government's death sentence conversation.
        conversation: Option<Handle<Conversation>>,
    },
}

/// Reputation and day-long diplomatic states.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Politics {
    reputation: BTreeMap<Handle<Government>, f64>,
    provoked: BTreeSet<Handle<Government>>,
    bribed: BTreeSet<Handle<Government>>,
    fined: BTreeSet<Handle<Government>>,
    bribed_planets: BTreeMap<Handle<Planet>, bool>,
    dominated: BTreeSet<Handle<Planet>>,
}

impl Politics {
    /// No reputation with anyone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over from every government's initial reputation. Fines are
    /// suspended for the rest of the day.
    pub fn reset(&mut self, universe: &UniverseObjects) {
        self.reputation.clear();
        self.dominated.clear();
        self.reset_daily();
        for (_, handle, government) in universe.governments.iter() {
            self.reputation.insert(handle, government.initial_reputation);
            self.fined.insert(handle);
        }
    }

    /// Forget provocations, bribes and today's fines.
    pub fn reset_daily(&mut self) {
        self.provoked.clear();
        self.bribed.clear();
        self.bribed_planets.clear();
        self.fined.clear();
    }

    /// The player's reputation with `government`.
    pub fn reputation(&self, government: Handle<Government>) -> f64 {
        self.reputation.get(&government).copied().unwrap_or(0.)
    }

    /// Every reputation the player has.
    pub fn reputations(&self) -> impl Iterator<Item = (Handle<Government>, f64)> + '_ {
        self.reputation.iter().map(|(g, r)| (*g, *r))
    }

    /// Change the reputation with `government` by `value`.
    pub fn add_reputation(&mut self, government: Handle<Government>, value: f64, universe: &UniverseObjects) {
        let current = self.reputation(government);
        self.set_reputation(government, current + value, universe);
    }

    /// Set the reputation with `government`.
    pub fn set_reputation(&mut self, government: Handle<Government>, value: f64, universe: &UniverseObjects) {
        let value = universe
            .governments
            .value(government)
            .map_or(value, |g| g.clamp_reputation(value));
        self.reputation.insert(government, value);
    }

    /// Whether `government` is hostile to the player today.
    pub fn is_enemy(&self, government: Handle<Government>) -> bool {
        if self.bribed.contains(&government) {
            return false;
        }
        if self.provoked.contains(&government) {
            return true;
        }
        self.reputation(government) < 0.
    }

    /// Whether two governments other than the player's are hostile.
    pub fn are_enemies(first: Handle<Government>, second: Handle<Government>, universe: &UniverseObjects) -> bool {
        if first == second {
            return false;
        }
        let attitude = |a: Handle<Government>, b: Handle<Government>| {
            universe.governments.value(a).map_or(0., |g| g.attitude_toward(a, b))
        };
        attitude(first, second) < 0. || attitude(second, first) < 0.
    }

    /// The player did `events` to `count` crew of `government`'s ships.
    /// Every government with an attitude toward `government` reacts.
    /// Provocation only lasts the day; everything else is permanent.
    pub fn offend(
        &mut self,
        government: Handle<Government>,
        events: ShipEvents,
        count: i64,
        universe: &UniverseObjects,
    ) {
        for (name, other, data) in universe.governments.iter() {
            let weight = data.attitude_toward(other, government);
            if events.contains(ShipEvents::PROVOKE) {
                if weight > 0. {
                    self.bribed.remove(&other);
                    self.provoked.insert(other);
                }
            } else if count != 0 && weight.abs() >= MIN_ATTITUDE {
                #[allow(clippy::cast_precision_loss)]
                let count = count as f64;
                let penalty = count * weight * data.penalty_for(events);
                let mut value = self.reputation(other);
                if events.contains(ShipEvents::ATROCITY) && weight > 0. {
                    value = value.min(0.);
                }
                self.set_reputation(other, value - penalty, universe);
                tracing::debug!(government = name, penalty, "reputation changed");
            }
        }
    }

    /// Bribe `government` to be friendly for the rest of the day.
    pub fn bribe(&mut self, government: Handle<Government>) {
        self.bribed.insert(government);
        self.provoked.remove(&government);
        self.fined.insert(government);
    }

    /// Whether the player may land on `planet`.
    pub fn can_land(&self, planet: Handle<Planet>, universe: &UniverseObjects) -> bool {
        let Some(data) = universe.planets.value(planet) else {
            return false;
        };
        if data.system.is_none() {
            return false;
        }
        if !data.is_inhabited() || self.dominated.contains(&planet) || self.bribed_planets.contains_key(&planet) {
            return true;
        }
        let Some(owner) = data.owner(universe) else {
            return true;
        };
        if self.provoked.contains(&owner) {
            return false;
        }
        data.can_land(self.reputation(owner))
    }

    /// Whether the player may use `planet`'s spaceport and shops.
    pub fn can_use_services(&self, planet: Handle<Planet>, universe: &UniverseObjects) -> bool {
        let Some(data) = universe.planets.value(planet) else {
            return false;
        };
        if data.system.is_none() {
            return false;
        }
        if self.dominated.contains(&planet) {
            return true;
        }
        if let Some(full) = self.bribed_planets.get(&planet) {
            return *full;
        }
        data.owner(universe).is_none_or(|owner| data.can_land(self.reputation(owner)))
    }

    /// Bribe `planet` for landing rights, with or without its services.
    pub fn bribe_planet(&mut self, planet: Handle<Planet>, full_access: bool) {
        self.bribed_planets.insert(planet, full_access);
    }

    /// Mark `planet` dominated, or release it.
    pub fn dominate_planet(&mut self, planet: Handle<Planet>, dominate: bool) {
        if dominate {
            self.dominated.insert(planet);
        } else {
            self.dominated.remove(&planet);
        }
    }

    /// Whether the player dominates `planet`.
    pub fn has_dominated(&self, planet: Handle<Planet>) -> bool {
        self.dominated.contains(&planet)
    }

    /// `government` scans the player with the given `security` (the chance
    /// of being caught). `scanned` is what was found.
    pub fn fine<R: Rng + ?Sized>(
        &mut self,
        government: Handle<Government>,
        security: f64,
        scanned: &Contraband,
        universe: &UniverseObjects,
        rng: &mut R,
    ) -> Verdict {
        let Some(data) = universe.governments.value(government) else {
            return Verdict::Clear;
        };
        if self.fined.contains(&government) || data.fine <= 0. || rng.random::<f64>() > security {
            return Verdict::Clear;
        }
        let name = if data.display_name.is_empty() {
            universe.governments.name_of(government)
        } else {
            data.display_name.as_str()
        };

        if scanned.atrocity {
            self.offend(government, ShipEvents::ATROCITY, 1, universe);
            return Verdict::Death {
                message: format!(
                    "The {name} authorities have found something on your ship that they consider an atrocity."
                ),
                conversation: data.death_sentence,
            };
        }

        let (base, reason) = match &scanned.cargo {
            Some((fine, reason)) if *fine >= scanned.outfits && *fine > 0 => (*fine, reason.clone()),
            _ if scanned.outfits > 0 => (
                scanned.outfits,
                " for having illegal outfits installed on your ship.".to_owned(),
            ),
            _ => return Verdict::Clear,
        };
        #[allow(clippy::cast_precision_loss)]
        let amount = to_i64(base as f64 * data.fine);
        self.fined.insert(government);
        Verdict::Fined {
            amount,
            message: format!("The {name} authorities fine you {amount} credits{reason}"),
        }
    }

    /// Read a `reputation with` block.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        for child in node.children().iter().filter(|c| c.size() >= 2) {
            let government = universe.governments.get(child.token(0));
            self.reputation.insert(government, child.value(1));
        }
    }

    /// Write a `reputation with` block.
    pub fn save(&self, writer: &mut DataWriter, universe: &UniverseObjects) {
        writer.write(["reputation with"]);
        writer.begin_child();
        for (government, value) in &self.reputation {
            writer.write_token(universe.governments.name_of(*government));
            writer.write_number(*value);
            writer.end_line();
        }
        writer.end_child();
    }
}
