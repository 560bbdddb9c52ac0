//! Governments: who owns what, and how they react to the player.

use std::collections::BTreeMap;

use starloom_core::Handle;
use starloom_data::DataNode;
use starloom_types::ShipEvents;

use super::Fleet;
use crate::conversation::Conversation;
use crate::phrase::Phrase;
use crate::universe::UniverseObjects;

/// A government definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Government {
    /// Name shown to the player.
    pub display_name: String,
    /// Map colour.
    pub color: (f64, f64, f64),
    /// Reputation a new pilot starts with.
    pub initial_reputation: f64,
    /// How much this government shares another's feelings. Positive values
    /// are allies, negative values enemies.
    pub attitude_toward: BTreeMap<Handle<Self>, f64>,
    /// Reputation lost per offence.
    pub penalty_for: Vec<(ShipEvents, f64)>,
    /// Fraction of the player's credits a bribe costs. Zero refuses bribes.
    pub bribe: f64,
    /// Multiplier on illegal-cargo fines.
    pub fine: f64,
    /// Conversation shown when a fine cannot be paid.
    pub death_sentence: Option<Handle<Conversation>>,
    /// Hail phrases.
    pub friendly_hail: Option<Handle<Phrase>>,
    /// Hail phrases.
    pub hostile_hail: Option<Handle<Phrase>>,
    /// Language the player must know to understand hails.
    pub language: String,
    /// Fleet sent to raid a player carrying too much cargo.
    pub raid: Option<Handle<Fleet>>,
    /// Lowest reputation this government can hold.
    pub reputation_min: Option<f64>,
    /// Highest reputation this government can hold.
    pub reputation_max: Option<f64>,
}

impl Default for Government {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            color: (1.0, 1.0, 1.0),
            initial_reputation: 0.0,
            attitude_toward: BTreeMap::new(),
            penalty_for: default_penalties(),
            bribe: 0.0,
            fine: 1.0,
            death_sentence: None,
            friendly_hail: None,
            hostile_hail: None,
            language: String::new(),
            raid: None,
            reputation_min: None,
            reputation_max: None,
        }
    }
}

fn default_penalties() -> Vec<(ShipEvents, f64)> {
    vec![
        (ShipEvents::ASSIST, -0.1),
        (ShipEvents::DISABLE, 0.5),
        (ShipEvents::BOARD, 0.3),
        (ShipEvents::CAPTURE, 1.0),
        (ShipEvents::DESTROY, 1.0),
        (ShipEvents::ATROCITY, 10.0),
    ]
}

impl Government {
    /// Apply one `government <name>` definition.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        for child in node.children() {
            let has = |n: usize| child.size() >= n;
            match child.key() {
                "display name" if has(2) => child.token(1).clone_into(&mut self.display_name),
                "color" if has(4) => self.color = (child.value(1), child.value(2), child.value(3)),
                "player reputation" if has(2) => self.initial_reputation = child.value(1),
                "attitude toward" => {
                    for grand in child.children() {
                        if grand.size() >= 2 {
                            let other = universe.governments.get(grand.token(0));
                            self.attitude_toward.insert(other, grand.value(1));
                        } else {
                            grand.print_trace("Skipping unrecognized attribute:");
                        }
                    }
                }
                "penalty for" => {
                    for grand in child.children() {
                        match ShipEvents::from_token(grand.key()) {
                            Some(event) if grand.size() >= 2 => {
                                self.penalty_for.retain(|(e, _)| *e != event);
                                self.penalty_for.push((event, grand.value(1)));
                            }
                            _ => {
                                grand.print_trace("Skipping unrecognized attribute:");
                            }
                        }
                    }
                }
                "bribe" if has(2) => self.bribe = child.value(1),
                "fine" if has(2) => self.fine = child.value(1),
                "death sentence" if has(2) => {
                    self.death_sentence = Some(universe.conversations.get(child.token(1)));
                }
                "friendly hail" if has(2) => self.friendly_hail = Some(universe.phrases.get(child.token(1))),
                "hostile hail" if has(2) => self.hostile_hail = Some(universe.phrases.get(child.token(1))),
                "language" if has(2) => child.token(1).clone_into(&mut self.language),
                "raid" if has(2) => self.raid = Some(universe.fleets.get(child.token(1))),
                "reputation" => {
                    for grand in child.children() {
                        match grand.key() {
                            "min" if grand.size() >= 2 => self.reputation_min = Some(grand.value(1)),
                            "max" if grand.size() >= 2 => self.reputation_max = Some(grand.value(1)),
                            _ => {
                                grand.print_trace("Skipping unrecognized attribute:");
                            }
                        }
                    }
                }
                "swizzle" | "friendly disabled hail" | "hostile disabled hail" | "enforces" | "provoked on scan" => {}
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }

    /// Reputation lost for every event in `events`.
    pub fn penalty_for(&self, events: ShipEvents) -> f64 {
        self.penalty_for
            .iter()
            .filter(|(event, _)| events.intersects(*event))
            .map(|(_, penalty)| penalty)
            .sum()
    }

    /// How this government feels about `other`. A government always agrees
    /// with itself.
    pub fn attitude_toward(&self, this: Handle<Self>, other: Handle<Self>) -> f64 {
        if this == other {
            return 1.0;
        }
        self.attitude_toward.get(&other).copied().unwrap_or(0.0)
    }

    /// `value` held within this government's reputation bounds.
    pub fn clamp_reputation(&self, value: f64) -> f64 {
        let value = self.reputation_min.map_or(value, |min| value.max(min));
        self.reputation_max.map_or(value, |max| value.min(max))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn penalties_sum_over_events() {
        let gov = Government::default();
        assert_eq!(gov.penalty_for(ShipEvents::DISABLE), 0.5);
        assert_eq!(gov.penalty_for(ShipEvents::KILL), 2.0);
        assert_eq!(gov.penalty_for(ShipEvents::SCAN_CARGO), 0.0);
    }

    #[test]
    fn bounds_clamp() {
        let gov = Government {
            reputation_min: Some(-5.0),
            reputation_max: Some(5.0),
            ..Government::default()
        };
        assert_eq!(gov.clamp_reputation(-20.0), -5.0);
        assert_eq!(gov.clamp_reputation(2.0), 2.0);
        assert_eq!(gov.clamp_reputation(9.0), 5.0);
    }
}
