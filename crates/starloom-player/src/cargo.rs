//! [`CargoHold`]: commodities, spare outfits, mission cargo and passengers.
//!
//! Mission cargo and passengers are keyed by mission instance id. They are
//! not saved with the hold; reloading the missions puts them back. The hold
//! remembers the mass of every outfit it has seen, so capacity queries do
//! not need the outfit registry.
//!
//! # Invariants
//!
//! - With a size limit, `add` never takes the hold past its capacity; it
//!   returns how much actually fit.
//! - Quantities never go negative. Removing more than is held removes
//!   what there is.

use std::collections::BTreeMap;

use starloom_conditions::expression::to_i64;
use starloom_core::{Handle, Set};
use starloom_data::{DataNode, DataWriter};
use starloom_universe::entities::Outfit;
use starloom_universe::{Mission, UniverseObjects};

/// Everything carried in the fleet's holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CargoHold {
    size: Option<i64>,
    bunks: Option<i64>,
    commodities: BTreeMap<String, i64>,
    outfits: BTreeMap<Handle<Outfit>, i64>,
    masses: BTreeMap<Handle<Outfit>, f64>,
    mission_cargo: BTreeMap<u64, i64>,
    passengers: BTreeMap<u64, i64>,
}

/// Tons one outfit takes up in a hold.
fn outfit_tons(outfit: Handle<Outfit>, outfits: &Set<Outfit>) -> f64 {
    outfits.value(outfit).map_or(0., |o| o.mass.max(0.))
}

impl CargoHold {
    /// An empty hold with no capacity limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty the hold and lift its limits.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Limit the hold to `tons`.
    pub const fn set_size(&mut self, tons: i64) {
        self.size = Some(tons);
    }

    /// The size limit, if any.
    pub const fn size(&self) -> Option<i64> {
        self.size
    }

    /// Limit the passenger bunks.
    pub const fn set_bunks(&mut self, count: i64) {
        self.bunks = Some(count);
    }

    /// Replace both limits; `None` lifts a limit.
    pub const fn set_limits(&mut self, size: Option<i64>, bunks: Option<i64>) {
        self.size = size;
        self.bunks = bunks;
    }

    /// Tons in use.
    pub fn used(&self) -> i64 {
        self.commodities_size()
            .saturating_add(self.outfits_size())
            .saturating_add(self.mission_cargo_size())
    }

    /// Free tons. Unlimited holds report `i64::MAX`.
    pub fn free(&self) -> i64 {
        self.size.map_or(i64::MAX, |size| size.saturating_sub(self.used()))
    }

    /// Tons of commodities.
    pub fn commodities_size(&self) -> i64 {
        self.commodities.values().fold(0_i64, |sum, tons| sum.saturating_add(*tons))
    }

    /// Tons of spare outfits.
    pub fn outfits_size(&self) -> i64 {
        let tons = self.outfits.iter().fold(0., |sum, (outfit, count)| {
            #[allow(clippy::cast_precision_loss)]
            let count = *count as f64;
            let mass = self.masses.get(outfit).copied().unwrap_or(0.);
            mass.mul_add(count, sum)
        });
        to_i64(tons.ceil())
    }

    /// Tons of mission cargo.
    pub fn mission_cargo_size(&self) -> i64 {
        self.mission_cargo.values().fold(0_i64, |sum, tons| sum.saturating_add(*tons))
    }

    /// Passengers aboard.
    pub fn passengers(&self) -> i64 {
        self.passengers.values().fold(0_i64, |sum, count| sum.saturating_add(*count))
    }

    /// Free bunks. Unlimited holds report `i64::MAX`.
    pub fn bunks_free(&self) -> i64 {
        self.bunks
            .map_or(i64::MAX, |bunks| bunks.saturating_sub(self.passengers()))
    }

    /// Whether the hold carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.commodities.values().all(|t| *t == 0)
            && self.outfits.values().all(|c| *c == 0)
            && self.mission_cargo.is_empty()
            && self.passengers.is_empty()
    }

    /// Tons of `commodity`.
    pub fn commodity(&self, commodity: &str) -> i64 {
        self.commodities.get(commodity).copied().unwrap_or(0)
    }

    /// Every commodity with its tonnage.
    pub fn commodities(&self) -> impl Iterator<Item = (&str, i64)> {
        self.commodities.iter().map(|(name, tons)| (name.as_str(), *tons))
    }

    /// Copies of `outfit`.
    pub fn outfit(&self, outfit: Handle<Outfit>) -> i64 {
        self.outfits.get(&outfit).copied().unwrap_or(0)
    }

    /// Every spare outfit with its count.
    pub fn outfits(&self) -> impl Iterator<Item = (Handle<Outfit>, i64)> + '_ {
        self.outfits.iter().map(|(outfit, count)| (*outfit, *count))
    }

    /// Tons carried for mission `id`.
    pub fn mission_cargo(&self, id: u64) -> Option<i64> {
        self.mission_cargo.get(&id).copied()
    }

    /// Passengers carried for mission `id`.
    pub fn mission_passengers(&self, id: u64) -> i64 {
        self.passengers.get(&id).copied().unwrap_or(0)
    }

    /// Add up to `tons` of `commodity`; a negative amount removes. Returns
    /// how much was added.
    pub fn add_commodity(&mut self, commodity: &str, tons: i64) -> i64 {
        if tons < 0 {
            return self.remove_commodity(commodity, tons.saturating_neg()).saturating_neg();
        }
        let tons = tons.min(self.free()).max(0);
        let entry = self.commodities.entry(commodity.to_owned()).or_default();
        *entry = entry.saturating_add(tons);
        tons
    }

    /// Remove up to `tons` of `commodity`. Returns how much was removed.
    pub fn remove_commodity(&mut self, commodity: &str, tons: i64) -> i64 {
        let Some(entry) = self.commodities.get_mut(commodity) else {
            return 0;
        };
        let removed = tons.clamp(0, *entry);
        *entry = entry.saturating_sub(removed);
        if *entry == 0 {
            self.commodities.remove(commodity);
        }
        removed
    }

    /// Add up to `count` copies of `outfit`, as many as fit. Returns how
    /// many were added.
    pub fn add_outfit(&mut self, outfit: Handle<Outfit>, count: i64, outfits: &Set<Outfit>) -> i64 {
        if count < 0 {
            return self.remove_outfit(outfit, count.saturating_neg()).saturating_neg();
        }
        let mass = outfit_tons(outfit, outfits);
        self.masses.insert(outfit, mass);
        let fits = if self.size.is_some() && mass > 0. {
            #[allow(clippy::cast_precision_loss)]
            let free = self.free().max(0) as f64;
            to_i64((free / mass).floor())
        } else {
            i64::MAX
        };
        let count = count.min(fits).max(0);
        if count > 0 {
            let entry = self.outfits.entry(outfit).or_default();
            *entry = entry.saturating_add(count);
        }
        count
    }

    /// Remove up to `count` copies of `outfit`. Returns how many were
    /// removed.
    pub fn remove_outfit(&mut self, outfit: Handle<Outfit>, count: i64) -> i64 {
        let Some(entry) = self.outfits.get_mut(&outfit) else {
            return 0;
        };
        let removed = count.clamp(0, *entry);
        *entry = entry.saturating_sub(removed);
        if *entry == 0 {
            self.outfits.remove(&outfit);
        }
        removed
    }

    /// Load a mission's cargo and passengers. A named cargo gets an entry
    /// even if it weighs nothing.
    pub fn add_mission_cargo(&mut self, mission: &Mission) {
        if !mission.cargo().is_empty() {
            let entry = self.mission_cargo.entry(mission.id()).or_default();
            *entry = entry.saturating_add(mission.cargo_size());
        }
        if mission.passengers() != 0 {
            let entry = self.passengers.entry(mission.id()).or_default();
            *entry = entry.saturating_add(mission.passengers());
        }
    }

    /// Unload everything belonging to mission `id`.
    pub fn remove_mission_cargo(&mut self, id: u64) {
        self.mission_cargo.remove(&id);
        self.passengers.remove(&id);
    }

    /// Drop cargo and passengers of every mission not in `active`.
    pub fn retain_missions(&mut self, active: &[u64]) {
        self.mission_cargo.retain(|id, _| active.contains(id));
        self.passengers.retain(|id, _| active.contains(id));
    }

    /// Value of the commodities at `prices` plus the outfits at full
    /// depreciation (a quarter of their cost).
    pub fn value(&self, prices: &BTreeMap<String, i64>, universe: &UniverseObjects) -> i64 {
        let commodities = self.commodities.iter().fold(0_i64, |sum, (name, tons)| {
            sum.saturating_add(prices.get(name).copied().unwrap_or(0).saturating_mul(*tons))
        });
        self.outfits.iter().fold(commodities, |sum, (outfit, count)| {
            let cost = universe.outfits.value(*outfit).map_or(0, |o| o.cost);
            sum.saturating_add(cost.saturating_mul(*count) / 4)
        })
    }

    /// The worst fine for spare outfits in this hold. Carrying an illegal
    /// outfit is half as bad as having it installed; `None` means an
    /// atrocity.
    pub fn illegal_outfit_fine(&self, outfits: &Set<Outfit>) -> Option<i64> {
        let mut worst = 0_i64;
        for outfit in self.outfits.keys() {
            let Some(data) = outfits.value(*outfit) else {
                continue;
            };
            if data.attribute("atrocity") > 0. || data.attribute("illegal") < 0. {
                return None;
            }
            worst = worst.max(to_i64(data.attribute("illegal")) / 2);
        }
        Some(worst)
    }

    /// Read a `cargo` block, adding to what is already held.
    pub fn load(&mut self, node: &DataNode, universe: &mut UniverseObjects) {
        for child in node.children() {
            match child.key() {
                "commodities" => {
                    for grand in child.children().iter().filter(|g| g.size() >= 2) {
                        let entry = self.commodities.entry(grand.token(0).to_owned()).or_default();
                        *entry = entry.saturating_add(to_i64(grand.value(1)));
                    }
                }
                "outfits" => {
                    for grand in child.children() {
                        let outfit = universe.outfits.get(grand.token(0));
                        self.masses.insert(outfit, outfit_tons(outfit, &universe.outfits));
                        let count = if grand.size() >= 2 { to_i64(grand.value(1)) } else { 1 };
                        let entry = self.outfits.entry(outfit).or_default();
                        *entry = entry.saturating_add(count);
                    }
                }
                _ => {
                    child.print_trace("Skipping unrecognized attribute:");
                }
            }
        }
    }

    /// Write a `cargo` block, or nothing if there are no commodities or
    /// outfits.
    pub fn save(&self, writer: &mut DataWriter, universe: &UniverseObjects) {
        let commodities: Vec<_> = self.commodities.iter().filter(|(_, t)| **t != 0).collect();
        let outfits: Vec<_> = self.outfits.iter().filter(|(_, c)| **c != 0).collect();
        if commodities.is_empty() && outfits.is_empty() {
            return;
        }
        writer.write(["cargo"]);
        writer.begin_child();
        if !commodities.is_empty() {
            writer.write(["commodities"]);
            writer.begin_child();
            for (name, tons) in commodities {
                writer.write([name.clone(), tons.to_string()]);
            }
            writer.end_child();
        }
        if !outfits.is_empty() {
            writer.write(["outfits"]);
            writer.begin_child();
            for (outfit, count) in outfits {
                writer.write([universe.outfits.name_of(*outfit).to_owned(), count.to_string()]);
            }
            writer.end_child();
        }
        writer.end_child();
    }
}
