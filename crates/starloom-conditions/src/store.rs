//! [`ConditionsStore`]: the map from condition name to value.
//!
//! Values come from two places. Primary conditions are a plain map that
//! assignments write to and saves persist. Derived conditions are computed by
//! providers registered under a name prefix (`"reputation: "`, `"ships: "`,
//! `"credits"`). A read consults the provider with the longest matching
//! prefix first and falls back to the plain map.
//!
//! Writing a derived name stores a pending primary value. Until the
//! provider's owner takes it back with [`ConditionsStore::take_pending`], the
//! pending value is what reads of that name return.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use starloom_data::{DataNode, DataWriter};

/// A read-only source of derived condition values.
pub trait ConditionProvider: Send + Sync {
    /// The value of `name`, which starts with this provider's prefix.
    fn get(&self, name: &str) -> i64;

    /// Whether this provider defines `name`. A provider that does not know
    /// a name lets the read fall through to the plain map.
    fn has(&self, name: &str) -> bool {
        let _ = name;
        true
    }
}

impl<F> ConditionProvider for F
where
    F: Fn(&str) -> i64 + Send + Sync,
{
    fn get(&self, name: &str) -> i64 {
        self(name)
    }
}

/// A shared table of derived values, refreshed by its owner and read
/// through the store.
///
/// Cloning shares the table.
#[derive(Debug, Clone, Default)]
pub struct DerivedTable {
    values: Arc<RwLock<BTreeMap<String, i64>>>,
}

impl DerivedTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value at once.
    pub fn replace(&self, values: BTreeMap<String, i64>) {
        let mut guard = self.values.write().unwrap_or_else(PoisonError::into_inner);
        *guard = values;
    }

    /// Set one value.
    pub fn set(&self, name: &str, value: i64) {
        let mut guard = self.values.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(name.to_owned(), value);
    }

    /// Read one value; absent names read as zero.
    pub fn value(&self, name: &str) -> i64 {
        let guard = self.values.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(name).copied().unwrap_or(0)
    }
}

impl ConditionProvider for DerivedTable {
    fn get(&self, name: &str) -> i64 {
        self.value(name)
    }
}

/// Condition values: a plain map plus prefix providers.
#[derive(Clone, Default)]
pub struct ConditionsStore {
    primaries: BTreeMap<String, i64>,
    providers: BTreeMap<String, Arc<dyn ConditionProvider>>,
}

impl std::fmt::Debug for ConditionsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionsStore")
            .field("primaries", &self.primaries)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConditionsStore {
    /// An empty store with no providers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with primary values.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        Self {
            primaries: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            providers: BTreeMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// The value of `name`: a pending write if there is one, derived if a
    /// provider covers it, otherwise the primary value, otherwise zero.
    pub fn get(&self, name: &str) -> i64 {
        let primary = self.primaries.get(name).copied();
        match self.provider_for(name) {
            Some(provider) => primary.unwrap_or_else(|| provider.get(name)),
            None => primary.unwrap_or(0),
        }
    }

    /// Whether a provider covers `name`.
    pub fn is_derived(&self, name: &str) -> bool {
        self.provider_for(name).is_some()
    }

    /// Whether `name` has a primary entry or a provider that defines it.
    pub fn has(&self, name: &str) -> bool {
        self.provider_for(name).is_some() || self.primaries.contains_key(name)
    }

    /// The primary value only, ignoring providers.
    pub fn primary(&self, name: &str) -> Option<i64> {
        self.primaries.get(name).copied()
    }

    /// Number of primary entries.
    pub fn primaries_len(&self) -> usize {
        self.primaries.len()
    }

    /// Primary entries in name order.
    pub fn primaries(&self) -> impl Iterator<Item = (&str, i64)> {
        self.primaries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    fn provider_for(&self, name: &str) -> Option<&Arc<dyn ConditionProvider>> {
        self.providers
            .iter()
            .filter(|(prefix, provider)| name.starts_with(prefix.as_str()) && provider.has(name))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, provider)| provider)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Set a primary value.
    pub fn set(&mut self, name: &str, value: i64) {
        if let Some(slot) = self.primaries.get_mut(name) {
            *slot = value;
        } else {
            self.primaries.insert(name.to_owned(), value);
        }
    }

    /// Add to a primary value, saturating. Returns the new value.
    pub fn add(&mut self, name: &str, delta: i64) -> i64 {
        let slot = self.entry(name);
        *slot = slot.saturating_add(delta);
        *slot
    }

    /// Increment by one.
    pub fn increment(&mut self, name: &str) -> i64 {
        self.add(name, 1)
    }

    /// Decrement by one.
    pub fn decrement(&mut self, name: &str) -> i64 {
        self.add(name, -1)
    }

    /// The primary slot for `name`, created as zero if absent.
    pub fn entry(&mut self, name: &str) -> &mut i64 {
        self.primaries.entry(name.to_owned()).or_insert(0)
    }

    /// Remove a primary entry. Returns whether one existed.
    pub fn erase(&mut self, name: &str) -> bool {
        self.primaries.remove(name).is_some()
    }

    /// Remove and return every pending write to a derived name, in name
    /// order.
    pub fn take_pending(&mut self) -> Vec<(String, i64)> {
        let pending: Vec<String> = self
            .primaries
            .keys()
            .filter(|name| self.provider_for(name).is_some())
            .cloned()
            .collect();
        pending
            .into_iter()
            .filter_map(|name| self.primaries.remove(&name).map(|value| (name, value)))
            .collect()
    }

    /// Drop every primary entry. Providers stay.
    pub fn clear_primaries(&mut self) {
        self.primaries.clear();
    }

    // ------------------------------------------------------------------
    // Providers
    // ------------------------------------------------------------------

    /// Register `provider` for every name starting with `prefix`,
    /// replacing any earlier provider for the same prefix.
    pub fn set_provider(&mut self, prefix: &str, provider: Arc<dyn ConditionProvider>) {
        self.providers.insert(prefix.to_owned(), provider);
    }

    /// Unregister the provider for `prefix`.
    pub fn remove_provider(&mut self, prefix: &str) -> bool {
        self.providers.remove(prefix).is_some()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Read `name value` children (a bare name means 1) into the plain map.
    pub fn load(&mut self, node: &DataNode) {
        for child in node.children() {
            let value = if child.size() >= 2 {
                crate::expression::parse_literal(child.token(1))
                    .unwrap_or_else(|| crate::expression::to_i64(child.value(1)))
            } else {
                1
            };
            self.set(child.token(0), value);
        }
    }

    /// Write a `conditions` block with every non-zero primary value.
    /// Pending writes to derived names are not saved.
    pub fn save(&self, writer: &mut DataWriter) {
        let saved: Vec<(&String, i64)> = self
            .primaries
            .iter()
            .filter(|(name, value)| **value != 0 && self.provider_for(name).is_none())
            .map(|(name, value)| (name, *value))
            .collect();
        if saved.is_empty() {
            return;
        }
        writer.write(["conditions"]);
        writer.begin_child();
        for (name, value) in saved {
            match value {
                0 => {}
                1 => writer.write([name.as_str()]),
                v => writer.write([name.clone(), v.to_string()]),
            }
        }
        writer.end_child();
    }
}
