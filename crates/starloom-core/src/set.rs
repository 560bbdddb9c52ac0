//! [`Set<T>`]: a string-keyed arena with stable handles.
//!
//! Entities refer to one another by [`Handle<T>`], an index into the set
//! that owns the target. Looking a name up with [`Set::get`] creates a
//! default stub the first time, so a system may link to a neighbour that is
//! defined later in the same file or in another file entirely. A loader
//! calls [`Set::mark_defined`] when it reads a real definition; stubs that
//! are never defined are what reference checking reports.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A stable reference to one entry of a [`Set<T>`].
pub struct Handle<T> {
    index: u32,
    marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    const fn new(index: u32) -> Self {
        Self {
            index,
            marker: PhantomData,
        }
    }

    /// Position of the entry in insertion order.
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    name: String,
    value: T,
    defined: bool,
}

/// An insertion-ordered, name-indexed collection of entities.
#[derive(Debug, Clone)]
pub struct Set<T> {
    entries: Vec<Entry<T>>,
    by_name: BTreeMap<String, u32>,
}

impl<T> Default for Set<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_name: BTreeMap::new(),
        }
    }
}

impl<T> Set<T> {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle for `name`, if the set has seen it.
    pub fn find(&self, name: &str) -> Option<Handle<T>> {
        self.by_name.get(name).map(|i| Handle::new(*i))
    }

    /// Whether `name` has an entry, stub or not.
    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of entries, stubs included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entity behind `handle`.
    pub fn value(&self, handle: Handle<T>) -> Option<&T> {
        self.entries.get(handle.index as usize).map(|e| &e.value)
    }

    /// Mutable access to the entity behind `handle`.
    pub fn value_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.entries.get_mut(handle.index as usize).map(|e| &mut e.value)
    }

    /// The entity named `name`, if present.
    pub fn find_value(&self, name: &str) -> Option<&T> {
        self.find(name).and_then(|h| self.value(h))
    }

    /// The name `handle` was created with, or the empty string for a handle
    /// from another set.
    pub fn name_of(&self, handle: Handle<T>) -> &str {
        self.entries
            .get(handle.index as usize)
            .map_or("", |e| e.name.as_str())
    }

    /// Record that `handle` now has a real definition.
    pub fn mark_defined(&mut self, handle: Handle<T>) {
        if let Some(entry) = self.entries.get_mut(handle.index as usize) {
            entry.defined = true;
        }
    }

    /// Whether `handle` has been defined rather than only referred to.
    pub fn is_defined(&self, handle: Handle<T>) -> bool {
        self.entries
            .get(handle.index as usize)
            .is_some_and(|e| e.defined)
    }

    /// Every entry in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Handle<T>, &T)> {
        self.entries
            .iter()
            .zip(0u32..)
            .map(|(e, i)| (e.name.as_str(), Handle::new(i), &e.value))
    }

    /// Every handle in insertion order.
    pub fn handles(&self) -> impl Iterator<Item = Handle<T>> + '_ {
        (0u32..).take(self.entries.len()).map(Handle::new)
    }

    /// Names of entries that were referred to but never defined.
    pub fn undefined_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.defined)
            .map(|e| e.name.as_str())
    }
}

impl<T: Default> Set<T> {
    /// The handle for `name`, inserting a default stub if it is new.
    /// Repeated calls return the same handle.
    pub fn get(&mut self, name: &str) -> Handle<T> {
        if let Some(index) = self.by_name.get(name) {
            return Handle::new(*index);
        }
        let index = u32::try_from(self.entries.len()).unwrap_or(u32::MAX);
        self.entries.push(Entry {
            name: name.to_owned(),
            value: T::default(),
            defined: false,
        });
        self.by_name.insert(name.to_owned(), index);
        Handle::new(index)
    }

    /// Mutable access by name, inserting a stub if needed.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        let handle = self.get(name);
        self.value_mut(handle)
    }

    /// Move the entity out, leaving a default in its place. Pair with
    /// [`put`](Self::put) to edit an entity while also borrowing the rest
    /// of the universe.
    pub fn take(&mut self, handle: Handle<T>) -> T {
        self.value_mut(handle).map(std::mem::take).unwrap_or_default()
    }

    /// Store `value` at `handle`.
    pub fn put(&mut self, handle: Handle<T>, value: T) {
        if let Some(slot) = self.value_mut(handle) {
            *slot = value;
        }
    }
}

impl<T: Default + Clone> Set<T> {
    /// Make this set equal to `other` without invalidating any handle.
    ///
    /// Entries of `other` are copied in (created if new). Entries that
    /// exist here but not in `other` are reset to a default stub.
    pub fn revert(&mut self, other: &Self) {
        for entry in &mut self.entries {
            if !other.by_name.contains_key(&entry.name) {
                entry.value = T::default();
                entry.defined = false;
            }
        }
        for source in &other.entries {
            let handle = self.get(&source.name);
            if let Some(entry) = self.entries.get_mut(handle.index as usize) {
                entry.value.clone_from(&source.value);
                entry.defined = source.defined;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct System {
        government: String,
    }

    #[test]
    fn get_is_stable() {
        let mut set: Set<System> = Set::new();
        let sol = set.get("Sol");
        for name in ["Alpha", "Sol", "Beta", "Gamma"] {
            set.get(name);
        }
        assert_eq!(set.get("Sol"), sol);
        assert_eq!(set.len(), 4);
        assert_eq!(set.name_of(sol), "Sol");
    }

    #[test]
    fn find_does_not_insert() {
        let mut set: Set<System> = Set::new();
        assert!(set.find("Sol").is_none());
        assert!(set.is_empty());
        set.get("Sol");
        assert!(set.find("Sol").is_some());
    }

    #[test]
    fn iteration_is_insertion_order() {
        let mut set: Set<System> = Set::new();
        for name in ["Zeta", "Alpha", "Mu"] {
            set.get(name);
        }
        let names: Vec<&str> = set.iter().map(|(n, _, _)| n).collect();
        assert_eq!(names, ["Zeta", "Alpha", "Mu"]);
    }

    #[test]
    fn stubs_until_defined() {
        let mut set: Set<System> = Set::new();
        let sol = set.get("Sol");
        set.get("Alpha");
        set.mark_defined(sol);
        assert!(set.is_defined(sol));
        assert_eq!(set.undefined_names().collect::<Vec<_>>(), ["Alpha"]);
    }

    #[test]
    fn revert_keeps_handles() {
        let mut set: Set<System> = Set::new();
        let sol = set.get("Sol");
        set.get_mut("Sol").unwrap().government = "Republic".to_owned();
        set.mark_defined(sol);
        let defaults = set.clone();

        set.get_mut("Sol").unwrap().government = "Pirate".to_owned();
        let added = set.get("New");
        set.mark_defined(added);

        set.revert(&defaults);
        assert_eq!(set.value(sol).unwrap().government, "Republic");
        assert_eq!(set.value(added), Some(&System::default()));
        assert!(!set.is_defined(added));
        assert_eq!(set.get("New"), added);
    }

    #[test]
    fn take_and_put() {
        let mut set: Set<System> = Set::new();
        let sol = set.get("Sol");
        let mut system = set.take(sol);
        system.government = "Republic".to_owned();
        set.put(sol, system);
        assert_eq!(set.find_value("Sol").unwrap().government, "Republic");
    }
}
