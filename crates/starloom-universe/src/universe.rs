//! [`UniverseObjects`]: every content registry, and the dispatcher that
//! fills them.
//!
//! Loading has two phases. [`UniverseObjects::load_sources`] parses every
//! data file (in parallel) and feeds each root node to the loader
//! registered for its keyword, in source order. Then
//! [`UniverseObjects::finish_loading`] resolves what only makes sense once
//! everything is read, and [`UniverseObjects::check_references`] reports
//! names that were used but never defined.
//!
//! After loading, the registries change only through
//! [`UniverseObjects::change`], which re-enters the same dispatcher with a
//! single node from a [`GameEvent`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use starloom_core::{Handle, Set, Source};
use starloom_data::{DataFile, DataNode};

use crate::conversation::Conversation;
use crate::entities::records::load_list;
use crate::entities::{
    Fleet, GameRules, Government, NamedLists, News, Outfit, Person, Planet, Sale, ShipModel, StartConditions, System,
    Trade,
};
use crate::error::UniverseError;
use crate::game_event::{GameEvent, is_change_keyword};
use crate::mission::Mission;
use crate::phrase::{Phrase, find_cycles};
use crate::test_def::{TestData, TestDef};
use crate::text_replacements::TextReplacements;

// ---------------------------------------------------------------------------
// Loader registry
// ---------------------------------------------------------------------------

/// Something that can apply one root node to the universe.
pub trait Loader: Send + Sync {
    /// Apply `node`, whose first token selected this loader.
    fn load(&self, universe: &mut UniverseObjects, node: &DataNode);
}

impl<F> Loader for F
where
    F: Fn(&mut UniverseObjects, &DataNode) + Send + Sync,
{
    fn load(&self, universe: &mut UniverseObjects, node: &DataNode) {
        self(universe, node);
    }
}

/// Keyword to loader map.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: BTreeMap<String, Arc<dyn Loader>>,
}

impl fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.loaders.keys()).finish()
    }
}

impl LoaderRegistry {
    /// Register `loader` for root nodes whose first token is `keyword`,
    /// replacing any earlier registration.
    pub fn register(&mut self, keyword: &str, loader: impl Loader + 'static) {
        self.loaders.insert(keyword.to_owned(), Arc::new(loader));
    }

    /// The loader for `keyword`.
    pub fn get(&self, keyword: &str) -> Option<&Arc<dyn Loader>> {
        self.loaders.get(keyword)
    }

    /// Whether `keyword` has a loader.
    pub fn contains(&self, keyword: &str) -> bool {
        self.loaders.contains_key(keyword)
    }

    /// The loaders for every content kind.
    pub fn standard() -> Self {
        let mut registry = Self::default();
        registry.register("system", load_system);
        registry.register("planet", load_planet);
        registry.register("outfit", |u: &mut UniverseObjects, node: &DataNode| {
            let Some(handle) = named(node, &mut u.outfits) else {
                return;
            };
            if let Some(outfit) = u.outfits.value_mut(handle) {
                outfit.load(node);
            }
        });
        registry.register("ship", load_ship);
        registry.register("fleet", |u: &mut UniverseObjects, node: &DataNode| {
            with_taken(u, node, |u| &mut u.fleets, |fleet, node, u| fleet.load(node, u));
        });
        registry.register("government", |u: &mut UniverseObjects, node: &DataNode| {
            with_taken(u, node, |u| &mut u.governments, |gov, node, u| gov.load(node, u));
        });
        registry.register("conversation", |u: &mut UniverseObjects, node: &DataNode| {
            with_taken(u, node, |u| &mut u.conversations, |c, node, u| c.load(node, u));
        });
        registry.register("mission", |u: &mut UniverseObjects, node: &DataNode| {
            with_taken(u, node, |u| &mut u.missions, |m, node, u| m.load(node, u));
        });
        registry.register("news", |u: &mut UniverseObjects, node: &DataNode| {
            with_taken(u, node, |u| &mut u.news, |n, node, u| n.load(node, u));
        });
        registry.register("person", |u: &mut UniverseObjects, node: &DataNode| {
            with_taken(u, node, |u| &mut u.persons, |p, node, u| p.load(node, u));
        });
        registry.register("test", |u: &mut UniverseObjects, node: &DataNode| {
            with_taken(u, node, |u| &mut u.tests, |t, node, u| t.load(node, u));
        });
        registry.register("start", |u: &mut UniverseObjects, node: &DataNode| {
            let name = if node.size() >= 2 { node.token(1) } else { "" };
            let handle = u.starts.get(name);
            u.starts.mark_defined(handle);
            let mut start = u.starts.take(handle);
            start.load(node, u);
            u.starts.put(handle, start);
        });
        registry.register("phrase", |u: &mut UniverseObjects, node: &DataNode| {
            let Some(handle) = named(node, &mut u.phrases) else {
                return;
            };
            let mut phrase = u.phrases.take(handle);
            phrase.load(node, &mut u.phrases);
            u.phrases.put(handle, phrase);
        });
        registry.register("event", |u: &mut UniverseObjects, node: &DataNode| {
            let Some(handle) = named(node, &mut u.events) else {
                return;
            };
            if let Some(event) = u.events.value_mut(handle) {
                event.load(node, &mut u.systems, &mut u.planets);
            }
        });
        registry.register("shipyard", |u: &mut UniverseObjects, node: &DataNode| {
            let Some(handle) = named(node, &mut u.shipyards) else {
                return;
            };
            if let Some(sale) = u.shipyards.value_mut(handle) {
                sale.load(node, &mut u.ships);
            }
        });
        registry.register("outfitter", |u: &mut UniverseObjects, node: &DataNode| {
            let Some(handle) = named(node, &mut u.outfitters) else {
                return;
            };
            if let Some(sale) = u.outfitters.value_mut(handle) {
                sale.load(node, &mut u.outfits);
            }
        });
        registry.register("test-data", |u: &mut UniverseObjects, node: &DataNode| {
            let Some(handle) = named(node, &mut u.test_data) else {
                return;
            };
            if let Some(data) = u.test_data.value_mut(handle) {
                data.load(node);
            }
        });
        registry.register("trade", |u: &mut UniverseObjects, node: &DataNode| u.trade.load(node));
        registry.register("substitutions", |u: &mut UniverseObjects, node: &DataNode| {
            u.substitutions.load(node);
        });
        registry.register("gamerules", |u: &mut UniverseObjects, node: &DataNode| u.rules.load(node));
        registry.register("category", |u: &mut UniverseObjects, node: &DataNode| {
            load_list(&mut u.categories, node, true);
        });
        registry.register("rating", |u: &mut UniverseObjects, node: &DataNode| {
            load_list(&mut u.ratings, node, false);
        });
        registry.register("disable", load_disable);
        registry.register("link", |u: &mut UniverseObjects, node: &DataNode| link(u, node, true));
        registry.register("unlink", |u: &mut UniverseObjects, node: &DataNode| link(u, node, false));
        for kind in RECORD_KINDS.iter().chain(OPAQUE_KINDS) {
            registry.register(kind, |u: &mut UniverseObjects, node: &DataNode| u.store_record(node));
        }
        registry
    }
}

/// Small keyed records kept as their nodes.
const RECORD_KINDS: &[&str] = &["galaxy", "star", "landing message", "tip", "help"];

/// Presentation definitions. Kept so they are neither diagnosed nor lost.
const OPAQUE_KINDS: &[&str] = &["color", "effect", "formation", "hazard", "interface", "minable", "wormhole"];

/// Kinds a `disable` root can name.
const DISABLE_KINDS: &[&str] = &["mission", "event", "person"];

fn named<T: Default>(node: &DataNode, set: &mut Set<T>) -> Option<Handle<T>> {
    if node.size() < 2 {
        node.print_trace(&format!("Skipping {} with no name:", node.key()));
        return None;
    }
    let handle = set.get(node.token(1));
    set.mark_defined(handle);
    Some(handle)
}

/// Move the named entity out of its set so its loader can borrow the whole
/// universe, then put it back.
fn with_taken<T, S, L>(universe: &mut UniverseObjects, node: &DataNode, set: S, load: L)
where
    T: Default,
    S: Fn(&mut UniverseObjects) -> &mut Set<T>,
    L: FnOnce(&mut T, &DataNode, &mut UniverseObjects),
{
    let Some(handle) = named(node, set(universe)) else {
        return;
    };
    let mut entity = set(universe).take(handle);
    load(&mut entity, node, universe);
    set(universe).put(handle, entity);
}

fn load_system(universe: &mut UniverseObjects, node: &DataNode) {
    let Some(handle) = named(node, &mut universe.systems) else {
        return;
    };
    let mut system = universe.systems.take(handle);
    system.load(handle, node, universe);
    universe.systems.put(handle, system);
}

fn load_planet(universe: &mut UniverseObjects, node: &DataNode) {
    let Some(handle) = named(node, &mut universe.planets) else {
        return;
    };
    let mut planet = universe.planets.take(handle);
    planet.load(node, universe);
    universe.planets.put(handle, planet);
}

/// `ship <model>` or `ship <model> <variant>`.
fn load_ship(universe: &mut UniverseObjects, node: &DataNode) {
    if node.size() < 2 {
        node.print_trace("Skipping ship with no name:");
        return;
    }
    let (name, base) = if node.size() >= 3 {
        if !universe.variant_definitions.insert(node.token(2).to_owned()) {
            node.print_trace("Error: Skipping duplicate ship variant:");
            tracing::error!(variant = %node.token(2), "ship variant defined more than once; keeping the first");
            return;
        }
        (node.token(2), Some(universe.ships.get(node.token(1))))
    } else {
        (node.token(1), None)
    };
    let handle = universe.ships.get(name);
    universe.ships.mark_defined(handle);
    if let Some(ship) = universe.ships.value_mut(handle) {
        if base.is_some() {
            ship.base = base;
        }
        ship.load(node, &mut universe.outfits);
    }
}

fn load_disable(universe: &mut UniverseObjects, node: &DataNode) {
    if node.size() < 3 || !DISABLE_KINDS.contains(&node.token(1)) {
        node.print_trace("Invalid use of keyword \"disable\":");
        return;
    }
    let names = universe.disabled.entry(node.token(1).to_owned()).or_default();
    names.extend(node.tokens().iter().skip(2).cloned());
}

fn link(universe: &mut UniverseObjects, node: &DataNode, add: bool) {
    if node.size() < 3 {
        node.print_trace("Skipping link with fewer than two systems:");
        return;
    }
    let a = universe.systems.get(node.token(1));
    let b = universe.systems.get(node.token(2));
    for (from, to) in [(a, b), (b, a)] {
        if let Some(system) = universe.systems.value_mut(from) {
            if add {
                system.links.insert(to);
            } else {
                system.links.remove(&to);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// UniverseObjects
// ---------------------------------------------------------------------------

/// Every content registry.
#[derive(Debug, Clone)]
pub struct UniverseObjects {
    /// Star systems.
    pub systems: Set<System>,
    /// Planets and stations.
    pub planets: Set<Planet>,
    /// Outfits.
    pub outfits: Set<Outfit>,
    /// Ship models and variants.
    pub ships: Set<ShipModel>,
    /// Fleets.
    pub fleets: Set<Fleet>,
    /// Governments.
    pub governments: Set<Government>,
    /// Phrases.
    pub phrases: Set<Phrase>,
    /// Conversations.
    pub conversations: Set<Conversation>,
    /// Ship stock lists.
    pub shipyards: Set<Sale<ShipModel>>,
    /// Outfit stock lists.
    pub outfitters: Set<Sale<Outfit>>,
    /// Events.
    pub events: Set<GameEvent>,
    /// Mission templates.
    pub missions: Set<Mission>,
    /// News items.
    pub news: Set<News>,
    /// Unique pilots.
    pub persons: Set<Person>,
    /// Starting scenarios. An unnamed `start` is stored under `""`.
    pub starts: Set<StartConditions>,
    /// Data-driven tests.
    pub tests: Set<TestDef>,
    /// Pilots and other data that tests inject.
    pub test_data: Set<TestData>,
    /// Commodities.
    pub trade: Trade,
    /// Global text replacements.
    pub substitutions: TextReplacements,
    /// Simulation rules.
    pub rules: GameRules,
    /// `category` lists.
    pub categories: NamedLists,
    /// `rating` lists.
    pub ratings: NamedLists,
    /// Small and presentation-only records, by kind and then name.
    pub records: BTreeMap<String, BTreeMap<String, DataNode>>,
    /// Names listed by `disable`, by kind.
    pub disabled: BTreeMap<String, BTreeSet<String>>,
    variant_definitions: BTreeSet<String>,
    loaders: Arc<LoaderRegistry>,
}

impl Default for UniverseObjects {
    fn default() -> Self {
        Self {
            systems: Set::new(),
            planets: Set::new(),
            outfits: Set::new(),
            ships: Set::new(),
            fleets: Set::new(),
            governments: Set::new(),
            phrases: Set::new(),
            conversations: Set::new(),
            shipyards: Set::new(),
            outfitters: Set::new(),
            events: Set::new(),
            missions: Set::new(),
            news: Set::new(),
            persons: Set::new(),
            starts: Set::new(),
            tests: Set::new(),
            test_data: Set::new(),
            trade: Trade::default(),
            substitutions: TextReplacements::new(),
            rules: GameRules::default(),
            categories: NamedLists::new(),
            ratings: NamedLists::new(),
            records: BTreeMap::new(),
            disabled: BTreeMap::new(),
            variant_definitions: BTreeSet::new(),
            loaders: Arc::new(LoaderRegistry::standard()),
        }
    }
}

impl UniverseObjects {
    /// An empty universe with the standard loaders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extra loader, or replace a standard one.
    pub fn register_loader(&mut self, keyword: &str, loader: impl Loader + 'static) {
        Arc::make_mut(&mut self.loaders).register(keyword, loader);
    }

    // -----------------------------------------------------------------------
    // Phase one: parse and dispatch
    // -----------------------------------------------------------------------

    /// Dispatch one root node to the loader for its keyword.
    pub fn load_node(&mut self, node: &DataNode) {
        let loaders = Arc::clone(&self.loaders);
        match loaders.get(node.key()) {
            Some(loader) => loader.load(self, node),
            None => {
                node.print_trace("Skipping unrecognized root object:");
            }
        }
    }

    /// Parse `text` and dispatch every root node.
    ///
    /// # Errors
    ///
    /// Returns [`UniverseError::Parse`] if the text is malformed.
    pub fn load_text(&mut self, text: &str, source_name: &str) -> Result<(), UniverseError> {
        let file = DataFile::parse(text, source_name)?;
        for node in file.nodes() {
            self.load_node(node);
        }
        Ok(())
    }

    /// Parse every data file of every source and dispatch the root nodes in
    /// source order, then finish loading and check references. Returns the
    /// reference warnings.
    ///
    /// Files are parsed on the blocking pool, one task per file. Dispatch
    /// happens here, on the caller's task, in discovery order.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be listed, a file cannot be
    /// read or parsed, or a parse task fails.
    pub async fn load_sources(&mut self, sources: &[Source]) -> Result<Vec<String>, UniverseError> {
        let mut tasks = Vec::new();
        for source in sources {
            let files = source.data_files().map_err(|error| UniverseError::Io {
                path: source.root.clone(),
                source: error,
            })?;
            tracing::info!(source = %source.name, files = files.len(), "scanning content source");
            for path in files {
                tasks.push(tokio::task::spawn_blocking(move || {
                    DataFile::load(&path).map(|file| (path, file))
                }));
            }
        }

        let mut loaded: usize = 0;
        for task in tasks {
            let (path, file): (PathBuf, DataFile) = task.await??;
            tracing::debug!(file = %path.display(), roots = file.nodes().len(), "dispatching data file");
            for node in file.nodes() {
                self.load_node(node);
            }
            loaded = loaded.saturating_add(1);
        }
        tracing::info!(files = loaded, "content loaded");

        self.finish_loading();
        Ok(self.check_references())
    }

    fn store_record(&mut self, node: &DataNode) {
        let name = if node.size() >= 2 { node.token(1) } else { "" };
        self.records
            .entry(node.key().to_owned())
            .or_default()
            .insert(name.to_owned(), node.clone());
    }

    // -----------------------------------------------------------------------
    // Phase two: finish and check
    // -----------------------------------------------------------------------

    /// Resolve everything that needs the whole universe: symmetric links,
    /// ship variants, phrase cycles and `disable` lists.
    pub fn finish_loading(&mut self) {
        let links: Vec<(Handle<System>, Handle<System>)> = self
            .systems
            .iter()
            .flat_map(|(_, handle, system)| system.links.iter().map(move |other| (handle, *other)))
            .collect();
        for (from, to) in links {
            if let Some(system) = self.systems.value_mut(to) {
                system.links.insert(from);
            }
        }

        let variants: Vec<(Handle<ShipModel>, Handle<ShipModel>)> = self
            .ships
            .iter()
            .filter_map(|(_, handle, ship)| ship.base.map(|base| (handle, base)))
            .collect();
        for (variant, base) in variants {
            let Some(base) = self.ships.value(base).cloned() else {
                continue;
            };
            if let Some(ship) = self.ships.value_mut(variant) {
                ship.inherit(&base);
            }
        }

        for handle in find_cycles(&self.phrases) {
            tracing::warn!(phrase = %self.phrases.name_of(handle), "discarding phrase that refers to itself");
            if let Some(phrase) = self.phrases.value_mut(handle) {
                phrase.clear();
            }
        }

        self.apply_disables();
    }

    fn apply_disables(&mut self) {
        for name in self.disabled.get("event").into_iter().flatten() {
            if let Some(event) = self.events.find(name).and_then(|h| self.events.value_mut(h)) {
                event.disabled = true;
            }
        }
        for name in self.disabled.get("person").into_iter().flatten() {
            if let Some(person) = self.persons.find(name).and_then(|h| self.persons.value_mut(h)) {
                person.disabled = true;
            }
        }
    }

    /// Whether `disable <kind>` named `name`.
    pub fn is_disabled(&self, kind: &str, name: &str) -> bool {
        self.disabled.get(kind).is_some_and(|names| names.contains(name))
    }

    /// Warn about every name that was referred to but never defined, except
    /// names a known event defines when it fires. Returns the warnings.
    pub fn check_references(&self) -> Vec<String> {
        let deferred: BTreeSet<(String, String)> = self
            .events
            .iter()
            .flat_map(|(_, _, event)| event.deferred_definitions())
            .collect();
        let mut warnings = Vec::new();
        let mut check = |kind: &str, names: Vec<&str>| {
            for name in names {
                if deferred.contains(&(kind.to_owned(), name.to_owned())) {
                    continue;
                }
                let warning = format!("Warning: {kind} \"{name}\" is referred to, but not fully defined.");
                tracing::warn!("{warning}");
                warnings.push(warning);
            }
        };
        check("conversation", self.conversations.undefined_names().collect());
        check("event", self.events.undefined_names().collect());
        check("fleet", self.fleets.undefined_names().collect());
        check("government", self.governments.undefined_names().collect());
        check("mission", self.missions.undefined_names().collect());
        check("news", self.news.undefined_names().collect());
        check("outfit", self.outfits.undefined_names().collect());
        check("outfitter", self.outfitters.undefined_names().collect());
        check("person", self.persons.undefined_names().collect());
        check("phrase", self.phrases.undefined_names().collect());
        check("planet", self.planets.undefined_names().collect());
        check("ship", self.ships.undefined_names().collect());
        check("shipyard", self.shipyards.undefined_names().collect());
        check("system", self.systems.undefined_names().collect());
        warnings
    }

    // -----------------------------------------------------------------------
    // Runtime changes
    // -----------------------------------------------------------------------

    /// Apply one change node from an event.
    pub fn change(&mut self, node: &DataNode) {
        if is_change_keyword(node.key()) && self.loaders.contains(node.key()) {
            self.load_node(node);
        } else {
            node.print_trace("Error: Invalid \"event\" data:");
        }
    }

    /// Apply a day's batch of changes, in order.
    pub fn apply_changes(&mut self, changes: &[DataNode]) {
        for node in changes {
            self.change(node);
        }
        if !changes.is_empty() {
            tracing::debug!(changes = changes.len(), "applied universe changes");
        }
    }

    /// Undo every change made since `defaults` was cloned. Handles stay
    /// valid: entities created since are reset to stubs, not removed.
    pub fn revert(&mut self, defaults: &Self) {
        self.systems.revert(&defaults.systems);
        self.planets.revert(&defaults.planets);
        self.outfits.revert(&defaults.outfits);
        self.ships.revert(&defaults.ships);
        self.fleets.revert(&defaults.fleets);
        self.governments.revert(&defaults.governments);
        self.phrases.revert(&defaults.phrases);
        self.conversations.revert(&defaults.conversations);
        self.shipyards.revert(&defaults.shipyards);
        self.outfitters.revert(&defaults.outfitters);
        self.events.revert(&defaults.events);
        self.missions.revert(&defaults.missions);
        self.news.revert(&defaults.news);
        self.persons.revert(&defaults.persons);
        self.substitutions.clone_from(&defaults.substitutions);
        self.trade.clone_from(&defaults.trade);
        self.records.clone_from(&defaults.records);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Jumps from `from` to `to` by breadth-first search over hyperspace
    /// links, or `None` if `to` is more than `max` jumps away or unreachable.
    pub fn jump_distance(&self, from: Handle<System>, to: Handle<System>, max: u32) -> Option<u32> {
        if from == to {
            return Some(0);
        }
        let mut seen = BTreeSet::from([from]);
        let mut queue = VecDeque::from([(from, 0_u32)]);
        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max {
                continue;
            }
            let next_depth = depth.saturating_add(1);
            let Some(system) = self.systems.value(current) else {
                continue;
            };
            for &next in &system.links {
                if next == to {
                    return Some(next_depth);
                }
                if seen.insert(next) {
                    queue.push_back((next, next_depth));
                }
            }
        }
        None
    }

    /// The record `kind <name>`, for small and presentation-only kinds.
    pub fn record(&self, kind: &str, name: &str) -> Option<&DataNode> {
        self.records.get(kind).and_then(|records| records.get(name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use starloom_data::DataNode;

    fn universe(text: &str) -> UniverseObjects {
        let mut universe = UniverseObjects::new();
        universe.load_text(text, "test.txt").unwrap();
        universe.finish_loading();
        universe
    }

    #[test]
    fn links_become_symmetric() {
        let universe = universe("system Sol\n\tlink Alpha\nsystem Alpha\n");
        let sol = universe.systems.find("Sol").unwrap();
        let alpha = universe.systems.find("Alpha").unwrap();
        assert!(universe.systems.value(alpha).unwrap().links.contains(&sol));
        assert_eq!(universe.jump_distance(sol, alpha, 10), Some(1));
        assert!(universe.check_references().is_empty());
    }

    #[test]
    fn jump_distance_respects_max() {
        let universe = universe("system A\n\tlink B\nsystem B\n\tlink C\nsystem C\nsystem D\n");
        let a = universe.systems.find("A").unwrap();
        let c = universe.systems.find("C").unwrap();
        let d = universe.systems.find("D").unwrap();
        assert_eq!(universe.jump_distance(a, c, 5), Some(2));
        assert_eq!(universe.jump_distance(a, c, 1), None);
        assert_eq!(universe.jump_distance(a, d, 5), None);
        assert_eq!(universe.jump_distance(d, d, 0), Some(0));
    }

    #[test]
    fn dangling_names_are_reported() {
        let universe = universe("system Sol\n\tgovernment Pirate\n");
        let warnings = universe.check_references();
        assert_eq!(warnings, vec!["Warning: government \"Pirate\" is referred to, but not fully defined.".to_owned()]);
    }

    #[test]
    fn event_definitions_are_deferred() {
        let universe = universe("system Sol\n\tlink Nova\nevent \"Nova appears\"\n\tsystem Nova\n\t\tlink Sol\n");
        assert!(universe.check_references().is_empty());
    }

    #[test]
    fn variants_inherit_their_base() {
        let universe = universe(
            "ship Sparrow\n\tattributes\n\t\tcategory Interceptor\n\t\tcost 100\n\t\t\"cargo space\" 5\n\
             ship Sparrow \"Sparrow (Armed)\"\n\tattributes\n\t\tcost 150\n",
        );
        let variant = universe.ships.find_value("Sparrow (Armed)").unwrap();
        assert_eq!(variant.category, "Interceptor");
        assert_eq!(variant.cost, 150);
        assert!(variant.attributes.contains_key("cargo space"));
    }

    #[test]
    fn duplicate_variants_keep_the_first() {
        let universe = universe(
            "ship Sparrow\n\tattributes\n\t\tcost 100\n\
             ship Sparrow \"Sparrow (Armed)\"\n\tattributes\n\t\tcost 150\n\
             ship Sparrow \"Sparrow (Armed)\"\n\tattributes\n\t\tcost 900\n",
        );
        assert_eq!(universe.ships.find_value("Sparrow (Armed)").unwrap().cost, 150);
    }

    #[test]
    fn changes_only_accept_change_kinds() {
        let mut universe = universe("system Sol\n");
        let pirate = DataNode::new(["government", "Pirate"]);
        let mut change = DataNode::new(["system", "Sol"]);
        change.add_child(pirate);
        universe.change(&change);
        let gov = universe.systems.find_value("Sol").unwrap().government;
        assert_eq!(gov, universe.governments.find("Pirate"));

        universe.change(&DataNode::new(["mission", "Sneaky"]));
        assert!(universe.missions.find("Sneaky").is_none());
    }

    #[test]
    fn revert_restores_defaults() {
        let mut universe = universe("system Sol\n\tgovernment Republic\ngovernment Republic\n");
        let defaults = universe.clone();
        universe.load_text("system Sol\n\tgovernment Pirate\n", "change").unwrap();
        universe.revert(&defaults);
        let gov = universe.systems.find_value("Sol").unwrap().government;
        assert_eq!(gov, universe.governments.find("Republic"));
    }

    #[test]
    fn disabled_events_do_nothing() {
        let universe = universe("event Boom\n\tboom = 1\ndisable event Boom\n");
        assert!(universe.events.find_value("Boom").unwrap().disabled);
        assert!(universe.is_disabled("event", "Boom"));
    }

    #[test]
    fn opaque_kinds_are_kept() {
        let universe = universe("color \"bright\" 1 1 1\ntip Cargo\n\t\"Buy low.\"\n");
        assert!(universe.record("color", "bright").is_some());
        assert_eq!(universe.record("tip", "Cargo").unwrap().children().len(), 1);
    }

    #[test]
    fn custom_loaders_can_be_registered() {
        let mut universe = UniverseObjects::new();
        universe.register_loader("plugin-note", |u: &mut UniverseObjects, node: &DataNode| {
            u.store_record(node);
        });
        universe.load_text("plugin-note hello\n", "t").unwrap();
        assert!(universe.record("plugin-note", "hello").is_some());
    }
}
