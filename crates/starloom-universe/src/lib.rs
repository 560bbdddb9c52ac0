//! Game content and the rules that bring it to life.
//!
//! # Modules
//!
//! - [`universe`] -- [`UniverseObjects`]: every registry, the root-keyword
//!   dispatcher that fills them, and runtime changes and reverts.
//! - [`entities`] -- Systems, planets, ships, outfits, governments, fleets,
//!   stock lists, news, persons, start scenarios, trade and rules.
//! - [`edit`] -- `add`/`remove` prefix handling shared by editable entities.
//! - [`phrase`] -- Random text templates and their cycle check.
//! - [`text_replacements`] -- Conditional `<token>` substitutions.
//! - [`location_filter`] -- Predicates over systems and planets.
//! - [`game_event`] -- Dated or triggered bundles of universe changes.
//! - [`game_action`] -- Side effects shared by missions and conversations.
//! - [`conversation`] -- Branching dialogue graphs.
//! - [`mission_action`] -- What a mission trigger does.
//! - [`npc`] -- Mission-controlled ships and their objectives.
//! - [`mission`] -- Mission templates, instantiation and the trigger
//!   lifecycle.
//! - [`test_def`] -- Data-driven test definitions.
//! - [`context`] -- [`PlayerContext`]: what content needs from the player.
//!
//! # Invariants
//!
//! - Every name a definition mentions resolves to a [`starloom_core::Handle`]
//!   immediately. Names that are never defined are reported by
//!   [`UniverseObjects::check_references`] and never cause a panic.
//! - A mission instance runs each trigger's action at most once, and none
//!   at all after it has completed, failed or been aborted.

pub mod context;
pub mod conversation;
pub mod edit;
pub mod entities;
pub mod error;
pub mod game_action;
pub mod game_event;
pub mod location_filter;
pub mod mission;
pub mod mission_action;
pub mod npc;
pub mod phrase;
pub mod test_def;
pub mod text_replacements;
pub mod universe;

pub use context::{PlayerContext, Presentation, ShipSummary};
pub use error::UniverseError;
pub use game_action::ActionOutcome;
pub use mission::Mission;
pub use universe::{Loader, LoaderRegistry, UniverseObjects};
