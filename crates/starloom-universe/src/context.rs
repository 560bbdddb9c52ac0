//! [`PlayerContext`]: the capability the runtime acts through.
//!
//! Events, actions, conversations and missions never own the player. They
//! receive a `&mut dyn PlayerContext` for the duration of one call and make
//! every change through it, so the player crate can keep its own
//! bookkeeping (accounts, cargo, logbook, presentation queue) private.

use starloom_conditions::ConditionsStore;
use starloom_core::Handle;
use starloom_types::Date;

use crate::conversation::Conversation;
use crate::entities::{Government, Outfit, Planet, ShipModel, System};
use crate::game_event::GameEvent;
use crate::universe::UniverseObjects;

/// Something the presentation layer should show.
#[derive(Debug, Clone, PartialEq)]
pub enum Presentation {
    /// A text dialog.
    Dialog {
        /// Text to show.
        text: String,
        /// Mission that produced it, by instance id.
        mission: Option<u64>,
        /// Whether closing the dialog accepts a mission offer.
        is_offer: bool,
    },
    /// An interactive conversation.
    Conversation {
        /// The instantiated conversation.
        conversation: Conversation,
        /// Mission that produced it, by instance id.
        mission: Option<u64>,
        /// Whether the outcome decides a mission offer.
        is_offer: bool,
    },
    /// A one-line message.
    Message(String),
    /// Change the music. `None` mutes.
    Music(Option<String>),
}

/// A ship the player is boarding or assisting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipSummary {
    /// Government the ship flies for.
    pub government: Option<Handle<Government>>,
    /// System the ship is in.
    pub system: Option<Handle<System>>,
}

/// Everything the content runtime may read or change about the player.
pub trait PlayerContext {
    /// Today's date.
    fn date(&self) -> Date;
    /// The condition store.
    fn conditions(&self) -> &ConditionsStore;
    /// The condition store, for writing.
    fn conditions_mut(&mut self) -> &mut ConditionsStore;
    /// Current system.
    fn system(&self) -> Option<Handle<System>>;
    /// Planet the player is landed on.
    fn planet(&self) -> Option<Handle<Planet>>;

    /// Credits on hand.
    fn credits(&self) -> i64;
    /// Add (or with a negative amount, remove) credits.
    fn add_credits(&mut self, amount: i64);
    /// Record a fine owed.
    fn add_fine(&mut self, amount: i64);
    /// Take on a debt repaid daily over `term` days.
    fn add_debt(&mut self, amount: i64, interest: Option<f64>, term: i64);

    /// How many of `outfit` the player has installed or in cargo.
    fn outfit_count(&self, outfit: Handle<Outfit>) -> i64;
    /// Give (positive) or take (negative) outfits.
    fn gift_outfit(&mut self, universe: &UniverseObjects, outfit: Handle<Outfit>, count: i64);
    /// Give the player a new ship.
    fn gift_ship(&mut self, universe: &UniverseObjects, model: Handle<ShipModel>, name: &str);
    /// Take a ship of `model`, by name if `name` is not empty. Returns
    /// whether a ship was taken.
    fn take_ship(&mut self, model: Handle<ShipModel>, name: &str) -> bool;
    /// Whether the player owns a ship of `model` (named `name` if given).
    fn has_ship(&self, model: Handle<ShipModel>, name: &str) -> bool;
    /// Free cargo space in tons.
    fn cargo_free(&self) -> i64;
    /// Free passenger bunks.
    fn bunks_free(&self) -> i64;

    /// Add a logbook entry. Special logs have a category and heading.
    fn add_log_entry(&mut self, category: Option<(&str, &str)>, text: &str);
    /// Schedule `event` for `date`.
    fn queue_event(&mut self, event: GameEvent, date: Date);
    /// Fail every active mission whose name is `name`.
    fn fail_mission(&mut self, name: &str);
    /// Mark a system as visited or forget it.
    fn visit_system(&mut self, system: Handle<System>, visited: bool);
    /// Mark a planet as visited or forget it.
    fn visit_planet(&mut self, planet: Handle<Planet>, visited: bool);
    /// Queue something for the presentation layer.
    fn present(&mut self, presentation: Presentation);

    /// The pilot's first name.
    fn first_name(&self) -> String;
    /// The pilot's last name.
    fn last_name(&self) -> String;
}
