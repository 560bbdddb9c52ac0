//! Shared type definitions for the Starloom content runtime.
//!
//! Every crate in the workspace speaks in terms of these types: the game
//! calendar, the outcome sentinels that end a conversation, the mission
//! trigger alphabet, and the ship-event bit set observed by mission NPCs.
//!
//! # Modules
//!
//! - [`date`] -- Packed calendar dates with cached epoch-day and text forms.
//! - [`enums`] -- Conversation outcomes, mission triggers, mission locations,
//!   and the ship-event bit set.

pub mod date;
pub mod enums;

pub use date::{Date, DateFormat};
pub use enums::{MissionLocation, MissionTrigger, Outcome, ShipEvents};
