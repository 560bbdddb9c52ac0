//! The pilot: everything that changes as the game is played.
//!
//! # Modules
//!
//! - [`player`] -- [`PlayerInfo`]: the pilot's state and the
//!   [`starloom_universe::PlayerContext`] that content acts through.
//! - [`flow`] -- Jumping, landing, taking off, offers and jobs.
//! - [`calendar`] -- The daily tick and pending events.
//! - [`account`] -- Credits, mortgages, fines and the credit score.
//! - [`politics`] -- Reputation, bribes, domination and security scans.
//! - [`cargo`] -- Commodities, spare outfits, mission cargo and passengers.
//! - [`fleet`] -- The player's ships and their capacity.
//! - [`save`] -- Saved games.
//! - [`test_runner`] -- Runs data-driven `test` definitions.
//! - [`error`] -- Save and test errors.
//!
//! # Invariants
//!
//! - Content is read-only to the player except through event changes,
//!   which are recorded so a saved game can replay them.
//! - All randomness comes from the pilot's seeded generator; the same
//!   seed, content and inputs play out the same way.

pub mod account;
pub mod calendar;
pub mod cargo;
pub mod error;
pub mod fleet;
pub mod flow;
pub mod player;
pub mod politics;
pub mod save;
pub mod test_runner;

pub use account::Account;
pub use cargo::CargoHold;
pub use error::{SaveError, TestError};
pub use fleet::PlayerShip;
pub use player::PlayerInfo;
pub use politics::Politics;
pub use test_runner::{TestReport, TestRunner, run_test};
