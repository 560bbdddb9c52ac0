//! Entity definitions for every content kind the registries hold.
//!
//! Each entity is default-constructible so that a forward reference can
//! create a stub, and each `load` applies one definition on top of what is
//! already there.

mod fleet;
mod government;
mod news;
mod outfit;
mod planet;
pub mod records;
mod sale;
mod ship;
mod start;
mod system;
mod trade;

pub use fleet::Fleet;
pub use government::Government;
pub use news::{News, Person};
pub use outfit::Outfit;
pub use planet::Planet;
pub use records::{GameRules, NamedLists};
pub use sale::Sale;
pub use ship::ShipModel;
pub use start::StartConditions;
pub use system::{System, SystemFleet};
pub use trade::{Commodity, Trade};
