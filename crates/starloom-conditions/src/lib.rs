//! Conditions: the named 64-bit integers that gate and record everything the
//! player has done.
//!
//! A condition reads as true when non-zero. Missing conditions read as zero.
//! Missions, conversations, events and news test conditions with a
//! [`ConditionSet`] and change them with [`ConditionAssignments`].
//!
//! # Modules
//!
//! - [`store`] -- [`ConditionsStore`]: the plain map plus read-only derived
//!   providers keyed by prefix.
//! - [`expression`] -- [`Expression`]: integer arithmetic over literals and
//!   condition names.
//! - [`condition_set`] -- [`ConditionSet`]: predicate trees.
//! - [`assignments`] -- [`ConditionAssignments`]: ordered mutation
//!   programs.
//! - [`error`] -- [`ConditionError`].
//!
//! # Invariants
//!
//! - Arithmetic saturates at the `i64` limits; nothing overflows.
//! - Writes never reach a derived provider.

pub mod assignments;
pub mod condition_set;
pub mod error;
pub mod expression;
pub mod store;

pub use assignments::{AssignOp, Assignment, ConditionAssignments};
pub use condition_set::{Comparison, Condition, ConditionSet};
pub use error::ConditionError;
pub use expression::Expression;
pub use store::{ConditionProvider, ConditionsStore, DerivedTable};
