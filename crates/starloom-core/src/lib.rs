//! Shared infrastructure for the content runtime.
//!
//! # Modules
//!
//! - [`set`] -- [`Set<T>`] and [`Handle<T>`]: the insertion-ordered,
//!   name-indexed arena every entity kind lives in. Forward references
//!   create stubs that a later definition fills in.
//! - [`weighted`] -- [`WeightedList<T>`]: positive-weight random choice.
//! - [`config`] -- [`EngineConfig`] read from `starloom.yaml`.
//! - [`sources`] -- Base resources and plugin discovery, and the ordered
//!   list of data files to load.
//!
//! # Invariants
//!
//! - A [`Handle<T>`] returned by a [`Set<T>`] stays valid for the life of
//!   that set. Entries are never removed, only reset.

pub mod config;
pub mod set;
pub mod sources;
pub mod weighted;

pub use config::{ConfigError, EngineConfig, LoggingConfig};
pub use set::{Handle, Set};
pub use sources::{PluginManifest, Source};
pub use weighted::WeightedList;
