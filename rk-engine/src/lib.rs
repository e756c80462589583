//! rk-engine: membership tag reconciliation
//!
//! - `hierarchy`: category discovery from declared tag labels
//! - `session`: reconciliation sessions (fetch, derive, diff, single write)
//! - `debounce`: per-subject toggle burst coalescing
//! - `rank`: competition ranking
//! - `points`, `activity`, `engine`: challenge scoring, inactivity sweep and
//!   the collection-wide facade

pub mod activity;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod points;
pub mod rank;
pub mod registry;
pub mod replay;
pub mod rules;
pub mod session;
pub mod store;
pub mod tags;

pub use crate::engine::Engine;
pub use crate::error::{Error, Result, StoreError};
pub use crate::session::{CommitOutcome, ReconciliationSession, Reconciler};
pub use crate::store::{InMemoryTagStore, TagStore};
pub use crate::tags::{KnownTag, TagSet};
