//! # rolekeeper Common Library
//!
//! Shared code for the rolekeeper engine and its replay tool:
//! - Identifier newtypes (subjects, tags, collections)
//! - Event types (EngineEvent enum) and the EventBus
//! - TOML bootstrap configuration loading
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod time;

pub use error::{Error, Result};
pub use ids::{CollectionId, SubjectId, TagId};
