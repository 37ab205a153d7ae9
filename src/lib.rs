//! Form Engine - declarative form state reconciliation
//!
//! Derives and keeps synchronized per-field state (value, touched flag,
//! validity, resolved options) and the aggregate form state from a set of
//! field declarations, an injected value object, user events, and fields
//! registered at runtime by nested fragments.

pub mod config;
pub mod error;
pub mod form;

pub use config::EngineConfig;
pub use error::{FormError, Result};
pub use form::*;
