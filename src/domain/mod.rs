//! Domain layer for the composition engine.
//!
//! This module contains the pure data models and domain errors; all
//! algorithms live in the service layer.

pub mod errors;
pub mod models;

// Re-export error types for convenient access
pub use errors::{CompositionError, DomainResult};
