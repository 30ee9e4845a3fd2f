//! Infrastructure layer.
//!
//! External-facing adapters around the domain core; currently the
//! hierarchical configuration loader.

pub mod config;

pub use config::{ConfigError, ConfigLoader};
