//! Core types for the application registry.
//!
//! This module provides foundational types used throughout the crate:
//! - **IDs**: Strongly-typed identifiers (AppId, SubscriptionToken)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for logging, enumeration and events

mod config;
mod errors;
mod ids;

pub use config::{Config, EnumerationConfig, EventConfig, ObservabilityConfig};
pub use errors::{Error, Result};
pub use ids::{AppId, SubscriptionToken};
