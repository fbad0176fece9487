//! # App Registry - Application Manager Facade
//!
//! Safe Rust front end to the platform's native application manager:
//! - Enumeration of installed and running applications
//! - Property and metadata filtered queries with scoped native filters
//! - Lookup of installed applications by id
//! - Launched/terminated and enabled/disabled event subscriptions
//!
//! ## Architecture
//!
//! Every native call goes through the [`native::AppFramework`] trait. Native
//! handles are wrapped in owning types and released on drop; nothing above
//! the `native` module sees a raw handle.
//! ```text
//!                    ┌─────────────────────────────────┐
//!   application  →   │           AppManager            │
//!      code          │  ┌───────────┐  ┌────────────┐  │
//!                    │  │ Registry  │  │  EventHub  │  │
//!                    │  │ (queries) │  │ (monitors) │  │
//!                    │  └─────┬─────┘  └─────┬──────┘  │
//!                    └────────┼──────────────┼─────────┘
//!                             ▼              ▼
//!                    ┌─────────────────────────────────┐
//!                    │   AppFramework (native layer)   │
//!                    └─────────────────────────────────┘
//! ```
//!
//! `MemoryFramework` implements the native surface in memory for hosts
//! without the platform library.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

// Re-export public API
pub mod events;
pub mod native;
pub mod registry;
pub mod types;

// Internal utilities
pub mod observability;

pub use events::{EventHub, EventKind};
pub use registry::{AppFilter, AppManager, ApplicationInfo, FilterKey, MetadataFilter};
pub use types::{Config, Error, Result};
