//! Application lifecycle and enable/disable events.
//!
//! [`EventHub`] owns the native monitors and the registered handlers; the
//! args types are what handlers receive.

mod args;
mod hub;

pub use args::{
    ApplicationDisabledEventArgs, ApplicationEnabledEventArgs, ApplicationLaunchedEventArgs,
    ApplicationTerminatedEventArgs,
};
pub use hub::{EventHub, EventKind};
