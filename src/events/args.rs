//! Event arguments delivered to application event handlers.

use chrono::{DateTime, Utc};

use crate::native::EventState;
use crate::registry::ApplicationInfo;
use crate::types::AppId;

/// An application process was launched.
#[derive(Debug)]
pub struct ApplicationLaunchedEventArgs {
    pub application: ApplicationInfo,
    pub timestamp: DateTime<Utc>,
}

/// An application process terminated.
#[derive(Debug)]
pub struct ApplicationTerminatedEventArgs {
    pub application: ApplicationInfo,
    pub timestamp: DateTime<Utc>,
}

/// An application was enabled (or an enable is in progress).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationEnabledEventArgs {
    pub app_id: AppId,
    pub app_type: String,
    pub state: EventState,
    pub timestamp: DateTime<Utc>,
}

/// An application was disabled (or a disable is in progress).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDisabledEventArgs {
    pub app_id: AppId,
    pub app_type: String,
    pub state: EventState,
    pub timestamp: DateTime<Utc>,
}
