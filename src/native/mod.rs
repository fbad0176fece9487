//! Native application-framework surface.
//!
//! The platform's application manager is reached exclusively through the
//! [`AppFramework`] trait. Raw handles (`RawAppInfo`, `RawFilter`, ...) are
//! plain ids into the native layer's tables; they never leave the crate
//! unwrapped. See [`handle`] for the owning wrappers.
//!
//! Enumeration follows the native foreach contract: the visitor is called
//! once per record and returns `true` to continue or `false` to stop.
//! Handles passed to a visitor are borrowed for the duration of that call
//! and must be cloned to be kept.

pub mod handle;
pub mod memory;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use handle::{AppInfoHandle, ContextHandle, FilterHandle, MetadataFilterHandle, MonitorHandle};
pub use memory::{AppEntry, CallStats, LiveHandles, MemoryFramework};

/// Result of a native call.
pub type NativeResult<T> = std::result::Result<T, ErrorCode>;

/// Shared reference to the native layer.
pub type SharedFramework = Arc<dyn AppFramework>;

/// Dispatch callback registered on an event monitor.
///
/// Invoked on whichever thread the native layer delivers events from.
pub type NativeCallback = Arc<dyn Fn(&NativeEvent) + Send + Sync>;

// =============================================================================
// Error Codes
// =============================================================================

/// Platform error codes reported by the application manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidParameter,
    OutOfMemory,
    IoError,
    NoSuchApp,
    DbFailed,
    InvalidPackage,
    AppNotRunning,
    RequestFailed,
    PermissionDenied,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::OutOfMemory => "OUT_OF_MEMORY",
            ErrorCode::IoError => "IO_ERROR",
            ErrorCode::NoSuchApp => "NO_SUCH_APP",
            ErrorCode::DbFailed => "DB_FAILED",
            ErrorCode::InvalidPackage => "INVALID_PACKAGE",
            ErrorCode::AppNotRunning => "APP_NO_RUNNING",
            ErrorCode::RequestFailed => "REQUEST_FAILED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Raw Handles
// =============================================================================

macro_rules! raw_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u64);
    };
}

raw_handle!(
    /// Application description handle (`app_info_h`).
    RawAppInfo
);
raw_handle!(
    /// Running application context handle (`app_context_h`).
    RawAppContext
);
raw_handle!(
    /// Property filter handle (`app_info_filter_h`).
    RawFilter
);
raw_handle!(
    /// Metadata filter handle (`app_info_metadata_filter_h`).
    RawMetadataFilter
);
raw_handle!(
    /// Event monitor handle (`app_manager_event_h`).
    RawMonitor
);

// =============================================================================
// Properties
// =============================================================================

/// Filter property keys understood by the native filter setters.
pub mod keys {
    pub const APP_ID: &str = "PACKAGE_INFO_PROP_APP_ID";
    pub const APP_TYPE: &str = "PACKAGE_INFO_PROP_APP_TYPE";
    pub const APP_CATEGORY: &str = "PACKAGE_INFO_PROP_APP_CATEGORY";
    pub const APP_NODISPLAY: &str = "PACKAGE_INFO_PROP_APP_NODISPLAY";
    pub const APP_TASKMANAGE: &str = "PACKAGE_INFO_PROP_APP_TASKMANAGE";
}

/// String properties of an application description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppProperty {
    AppId,
    PackageId,
    Label,
    ExecPath,
    IconPath,
    AppType,
}

/// Boolean properties of an application description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppFlag {
    NoDisplay,
    TaskManage,
}

/// State of a running application context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    Undefined,
    Foreground,
    Background,
    Service,
    Terminated,
}

/// Which running contexts a traversal visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningScope {
    /// UI applications only.
    Running,
    /// Every running context, including services and sub-applications.
    AllRunning,
}

// =============================================================================
// Events
// =============================================================================

/// Kind of native event monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorKind {
    /// Application context launched/terminated notifications.
    Context,
    /// Application enable/disable status notifications.
    Status,
}

/// Statuses an enable/disable monitor subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusMask(pub u32);

impl StatusMask {
    pub const ENABLE: StatusMask = StatusMask(0x40);
    pub const DISABLE: StatusMask = StatusMask(0x80);
    pub const ENABLE_AND_DISABLE: StatusMask = StatusMask(0x40 | 0x80);

    pub const fn contains(self, other: StatusMask) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Context transition reported by a context monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextEventKind {
    Launched,
    Terminated,
}

/// Status change reported by a status monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusEventKind {
    Enable,
    Disable,
}

impl StatusEventKind {
    pub const fn mask(self) -> StatusMask {
        match self {
            StatusEventKind::Enable => StatusMask::ENABLE,
            StatusEventKind::Disable => StatusMask::DISABLE,
        }
    }
}

/// Progress of a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Started,
    Processing,
    Completed,
    Failed,
}

/// Payload delivered to a monitor's callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    Context {
        app_id: String,
        kind: ContextEventKind,
    },
    Status {
        app_id: String,
        app_type: String,
        kind: StatusEventKind,
        state: EventState,
    },
}

impl NativeEvent {
    pub fn app_id(&self) -> &str {
        match self {
            NativeEvent::Context { app_id, .. } | NativeEvent::Status { app_id, .. } => app_id,
        }
    }
}

// =============================================================================
// AppFramework
// =============================================================================

/// The native application-manager library.
///
/// Every create/clone returns a handle the caller must destroy exactly once.
/// Destroy calls are infallible from the caller's point of view.
pub trait AppFramework: Send + Sync + fmt::Debug {
    // --- application descriptions ---------------------------------------

    /// Create a description handle for an installed application.
    fn app_info_create(&self, app_id: &str) -> NativeResult<RawAppInfo>;
    fn app_info_clone(&self, info: RawAppInfo) -> NativeResult<RawAppInfo>;
    fn app_info_destroy(&self, info: RawAppInfo);
    fn app_info_property(&self, info: RawAppInfo, property: AppProperty) -> NativeResult<String>;
    fn app_info_flag(&self, info: RawAppInfo, flag: AppFlag) -> NativeResult<bool>;
    fn app_info_categories(&self, info: RawAppInfo) -> NativeResult<Vec<String>>;
    fn app_info_metadata(&self, info: RawAppInfo) -> NativeResult<Vec<(String, String)>>;

    /// Visit every installed application.
    fn foreach_app_info(&self, visitor: &mut dyn FnMut(RawAppInfo) -> bool) -> NativeResult<()>;

    // --- running contexts -----------------------------------------------

    /// Visit running application contexts in `scope`.
    fn foreach_app_context(
        &self,
        scope: RunningScope,
        visitor: &mut dyn FnMut(RawAppContext) -> bool,
    ) -> NativeResult<()>;
    fn app_context_clone(&self, context: RawAppContext) -> NativeResult<RawAppContext>;
    fn app_context_destroy(&self, context: RawAppContext);
    fn app_context_app_id(&self, context: RawAppContext) -> NativeResult<String>;
    fn app_context_package_id(&self, context: RawAppContext) -> NativeResult<String>;
    fn app_context_pid(&self, context: RawAppContext) -> NativeResult<i32>;
    fn app_context_state(&self, context: RawAppContext) -> NativeResult<ContextState>;
    fn app_context_is_terminated(&self, context: RawAppContext) -> NativeResult<bool>;

    // --- property filters -----------------------------------------------

    fn filter_create(&self) -> NativeResult<RawFilter>;
    fn filter_add_string(&self, filter: RawFilter, key: &str, value: &str) -> NativeResult<()>;
    fn filter_add_bool(&self, filter: RawFilter, key: &str, value: bool) -> NativeResult<()>;
    fn filter_foreach(
        &self,
        filter: RawFilter,
        visitor: &mut dyn FnMut(RawAppInfo) -> bool,
    ) -> NativeResult<()>;
    fn filter_destroy(&self, filter: RawFilter);

    // --- metadata filters -----------------------------------------------

    fn metadata_filter_create(&self) -> NativeResult<RawMetadataFilter>;
    fn metadata_filter_add(
        &self,
        filter: RawMetadataFilter,
        key: &str,
        value: &str,
    ) -> NativeResult<()>;
    fn metadata_filter_foreach(
        &self,
        filter: RawMetadataFilter,
        visitor: &mut dyn FnMut(RawAppInfo) -> bool,
    ) -> NativeResult<()>;
    fn metadata_filter_destroy(&self, filter: RawMetadataFilter);

    // --- event monitors -------------------------------------------------

    fn monitor_create(&self, kind: MonitorKind) -> NativeResult<RawMonitor>;
    fn monitor_set_status(&self, monitor: RawMonitor, mask: StatusMask) -> NativeResult<()>;
    fn monitor_register(&self, monitor: RawMonitor, callback: NativeCallback) -> NativeResult<()>;
    fn monitor_unregister(&self, monitor: RawMonitor);
    fn monitor_destroy(&self, monitor: RawMonitor);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mask_contains() {
        assert!(StatusMask::ENABLE_AND_DISABLE.contains(StatusMask::ENABLE));
        assert!(StatusMask::ENABLE_AND_DISABLE.contains(StatusMask::DISABLE));
        assert!(!StatusMask::ENABLE.contains(StatusMask::DISABLE));
        assert!(StatusEventKind::Disable.mask().contains(StatusMask::DISABLE));
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::NoSuchApp.to_string(), "NO_SUCH_APP");
        assert_eq!(ErrorCode::AppNotRunning.to_string(), "APP_NO_RUNNING");
    }
}
