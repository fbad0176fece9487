//! Owned application records.
//!
//! Each record holds its own cloned native handle; dropping the record
//! releases it. Accessors read through the handle and translate native
//! failures into [`Error`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::native::{
    AppFlag, AppInfoHandle, AppProperty, ContextHandle, ContextState, ErrorCode, NativeResult,
};
use crate::types::{AppId, Error, Result};

// =============================================================================
// ApplicationInfo
// =============================================================================

/// An installed application's description.
#[derive(Debug)]
pub struct ApplicationInfo {
    app_id: AppId,
    handle: AppInfoHandle,
}

impl ApplicationInfo {
    /// Wrap an owned description handle, reading its identifier eagerly.
    pub(crate) fn from_handle(handle: AppInfoHandle) -> NativeResult<Self> {
        let id = handle
            .framework()
            .app_info_property(handle.raw(), AppProperty::AppId)?;
        let app_id = AppId::from_string(id).map_err(|_| ErrorCode::InvalidParameter)?;
        Ok(Self { app_id, handle })
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    pub fn package_id(&self) -> Result<String> {
        self.property(AppProperty::PackageId)
    }

    pub fn label(&self) -> Result<String> {
        self.property(AppProperty::Label)
    }

    pub fn exec_path(&self) -> Result<String> {
        self.property(AppProperty::ExecPath)
    }

    pub fn icon_path(&self) -> Result<String> {
        self.property(AppProperty::IconPath)
    }

    pub fn app_type(&self) -> Result<String> {
        self.property(AppProperty::AppType)
    }

    /// Whether the application is hidden from launchers.
    pub fn is_no_display(&self) -> Result<bool> {
        self.flag(AppFlag::NoDisplay)
    }

    /// Whether the application shows up in the task manager.
    pub fn is_task_managed(&self) -> Result<bool> {
        self.flag(AppFlag::TaskManage)
    }

    pub fn categories(&self) -> Result<Vec<String>> {
        self.handle
            .framework()
            .app_info_categories(self.handle.raw())
            .map_err(|code| self.read_error(code, "categories"))
    }

    pub fn metadata(&self) -> Result<BTreeMap<String, String>> {
        let pairs = self
            .handle
            .framework()
            .app_info_metadata(self.handle.raw())
            .map_err(|code| self.read_error(code, "metadata"))?;
        Ok(pairs.into_iter().collect())
    }

    /// Read every property into a plain, serialisable value.
    pub fn snapshot(&self) -> Result<ApplicationSnapshot> {
        Ok(ApplicationSnapshot {
            app_id: self.app_id.clone(),
            package_id: self.package_id()?,
            label: self.label()?,
            exec_path: self.exec_path()?,
            icon_path: self.icon_path()?,
            app_type: self.app_type()?,
            no_display: self.is_no_display()?,
            task_manage: self.is_task_managed()?,
            categories: self.categories()?,
            metadata: self.metadata()?,
        })
    }

    fn property(&self, property: AppProperty) -> Result<String> {
        self.handle
            .framework()
            .app_info_property(self.handle.raw(), property)
            .map_err(|code| self.read_error(code, &format!("{property:?}")))
    }

    fn flag(&self, flag: AppFlag) -> Result<bool> {
        self.handle
            .framework()
            .app_info_flag(self.handle.raw(), flag)
            .map_err(|code| self.read_error(code, &format!("{flag:?}")))
    }

    fn read_error(&self, code: ErrorCode, what: &str) -> Error {
        Error::from_native(code, format!("failed to read {what} of {}", self.app_id))
    }
}

/// Plain copy of an application's properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSnapshot {
    pub app_id: AppId,
    pub package_id: String,
    pub label: String,
    pub exec_path: String,
    pub icon_path: String,
    pub app_type: String,
    pub no_display: bool,
    pub task_manage: bool,
    pub categories: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

// =============================================================================
// RunningContext
// =============================================================================

/// A running application process.
#[derive(Debug)]
pub struct RunningContext {
    app_id: AppId,
    process_id: i32,
    handle: ContextHandle,
}

impl RunningContext {
    pub(crate) fn from_handle(handle: ContextHandle) -> NativeResult<Self> {
        let framework = handle.framework();
        let id = framework.app_context_app_id(handle.raw())?;
        let process_id = framework.app_context_pid(handle.raw())?;
        let app_id = AppId::from_string(id).map_err(|_| ErrorCode::InvalidParameter)?;
        Ok(Self {
            app_id,
            process_id,
            handle,
        })
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    pub fn process_id(&self) -> i32 {
        self.process_id
    }

    pub fn package_id(&self) -> Result<String> {
        self.handle
            .framework()
            .app_context_package_id(self.handle.raw())
            .map_err(|code| self.read_error(code, "package id"))
    }

    /// Current state; `Terminated` once the process has exited.
    pub fn state(&self) -> Result<ContextState> {
        self.handle
            .framework()
            .app_context_state(self.handle.raw())
            .map_err(|code| self.read_error(code, "state"))
    }

    pub fn is_terminated(&self) -> Result<bool> {
        self.handle
            .framework()
            .app_context_is_terminated(self.handle.raw())
            .map_err(|code| self.read_error(code, "termination state"))
    }

    fn read_error(&self, code: ErrorCode, what: &str) -> Error {
        Error::from_native(
            code,
            format!("failed to read {what} of {} (pid {})", self.app_id, self.process_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{AppEntry, MemoryFramework, SharedFramework};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn shared(memory: &Arc<MemoryFramework>) -> SharedFramework {
        memory.clone()
    }

    #[test]
    fn test_snapshot_reads_every_property() {
        let memory = Arc::new(MemoryFramework::with_apps([AppEntry::new("org.example.clock")
            .with_label("Clock")
            .with_category("http://tizen.org/category/homeapp")
            .with_metadata("http://tizen.org/metadata/widget", "true")
            .with_no_display(true)]));
        let framework = shared(&memory);

        let handle = AppInfoHandle::create(&framework, "org.example.clock").unwrap();
        let info = ApplicationInfo::from_handle(handle).unwrap();
        let snapshot = info.snapshot().unwrap();

        assert_eq!(snapshot.app_id.as_str(), "org.example.clock");
        assert_eq!(snapshot.label, "Clock");
        assert!(snapshot.no_display);
        assert!(snapshot.task_manage);
        assert_eq!(
            snapshot.categories,
            vec!["http://tizen.org/category/homeapp".to_string()]
        );
        assert_eq!(
            snapshot.metadata.get("http://tizen.org/metadata/widget"),
            Some(&"true".to_string())
        );
    }

    #[test]
    fn test_record_drop_releases_handle() {
        let memory = Arc::new(MemoryFramework::with_apps([AppEntry::new("org.example.clock")]));
        let framework = shared(&memory);

        let info = ApplicationInfo::from_handle(
            AppInfoHandle::create(&framework, "org.example.clock").unwrap(),
        )
        .unwrap();
        assert_eq!(memory.live_handles().app_infos, 1);

        drop(info);
        assert_eq!(memory.live_handles().app_infos, 0);
    }

    #[test]
    fn test_record_outlives_uninstall() {
        let memory = Arc::new(MemoryFramework::with_apps([
            AppEntry::new("org.example.clock").with_label("Clock")
        ]));
        let framework = shared(&memory);

        let info = ApplicationInfo::from_handle(
            AppInfoHandle::create(&framework, "org.example.clock").unwrap(),
        )
        .unwrap();
        memory.uninstall("org.example.clock");

        assert_eq!(info.label().unwrap(), "Clock");
    }
}
