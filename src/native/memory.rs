//! In-memory application framework.
//!
//! `MemoryFramework` keeps an application table, a process table and the
//! same handle tables the platform library keeps, and implements
//! [`AppFramework`] on top of them. It backs hosts without the platform
//! library and the test suite.
//!
//! Besides the native surface it exposes:
//!   - scripting: `install`, `launch`, `terminate`, `set_enabled`, ...
//!   - fault injection: failing clones, enumerations and monitor setup
//!   - accounting: live handle counts and per-call statistics

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use super::{
    keys, AppFlag, AppFramework, AppProperty, ContextEventKind, ContextState, ErrorCode,
    EventState, MonitorKind, NativeCallback, NativeEvent, NativeResult, RawAppContext, RawAppInfo,
    RawFilter, RawMetadataFilter, RawMonitor, RunningScope, StatusEventKind, StatusMask,
};

// =============================================================================
// Table Entries
// =============================================================================

/// One installed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub app_id: String,
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

impl AppEntry {
    pub fn new(app_id: impl Into<String>) -> Self {
        let app_id = app_id.into();
        Self {
            package_id: app_id.clone(),
            label: app_id.clone(),
            exec_path: format!("/opt/usr/globalapps/{app_id}/bin/{app_id}"),
            icon_path: format!("/opt/usr/globalapps/{app_id}/shared/res/{app_id}.png"),
            app_type: "capp".to_string(),
            no_display: false,
            task_manage: true,
            categories: Vec::new(),
            metadata: BTreeMap::new(),
            app_id,
        }
    }

    pub fn with_package(mut self, package_id: impl Into<String>) -> Self {
        self.package_id = package_id.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_type(mut self, app_type: impl Into<String>) -> Self {
        self.app_type = app_type.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_no_display(mut self, no_display: bool) -> Self {
        self.no_display = no_display;
        self
    }

    pub fn with_task_manage(mut self, task_manage: bool) -> Self {
        self.task_manage = task_manage;
        self
    }

    fn matches_property(&self, key: &str, value: &str) -> bool {
        match key {
            keys::APP_ID => self.app_id == value,
            keys::APP_TYPE => self.app_type == value,
            keys::APP_CATEGORY => self.categories.iter().any(|c| c == value),
            _ => false,
        }
    }

    fn matches_flag(&self, key: &str, value: bool) -> bool {
        match key {
            keys::APP_NODISPLAY => self.no_display == value,
            keys::APP_TASKMANAGE => self.task_manage == value,
            _ => false,
        }
    }

    /// A metadata pair with an empty value matches on key presence.
    fn matches_metadata(&self, key: &str, value: &str) -> bool {
        self.metadata
            .get(key)
            .is_some_and(|v| value.is_empty() || v == value)
    }
}

#[derive(Debug, Clone)]
struct ProcessEntry {
    app_id: String,
    package_id: String,
    pid: i32,
    state: ContextState,
}

#[derive(Debug, Default)]
struct FilterState {
    strings: Vec<(String, String)>,
    flags: Vec<(String, bool)>,
}

impl FilterState {
    fn matches(&self, entry: &AppEntry) -> bool {
        self.strings
            .iter()
            .all(|(k, v)| entry.matches_property(k, v))
            && self.flags.iter().all(|(k, v)| entry.matches_flag(k, *v))
    }
}

struct MonitorState {
    kind: MonitorKind,
    mask: Option<StatusMask>,
    callback: Option<NativeCallback>,
}

impl MonitorState {
    fn accepts(&self, event: &NativeEvent) -> bool {
        match (self.kind, event) {
            (MonitorKind::Context, NativeEvent::Context { .. }) => true,
            (MonitorKind::Status, NativeEvent::Status { kind, .. }) => {
                self.mask.is_some_and(|mask| mask.contains(kind.mask()))
            }
            _ => false,
        }
    }
}

// =============================================================================
// Accounting
// =============================================================================

/// Handles currently allocated, per kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveHandles {
    pub app_infos: usize,
    pub contexts: usize,
    pub filters: usize,
    pub metadata_filters: usize,
    pub monitors: usize,
}

impl LiveHandles {
    pub fn total(&self) -> usize {
        self.app_infos + self.contexts + self.filters + self.metadata_filters + self.monitors
    }
}

/// Counters for native calls that matter to resource discipline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStats {
    pub enumerations: usize,
    pub app_info_clones: usize,
    pub filter_creates: usize,
    pub filter_destroys: usize,
    pub metadata_filter_creates: usize,
    pub metadata_filter_destroys: usize,
    pub monitor_creates: usize,
    pub monitor_destroys: usize,
    pub monitor_registrations: usize,
    pub monitor_unregistrations: usize,
}

#[derive(Debug, Clone, Copy)]
struct EnumerationFault {
    after: usize,
    code: ErrorCode,
}

#[derive(Debug, Default)]
struct Faults {
    clone_failures: HashSet<String>,
    context_clone_failures: HashSet<String>,
    enumeration: Option<EnumerationFault>,
    monitor_create: Option<ErrorCode>,
    monitor_set_status: Option<ErrorCode>,
    monitor_register: Option<ErrorCode>,
}

#[derive(Default)]
struct State {
    apps: Vec<AppEntry>,
    processes: Vec<ProcessEntry>,
    next_handle: u64,
    launches: i32,
    app_infos: HashMap<u64, AppEntry>,
    contexts: HashMap<u64, ProcessEntry>,
    filters: HashMap<u64, FilterState>,
    metadata_filters: HashMap<u64, Vec<(String, String)>>,
    monitors: HashMap<u64, MonitorState>,
    faults: Faults,
    stats: CallStats,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn app(&self, app_id: &str) -> Option<&AppEntry> {
        self.apps.iter().find(|app| app.app_id == app_id)
    }

    fn info(&self, info: RawAppInfo) -> NativeResult<&AppEntry> {
        self.app_infos.get(&info.0).ok_or(ErrorCode::InvalidParameter)
    }

    fn context(&self, context: RawAppContext) -> NativeResult<&ProcessEntry> {
        self.contexts.get(&context.0).ok_or(ErrorCode::InvalidParameter)
    }
}

// =============================================================================
// MemoryFramework
// =============================================================================

/// In-memory implementation of the native application manager.
pub struct MemoryFramework {
    state: Mutex<State>,
}

impl MemoryFramework {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Create a framework with `apps` installed, in order.
    pub fn with_apps(apps: impl IntoIterator<Item = AppEntry>) -> Self {
        let framework = Self::new();
        for app in apps {
            framework.install(app);
        }
        framework
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Install (or replace) an application.
    pub fn install(&self, entry: AppEntry) {
        let mut state = self.state.lock();
        match state.apps.iter_mut().find(|app| app.app_id == entry.app_id) {
            Some(existing) => *existing = entry,
            None => state.apps.push(entry),
        }
    }

    pub fn uninstall(&self, app_id: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.apps.len();
        state.apps.retain(|app| app.app_id != app_id);
        state.apps.len() != before
    }

    /// Start a UI process for `app_id` and notify context monitors.
    pub fn launch(&self, app_id: &str) -> i32 {
        self.spawn_process(app_id, ContextState::Foreground)
    }

    /// Start a service process for `app_id` and notify context monitors.
    pub fn launch_service(&self, app_id: &str) -> i32 {
        self.spawn_process(app_id, ContextState::Service)
    }

    fn spawn_process(&self, app_id: &str, state: ContextState) -> i32 {
        let pid = {
            let mut guard = self.state.lock();
            guard.launches += 1;
            let pid = 1000 + guard.launches;
            let package_id = guard
                .app(app_id)
                .map(|app| app.package_id.clone())
                .unwrap_or_else(|| app_id.to_string());
            guard.processes.push(ProcessEntry {
                app_id: app_id.to_string(),
                package_id,
                pid,
                state,
            });
            pid
        };
        self.emit(NativeEvent::Context {
            app_id: app_id.to_string(),
            kind: ContextEventKind::Launched,
        });
        pid
    }

    /// Stop every process of `app_id`. Returns false if none was running.
    pub fn terminate(&self, app_id: &str) -> bool {
        let removed = {
            let mut guard = self.state.lock();
            let before = guard.processes.len();
            guard.processes.retain(|p| p.app_id != app_id);
            guard.processes.len() != before
        };
        if removed {
            self.emit(NativeEvent::Context {
                app_id: app_id.to_string(),
                kind: ContextEventKind::Terminated,
            });
        }
        removed
    }

    /// Enable or disable `app_id`, reporting `Started` then `Completed`.
    pub fn set_enabled(&self, app_id: &str, enabled: bool) {
        let kind = if enabled {
            StatusEventKind::Enable
        } else {
            StatusEventKind::Disable
        };
        self.emit_status(app_id, kind, EventState::Started);
        self.emit_status(app_id, kind, EventState::Completed);
    }

    pub fn emit_status(&self, app_id: &str, kind: StatusEventKind, state: EventState) -> usize {
        let app_type = self
            .state
            .lock()
            .app(app_id)
            .map(|app| app.app_type.clone())
            .unwrap_or_default();
        self.emit(NativeEvent::Status {
            app_id: app_id.to_string(),
            app_type,
            kind,
            state,
        })
    }

    /// Deliver `event` to every registered monitor that accepts it.
    ///
    /// Callbacks run on the calling thread, after the table lock is released.
    pub fn emit(&self, event: NativeEvent) -> usize {
        let callbacks: Vec<NativeCallback> = {
            let state = self.state.lock();
            state
                .monitors
                .values()
                .filter(|monitor| monitor.accepts(&event))
                .filter_map(|monitor| monitor.callback.clone())
                .collect()
        };
        for callback in &callbacks {
            callback(&event);
        }
        callbacks.len()
    }

    // =========================================================================
    // Fault Injection
    // =========================================================================

    /// Make `app_info_clone` fail for descriptions of `app_id`.
    pub fn fail_clone_of(&self, app_id: &str) {
        self.state.lock().faults.clone_failures.insert(app_id.to_string());
    }

    /// Make `app_context_clone` fail for contexts of `app_id`.
    pub fn fail_context_clone_of(&self, app_id: &str) {
        self.state
            .lock()
            .faults
            .context_clone_failures
            .insert(app_id.to_string());
    }

    /// Make traversals fail with `code` after visiting `after` records.
    pub fn fail_enumeration(&self, after: usize, code: ErrorCode) {
        self.state.lock().faults.enumeration = Some(EnumerationFault { after, code });
    }

    pub fn fail_monitor_create(&self, code: ErrorCode) {
        self.state.lock().faults.monitor_create = Some(code);
    }

    pub fn fail_monitor_set_status(&self, code: ErrorCode) {
        self.state.lock().faults.monitor_set_status = Some(code);
    }

    pub fn fail_monitor_register(&self, code: ErrorCode) {
        self.state.lock().faults.monitor_register = Some(code);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    // =========================================================================
    // Accounting
    // =========================================================================

    pub fn live_handles(&self) -> LiveHandles {
        let state = self.state.lock();
        LiveHandles {
            app_infos: state.app_infos.len(),
            contexts: state.contexts.len(),
            filters: state.filters.len(),
            metadata_filters: state.metadata_filters.len(),
            monitors: state.monitors.len(),
        }
    }

    pub fn stats(&self) -> CallStats {
        self.state.lock().stats
    }

    /// Number of monitors with a registered callback.
    pub fn registered_callbacks(&self) -> usize {
        self.state
            .lock()
            .monitors
            .values()
            .filter(|monitor| monitor.callback.is_some())
            .count()
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Hand out temporary description handles for `entries`, one visitor call
    /// each, then release them.
    fn traverse_infos(
        &self,
        entries: Vec<AppEntry>,
        visitor: &mut dyn FnMut(RawAppInfo) -> bool,
    ) -> NativeResult<()> {
        let (temporaries, fault) = {
            let mut state = self.state.lock();
            state.stats.enumerations += 1;
            let fault = state.faults.enumeration;
            let ids: Vec<u64> = entries
                .into_iter()
                .map(|entry| {
                    let id = state.next_id();
                    state.app_infos.insert(id, entry);
                    id
                })
                .collect();
            (ids, fault)
        };

        let result = visit(&temporaries, fault, |id| visitor(RawAppInfo(id)));

        let mut state = self.state.lock();
        for id in temporaries {
            state.app_infos.remove(&id);
        }
        result
    }

    fn traverse_contexts(
        &self,
        entries: Vec<ProcessEntry>,
        visitor: &mut dyn FnMut(RawAppContext) -> bool,
    ) -> NativeResult<()> {
        let (temporaries, fault) = {
            let mut state = self.state.lock();
            state.stats.enumerations += 1;
            let fault = state.faults.enumeration;
            let ids: Vec<u64> = entries
                .into_iter()
                .map(|entry| {
                    let id = state.next_id();
                    state.contexts.insert(id, entry);
                    id
                })
                .collect();
            (ids, fault)
        };

        let result = visit(&temporaries, fault, |id| visitor(RawAppContext(id)));

        let mut state = self.state.lock();
        for id in temporaries {
            state.contexts.remove(&id);
        }
        result
    }
}

/// Drive a visitor over `ids`, honouring an injected enumeration fault.
fn visit(
    ids: &[u64],
    fault: Option<EnumerationFault>,
    mut visitor: impl FnMut(u64) -> bool,
) -> NativeResult<()> {
    for (visited, id) in ids.iter().enumerate() {
        if let Some(fault) = fault.filter(|f| f.after == visited) {
            return Err(fault.code);
        }
        if !visitor(*id) {
            return Ok(());
        }
    }
    match fault {
        Some(fault) if fault.after >= ids.len() => Err(fault.code),
        _ => Ok(()),
    }
}

impl Default for MemoryFramework {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryFramework")
            .field("apps", &state.apps.len())
            .field("processes", &state.processes.len())
            .field("monitors", &state.monitors.len())
            .finish()
    }
}

// =============================================================================
// AppFramework
// =============================================================================

impl AppFramework for MemoryFramework {
    fn app_info_create(&self, app_id: &str) -> NativeResult<RawAppInfo> {
        if app_id.is_empty() {
            return Err(ErrorCode::InvalidParameter);
        }
        let mut state = self.state.lock();
        let entry = state.app(app_id).cloned().ok_or(ErrorCode::NoSuchApp)?;
        let id = state.next_id();
        state.app_infos.insert(id, entry);
        Ok(RawAppInfo(id))
    }

    fn app_info_clone(&self, info: RawAppInfo) -> NativeResult<RawAppInfo> {
        let mut state = self.state.lock();
        let entry = state.info(info)?.clone();
        if state.faults.clone_failures.contains(&entry.app_id) {
            return Err(ErrorCode::OutOfMemory);
        }
        let id = state.next_id();
        state.app_infos.insert(id, entry);
        state.stats.app_info_clones += 1;
        Ok(RawAppInfo(id))
    }

    fn app_info_destroy(&self, info: RawAppInfo) {
        if self.state.lock().app_infos.remove(&info.0).is_none() {
            tracing::warn!(?info, "destroy of unknown app_info handle");
        }
    }

    fn app_info_property(&self, info: RawAppInfo, property: AppProperty) -> NativeResult<String> {
        let state = self.state.lock();
        let entry = state.info(info)?;
        Ok(match property {
            AppProperty::AppId => entry.app_id.clone(),
            AppProperty::PackageId => entry.package_id.clone(),
            AppProperty::Label => entry.label.clone(),
            AppProperty::ExecPath => entry.exec_path.clone(),
            AppProperty::IconPath => entry.icon_path.clone(),
            AppProperty::AppType => entry.app_type.clone(),
        })
    }

    fn app_info_flag(&self, info: RawAppInfo, flag: AppFlag) -> NativeResult<bool> {
        let state = self.state.lock();
        let entry = state.info(info)?;
        Ok(match flag {
            AppFlag::NoDisplay => entry.no_display,
            AppFlag::TaskManage => entry.task_manage,
        })
    }

    fn app_info_categories(&self, info: RawAppInfo) -> NativeResult<Vec<String>> {
        Ok(self.state.lock().info(info)?.categories.clone())
    }

    fn app_info_metadata(&self, info: RawAppInfo) -> NativeResult<Vec<(String, String)>> {
        let state = self.state.lock();
        Ok(state
            .info(info)?
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn foreach_app_info(&self, visitor: &mut dyn FnMut(RawAppInfo) -> bool) -> NativeResult<()> {
        let entries = self.state.lock().apps.clone();
        self.traverse_infos(entries, visitor)
    }

    fn foreach_app_context(
        &self,
        scope: RunningScope,
        visitor: &mut dyn FnMut(RawAppContext) -> bool,
    ) -> NativeResult<()> {
        let entries: Vec<ProcessEntry> = self
            .state
            .lock()
            .processes
            .iter()
            .filter(|p| scope == RunningScope::AllRunning || p.state != ContextState::Service)
            .cloned()
            .collect();
        self.traverse_contexts(entries, visitor)
    }

    fn app_context_clone(&self, context: RawAppContext) -> NativeResult<RawAppContext> {
        let mut state = self.state.lock();
        let entry = state.context(context)?.clone();
        if state.faults.context_clone_failures.contains(&entry.app_id) {
            return Err(ErrorCode::OutOfMemory);
        }
        let id = state.next_id();
        state.contexts.insert(id, entry);
        Ok(RawAppContext(id))
    }

    fn app_context_destroy(&self, context: RawAppContext) {
        if self.state.lock().contexts.remove(&context.0).is_none() {
            tracing::warn!(?context, "destroy of unknown app_context handle");
        }
    }

    fn app_context_app_id(&self, context: RawAppContext) -> NativeResult<String> {
        Ok(self.state.lock().context(context)?.app_id.clone())
    }

    fn app_context_package_id(&self, context: RawAppContext) -> NativeResult<String> {
        Ok(self.state.lock().context(context)?.package_id.clone())
    }

    fn app_context_pid(&self, context: RawAppContext) -> NativeResult<i32> {
        Ok(self.state.lock().context(context)?.pid)
    }

    fn app_context_state(&self, context: RawAppContext) -> NativeResult<ContextState> {
        let state = self.state.lock();
        let entry = state.context(context)?;
        let running = state.processes.iter().any(|p| p.pid == entry.pid);
        Ok(if running {
            entry.state
        } else {
            ContextState::Terminated
        })
    }

    fn app_context_is_terminated(&self, context: RawAppContext) -> NativeResult<bool> {
        Ok(self.app_context_state(context)? == ContextState::Terminated)
    }

    fn filter_create(&self) -> NativeResult<RawFilter> {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.filters.insert(id, FilterState::default());
        state.stats.filter_creates += 1;
        Ok(RawFilter(id))
    }

    fn filter_add_string(&self, filter: RawFilter, key: &str, value: &str) -> NativeResult<()> {
        if !matches!(key, keys::APP_ID | keys::APP_TYPE | keys::APP_CATEGORY) {
            return Err(ErrorCode::InvalidParameter);
        }
        let mut state = self.state.lock();
        let filter = state
            .filters
            .get_mut(&filter.0)
            .ok_or(ErrorCode::InvalidParameter)?;
        filter.strings.push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn filter_add_bool(&self, filter: RawFilter, key: &str, value: bool) -> NativeResult<()> {
        if !matches!(key, keys::APP_NODISPLAY | keys::APP_TASKMANAGE) {
            return Err(ErrorCode::InvalidParameter);
        }
        let mut state = self.state.lock();
        let filter = state
            .filters
            .get_mut(&filter.0)
            .ok_or(ErrorCode::InvalidParameter)?;
        filter.flags.push((key.to_string(), value));
        Ok(())
    }

    fn filter_foreach(
        &self,
        filter: RawFilter,
        visitor: &mut dyn FnMut(RawAppInfo) -> bool,
    ) -> NativeResult<()> {
        let entries = {
            let state = self.state.lock();
            let filter = state.filters.get(&filter.0).ok_or(ErrorCode::InvalidParameter)?;
            state
                .apps
                .iter()
                .filter(|app| filter.matches(app))
                .cloned()
                .collect()
        };
        self.traverse_infos(entries, visitor)
    }

    fn filter_destroy(&self, filter: RawFilter) {
        let mut state = self.state.lock();
        if state.filters.remove(&filter.0).is_some() {
            state.stats.filter_destroys += 1;
        }
    }

    fn metadata_filter_create(&self) -> NativeResult<RawMetadataFilter> {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.metadata_filters.insert(id, Vec::new());
        state.stats.metadata_filter_creates += 1;
        Ok(RawMetadataFilter(id))
    }

    fn metadata_filter_add(
        &self,
        filter: RawMetadataFilter,
        key: &str,
        value: &str,
    ) -> NativeResult<()> {
        if key.is_empty() {
            return Err(ErrorCode::InvalidParameter);
        }
        let mut state = self.state.lock();
        let pairs = state
            .metadata_filters
            .get_mut(&filter.0)
            .ok_or(ErrorCode::InvalidParameter)?;
        pairs.push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn metadata_filter_foreach(
        &self,
        filter: RawMetadataFilter,
        visitor: &mut dyn FnMut(RawAppInfo) -> bool,
    ) -> NativeResult<()> {
        let entries = {
            let state = self.state.lock();
            let pairs = state
                .metadata_filters
                .get(&filter.0)
                .ok_or(ErrorCode::InvalidParameter)?;
            state
                .apps
                .iter()
                .filter(|app| pairs.iter().any(|(k, v)| app.matches_metadata(k, v)))
                .cloned()
                .collect()
        };
        self.traverse_infos(entries, visitor)
    }

    fn metadata_filter_destroy(&self, filter: RawMetadataFilter) {
        let mut state = self.state.lock();
        if state.metadata_filters.remove(&filter.0).is_some() {
            state.stats.metadata_filter_destroys += 1;
        }
    }

    fn monitor_create(&self, kind: MonitorKind) -> NativeResult<RawMonitor> {
        let mut state = self.state.lock();
        if let Some(code) = state.faults.monitor_create {
            return Err(code);
        }
        let id = state.next_id();
        state.monitors.insert(
            id,
            MonitorState {
                kind,
                mask: None,
                callback: None,
            },
        );
        state.stats.monitor_creates += 1;
        Ok(RawMonitor(id))
    }

    fn monitor_set_status(&self, monitor: RawMonitor, mask: StatusMask) -> NativeResult<()> {
        let mut state = self.state.lock();
        if let Some(code) = state.faults.monitor_set_status {
            return Err(code);
        }
        let monitor = state
            .monitors
            .get_mut(&monitor.0)
            .ok_or(ErrorCode::InvalidParameter)?;
        if monitor.kind != MonitorKind::Status {
            return Err(ErrorCode::InvalidParameter);
        }
        monitor.mask = Some(mask);
        Ok(())
    }

    fn monitor_register(&self, monitor: RawMonitor, callback: NativeCallback) -> NativeResult<()> {
        let mut state = self.state.lock();
        if let Some(code) = state.faults.monitor_register {
            return Err(code);
        }
        let monitor = state
            .monitors
            .get_mut(&monitor.0)
            .ok_or(ErrorCode::InvalidParameter)?;
        monitor.callback = Some(callback);
        state.stats.monitor_registrations += 1;
        Ok(())
    }

    fn monitor_unregister(&self, monitor: RawMonitor) {
        let mut state = self.state.lock();
        let unregistered = state
            .monitors
            .get_mut(&monitor.0)
            .and_then(|m| m.callback.take())
            .is_some();
        if unregistered {
            state.stats.monitor_unregistrations += 1;
        }
    }

    fn monitor_destroy(&self, monitor: RawMonitor) {
        let mut state = self.state.lock();
        if state.monitors.remove(&monitor.0).is_some() {
            state.stats.monitor_destroys += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn collect_ids(framework: &MemoryFramework) -> NativeResult<Vec<String>> {
        let mut ids = Vec::new();
        framework.foreach_app_info(&mut |raw| {
            ids.push(framework.app_info_property(raw, AppProperty::AppId).unwrap());
            true
        })?;
        Ok(ids)
    }

    #[test]
    fn test_foreach_visits_in_install_order_and_releases_temporaries() {
        let framework = MemoryFramework::with_apps([
            AppEntry::new("org.example.a"),
            AppEntry::new("org.example.b"),
        ]);

        let ids = collect_ids(&framework).unwrap();
        assert_eq!(ids, vec!["org.example.a", "org.example.b"]);
        assert_eq!(framework.live_handles().total(), 0);
        assert_eq!(framework.stats().enumerations, 1);
    }

    #[test]
    fn test_visitor_false_stops_traversal() {
        let framework = MemoryFramework::with_apps([
            AppEntry::new("org.example.a"),
            AppEntry::new("org.example.b"),
        ]);

        let mut visited = 0;
        framework
            .foreach_app_info(&mut |_| {
                visited += 1;
                false
            })
            .unwrap();
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_enumeration_fault_reports_code() {
        let framework = MemoryFramework::with_apps([AppEntry::new("org.example.a")]);
        framework.fail_enumeration(0, ErrorCode::DbFailed);

        assert_eq!(collect_ids(&framework), Err(ErrorCode::DbFailed));
        assert_eq!(framework.live_handles().total(), 0);

        framework.clear_faults();
        assert!(collect_ids(&framework).is_ok());
    }

    #[test]
    fn test_filter_rejects_unknown_key() {
        let framework = MemoryFramework::new();
        let filter = framework.filter_create().unwrap();

        assert_eq!(
            framework.filter_add_string(filter, "NOT_A_KEY", "x"),
            Err(ErrorCode::InvalidParameter)
        );
        assert_eq!(
            framework.filter_add_bool(filter, keys::APP_ID, true),
            Err(ErrorCode::InvalidParameter)
        );
        framework.filter_destroy(filter);
    }

    #[test]
    fn test_context_scope_excludes_services_from_running() {
        let framework = MemoryFramework::with_apps([
            AppEntry::new("org.example.ui"),
            AppEntry::new("org.example.service").with_type("svcapp"),
        ]);
        framework.launch("org.example.ui");
        framework.launch_service("org.example.service");

        let mut running = 0;
        framework
            .foreach_app_context(RunningScope::Running, &mut |_| {
                running += 1;
                true
            })
            .unwrap();
        let mut all = 0;
        framework
            .foreach_app_context(RunningScope::AllRunning, &mut |_| {
                all += 1;
                true
            })
            .unwrap();

        assert_eq!((running, all), (1, 2));
    }

    #[test]
    fn test_status_events_respect_mask() {
        let framework = MemoryFramework::new();
        let monitor = framework.monitor_create(MonitorKind::Status).unwrap();
        framework
            .monitor_set_status(monitor, StatusMask::ENABLE)
            .unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        framework
            .monitor_register(
                monitor,
                Arc::new(move |_event: &NativeEvent| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        framework.set_enabled("org.example.a", true);
        framework.set_enabled("org.example.a", false);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        framework.monitor_unregister(monitor);
        framework.monitor_destroy(monitor);
        assert_eq!(framework.live_handles().monitors, 0);
    }

    #[test]
    fn test_context_state_reports_terminated_after_exit() {
        let framework = MemoryFramework::with_apps([AppEntry::new("org.example.a")]);
        framework.launch("org.example.a");

        let mut held = None;
        framework
            .foreach_app_context(RunningScope::Running, &mut |raw| {
                held = framework.app_context_clone(raw).ok();
                true
            })
            .unwrap();
        let held = held.unwrap();

        assert_eq!(framework.app_context_state(held), Ok(ContextState::Foreground));
        framework.terminate("org.example.a");
        assert_eq!(framework.app_context_is_terminated(held), Ok(true));
        framework.app_context_destroy(held);
    }
}
