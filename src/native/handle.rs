//! Owning wrappers for native handles.
//!
//! An [`Owned`] handle pairs a raw id with the framework that issued it and
//! releases it on drop, so every create/clone is matched by exactly one
//! destroy on all exit paths.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{
    AppFramework, MonitorKind, NativeResult, RawAppContext, RawAppInfo, RawFilter,
    RawMetadataFilter, RawMonitor, SharedFramework,
};

/// A kind of native handle and how to release it.
pub trait HandleKind {
    type Raw: Copy + fmt::Debug;
    const NAME: &'static str;

    fn release(framework: &dyn AppFramework, raw: Self::Raw);
}

/// A native handle owned by this crate.
pub struct Owned<K: HandleKind> {
    framework: SharedFramework,
    raw: K::Raw,
    _kind: PhantomData<fn() -> K>,
}

impl<K: HandleKind> Owned<K> {
    /// Take ownership of `raw`. It will be released when the wrapper drops.
    pub(crate) fn from_raw(framework: &SharedFramework, raw: K::Raw) -> Self {
        tracing::trace!(kind = K::NAME, ?raw, "acquired native handle");
        Self {
            framework: Arc::clone(framework),
            raw,
            _kind: PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> K::Raw {
        self.raw
    }

    pub(crate) fn framework(&self) -> &SharedFramework {
        &self.framework
    }
}

impl<K: HandleKind> Drop for Owned<K> {
    fn drop(&mut self) {
        K::release(self.framework.as_ref(), self.raw);
        tracing::trace!(kind = K::NAME, raw = ?self.raw, "released native handle");
    }
}

impl<K: HandleKind> fmt::Debug for Owned<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("kind", &K::NAME)
            .field("raw", &self.raw)
            .finish()
    }
}

// =============================================================================
// Handle Kinds
// =============================================================================

#[derive(Debug)]
pub enum AppInfoKind {}

impl HandleKind for AppInfoKind {
    type Raw = RawAppInfo;
    const NAME: &'static str = "app_info";

    fn release(framework: &dyn AppFramework, raw: RawAppInfo) {
        framework.app_info_destroy(raw);
    }
}

#[derive(Debug)]
pub enum ContextKind {}

impl HandleKind for ContextKind {
    type Raw = RawAppContext;
    const NAME: &'static str = "app_context";

    fn release(framework: &dyn AppFramework, raw: RawAppContext) {
        framework.app_context_destroy(raw);
    }
}

#[derive(Debug)]
pub enum FilterKind {}

impl HandleKind for FilterKind {
    type Raw = RawFilter;
    const NAME: &'static str = "app_info_filter";

    fn release(framework: &dyn AppFramework, raw: RawFilter) {
        framework.filter_destroy(raw);
    }
}

#[derive(Debug)]
pub enum MetadataFilterKind {}

impl HandleKind for MetadataFilterKind {
    type Raw = RawMetadataFilter;
    const NAME: &'static str = "app_info_metadata_filter";

    fn release(framework: &dyn AppFramework, raw: RawMetadataFilter) {
        framework.metadata_filter_destroy(raw);
    }
}

#[derive(Debug)]
pub enum MonitorHandleKind {}

impl HandleKind for MonitorHandleKind {
    type Raw = RawMonitor;
    const NAME: &'static str = "event_monitor";

    fn release(framework: &dyn AppFramework, raw: RawMonitor) {
        framework.monitor_destroy(raw);
    }
}

pub type AppInfoHandle = Owned<AppInfoKind>;
pub type ContextHandle = Owned<ContextKind>;
pub type FilterHandle = Owned<FilterKind>;
pub type MetadataFilterHandle = Owned<MetadataFilterKind>;
pub type MonitorHandle = Owned<MonitorHandleKind>;

// =============================================================================
// Constructors
// =============================================================================

impl AppInfoHandle {
    /// Create a description handle for `app_id`.
    pub(crate) fn create(framework: &SharedFramework, app_id: &str) -> NativeResult<Self> {
        let raw = framework.app_info_create(app_id)?;
        Ok(Self::from_raw(framework, raw))
    }

    /// Clone a borrowed handle into an independently owned one.
    pub(crate) fn clone_raw(framework: &SharedFramework, raw: RawAppInfo) -> NativeResult<Self> {
        let cloned = framework.app_info_clone(raw)?;
        Ok(Self::from_raw(framework, cloned))
    }
}

impl ContextHandle {
    pub(crate) fn clone_raw(framework: &SharedFramework, raw: RawAppContext) -> NativeResult<Self> {
        let cloned = framework.app_context_clone(raw)?;
        Ok(Self::from_raw(framework, cloned))
    }
}

impl FilterHandle {
    pub(crate) fn create(framework: &SharedFramework) -> NativeResult<Self> {
        let raw = framework.filter_create()?;
        Ok(Self::from_raw(framework, raw))
    }
}

impl MetadataFilterHandle {
    pub(crate) fn create(framework: &SharedFramework) -> NativeResult<Self> {
        let raw = framework.metadata_filter_create()?;
        Ok(Self::from_raw(framework, raw))
    }
}

impl MonitorHandle {
    pub(crate) fn create(framework: &SharedFramework, kind: MonitorKind) -> NativeResult<Self> {
        let raw = framework.monitor_create(kind)?;
        Ok(Self::from_raw(framework, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{AppEntry, MemoryFramework};

    fn framework() -> (Arc<MemoryFramework>, SharedFramework) {
        let memory = Arc::new(MemoryFramework::new());
        memory.install(AppEntry::new("org.example.clock"));
        let shared: SharedFramework = memory.clone();
        (memory, shared)
    }

    #[test]
    fn test_drop_releases_handle() {
        let (memory, shared) = framework();

        let handle = AppInfoHandle::create(&shared, "org.example.clock").unwrap();
        assert_eq!(memory.live_handles().app_infos, 1);

        drop(handle);
        assert_eq!(memory.live_handles().app_infos, 0);
    }

    #[test]
    fn test_clone_is_independent_of_source() {
        let (memory, shared) = framework();

        let original = AppInfoHandle::create(&shared, "org.example.clock").unwrap();
        let cloned = AppInfoHandle::clone_raw(&shared, original.raw()).unwrap();
        assert_ne!(original.raw(), cloned.raw());

        drop(original);
        assert_eq!(memory.live_handles().app_infos, 1);
        assert!(shared
            .app_info_property(cloned.raw(), crate::native::AppProperty::AppId)
            .is_ok());
    }

    #[test]
    fn test_failed_create_leaves_nothing_to_release() {
        let (memory, shared) = framework();

        let err = AppInfoHandle::create(&shared, "org.example.missing").unwrap_err();
        assert_eq!(err, crate::native::ErrorCode::NoSuchApp);
        assert_eq!(memory.live_handles().app_infos, 0);
    }

    #[test]
    fn test_filter_handles_released() {
        let (memory, shared) = framework();

        {
            let _filter = FilterHandle::create(&shared).unwrap();
            let _metadata = MetadataFilterHandle::create(&shared).unwrap();
            assert_eq!(memory.live_handles().filters, 1);
            assert_eq!(memory.live_handles().metadata_filters, 1);
        }

        assert_eq!(memory.live_handles().total(), 0);
    }
}
