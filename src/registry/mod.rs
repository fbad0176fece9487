//! Application registry facade.
//!
//! [`AppManager`] is the public entry point: it enumerates installed and
//! running applications, looks applications up by id and owns the
//! [`EventHub`] for application events.
//!
//! Enumerations call into the native layer synchronously, so they run on the
//! blocking pool and the returned futures complete when the traversal does.
//! There is no cancellation and no timeout beyond what the native layer does.

mod enumerate;
mod filter;
mod records;

pub use filter::{AppFilter, FilterKey, MetadataFilter};
pub use records::{ApplicationInfo, ApplicationSnapshot, RunningContext};

use std::sync::Arc;

use crate::events::{
    ApplicationDisabledEventArgs, ApplicationEnabledEventArgs, ApplicationLaunchedEventArgs,
    ApplicationTerminatedEventArgs, EventHub,
};
use crate::native::{AppInfoHandle, RunningScope, SharedFramework};
use crate::types::{AppId, Config, Error, Result, SubscriptionToken};

/// Application manager over a native framework.
#[derive(Debug)]
pub struct AppManager {
    framework: SharedFramework,
    config: Config,
    events: EventHub,
}

impl AppManager {
    pub fn new(framework: SharedFramework) -> Self {
        Self::with_config(framework, Config::default())
    }

    pub fn with_config(framework: SharedFramework, config: Config) -> Self {
        let events = EventHub::new(Arc::clone(&framework), &config.events);
        Self {
            framework,
            config,
            events,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventHub {
        &mut self.events
    }

    // =========================================================================
    // Installed Applications
    // =========================================================================

    /// All installed applications.
    pub async fn list_installed(&self) -> Result<Vec<ApplicationInfo>> {
        let max_results = self.config.enumeration.max_results;
        self.offload(move |framework| {
            enumerate::collect_app_infos(
                &framework,
                max_results,
                "installed applications",
                |visitor| framework.foreach_app_info(visitor),
            )
        })
        .await
    }

    /// Installed applications matching every criterion of `filter`.
    ///
    /// Fails with `InvalidFilter` on empty criteria before touching the
    /// native layer.
    pub async fn list_installed_filtered(
        &self,
        filter: &AppFilter,
    ) -> Result<Vec<ApplicationInfo>> {
        filter.validate()?;
        let filter = filter.clone();
        let max_results = self.config.enumeration.max_results;
        self.offload(move |framework| {
            let handle = filter.build(&framework)?;
            enumerate::collect_app_infos(
                &framework,
                max_results,
                "filtered applications",
                |visitor| framework.filter_foreach(handle.raw(), visitor),
            )
        })
        .await
    }

    /// Installed applications carrying any of the metadata pairs in `filter`.
    pub async fn list_installed_by_metadata(
        &self,
        filter: &MetadataFilter,
    ) -> Result<Vec<ApplicationInfo>> {
        filter.validate()?;
        let filter = filter.clone();
        let max_results = self.config.enumeration.max_results;
        self.offload(move |framework| {
            let handle = filter.build(&framework)?;
            enumerate::collect_app_infos(
                &framework,
                max_results,
                "metadata-filtered applications",
                |visitor| framework.metadata_filter_foreach(handle.raw(), visitor),
            )
        })
        .await
    }

    /// Number of installed applications.
    pub async fn installed_count(&self) -> Result<usize> {
        self.offload(|framework| enumerate::count_installed(&framework)).await
    }

    /// Look up one installed application.
    ///
    /// An unknown id is `NotFound`; an empty id is `InvalidParameter`.
    pub fn get_installed(&self, app_id: &str) -> Result<ApplicationInfo> {
        let app_id = AppId::try_from(app_id)?;
        AppInfoHandle::create(&self.framework, app_id.as_str())
            .and_then(ApplicationInfo::from_handle)
            .map_err(|code| {
                Error::from_native_lookup(code, format!("no installed application {app_id}"))
            })
    }

    // =========================================================================
    // Running Applications
    // =========================================================================

    /// Installed descriptions of running UI applications.
    pub async fn list_running(&self) -> Result<Vec<ApplicationInfo>> {
        let max_results = self.config.enumeration.max_results;
        self.offload(move |framework| {
            enumerate::collect_running_infos(&framework, RunningScope::Running, max_results)
        })
        .await
    }

    /// Installed descriptions of every running application, services included.
    pub async fn list_all_running(&self) -> Result<Vec<ApplicationInfo>> {
        let max_results = self.config.enumeration.max_results;
        self.offload(move |framework| {
            enumerate::collect_running_infos(&framework, RunningScope::AllRunning, max_results)
        })
        .await
    }

    /// Running UI application contexts.
    pub async fn list_running_contexts(&self) -> Result<Vec<RunningContext>> {
        let max_results = self.config.enumeration.max_results;
        self.offload(move |framework| {
            enumerate::collect_contexts(&framework, RunningScope::Running, max_results)
        })
        .await
    }

    /// Every running application context, services included.
    pub async fn list_all_running_contexts(&self) -> Result<Vec<RunningContext>> {
        let max_results = self.config.enumeration.max_results;
        self.offload(move |framework| {
            enumerate::collect_contexts(&framework, RunningScope::AllRunning, max_results)
        })
        .await
    }

    /// Whether any process of `app_id` is running.
    pub async fn is_running(&self, app_id: &str) -> Result<bool> {
        let app_id = AppId::try_from(app_id)?;
        self.offload(move |framework| enumerate::any_running(&framework, app_id.as_str()))
            .await
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn on_launched<F>(&mut self, handler: F) -> Result<SubscriptionToken>
    where
        F: Fn(&ApplicationLaunchedEventArgs) + Send + Sync + 'static,
    {
        self.events.on_launched(handler)
    }

    pub fn on_terminated<F>(&mut self, handler: F) -> Result<SubscriptionToken>
    where
        F: Fn(&ApplicationTerminatedEventArgs) + Send + Sync + 'static,
    {
        self.events.on_terminated(handler)
    }

    pub fn on_enabled<F>(&mut self, handler: F) -> Result<SubscriptionToken>
    where
        F: Fn(&ApplicationEnabledEventArgs) + Send + Sync + 'static,
    {
        self.events.on_enabled(handler)
    }

    pub fn on_disabled<F>(&mut self, handler: F) -> Result<SubscriptionToken>
    where
        F: Fn(&ApplicationDisabledEventArgs) + Send + Sync + 'static,
    {
        self.events.on_disabled(handler)
    }

    pub fn unsubscribe(&mut self, token: &SubscriptionToken) -> bool {
        self.events.unsubscribe(token)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Run a blocking native traversal on the blocking pool.
    async fn offload<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(SharedFramework) -> Result<T> + Send + 'static,
    {
        let framework = Arc::clone(&self.framework);
        tokio::task::spawn_blocking(move || work(framework))
            .await
            .map_err(|e| Error::internal(format!("enumeration task failed: {e}")))?
    }
}
