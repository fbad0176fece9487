//! Event subscription management.
//!
//! Application events come in two coupled pairs, each backed by a single
//! native monitor:
//!   - Launched / Terminated  -> context monitor
//!   - Enabled / Disabled     -> status monitor
//!
//! A pair's monitor is created (and its dispatch callback registered) when
//! the first handler of either member is added, and unregistered and
//! destroyed when the last handler of both members is removed.
//!
//! Subscribing and unsubscribing take `&mut self`; callers that share an
//! `EventHub` across threads must synchronise access themselves. Dispatch
//! reads the handler lists from the native callback thread.

use chrono::Utc;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::args::{
    ApplicationDisabledEventArgs, ApplicationEnabledEventArgs, ApplicationLaunchedEventArgs,
    ApplicationTerminatedEventArgs,
};
use crate::native::{
    AppInfoHandle, ContextEventKind, MonitorHandle, MonitorKind, NativeCallback, NativeEvent,
    SharedFramework, StatusEventKind, StatusMask,
};
use crate::registry::ApplicationInfo;
use crate::types::{AppId, Error, EventConfig, Result, SubscriptionToken};

type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// The four application event streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Launched,
    Terminated,
    Enabled,
    Disabled,
}

impl EventKind {
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::Launched => "ApplicationLaunched",
            EventKind::Terminated => "ApplicationTerminated",
            EventKind::Enabled => "ApplicationEnabled",
            EventKind::Disabled => "ApplicationDisabled",
        }
    }
}

// =============================================================================
// Handler Lists
// =============================================================================

struct HandlerList<A> {
    kind: EventKind,
    entries: RwLock<Vec<(SubscriptionToken, Handler<A>)>>,
}

impl<A> HandlerList<A> {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            entries: RwLock::new(Vec::new()),
        }
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn push(&self, handler: Handler<A>) -> SubscriptionToken {
        let token = SubscriptionToken::new();
        self.entries.write().push((token.clone(), handler));
        token
    }

    fn remove(&self, token: &SubscriptionToken) -> bool {
        let mut entries = self.entries.write();
        match entries.iter().position(|(t, _)| t == token) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invoke every handler in registration order. A panicking handler is
    /// logged and does not stop the others.
    fn dispatch(&self, args: &A) {
        // Snapshot so handlers may subscribe/unsubscribe without deadlocking.
        let handlers: Vec<(SubscriptionToken, Handler<A>)> = self.entries.read().clone();
        let mut delivered = 0;
        for (token, handler) in &handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(args))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    tracing::error!(
                        event = self.kind.name(),
                        token = %token,
                        panic = panic_message(payload.as_ref()),
                        "event handler panicked"
                    );
                }
            }
        }
        tracing::debug!(
            event = self.kind.name(),
            delivered,
            subscribers = handlers.len(),
            "event dispatched"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// The two handler lists sharing one monitor.
struct PairHandlers<A, B> {
    first: HandlerList<A>,
    second: HandlerList<B>,
}

impl<A, B> PairHandlers<A, B> {
    fn subscriber_count(&self) -> usize {
        self.first.len() + self.second.len()
    }
}

// =============================================================================
// Monitor Slot
// =============================================================================

type Dispatcher<A, B> = fn(&SharedFramework, &PairHandlers<A, B>, &NativeEvent);

/// One coupled event pair and the monitor that feeds it.
struct MonitorSlot<A, B> {
    kind: MonitorKind,
    status_mask: Option<StatusMask>,
    handlers: Arc<PairHandlers<A, B>>,
    monitor: Option<MonitorHandle>,
    dispatcher: Dispatcher<A, B>,
}

impl<A: 'static, B: 'static> MonitorSlot<A, B> {
    fn new(
        kind: MonitorKind,
        status_mask: Option<StatusMask>,
        kinds: (EventKind, EventKind),
        dispatcher: Dispatcher<A, B>,
    ) -> Self {
        Self {
            kind,
            status_mask,
            handlers: Arc::new(PairHandlers {
                first: HandlerList::new(kinds.0),
                second: HandlerList::new(kinds.1),
            }),
            monitor: None,
            dispatcher,
        }
    }

    /// Create the monitor and register the dispatch callback, once.
    fn ensure_monitor(&mut self, framework: &SharedFramework) -> Result<()> {
        if self.monitor.is_some() {
            return Ok(());
        }

        let monitor = MonitorHandle::create(framework, self.kind).map_err(|code| {
            Error::from_native(code, format!("failed to create {:?} event monitor", self.kind))
        })?;
        if let Some(mask) = self.status_mask {
            framework
                .monitor_set_status(monitor.raw(), mask)
                .map_err(|code| Error::from_native(code, "failed to set monitor status"))?;
        }

        let handlers = Arc::clone(&self.handlers);
        let callback_framework = Arc::clone(framework);
        let dispatcher = self.dispatcher;
        let kind = self.kind;
        let callback: NativeCallback = Arc::new(move |event: &NativeEvent| {
            // Nothing may unwind back into the native layer.
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                dispatcher(&callback_framework, &handlers, event)
            }));
            if let Err(payload) = outcome {
                tracing::error!(
                    monitor = ?kind,
                    app_id = event.app_id(),
                    panic = panic_message(payload.as_ref()),
                    "event dispatch panicked"
                );
            }
        });

        framework
            .monitor_register(monitor.raw(), callback)
            .map_err(|code| Error::from_native(code, "failed to register event callback"))?;

        tracing::debug!(monitor = ?self.kind, "event monitor created");
        self.monitor = Some(monitor);
        Ok(())
    }

    fn subscribe_first(
        &mut self,
        framework: &SharedFramework,
        handler: Handler<A>,
    ) -> Result<SubscriptionToken> {
        self.ensure_monitor(framework)?;
        let token = self.handlers.first.push(handler);
        tracing::debug!(event = self.handlers.first.kind.name(), token = %token, "handler added");
        Ok(token)
    }

    fn subscribe_second(
        &mut self,
        framework: &SharedFramework,
        handler: Handler<B>,
    ) -> Result<SubscriptionToken> {
        self.ensure_monitor(framework)?;
        let token = self.handlers.second.push(handler);
        tracing::debug!(event = self.handlers.second.kind.name(), token = %token, "handler added");
        Ok(token)
    }

    /// Remove `token` from either list. Tears the monitor down when the pair
    /// has no subscribers left.
    fn unsubscribe(&mut self, token: &SubscriptionToken) -> bool {
        let removed = self.handlers.first.remove(token) || self.handlers.second.remove(token);
        if removed && self.handlers.subscriber_count() == 0 {
            self.teardown();
        }
        removed
    }
}

impl<A, B> MonitorSlot<A, B> {
    fn is_active(&self) -> bool {
        self.monitor.is_some()
    }

    /// Unregister the callback, then destroy the monitor.
    fn teardown(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.framework().monitor_unregister(monitor.raw());
            tracing::debug!(monitor = ?self.kind, "event monitor destroyed");
        }
    }
}

impl<A, B> Drop for MonitorSlot<A, B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// =============================================================================
// Dispatchers
// =============================================================================

type LifecycleHandlers = PairHandlers<ApplicationLaunchedEventArgs, ApplicationTerminatedEventArgs>;
type StatusHandlers = PairHandlers<ApplicationEnabledEventArgs, ApplicationDisabledEventArgs>;

fn dispatch_lifecycle(
    framework: &SharedFramework,
    handlers: &LifecycleHandlers,
    event: &NativeEvent,
) {
    let NativeEvent::Context { app_id, kind } = event else {
        tracing::debug!(?event, "ignoring non-context event on context monitor");
        return;
    };

    let application = match AppInfoHandle::create(framework, app_id)
        .and_then(ApplicationInfo::from_handle)
    {
        Ok(application) => application,
        Err(code) => {
            tracing::error!(app_id = %app_id, %code, "failed to resolve application for event");
            return;
        }
    };

    let timestamp = Utc::now();
    match kind {
        ContextEventKind::Launched => {
            handlers.first.dispatch(&ApplicationLaunchedEventArgs {
                application,
                timestamp,
            });
        }
        ContextEventKind::Terminated => {
            handlers.second.dispatch(&ApplicationTerminatedEventArgs {
                application,
                timestamp,
            });
        }
    }
}

fn dispatch_status(_framework: &SharedFramework, handlers: &StatusHandlers, event: &NativeEvent) {
    let NativeEvent::Status {
        app_id,
        app_type,
        kind,
        state,
    } = event
    else {
        tracing::debug!(?event, "ignoring non-status event on status monitor");
        return;
    };

    let app_id = match AppId::from_string(app_id.clone()) {
        Ok(app_id) => app_id,
        Err(reason) => {
            tracing::error!(reason, "status event without application id");
            return;
        }
    };

    let timestamp = Utc::now();
    match kind {
        StatusEventKind::Enable => {
            handlers.first.dispatch(&ApplicationEnabledEventArgs {
                app_id,
                app_type: app_type.clone(),
                state: *state,
                timestamp,
            });
        }
        StatusEventKind::Disable => {
            handlers.second.dispatch(&ApplicationDisabledEventArgs {
                app_id,
                app_type: app_type.clone(),
                state: *state,
                timestamp,
            });
        }
    }
}

// =============================================================================
// EventHub
// =============================================================================

/// Owns the application event monitors and their handlers.
pub struct EventHub {
    framework: SharedFramework,
    lifecycle: MonitorSlot<ApplicationLaunchedEventArgs, ApplicationTerminatedEventArgs>,
    status: MonitorSlot<ApplicationEnabledEventArgs, ApplicationDisabledEventArgs>,
}

impl EventHub {
    pub fn new(framework: SharedFramework, config: &EventConfig) -> Self {
        Self {
            framework,
            lifecycle: MonitorSlot::new(
                MonitorKind::Context,
                None,
                (EventKind::Launched, EventKind::Terminated),
                dispatch_lifecycle,
            ),
            status: MonitorSlot::new(
                MonitorKind::Status,
                Some(config.status_mask),
                (EventKind::Enabled, EventKind::Disabled),
                dispatch_status,
            ),
        }
    }

    pub fn on_launched<F>(&mut self, handler: F) -> Result<SubscriptionToken>
    where
        F: Fn(&ApplicationLaunchedEventArgs) + Send + Sync + 'static,
    {
        self.lifecycle.subscribe_first(&self.framework, Arc::new(handler))
    }

    pub fn on_terminated<F>(&mut self, handler: F) -> Result<SubscriptionToken>
    where
        F: Fn(&ApplicationTerminatedEventArgs) + Send + Sync + 'static,
    {
        self.lifecycle.subscribe_second(&self.framework, Arc::new(handler))
    }

    pub fn on_enabled<F>(&mut self, handler: F) -> Result<SubscriptionToken>
    where
        F: Fn(&ApplicationEnabledEventArgs) + Send + Sync + 'static,
    {
        self.status.subscribe_first(&self.framework, Arc::new(handler))
    }

    pub fn on_disabled<F>(&mut self, handler: F) -> Result<SubscriptionToken>
    where
        F: Fn(&ApplicationDisabledEventArgs) + Send + Sync + 'static,
    {
        self.status.subscribe_second(&self.framework, Arc::new(handler))
    }

    /// Detach the handler registered under `token`. Returns false if no such
    /// handler is registered.
    pub fn unsubscribe(&mut self, token: &SubscriptionToken) -> bool {
        let removed = self.lifecycle.unsubscribe(token) || self.status.unsubscribe(token);
        if !removed {
            tracing::debug!(token = %token, "unsubscribe of unknown token");
        }
        removed
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Launched => self.lifecycle.handlers.first.len(),
            EventKind::Terminated => self.lifecycle.handlers.second.len(),
            EventKind::Enabled => self.status.handlers.first.len(),
            EventKind::Disabled => self.status.handlers.second.len(),
        }
    }

    /// Whether the launched/terminated monitor currently exists.
    pub fn is_lifecycle_monitor_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    /// Whether the enabled/disabled monitor currently exists.
    pub fn is_status_monitor_active(&self) -> bool {
        self.status.is_active()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("launched", &self.subscriber_count(EventKind::Launched))
            .field("terminated", &self.subscriber_count(EventKind::Terminated))
            .field("enabled", &self.subscriber_count(EventKind::Enabled))
            .field("disabled", &self.subscriber_count(EventKind::Disabled))
            .field("lifecycle_monitor", &self.lifecycle.is_active())
            .field("status_monitor", &self.status.is_active())
            .finish()
    }
}
