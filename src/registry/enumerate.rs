//! Blocking traversal of native records.
//!
//! These run on the blocking pool. Each visited record is cloned (or, for
//! running contexts resolved to static info, created by id) into an owned
//! record. A record that cannot be cloned or resolved is skipped with a
//! warning; a failure of the traversal itself fails the whole batch and
//! drops whatever was collected so far.

use crate::native::{
    AppInfoHandle, ContextHandle, NativeResult, RawAppContext, RawAppInfo, RunningScope,
    SharedFramework,
};
use crate::types::{Error, Result};

use super::records::{ApplicationInfo, RunningContext};

/// Whether the visitor should ask for another record.
fn wants_more(collected: usize, max_results: Option<usize>) -> bool {
    max_results.map_or(true, |max| collected < max)
}

/// Clone every visited description into an owned [`ApplicationInfo`].
pub(crate) fn collect_app_infos<F>(
    framework: &SharedFramework,
    max_results: Option<usize>,
    source: &str,
    traverse: F,
) -> Result<Vec<ApplicationInfo>>
where
    F: FnOnce(&mut dyn FnMut(RawAppInfo) -> bool) -> NativeResult<()>,
{
    let mut records = Vec::new();
    if max_results == Some(0) {
        return Ok(records);
    }

    traverse(&mut |raw| {
        match AppInfoHandle::clone_raw(framework, raw).and_then(ApplicationInfo::from_handle) {
            Ok(info) => records.push(info),
            Err(code) => {
                tracing::warn!(source, ?raw, %code, "skipping application: clone failed");
            }
        }
        wants_more(records.len(), max_results)
    })
    .map_err(|code| Error::from_native(code, format!("failed to enumerate {source}")))?;

    tracing::debug!(source, count = records.len(), "enumerated applications");
    Ok(records)
}

/// Resolve every visited running context to its installed description.
pub(crate) fn collect_running_infos(
    framework: &SharedFramework,
    scope: RunningScope,
    max_results: Option<usize>,
) -> Result<Vec<ApplicationInfo>> {
    let mut records = Vec::new();
    if max_results == Some(0) {
        return Ok(records);
    }

    framework
        .foreach_app_context(scope, &mut |raw| {
            match resolve_context(framework, raw) {
                Ok(info) => records.push(info),
                Err(code) => {
                    tracing::warn!(
                        ?scope,
                        ?raw,
                        %code,
                        "skipping running application: resolve failed"
                    );
                }
            }
            wants_more(records.len(), max_results)
        })
        .map_err(|code| {
            Error::from_native(code, format!("failed to enumerate {scope:?} applications"))
        })?;

    tracing::debug!(?scope, count = records.len(), "enumerated running applications");
    Ok(records)
}

fn resolve_context(
    framework: &SharedFramework,
    raw: RawAppContext,
) -> NativeResult<ApplicationInfo> {
    let app_id = framework.app_context_app_id(raw)?;
    let handle = AppInfoHandle::create(framework, &app_id)?;
    ApplicationInfo::from_handle(handle)
}

/// Clone every visited running context into an owned [`RunningContext`].
pub(crate) fn collect_contexts(
    framework: &SharedFramework,
    scope: RunningScope,
    max_results: Option<usize>,
) -> Result<Vec<RunningContext>> {
    let mut records = Vec::new();
    if max_results == Some(0) {
        return Ok(records);
    }

    framework
        .foreach_app_context(scope, &mut |raw| {
            match ContextHandle::clone_raw(framework, raw).and_then(RunningContext::from_handle) {
                Ok(context) => records.push(context),
                Err(code) => {
                    tracing::warn!(?scope, ?raw, %code, "skipping running context: clone failed");
                }
            }
            wants_more(records.len(), max_results)
        })
        .map_err(|code| {
            Error::from_native(code, format!("failed to enumerate {scope:?} contexts"))
        })?;

    Ok(records)
}

/// Count installed applications without cloning any handle.
pub(crate) fn count_installed(framework: &SharedFramework) -> Result<usize> {
    let mut count = 0;
    framework
        .foreach_app_info(&mut |_| {
            count += 1;
            true
        })
        .map_err(|code| Error::from_native(code, "failed to count installed applications"))?;
    Ok(count)
}

/// Whether any running context belongs to `app_id`.
pub(crate) fn any_running(framework: &SharedFramework, app_id: &str) -> Result<bool> {
    let mut found = false;
    framework
        .foreach_app_context(RunningScope::AllRunning, &mut |raw| {
            found = framework
                .app_context_app_id(raw)
                .is_ok_and(|id| id == app_id);
            !found
        })
        .map_err(|code| Error::from_native(code, "failed to enumerate running contexts"))?;
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{AppEntry, ErrorCode, MemoryFramework};
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn setup(ids: &[&str]) -> (Arc<MemoryFramework>, SharedFramework) {
        let memory = Arc::new(MemoryFramework::with_apps(
            ids.iter().map(|id| AppEntry::new(*id)),
        ));
        let shared: SharedFramework = memory.clone();
        (memory, shared)
    }

    fn installed(shared: &SharedFramework, max: Option<usize>) -> Result<Vec<ApplicationInfo>> {
        collect_app_infos(shared, max, "installed applications", |visitor| {
            shared.foreach_app_info(visitor)
        })
    }

    fn ids(records: &[ApplicationInfo]) -> Vec<&str> {
        records.iter().map(|r| r.app_id().as_str()).collect()
    }

    #[test]
    #[traced_test]
    fn test_clone_failure_skips_only_that_record() {
        let (memory, shared) = setup(&["org.example.one", "org.example.two", "org.example.three"]);
        memory.fail_clone_of("org.example.two");

        let records = installed(&shared, None).unwrap();

        assert_eq!(ids(&records), vec!["org.example.one", "org.example.three"]);
        assert!(logs_contain("skipping application: clone failed"));
    }

    #[test]
    fn test_traversal_failure_discards_partial_results() {
        let (memory, shared) = setup(&["org.example.one", "org.example.two", "org.example.three"]);
        memory.fail_enumeration(2, ErrorCode::IoError);

        let err = installed(&shared, None).unwrap_err();

        assert_eq!(err.native_code(), Some(ErrorCode::IoError));
        assert_eq!(memory.live_handles().total(), 0);
    }

    #[test]
    fn test_max_results_stops_traversal() {
        let (_memory, shared) = setup(&["org.example.one", "org.example.two", "org.example.three"]);

        let records = installed(&shared, Some(2)).unwrap();
        assert_eq!(ids(&records), vec!["org.example.one", "org.example.two"]);

        assert!(installed(&shared, Some(0)).unwrap().is_empty());
    }

    #[test]
    fn test_running_skips_unresolvable_context() {
        let (memory, shared) = setup(&["org.example.one"]);
        memory.launch("org.example.one");
        memory.launch("org.example.ghost");

        let records = collect_running_infos(&shared, RunningScope::Running, None).unwrap();

        assert_eq!(ids(&records), vec!["org.example.one"]);
    }

    #[test]
    fn test_contexts_carry_process_ids() {
        let (memory, shared) = setup(&["org.example.one", "org.example.svc"]);
        let ui = memory.launch("org.example.one");
        let svc = memory.launch_service("org.example.svc");

        let running = collect_contexts(&shared, RunningScope::Running, None).unwrap();
        let all = collect_contexts(&shared, RunningScope::AllRunning, None).unwrap();

        assert_eq!(running.iter().map(|c| c.process_id()).collect::<Vec<_>>(), vec![ui]);
        assert_eq!(all.iter().map(|c| c.process_id()).collect::<Vec<_>>(), vec![ui, svc]);
    }

    #[test]
    #[traced_test]
    fn test_context_clone_failure_skips_only_that_context() {
        let (memory, shared) = setup(&["org.example.one", "org.example.two", "org.example.three"]);
        let first = memory.launch("org.example.one");
        memory.launch("org.example.two");
        let third = memory.launch("org.example.three");
        memory.fail_context_clone_of("org.example.two");

        let contexts = collect_contexts(&shared, RunningScope::AllRunning, None).unwrap();

        let pids: Vec<_> = contexts.iter().map(|c| c.process_id()).collect();
        assert_eq!(pids, vec![first, third]);
        assert!(logs_contain("skipping running context: clone failed"));
    }

    #[test]
    fn test_count_and_any_running() {
        let (memory, shared) = setup(&["org.example.one", "org.example.two"]);
        memory.launch_service("org.example.two");

        assert_eq!(count_installed(&shared).unwrap(), 2);
        assert!(any_running(&shared, "org.example.two").unwrap());
        assert!(!any_running(&shared, "org.example.one").unwrap());
        assert_eq!(memory.stats().app_info_clones, 0);
    }
}
