//! Process-global `SpanTracker` lifecycle. `SpanTracker` itself holds no
//! `tokio` primitives; here it sits behind a `tokio::sync::Mutex` so every
//! suspension point goes through `spawn_blocking` rather than ever blocking
//! the async executor on SQLite I/O.

use std::sync::OnceLock;

use evotrace_engine::SpanTracker;
use evotrace_store::Store;

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

static TRACKER: OnceLock<tokio::sync::Mutex<Option<SpanTracker>>> = OnceLock::new();

fn cell() -> &'static tokio::sync::Mutex<Option<SpanTracker>> {
    TRACKER.get_or_init(|| tokio::sync::Mutex::new(None))
}

/// Opens the store at `config.storage_path` and installs it as the global
/// tracker. Errors if a tracker is already installed — call [`teardown`]
/// first to replace it.
pub async fn init(config: &RuntimeConfig, agent_id: Option<String>, agent_type: Option<String>) -> Result<()> {
    let path = config.storage_path.join("evotrace.db");
    let open_options = config.open_options();
    let tracker = tokio::task::spawn_blocking(move || -> Result<SpanTracker> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Store::open(&path, open_options)?;
        let mut tracker = SpanTracker::new(store);
        if let (Some(id), Some(kind)) = (agent_id, agent_type) {
            tracker = tracker.with_agent(id, kind);
        }
        Ok(tracker)
    })
    .await
    .map_err(|e| Error::Config(format!("tracker init task panicked: {e}")))??;

    install(tracker).await
}

/// Installs an already-constructed tracker (primarily for tests, which use
/// `Store::open_in_memory`).
pub async fn install(tracker: SpanTracker) -> Result<()> {
    let mut guard = cell().lock().await;
    if guard.is_some() {
        return Err(Error::Config("global tracker is already initialized".to_string()));
    }
    *guard = Some(tracker);
    Ok(())
}

pub async fn is_initialized() -> bool {
    cell().lock().await.is_some()
}

/// Clears the global tracker without touching the underlying store file.
pub async fn teardown() {
    *cell().lock().await = None;
}

/// Runs `f` against the global tracker on a blocking thread, returning
/// [`Error::NotInitialized`] if [`init`]/[`install`] was never called.
pub async fn with_tracker<F, T>(f: F) -> Result<T>
where
    F: FnOnce(&mut SpanTracker) -> evotrace_engine::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let cell = cell();
    tokio::task::spawn_blocking(move || {
        let mut guard = cell.blocking_lock();
        let tracker = guard.as_mut().ok_or_else(|| Error::NotInitialized("call init() before using the tracker".to_string()))?;
        f(tracker).map_err(Error::from)
    })
    .await
    .map_err(|e| Error::Config(format!("tracker task panicked: {e}")))?
}

pub async fn init_in_memory(agent_id: Option<String>, agent_type: Option<String>) -> Result<()> {
    let store = Store::open_in_memory()?;
    let mut tracker = SpanTracker::new(store);
    if let (Some(id), Some(kind)) = (agent_id, agent_type) {
        tracker = tracker.with_agent(id, kind);
    }
    install(tracker).await
}

#[cfg(test)]
mod tests {
    // The global tracker is process-wide state, so every case below runs
    // sequentially inside one test to avoid cross-test races.
    use super::*;

    #[tokio::test]
    async fn global_tracker_lifecycle() {
        teardown().await;

        let result = with_tracker(|t| Ok(t.active_span_count())).await;
        assert!(matches!(result, Err(Error::NotInitialized(_))));

        init_in_memory(Some("agent-1".to_string()), Some("worker".to_string())).await.unwrap();
        let count = with_tracker(|t| Ok(t.active_span_count())).await.unwrap();
        assert_eq!(count, 0);

        let err = init_in_memory(None, None).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        teardown().await;
        assert!(!is_initialized().await);
    }
}
