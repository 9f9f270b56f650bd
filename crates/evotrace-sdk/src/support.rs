//! Bridges the `evotrace-runtime` global tracker (whose `with_tracker`
//! closures are pinned to `evotrace_engine::Result`) with the
//! `evotrace-learning` operations the rest of this crate wraps, which
//! return their own `evotrace_learning::Result`. The closure never itself
//! fails at the engine layer — it nests the learning-layer result inside
//! the engine-layer `Ok`, then both layers are unwrapped on the way out.

use evotrace_engine::SpanTracker;
use evotrace_store::Store;

use crate::error::Result;

pub(crate) async fn run_store<T, F>(f: F) -> Result<T>
where
    F: FnOnce(&Store) -> evotrace_learning::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let outcome: evotrace_learning::Result<T> = evotrace_runtime::with_tracker(move |tracker| Ok(f(tracker.store()))).await?;
    Ok(outcome?)
}

pub(crate) async fn run_tracker<T, F>(f: F) -> Result<T>
where
    F: FnOnce(&mut SpanTracker) -> evotrace_learning::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let outcome: evotrace_learning::Result<T> = evotrace_runtime::with_tracker(move |tracker| Ok(f(tracker))).await?;
    Ok(outcome?)
}
