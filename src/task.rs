//! Fire-and-forget work on the ambient runtime.

use std::future::Future;

use tokio::runtime::Handle;
use tracing::warn;

/// Spawn `work` onto the current tokio runtime without awaiting it.
///
/// Returns `false` (and logs) when called outside a runtime; the work is
/// dropped rather than run inline or panicking.
pub fn spawn_best_effort<F>(label: &'static str, work: F) -> bool
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(work);
            true
        }
        Err(_) => {
            warn!(task = label, "no async runtime, dropping background write");
            false
        }
    }
}
