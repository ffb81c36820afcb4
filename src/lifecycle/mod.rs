//! Process-lifecycle integration
//!
//! Hotkey bindings are process-scoped OS resources; the registry flushes
//! its timers and unbinds everything when the process is asked to
//! terminate.

#[cfg(unix)]
mod shutdown;

#[cfg(unix)]
pub use shutdown::ShutdownSignal;

#[cfg(unix)]
use std::sync::Arc;

#[cfg(unix)]
use tracing::info;

#[cfg(unix)]
impl crate::center::HotKeyCenter {
    /// Spawn a task that waits for SIGTERM/SIGINT and shuts the registry
    /// down: timers first, then every binding.
    pub fn install_termination_hook(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let center = Arc::clone(self);
        tokio::spawn(async move {
            ShutdownSignal::new().wait().await;
            info!("termination requested, flushing hotkey registry");
            center.shutdown();
        })
    }
}
