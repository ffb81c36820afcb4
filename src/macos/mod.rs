//! macOS backend
//!
//! Binds combos through the Carbon Event Manager, receives the
//! pressed/released hotkey events it delivers, and watches modifier-flag
//! changes through a CGEventTap for the double-tap path.

mod carbon;
mod monitor;
mod system;

pub use monitor::ModifierMonitor;
pub use system::{CarbonEventHandlers, CarbonSystem};

/// Errors raised while wiring the backend up
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to install event handler: status {0}")]
    HandlerInstall(i32),

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn monitor thread: {0}")]
    ThreadSpawn(String),

    #[error("modifier monitor is already running")]
    AlreadyRunning,
}
