//! Pressed/released event dispatch
//!
//! Platform backends feed [`KeyEvent`]s to the center, either directly via
//! [`HotKeyCenter::handle_event`] (synchronous, so the handled/not-handled
//! outcome can go back to the OS dispatch chain) or through a channel
//! drained by [`HotKeyCenter::run`].

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::HotKeyCenter;
use crate::hotkey::InvokeResult;
use crate::system::OsStatus;

/// What the OS reported the event to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    /// A registered combo was pressed
    Pressed,
    /// A registered combo's key was released
    Released,
    /// An event kind this engine does not know; indicates version skew in
    /// the backend
    Unknown(u32),
}

/// One OS-level hotkey notification.
///
/// The backend extracts the sub-identifier parameter from the raw event;
/// when extraction fails, the platform status code travels here instead so
/// the dispatcher can hand it back to the OS chain.
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub sub_id: Result<u32, OsStatus>,
}

impl KeyEvent {
    pub fn pressed(sub_id: u32) -> Self {
        Self {
            kind: KeyEventKind::Pressed,
            sub_id: Ok(sub_id),
        }
    }

    pub fn released(sub_id: u32) -> Self {
        Self {
            kind: KeyEventKind::Released,
            sub_id: Ok(sub_id),
        }
    }

    pub fn malformed(kind: KeyEventKind, status: OsStatus) -> Self {
        Self {
            kind,
            sub_id: Err(status),
        }
    }
}

impl HotKeyCenter {
    /// Suspend delivery of pressed events without unregistering anything.
    /// Idempotent. Released events keep flowing so held keys still stop
    /// repeating.
    pub fn pause_event_handler(&self) {
        if !self.paused.swap(true, Ordering::AcqRel) {
            info!("hotkey delivery paused");
        }
    }

    /// Resume delivery of pressed events. Idempotent.
    pub fn resume_event_handler(&self) {
        if self.paused.swap(false, Ordering::AcqRel) {
            info!("hotkey delivery resumed");
        }
    }

    /// Dispatch one OS notification.
    ///
    /// Returns the invocation outcome for the OS chain, or the platform
    /// status code when the event was missing its sub-identifier parameter.
    pub fn handle_event(self: &Arc<Self>, event: &KeyEvent) -> Result<InvokeResult, OsStatus> {
        match event.kind {
            KeyEventKind::Unknown(kind) => {
                debug_assert!(false, "unknown hotkey event kind {kind}");
                warn!(kind, "ignoring unknown hotkey event kind");
                Ok(InvokeResult::NotHandled)
            }
            KeyEventKind::Pressed => {
                if self.paused.load(Ordering::Acquire) {
                    debug!("pressed event dropped while paused");
                    return Ok(InvokeResult::NotHandled);
                }

                let sub_id = event.sub_id?;
                let Some(hotkey) = self.hotkey_for_sub_id(sub_id) else {
                    debug!(sub_id, "pressed event for unknown sub-identifier");
                    return Ok(InvokeResult::NotHandled);
                };

                debug!(identifier = %hotkey.identifier(), sub_id, "hotkey pressed");
                // Invoked outside the registry lock: the action may well
                // re-enter register/unregister.
                let result = hotkey.invoke();

                if hotkey.detects_key_hold() && self.hold_detection.load(Ordering::Acquire) {
                    self.arm_repeat(sub_id);
                }
                Ok(result)
            }
            KeyEventKind::Released => {
                // A release always stops repetition, whichever key it was;
                // only one repeat cycle is ever active.
                self.cancel_repeat();
                Ok(InvokeResult::Handled)
            }
        }
    }

    /// Drain a backend's event stream until it closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<KeyEvent>) {
        info!("hotkey dispatch loop started");
        while let Some(event) = events.recv().await {
            if let Err(status) = self.handle_event(&event) {
                warn!(status = %status, "event parameter extraction failed");
            }
        }
        info!("hotkey dispatch loop stopped");
    }
}
