//! The registered-shortcut value object
//!
//! A `HotKey` couples an identifier and a [`KeyCombo`] with the action to
//! run when the combo fires. The OS handle pair is attached by the registry
//! on registration and cleared on unregistration; its presence is the sole
//! source of truth for "currently bound to the OS".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::combo::KeyCombo;
use crate::system::OsHandle;

/// Where a hotkey's action body runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionQueue {
    /// Hand off to the async runtime; `invoke` returns before the body runs
    Main,
    /// Run synchronously on the thread delivering the event
    Caller,
}

/// Outcome of one invocation, reported back to the OS dispatch chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeResult {
    /// The event was consumed
    Handled,
    /// The event should be forwarded to the next handler in the chain
    NotHandled,
}

/// Receiver for the indirect-call action variant.
///
/// The hotkey holds the target weakly; a target that has been dropped makes
/// invocation a no-op rather than an error.
pub trait HotKeyHandler: Send + Sync {
    fn hotkey_fired(&self, hotkey: &HotKey);
}

/// Exactly one action shape per hotkey, fixed at construction.
enum Action {
    Callback(Arc<dyn Fn(&HotKey) + Send + Sync>),
    Target(Weak<dyn HotKeyHandler>),
}

/// The OS sub-identifier / handle pair for a live registration.
///
/// Kept as one value so the pair is either entirely present or entirely
/// absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OsBinding {
    pub sub_id: u32,
    pub handle: OsHandle,
}

/// A process-wide shortcut: identity, combo, action, and registration state.
pub struct HotKey {
    identifier: String,
    combo: KeyCombo,
    action: Action,
    queue: ActionQueue,
    detect_key_hold: bool,
    forward_next_event: AtomicBool,
    binding: Mutex<Option<OsBinding>>,
}

impl HotKey {
    /// A hotkey whose action is a closure.
    pub fn new(
        identifier: impl Into<String>,
        combo: KeyCombo,
        queue: ActionQueue,
        action: impl Fn(&HotKey) + Send + Sync + 'static,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            combo,
            action: Action::Callback(Arc::new(action)),
            queue,
            detect_key_hold: false,
            forward_next_event: AtomicBool::new(false),
            binding: Mutex::new(None),
        }
    }

    /// A hotkey that calls back into a weakly-held target.
    pub fn with_target<T: HotKeyHandler + 'static>(
        identifier: impl Into<String>,
        combo: KeyCombo,
        queue: ActionQueue,
        target: &Arc<T>,
    ) -> Self {
        let target: Arc<dyn HotKeyHandler> = target.clone();
        let weak: Weak<dyn HotKeyHandler> = Arc::downgrade(&target);
        Self {
            identifier: identifier.into(),
            combo,
            action: Action::Target(weak),
            queue,
            detect_key_hold: false,
            forward_next_event: AtomicBool::new(false),
            binding: Mutex::new(None),
        }
    }

    /// Opt in to auto-repeat while the key is held.
    pub fn with_key_hold(mut self, detect: bool) -> Self {
        self.detect_key_hold = detect;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn key_combo(&self) -> KeyCombo {
        self.combo
    }

    pub fn detects_key_hold(&self) -> bool {
        self.detect_key_hold
    }

    pub fn is_registered(&self) -> bool {
        self.binding.lock().is_some()
    }

    /// Arrange for the *next* invocation to report `NotHandled` after firing,
    /// so the OS also delivers the key event to the next handler in the
    /// chain. The flag resets as soon as it is consumed.
    pub fn set_forward_next_event(&self, forward: bool) {
        self.forward_next_event.store(forward, Ordering::Release);
    }

    pub fn forwards_next_event(&self) -> bool {
        self.forward_next_event.load(Ordering::Acquire)
    }

    pub(crate) fn sub_id(&self) -> Option<u32> {
        (*self.binding.lock()).map(|b| b.sub_id)
    }

    pub(crate) fn set_binding(&self, binding: OsBinding) {
        *self.binding.lock() = Some(binding);
    }

    pub(crate) fn take_binding(&self) -> Option<OsBinding> {
        self.binding.lock().take()
    }

    /// Run the action once.
    ///
    /// A dead indirect target makes this a no-op returning `NotHandled`
    /// without consuming the forward flag. Otherwise the action is delivered
    /// according to the queue (main-queue delivery is asynchronous), and a
    /// set forward flag is consumed, turning the result into `NotHandled`
    /// exactly once.
    pub fn invoke(self: &Arc<Self>) -> InvokeResult {
        if let Action::Target(weak) = &self.action {
            if weak.upgrade().is_none() {
                debug!(identifier = %self.identifier, "target gone, event not handled");
                return InvokeResult::NotHandled;
            }
        }

        match self.queue {
            ActionQueue::Caller => self.fire(),
            ActionQueue::Main => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let hotkey = Arc::clone(self);
                    runtime.spawn(async move { hotkey.fire() });
                }
                Err(_) => {
                    // No runtime to marshal onto; deliver on this thread.
                    debug!(identifier = %self.identifier, "no runtime, delivering synchronously");
                    self.fire();
                }
            },
        }

        if self.forward_next_event.swap(false, Ordering::AcqRel) {
            InvokeResult::NotHandled
        } else {
            InvokeResult::Handled
        }
    }

    fn fire(&self) {
        match &self.action {
            Action::Callback(action) => action(self),
            Action::Target(weak) => {
                if let Some(target) = weak.upgrade() {
                    target.hotkey_fired(self);
                } else {
                    debug!(identifier = %self.identifier, "target dropped before delivery");
                }
            }
        }
    }
}

impl PartialEq for HotKey {
    /// Structural over identifier, combo, and the OS handle pair, letting
    /// the registry tell "this exact registration already exists" apart from
    /// "this identifier is reused".
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.identifier == other.identifier
            && self.combo == other.combo
            && *self.binding.lock() == *other.binding.lock()
    }
}

impl Eq for HotKey {}

impl std::fmt::Debug for HotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotKey")
            .field("identifier", &self.identifier)
            .field("combo", &self.combo)
            .field("queue", &self.queue)
            .field("detect_key_hold", &self.detect_key_hold)
            .field("binding", &*self.binding.lock())
            .finish()
    }
}
