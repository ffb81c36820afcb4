//! Hotkey registry and dispatch engine
//!
//! `HotKeyCenter` owns the identifier table, allocates the OS
//! sub-identifiers, talks to the platform binding service, routes
//! pressed/released events to the matching hotkey, and drives the key-hold
//! repeat timers. One instance serves the whole process; embedders create
//! it at their composition root and hand out clones of the `Arc`.

mod dispatch;
mod lock;
mod repeat;

pub use dispatch::{KeyEvent, KeyEventKind};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::combo::Modifiers;
use crate::config::{RepeatPreferences, RepeatTiming};
use crate::hotkey::{HotKey, OsBinding};
use crate::system::HotkeySystem;
use lock::TimedLock;
use repeat::RepeatSlot;

/// The process-wide hotkey registry.
pub struct HotKeyCenter {
    registry: TimedLock<Registry>,
    system: Arc<dyn HotkeySystem>,
    /// While set, pressed events are dropped at dispatch entry.
    paused: AtomicBool,
    /// Global switch for the key-hold repeat machinery.
    hold_detection: AtomicBool,
    /// Repeat-timing constants; snapshotted when a timer is armed.
    timing: Mutex<RepeatTiming>,
}

/// Everything behind the registry lock.
struct Registry {
    hotkeys: HashMap<String, Arc<HotKey>>,
    /// Next OS sub-identifier. Monotonic, never reused, so in-flight events
    /// can never alias a later registration.
    counter: u32,
    repeat: RepeatSlot,
}

impl HotKeyCenter {
    pub fn new(system: Arc<dyn HotkeySystem>) -> Arc<Self> {
        Arc::new(Self {
            registry: TimedLock::new(Registry {
                hotkeys: HashMap::new(),
                counter: 0,
                repeat: RepeatSlot::new(),
            }),
            system,
            paused: AtomicBool::new(false),
            hold_detection: AtomicBool::new(true),
            timing: Mutex::new(RepeatTiming::derive(&RepeatPreferences::default())),
        })
    }

    /// Register a hotkey.
    ///
    /// Returns `false` without touching the OS when the identifier is taken
    /// or an equal hotkey is already registered. Modifier-only double-tap
    /// combos are never sent to the OS; they are served by the
    /// modifier-event path alone. Otherwise the combo is bound under the
    /// next sub-identifier, and the handle pair is attached to the hotkey
    /// only once the OS confirms.
    pub fn register(&self, hotkey: &Arc<HotKey>) -> bool {
        let identifier = hotkey.identifier().to_string();

        self.registry.with(|reg| {
            if reg.hotkeys.contains_key(&identifier)
                || reg.hotkeys.values().any(|existing| **existing == **hotkey)
            {
                debug!(identifier = %identifier, "duplicate registration rejected");
                return false;
            }

            if hotkey.key_combo().doubled_modifiers() {
                reg.hotkeys.insert(identifier.clone(), Arc::clone(hotkey));
                info!(
                    identifier = %identifier,
                    combo = %hotkey.key_combo(),
                    "double-tap hotkey registered"
                );
                return true;
            }

            // Insert before the OS call so a racing registration of the
            // same identifier fails fast instead of waiting on the OS.
            reg.hotkeys.insert(identifier.clone(), Arc::clone(hotkey));
            let sub_id = reg.counter;

            match self.system.bind(&hotkey.key_combo(), sub_id) {
                Ok(handle) => {
                    hotkey.set_binding(OsBinding { sub_id, handle });
                    reg.counter += 1;
                    info!(
                        identifier = %identifier,
                        combo = %hotkey.key_combo(),
                        sub_id,
                        "hotkey registered"
                    );
                    true
                }
                Err(status) => {
                    // A handle left over from an earlier registration is
                    // released before reporting the failure.
                    if let Some(stale) = hotkey.take_binding() {
                        if let Err(unbind_status) = self.system.unbind(stale.handle) {
                            warn!(
                                identifier = %identifier,
                                status = %unbind_status,
                                "failed to release stale binding"
                            );
                        }
                    }
                    reg.hotkeys.remove(&identifier);
                    warn!(
                        identifier = %identifier,
                        combo = %hotkey.key_combo(),
                        status = %status,
                        "platform refused to bind combo"
                    );
                    false
                }
            }
        })
    }

    /// Unregister a hotkey. No-op when it carries no OS handle.
    pub fn unregister(&self, hotkey: &HotKey) {
        let Some(binding) = hotkey.take_binding() else {
            return;
        };

        if let Err(status) = self.system.unbind(binding.handle) {
            warn!(
                identifier = %hotkey.identifier(),
                status = %status,
                "platform failed to unbind hotkey"
            );
        }
        self.registry.with(|reg| {
            reg.hotkeys.remove(hotkey.identifier());
        });
        info!(
            identifier = %hotkey.identifier(),
            sub_id = binding.sub_id,
            "hotkey unregistered"
        );
    }

    /// Unregister by identifier. Returns `false` when nothing with that
    /// identifier is registered.
    pub fn unregister_by_identifier(&self, identifier: &str) -> bool {
        let found = self
            .registry
            .with(|reg| reg.hotkeys.get(identifier).cloned());
        match found {
            Some(hotkey) => {
                self.unregister(&hotkey);
                true
            }
            None => false,
        }
    }

    /// Unregister every currently-registered hotkey.
    pub fn unregister_all(&self) {
        let all: Vec<Arc<HotKey>> = self.registry.with(|reg| reg.hotkeys.values().cloned().collect());
        info!(count = all.len(), "unregistering all hotkeys");
        for hotkey in all {
            self.unregister(&hotkey);
        }
    }

    /// Invoke every registered double-tap hotkey matching the reported
    /// modifier set. Match order is table-iteration order; callers must not
    /// rely on ordering among matches.
    pub fn modifier_double_tapped(&self, modifiers: Modifiers) {
        let matches: Vec<Arc<HotKey>> = self.registry.with(|reg| {
            reg.hotkeys
                .values()
                .filter(|hk| {
                    hk.key_combo().doubled_modifiers() && hk.key_combo().modifiers() == modifiers
                })
                .cloned()
                .collect()
        });

        debug!(modifiers = %modifiers, count = matches.len(), "modifier double tap");
        for hotkey in matches {
            hotkey.invoke();
        }
    }

    /// Swap the repeat-timing constants. Timers already armed keep the
    /// values they were armed with.
    pub fn set_repeat_preferences(&self, preferences: &RepeatPreferences) {
        let timing = RepeatTiming::derive(preferences);
        info!(
            initial_ms = timing.initial_interval.as_millis() as u64,
            repeat_ms = timing.repeat_interval.as_millis() as u64,
            "repeat timing updated"
        );
        *self.timing.lock() = timing;
    }

    /// Master switch for key-hold repetition.
    pub fn set_hold_detection_enabled(&self, enabled: bool) {
        self.hold_detection.store(enabled, Ordering::Release);
    }

    /// Flush timers and unbind everything. Called by the embedder when the
    /// process is asked to terminate; timers are cancelled first so no
    /// repeat tick runs against a half-torn-down registry.
    pub fn shutdown(&self) {
        info!("hotkey center shutting down");
        self.cancel_repeat();
        self.unregister_all();
    }

    /// Look up the hotkey bound under an OS sub-identifier.
    fn hotkey_for_sub_id(&self, sub_id: u32) -> Option<Arc<HotKey>> {
        self.registry.with(|reg| {
            reg.hotkeys
                .values()
                .find(|hk| hk.sub_id() == Some(sub_id))
                .cloned()
        })
    }

    #[cfg(test)]
    fn registered_count(&self) -> usize {
        self.registry.with(|reg| reg.hotkeys.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::combo::KeyCombo;
    use crate::hotkey::ActionQueue;
    use crate::system::testing::{RecordingSystem, HOTKEY_EXISTS};
    use crate::system::{OsHandle, OsStatus};

    fn noop_hotkey(identifier: &str, combo: KeyCombo) -> Arc<HotKey> {
        Arc::new(HotKey::new(identifier, combo, ActionQueue::Caller, |_| {}))
    }

    fn counting_hotkey(
        identifier: &str,
        combo: KeyCombo,
        counter: &Arc<AtomicUsize>,
    ) -> Arc<HotKey> {
        let counter = Arc::clone(counter);
        Arc::new(HotKey::new(identifier, combo, ActionQueue::Caller, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_register_assigns_binding() {
        let system = Arc::new(RecordingSystem::new());
        let center = HotKeyCenter::new(system);
        let hotkey = noop_hotkey("toggle", KeyCombo::new(0, Modifiers::command()));

        assert!(center.register(&hotkey));
        assert!(hotkey.is_registered());
        assert_eq!(center.registered_count(), 1);
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let system = Arc::new(RecordingSystem::new());
        let center = HotKeyCenter::new(Arc::clone(&system) as Arc<dyn HotkeySystem>);

        let first = noop_hotkey("toggle", KeyCombo::new(0, Modifiers::command()));
        let second = noop_hotkey("toggle", KeyCombo::new(7, Modifiers::control()));

        assert!(center.register(&first));
        assert!(!center.register(&second));

        // The table retains only the first; no OS call was made for the second
        assert_eq!(center.registered_count(), 1);
        assert!(!second.is_registered());
        assert_eq!(system.bind_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reregistration_gets_fresh_sub_id() {
        let system = Arc::new(RecordingSystem::new());
        let center = HotKeyCenter::new(system);
        let hotkey = noop_hotkey("toggle", KeyCombo::new(0, Modifiers::command()));

        assert!(center.register(&hotkey));
        let first_id = hotkey.sub_id().unwrap();
        center.unregister(&hotkey);
        assert!(!hotkey.is_registered());

        assert!(center.register(&hotkey));
        let second_id = hotkey.sub_id().unwrap();
        assert_ne!(first_id, second_id);
    }

    #[test]
    fn test_double_tap_combo_skips_os() {
        let system = Arc::new(RecordingSystem::new());
        let center = HotKeyCenter::new(Arc::clone(&system) as Arc<dyn HotkeySystem>);
        let hotkey = noop_hotkey("cmd-twice", KeyCombo::double_tap(Modifiers::command()));

        assert!(center.register(&hotkey));
        assert!(!hotkey.is_registered());
        assert_eq!(system.bind_count.load(Ordering::SeqCst), 0);
        assert_eq!(center.registered_count(), 1);
    }

    #[test]
    fn test_bind_failure_reports_false_and_cleans_up() {
        let system = Arc::new(RecordingSystem::new());
        let center = HotKeyCenter::new(Arc::clone(&system) as Arc<dyn HotkeySystem>);
        let hotkey = noop_hotkey("toggle", KeyCombo::new(0, Modifiers::command()));

        *system.fail_next_bind.lock() = Some(OsStatus(-9868));
        assert!(!center.register(&hotkey));
        assert!(!hotkey.is_registered());
        assert_eq!(center.registered_count(), 0);
    }

    #[test]
    fn test_bind_failure_releases_stale_handle() {
        let system = Arc::new(RecordingSystem::new());
        let center = HotKeyCenter::new(Arc::clone(&system) as Arc<dyn HotkeySystem>);
        let hotkey = noop_hotkey("toggle", KeyCombo::new(0, Modifiers::command()));

        // Simulate a handle surviving from an earlier registration
        hotkey.set_binding(OsBinding {
            sub_id: 99,
            handle: OsHandle::from_raw(0xbeef),
        });
        *system.fail_next_bind.lock() = Some(OsStatus(-9868));

        assert!(!center.register(&hotkey));
        assert!(!hotkey.is_registered());
        assert_eq!(system.unbind_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_distinct_identifiers_same_combo() {
        let system = Arc::new(RecordingSystem::new());
        let center = HotKeyCenter::new(Arc::clone(&system) as Arc<dyn HotkeySystem>);
        let combo = KeyCombo::new(0, Modifiers::command());

        let mut handles = Vec::new();
        for i in 0..4 {
            let center = Arc::clone(&center);
            let hotkey = noop_hotkey(&format!("contender-{i}"), combo);
            handles.push(std::thread::spawn(move || center.register(&hotkey)));
        }

        let outcomes: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        // Exactly one contender binds the combo; the platform rejects the rest
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(system.bound_len(), 1);
    }

    #[test]
    fn test_unregister_by_identifier() {
        let system = Arc::new(RecordingSystem::new());
        let center = HotKeyCenter::new(system);
        let hotkey = noop_hotkey("toggle", KeyCombo::new(0, Modifiers::command()));

        assert!(center.register(&hotkey));
        assert!(center.unregister_by_identifier("toggle"));
        assert!(!center.unregister_by_identifier("toggle"));
        assert_eq!(center.registered_count(), 0);
    }

    #[test]
    fn test_unregister_all_then_invoke_is_harmless() {
        let system = Arc::new(RecordingSystem::new());
        let center = HotKeyCenter::new(Arc::clone(&system) as Arc<dyn HotkeySystem>);
        let counter = Arc::new(AtomicUsize::new(0));
        let hotkey = counting_hotkey("toggle", KeyCombo::new(0, Modifiers::command()), &counter);

        assert!(center.register(&hotkey));
        center.unregister_all();
        assert_eq!(center.registered_count(), 0);

        let unbinds = system.unbind_count.load(Ordering::SeqCst);
        // Invocation still works locally and performs no OS interaction
        hotkey.invoke();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!hotkey.is_registered());
        assert_eq!(system.unbind_count.load(Ordering::SeqCst), unbinds);
    }

    #[test]
    fn test_double_tap_dispatch_invokes_matching_only() {
        let system = Arc::new(RecordingSystem::new());
        let center = HotKeyCenter::new(system);

        let cmd_hits = Arc::new(AtomicUsize::new(0));
        let ctrl_hits = Arc::new(AtomicUsize::new(0));
        let chord_hits = Arc::new(AtomicUsize::new(0));

        let cmd_a = counting_hotkey(
            "cmd-a",
            KeyCombo::double_tap(Modifiers::command()),
            &cmd_hits,
        );
        let cmd_b = counting_hotkey(
            "cmd-b",
            KeyCombo::double_tap(Modifiers::command()),
            &cmd_hits,
        );
        let ctrl = counting_hotkey(
            "ctrl",
            KeyCombo::double_tap(Modifiers::control()),
            &ctrl_hits,
        );
        let chord = counting_hotkey(
            "chord",
            KeyCombo::new(0, Modifiers::command()),
            &chord_hits,
        );

        for hk in [&cmd_a, &cmd_b, &ctrl, &chord] {
            assert!(center.register(hk));
        }

        center.modifier_double_tapped(Modifiers::command());
        assert_eq!(cmd_hits.load(Ordering::SeqCst), 2);
        assert_eq!(ctrl_hits.load(Ordering::SeqCst), 0);
        assert_eq!(chord_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_concurrent_duplicate_combo_error_is_platform_rejection() {
        let system = Arc::new(RecordingSystem::new());
        let center = HotKeyCenter::new(Arc::clone(&system) as Arc<dyn HotkeySystem>);
        let combo = KeyCombo::new(0, Modifiers::command());

        assert!(center.register(&noop_hotkey("first", combo)));
        assert_eq!(system.bind(&combo, 42), Err(HOTKEY_EXISTS));
    }
}
