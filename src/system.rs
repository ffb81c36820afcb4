//! OS hotkey subsystem contract
//!
//! The registry talks to the platform through this trait: bind a combo to a
//! process-assigned sub-identifier, unbind a handle, and (backend-side)
//! deliver pressed/released events carrying the sub-identifier back through
//! a channel.

use crate::combo::KeyCombo;

/// Platform status code, `0` meaning success. Non-zero values are passed
/// through unchanged so the embedder can hand them back to the OS dispatch
/// chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsStatus(pub i32);

impl std::fmt::Display for OsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "os status {}", self.0)
    }
}

/// Opaque token for one OS-level hotkey binding. Wide enough to carry a
/// platform handle pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsHandle(u64);

impl OsHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The OS-level hotkey binding service.
///
/// Implementations are expected to be synchronous and fast; both methods are
/// called while the registry lock is held.
pub trait HotkeySystem: Send + Sync {
    /// Bind a combo to this process under the given sub-identifier.
    fn bind(&self, combo: &KeyCombo, sub_id: u32) -> Result<OsHandle, OsStatus>;

    /// Release a previously returned binding handle.
    fn unbind(&self, handle: OsHandle) -> Result<(), OsStatus>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory stand-in for the platform hotkey service.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    use parking_lot::Mutex;

    use super::{HotkeySystem, OsHandle, OsStatus};
    use crate::combo::KeyCombo;

    /// Platform rejection for a combo that is already bound system-wide.
    pub const HOTKEY_EXISTS: OsStatus = OsStatus(-9878);

    /// Records bind/unbind traffic and emulates the platform's rejection of
    /// a combo that some process (including this one) already holds.
    #[derive(Default)]
    pub struct RecordingSystem {
        next_handle: AtomicU64,
        bound: Mutex<HashMap<u64, KeyCombo>>,
        pub unbind_count: AtomicU64,
        pub bind_count: AtomicU64,
        pub fail_next_bind: Mutex<Option<OsStatus>>,
    }

    impl RecordingSystem {
        pub fn new() -> Self {
            Self {
                next_handle: AtomicU64::new(0x1000),
                ..Self::default()
            }
        }

        pub fn bound_len(&self) -> usize {
            self.bound.lock().len()
        }
    }

    impl HotkeySystem for RecordingSystem {
        fn bind(&self, combo: &KeyCombo, _sub_id: u32) -> Result<OsHandle, OsStatus> {
            self.bind_count.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.fail_next_bind.lock().take() {
                return Err(status);
            }
            let mut bound = self.bound.lock();
            if bound.values().any(|c| c == combo) {
                return Err(HOTKEY_EXISTS);
            }
            let raw = self.next_handle.fetch_add(1, Ordering::SeqCst);
            bound.insert(raw, *combo);
            Ok(OsHandle::from_raw(raw))
        }

        fn unbind(&self, handle: OsHandle) -> Result<(), OsStatus> {
            self.unbind_count.fetch_add(1, Ordering::SeqCst);
            self.bound.lock().remove(&handle.raw());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSystem;
    use super::*;
    use crate::combo::{KeyCombo, Modifiers};

    #[test]
    fn test_handle_roundtrip() {
        let handle = OsHandle::from_raw(0xdead_beef);
        assert_eq!(handle.raw(), 0xdead_beef);
    }

    #[test]
    fn test_recording_system_rejects_duplicate_combo() {
        let system = RecordingSystem::new();
        let combo = KeyCombo::new(4, Modifiers::command());
        let first = system.bind(&combo, 0);
        let second = system.bind(&combo, 1);
        assert!(first.is_ok());
        assert_eq!(second, Err(testing::HOTKEY_EXISTS));
    }
}
