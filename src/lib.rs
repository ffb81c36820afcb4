//! hotkey-center: process-wide hotkey registration and dispatch
//!
//! This crate provides:
//! - A thread-safe registry mapping shortcut identifiers to OS bindings
//! - Pressed/released event dispatch with pause/resume
//! - Key-hold auto-repeat driven by an explicit timer state machine
//! - Double-tap-modifier shortcuts routed off a raw flags monitor
//!
//! The platform is reached through the [`HotkeySystem`] trait; a Carbon
//! backend ships in [`macos`] on that target. Embedders create one
//! [`HotKeyCenter`] at their composition root, wire a backend to it, and
//! register [`HotKey`]s against it:
//!
//! ```
//! use std::sync::Arc;
//! use hotkey_center::{ActionQueue, HotKey, HotKeyCenter, KeyCombo, Modifiers};
//! # use hotkey_center::{HotkeySystem, OsHandle, OsStatus};
//! # struct NoopSystem;
//! # impl HotkeySystem for NoopSystem {
//! #     fn bind(&self, _: &KeyCombo, _: u32) -> Result<OsHandle, OsStatus> {
//! #         Ok(OsHandle::from_raw(1))
//! #     }
//! #     fn unbind(&self, _: OsHandle) -> Result<(), OsStatus> {
//! #         Ok(())
//! #     }
//! # }
//!
//! let center = HotKeyCenter::new(Arc::new(NoopSystem));
//! let hotkey = Arc::new(HotKey::new(
//!     "toggle-overlay",
//!     KeyCombo::new(0, Modifiers::command()),
//!     ActionQueue::Main,
//!     |hk| println!("{} fired", hk.identifier()),
//! ));
//! assert!(center.register(&hotkey));
//! ```

mod center;
mod combo;
mod config;
mod hotkey;
mod lifecycle;
mod modifier;
mod system;

#[cfg(target_os = "macos")]
pub mod macos;

pub use center::{HotKeyCenter, KeyEvent, KeyEventKind};
pub use combo::{KeyCombo, Modifiers};
pub use config::{RepeatPreferences, RepeatTiming};
pub use hotkey::{ActionQueue, HotKey, HotKeyHandler, InvokeResult};
#[cfg(unix)]
pub use lifecycle::ShutdownSignal;
pub use modifier::{route_double_taps, DoubleTapDetector};
pub use system::{HotkeySystem, OsHandle, OsStatus};
