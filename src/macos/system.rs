//! Carbon binding service and event-handler installation

use std::ffi::c_void;
use std::mem;
use std::ptr;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::carbon::{
    EventHandlerCallRef, EventHandlerRef, EventHotKeyID, EventHotKeyRef, EventRef, EventTypeSpec,
    GetApplicationEventTarget, GetEventKind, GetEventParameter, InstallEventHandler,
    RegisterEventHotKey, RemoveEventHandler, UnregisterEventHotKey, CMD_KEY, CONTROL_KEY,
    EVENT_CLASS_KEYBOARD, EVENT_HOTKEY_PRESSED, EVENT_HOTKEY_RELEASED, EVENT_NOT_HANDLED_ERR,
    EVENT_PARAM_DIRECT_OBJECT, NO_ERR, OPTION_KEY, SHIFT_KEY, SIGNATURE, TYPE_EVENT_HOTKEY_ID,
};
use super::BackendError;
use crate::center::{HotKeyCenter, KeyEvent, KeyEventKind};
use crate::combo::{KeyCombo, Modifiers};
use crate::hotkey::InvokeResult;
use crate::system::{HotkeySystem, OsHandle, OsStatus};

/// `paramErr`: the combo cannot be expressed to the OS.
const PARAM_ERR: i32 = -50;

fn carbon_modifier_bits(modifiers: Modifiers) -> u32 {
    let mut bits = 0;
    if modifiers.command {
        bits |= CMD_KEY;
    }
    if modifiers.shift {
        bits |= SHIFT_KEY;
    }
    if modifiers.option {
        bits |= OPTION_KEY;
    }
    if modifiers.control {
        bits |= CONTROL_KEY;
    }
    bits
}

/// The Carbon hotkey binding service.
pub struct CarbonSystem;

impl CarbonSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CarbonSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl HotkeySystem for CarbonSystem {
    fn bind(&self, combo: &KeyCombo, sub_id: u32) -> Result<OsHandle, OsStatus> {
        let Some(key_code) = combo.key_code() else {
            // Key-less combos never reach the OS
            return Err(OsStatus(PARAM_ERR));
        };

        let hotkey_id = EventHotKeyID {
            signature: SIGNATURE,
            id: sub_id,
        };
        let mut handle: EventHotKeyRef = ptr::null_mut();
        let status = unsafe {
            RegisterEventHotKey(
                key_code,
                carbon_modifier_bits(combo.modifiers()),
                hotkey_id,
                GetApplicationEventTarget(),
                0,
                &mut handle,
            )
        };
        if status != NO_ERR {
            return Err(OsStatus(status));
        }
        if handle.is_null() {
            return Err(OsStatus(PARAM_ERR));
        }
        debug!(sub_id, key_code, "carbon hotkey bound");
        Ok(OsHandle::from_raw(handle as u64))
    }

    fn unbind(&self, handle: OsHandle) -> Result<(), OsStatus> {
        let status = unsafe { UnregisterEventHotKey(handle.raw() as EventHotKeyRef) };
        if status != NO_ERR {
            return Err(OsStatus(status));
        }
        Ok(())
    }
}

struct DispatchContext {
    center: Arc<HotKeyCenter>,
    runtime: Handle,
}

/// The two process-wide Carbon handlers, installed once and removed on drop.
pub struct CarbonEventHandlers {
    pressed: EventHandlerRef,
    released: EventHandlerRef,
    context: *mut DispatchContext,
}

// The handler refs are only touched from this struct's owner; Carbon calls
// back through the context pointer, which stays valid until drop removes
// both handlers.
unsafe impl Send for CarbonEventHandlers {}

impl CarbonEventHandlers {
    /// Install the pressed and released handlers, routing into `center` on
    /// the given runtime.
    pub fn install(center: Arc<HotKeyCenter>, runtime: Handle) -> Result<Self, BackendError> {
        let context = Box::into_raw(Box::new(DispatchContext { center, runtime }));

        let pressed = match unsafe { install_one(EVENT_HOTKEY_PRESSED, context) } {
            Ok(handler) => handler,
            Err(e) => {
                drop(unsafe { Box::from_raw(context) });
                return Err(e);
            }
        };
        let released = match unsafe { install_one(EVENT_HOTKEY_RELEASED, context) } {
            Ok(handler) => handler,
            Err(e) => {
                unsafe {
                    RemoveEventHandler(pressed);
                    drop(Box::from_raw(context));
                }
                return Err(e);
            }
        };

        debug!("carbon event handlers installed");
        Ok(Self {
            pressed,
            released,
            context,
        })
    }
}

impl Drop for CarbonEventHandlers {
    fn drop(&mut self) {
        unsafe {
            RemoveEventHandler(self.pressed);
            RemoveEventHandler(self.released);
            drop(Box::from_raw(self.context));
        }
    }
}

unsafe fn install_one(
    event_kind: u32,
    context: *mut DispatchContext,
) -> Result<EventHandlerRef, BackendError> {
    let type_spec = EventTypeSpec {
        event_class: EVENT_CLASS_KEYBOARD,
        event_kind,
    };
    let mut handler: EventHandlerRef = ptr::null_mut();
    let status = InstallEventHandler(
        GetApplicationEventTarget(),
        hotkey_event_handler,
        1,
        &type_spec,
        context as *mut c_void,
        &mut handler,
    );
    if status != NO_ERR {
        warn!(event_kind, status, "InstallEventHandler failed");
        return Err(BackendError::HandlerInstall(status));
    }
    Ok(handler)
}

/// Carbon entry point. Must not panic; runs on the main event target.
extern "C" fn hotkey_event_handler(
    _call_ref: EventHandlerCallRef,
    event: EventRef,
    user_data: *mut c_void,
) -> i32 {
    let context = unsafe { &*(user_data as *const DispatchContext) };

    let raw_kind = unsafe { GetEventKind(event) };
    let kind = match raw_kind {
        EVENT_HOTKEY_PRESSED => KeyEventKind::Pressed,
        EVENT_HOTKEY_RELEASED => KeyEventKind::Released,
        other => KeyEventKind::Unknown(other),
    };

    let mut hotkey_id = EventHotKeyID { signature: 0, id: 0 };
    let status = unsafe {
        GetEventParameter(
            event,
            EVENT_PARAM_DIRECT_OBJECT,
            TYPE_EVENT_HOTKEY_ID,
            ptr::null_mut(),
            mem::size_of::<EventHotKeyID>() as u32,
            ptr::null_mut(),
            &mut hotkey_id as *mut EventHotKeyID as *mut c_void,
        )
    };

    let key_event = if status != NO_ERR {
        KeyEvent::malformed(kind, OsStatus(status))
    } else if hotkey_id.signature != SIGNATURE {
        // Not one of ours; leave it to the next handler
        return EVENT_NOT_HANDLED_ERR;
    } else {
        KeyEvent {
            kind,
            sub_id: Ok(hotkey_id.id),
        }
    };

    // Enter the runtime so main-queue actions are handed off instead of
    // running inline on the event target.
    let _guard = context.runtime.enter();
    match context.center.handle_event(&key_event) {
        Ok(InvokeResult::Handled) => NO_ERR,
        Ok(InvokeResult::NotHandled) => EVENT_NOT_HANDLED_ERR,
        Err(status) => status.0,
    }
}
