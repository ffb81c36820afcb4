//! Modifier-flag monitor using a CGEventTap
//!
//! Feeds the double-tap detector with system-wide modifier-set changes.
//! Runs on a dedicated thread with its own CFRunLoop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventType,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::BackendError;
use crate::combo::Modifiers;

fn modifiers_from_flags(flags: CGEventFlags) -> Modifiers {
    Modifiers {
        control: flags.contains(CGEventFlags::CGEventFlagControl),
        option: flags.contains(CGEventFlags::CGEventFlagAlternate),
        command: flags.contains(CGEventFlags::CGEventFlagCommand),
        shift: flags.contains(CGEventFlags::CGEventFlagShift),
    }
}

/// Watches system-wide modifier-flag changes and emits each distinct
/// modifier set once.
pub struct ModifierMonitor {
    flags_tx: mpsc::Sender<Modifiers>,
    running: Arc<AtomicBool>,
}

impl ModifierMonitor {
    pub fn new(flags_tx: mpsc::Sender<Modifiers>) -> Self {
        Self {
            flags_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the monitor thread. Runs until `stop()` or process exit.
    pub fn start(&self) -> Result<(), BackendError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BackendError::AlreadyRunning);
        }

        let flags_tx = self.flags_tx.clone();
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("modifier-monitor".to_string())
            .spawn(move || {
                info!("modifier monitor thread started");

                if let Err(e) = run_event_loop(flags_tx, running.clone()) {
                    error!(?e, "modifier monitor error");
                }

                running.store(false, Ordering::SeqCst);
                info!("modifier monitor thread stopped");
            })
            .map_err(|e| BackendError::ThreadSpawn(e.to_string()))?;

        Ok(())
    }

    /// Ask the monitor thread to wind down on its next loop iteration.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn run_event_loop(
    flags_tx: mpsc::Sender<Modifiers>,
    running: Arc<AtomicBool>,
) -> Result<(), BackendError> {
    let mut last_set = Modifiers::default();

    // Events cross from the tap callback to this loop over a std channel;
    // the callback must stay fast and non-blocking.
    let (callback_tx, callback_rx) = std::sync::mpsc::channel::<CGEventFlags>();

    let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
          -> Option<CGEvent> {
        match event_type {
            CGEventType::FlagsChanged => {
                let _ = callback_tx.send(event.get_flags());
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                warn!("event tap disabled, will re-enable");
            }
            _ => {}
        }
        Some(event.clone())
    };

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::FlagsChanged],
        callback,
    )
    .map_err(|_| {
        error!("failed to create event tap - is Accessibility permission granted?");
        BackendError::EventTapCreation
    })?;

    tap.enable();

    let run_loop_source = tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| BackendError::EventTapCreation)?;
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    info!("modifier event tap created and enabled");

    while running.load(Ordering::SeqCst) {
        unsafe {
            CFRunLoop::run_in_mode(
                kCFRunLoopDefaultMode,
                std::time::Duration::from_millis(100),
                true,
            );
        }

        while let Ok(flags) = callback_rx.try_recv() {
            let set = modifiers_from_flags(flags);
            if set != last_set {
                debug!(from = %last_set, to = %set, "modifier set changed");
                if flags_tx.blocking_send(set).is_err() {
                    warn!("modifier channel closed, stopping monitor");
                    return Ok(());
                }
                last_set = set;
            }
        }
    }

    Ok(())
}
