//! Key-hold repeat state machine
//!
//! Idle → ArmPending (initial-delay countdown) → Repeating (periodic
//! re-invocation) → Idle on release or when the hotkey disappears. The
//! process owns at most one arm task and one repeat timer; arming while a
//! cycle is live cancels it first, so the most recent press wins.
//!
//! Each tick re-resolves the hotkey by its OS sub-identifier instead of
//! holding a reference, so a hotkey unregistered mid-repeat simply stops
//! repeating rather than firing on a stale object.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::HotKeyCenter;

/// The single process-wide repeat slot, living behind the registry lock.
pub(super) struct RepeatSlot {
    /// One-shot task counting down the initial delay
    arm: Option<JoinHandle<()>>,
    /// Periodic timer task, present only in the Repeating state
    timer: Option<JoinHandle<()>>,
    /// Bumped on every cancel; fences an arm task that has already slept
    /// off its delay but lost the race against a release
    generation: u64,
}

impl RepeatSlot {
    pub fn new() -> Self {
        Self {
            arm: None,
            timer: None,
            generation: 0,
        }
    }

    /// Stop the cycle, whatever state it is in. Idempotent: aborting an
    /// already-finished or already-aborted task is a no-op.
    fn cancel(&mut self) {
        self.generation += 1;
        if let Some(arm) = self.arm.take() {
            arm.abort();
        }
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl HotKeyCenter {
    /// Idle → ArmPending: start the initial-delay countdown for the hotkey
    /// bound under `sub_id`, replacing any cycle already running.
    pub(super) fn arm_repeat(self: &Arc<Self>, sub_id: u32) {
        let timing = *self.timing.lock();
        let center = Arc::clone(self);

        self.registry.with(|reg| {
            reg.repeat.cancel();
            let generation = reg.repeat.generation;

            debug!(
                sub_id,
                delay_ms = timing.initial_interval.as_millis() as u64,
                "hold repeat armed"
            );
            reg.repeat.arm = Some(tokio::spawn(async move {
                tokio::time::sleep(timing.initial_interval).await;
                center.begin_repeating(sub_id, generation, timing.repeat_interval);
            }));
        });
    }

    /// ArmPending → Repeating, unless a cancel arrived while the arm task
    /// was sleeping or waiting on the lock.
    fn begin_repeating(self: &Arc<Self>, sub_id: u32, generation: u64, period: Duration) {
        let center = Arc::clone(self);

        self.registry.with(|reg| {
            if reg.repeat.generation != generation {
                debug!(sub_id, "arm superseded before repeat started");
                return;
            }
            reg.repeat.arm = None;

            debug!(
                sub_id,
                period_ms = period.as_millis() as u64,
                "hold repeat ticking"
            );
            reg.repeat.timer = Some(tokio::spawn(async move {
                let start = tokio::time::Instant::now() + period;
                let mut ticker = tokio::time::interval_at(start, period);
                loop {
                    ticker.tick().await;
                    match center.hotkey_for_sub_id(sub_id) {
                        Some(hotkey) => {
                            hotkey.invoke();
                        }
                        None => {
                            // Unregistered mid-repeat; back to Idle
                            debug!(sub_id, "hotkey gone, stopping repeat");
                            break;
                        }
                    }
                }
            }));
        });
    }

    /// Any → Idle.
    pub(super) fn cancel_repeat(&self) {
        self.registry.with(|reg| reg.repeat.cancel());
    }
}
