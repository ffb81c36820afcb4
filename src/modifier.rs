//! Modifier double-tap detection
//!
//! Watches the stream of modifier-set changes coming off a raw flags
//! monitor and reports when the same non-empty set is pressed twice within
//! the debounce window. Single taps never report; a different set restarts
//! the window.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::center::HotKeyCenter;
use crate::combo::Modifiers;

/// Two taps further apart than this are unrelated.
const DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(300);

/// Debounces flag-change notifications into double-tap reports.
pub struct DoubleTapDetector {
    window: Duration,
    last: Option<(Modifiers, Instant)>,
}

impl Default for DoubleTapDetector {
    fn default() -> Self {
        Self::new(DOUBLE_TAP_WINDOW)
    }
}

impl DoubleTapDetector {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Feed one modifier-set change. Returns the set when this change
    /// completes a double tap.
    ///
    /// Empty sets (all modifiers released) pass through without resetting
    /// the window, since every tap is followed by a release.
    pub fn flags_changed(&mut self, modifiers: Modifiers) -> Option<Modifiers> {
        if modifiers.is_empty() {
            return None;
        }

        let now = Instant::now();
        match self.last.take() {
            Some((prev, at)) if prev == modifiers && now.duration_since(at) <= self.window => {
                debug!(modifiers = %modifiers, "modifier double tap detected");
                Some(modifiers)
            }
            _ => {
                self.last = Some((modifiers, now));
                None
            }
        }
    }
}

/// Drain a flags-change stream into the center's double-tap dispatch.
pub async fn route_double_taps(
    mut detector: DoubleTapDetector,
    mut flags: mpsc::Receiver<Modifiers>,
    center: Arc<HotKeyCenter>,
) {
    info!("double-tap routing started");
    while let Some(modifiers) = flags.recv().await {
        if let Some(set) = detector.flags_changed(modifiers) {
            center.modifier_double_tapped(set);
        }
    }
    info!("double-tap routing stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::combo::KeyCombo;
    use crate::hotkey::{ActionQueue, HotKey};
    use crate::system::testing::RecordingSystem;

    #[tokio::test(start_paused = true)]
    async fn test_two_taps_within_window_report() {
        let mut detector = DoubleTapDetector::default();

        assert_eq!(detector.flags_changed(Modifiers::command()), None);
        assert_eq!(detector.flags_changed(Modifiers::default()), None);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(
            detector.flags_changed(Modifiers::command()),
            Some(Modifiers::command())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_tap_is_silent() {
        let mut detector = DoubleTapDetector::default();

        assert_eq!(detector.flags_changed(Modifiers::command()), None);
        assert_eq!(detector.flags_changed(Modifiers::default()), None);
        tokio::time::advance(Duration::from_secs(5)).await;
        // Long after the window: this press starts a new tap, not a double
        assert_eq!(detector.flags_changed(Modifiers::command()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_set_restarts_window() {
        let mut detector = DoubleTapDetector::default();

        assert_eq!(detector.flags_changed(Modifiers::command()), None);
        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(detector.flags_changed(Modifiers::control()), None);
        tokio::time::advance(Duration::from_millis(50)).await;
        // Command again: the control press replaced the pending tap
        assert_eq!(detector.flags_changed(Modifiers::command()), None);
        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(
            detector.flags_changed(Modifiers::command()),
            Some(Modifiers::command())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_resets_for_next_pair() {
        let mut detector = DoubleTapDetector::default();

        assert_eq!(detector.flags_changed(Modifiers::option()), None);
        assert!(detector.flags_changed(Modifiers::option()).is_some());
        // The pair was consumed; a third tap starts over
        assert_eq!(detector.flags_changed(Modifiers::option()), None);
        assert!(detector.flags_changed(Modifiers::option()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_routing_invokes_matching_hotkeys_once_per_pair() {
        let center = HotKeyCenter::new(Arc::new(RecordingSystem::new()));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let hotkey = Arc::new(HotKey::new(
            "cmd-twice",
            KeyCombo::double_tap(Modifiers::command()),
            ActionQueue::Caller,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));
        assert!(center.register(&hotkey));

        let (tx, rx) = mpsc::channel(8);
        let pump = tokio::spawn(route_double_taps(
            DoubleTapDetector::default(),
            rx,
            Arc::clone(&center),
        ));

        for modifiers in [
            Modifiers::command(),
            Modifiers::default(),
            Modifiers::command(),
            Modifiers::default(),
        ] {
            tx.send(modifiers).await.unwrap();
        }
        drop(tx);
        pump.await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
