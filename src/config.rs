//! Repeat-rate preference loading and interval derivation

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One preference tick, matching the platform's key-repeat unit.
const TICK: f64 = 0.015;

/// Raw values below these floors are clamped before scaling.
const KEY_REPEAT_FLOOR: f64 = 2.0;
const INITIAL_KEY_REPEAT_FLOOR: f64 = 15.0;

/// User-tunable key-repeat preferences, in platform ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepeatPreferences {
    /// Delay between repeats while a key is held
    pub key_repeat: f64,
    /// Delay before auto-repeat starts
    pub initial_key_repeat: f64,
}

impl Default for RepeatPreferences {
    fn default() -> Self {
        Self {
            key_repeat: 6.0,
            initial_key_repeat: 25.0,
        }
    }
}

impl RepeatPreferences {
    /// Load preferences from the environment, falling back to platform
    /// defaults for anything unset.
    pub fn load() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            key_repeat: env_f64("HOTKEY_KEY_REPEAT")?.unwrap_or(defaults.key_repeat),
            initial_key_repeat: env_f64("HOTKEY_INITIAL_KEY_REPEAT")?
                .unwrap_or(defaults.initial_key_repeat),
        })
    }
}

fn env_f64(name: &str) -> Result<Option<f64>> {
    match std::env::var(name) {
        Ok(raw) => {
            let value = raw
                .parse::<f64>()
                .with_context(|| format!("{name} is not a number: {raw:?}"))?;
            Ok(Some(value))
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {name}")),
    }
}

/// The derived timer constants the repeat machine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatTiming {
    /// Delay before auto-repeat starts
    pub initial_interval: Duration,
    /// Delay between repeats
    pub repeat_interval: Duration,
}

impl RepeatTiming {
    /// `max(raw, floor) * scale`, per interval.
    pub fn derive(preferences: &RepeatPreferences) -> Self {
        Self {
            initial_interval: Duration::from_secs_f64(
                preferences.initial_key_repeat.max(INITIAL_KEY_REPEAT_FLOOR) * TICK,
            ),
            repeat_interval: Duration::from_secs_f64(
                preferences.key_repeat.max(KEY_REPEAT_FLOOR) * TICK,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_derivation() {
        let timing = RepeatTiming::derive(&RepeatPreferences::default());
        assert_eq!(timing.repeat_interval, Duration::from_millis(90));
        assert_eq!(timing.initial_interval, Duration::from_millis(375));
    }

    #[test]
    fn test_derivation_clamps_at_floor() {
        let timing = RepeatTiming::derive(&RepeatPreferences {
            key_repeat: 0.5,
            initial_key_repeat: 1.0,
        });
        assert_eq!(timing.repeat_interval, Duration::from_millis(30));
        assert_eq!(timing.initial_interval, Duration::from_millis(225));
    }

    #[test]
    fn test_load_uses_defaults_when_unset() {
        // The variables are not set in the test environment
        let prefs = RepeatPreferences::load().unwrap();
        assert_eq!(prefs, RepeatPreferences::default());
    }
}
