//! Key combination value types
//!
//! Provides the modifier-set representation and the immutable key+modifier
//! combo that identifies one shortcut. A combo with no literal key is a
//! modifier-only double-tap shortcut.

use serde::{Deserialize, Serialize};

/// Tracks which modifier keys participate in a combo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    /// Control key
    pub control: bool,
    /// Option/Alt key
    pub option: bool,
    /// Command key
    pub command: bool,
    /// Shift key
    pub shift: bool,
}

impl Modifiers {
    /// Check if no modifier is set
    pub fn is_empty(&self) -> bool {
        !self.control && !self.option && !self.command && !self.shift
    }

    /// Modifier set containing only Command
    pub fn command() -> Self {
        Self {
            command: true,
            ..Self::default()
        }
    }

    /// Modifier set containing only Control
    pub fn control() -> Self {
        Self {
            control: true,
            ..Self::default()
        }
    }

    /// Modifier set containing only Option
    pub fn option() -> Self {
        Self {
            option: true,
            ..Self::default()
        }
    }
}

impl std::fmt::Display for Modifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<&str> = Vec::new();
        if self.control {
            parts.push("ctrl");
        }
        if self.option {
            parts.push("opt");
        }
        if self.shift {
            parts.push("shift");
        }
        if self.command {
            parts.push("cmd");
        }
        write!(f, "{}", parts.join("+"))
    }
}

/// An immutable key + modifier-set combination identifying one shortcut.
///
/// `key_code` is an opaque platform virtual key code; translating a physical
/// key press into one is the keyboard layer's job, not this crate's. A combo
/// with no key code represents a modifier set meant to be pressed twice in
/// quick succession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCombo {
    key_code: Option<u32>,
    modifiers: Modifiers,
}

impl KeyCombo {
    /// A key + modifier chord, e.g. Cmd+Shift+P
    pub fn new(key_code: u32, modifiers: Modifiers) -> Self {
        Self {
            key_code: Some(key_code),
            modifiers,
        }
    }

    /// A modifier-only combo triggered by double-tapping the set
    pub fn double_tap(modifiers: Modifiers) -> Self {
        Self {
            key_code: None,
            modifiers,
        }
    }

    /// The platform key code, if this combo carries a literal key
    pub fn key_code(&self) -> Option<u32> {
        self.key_code
    }

    /// The modifier set of this combo
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// True iff this combo carries no literal key, only a modifier set
    /// meant to be double-tapped
    pub fn doubled_modifiers(&self) -> bool {
        self.key_code.is_none() && !self.modifiers.is_empty()
    }
}

impl std::fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.key_code {
            Some(code) => write!(f, "{}+key({})", self.modifiers, code),
            None => write!(f, "{}x2", self.modifiers),
        }
    }
}
