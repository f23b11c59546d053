//! Chord key definitions and binding parsing
//!
//! A hotkey is a chord of one modifier key and one letter/digit key,
//! written as `"Alt+Q"` in the settings file. Raw hook events carry
//! Windows virtual-key codes; [`HotkeyBinding::classify`] maps them onto
//! the two chord keys.

use std::fmt;
use std::str::FromStr;

/// Virtual-key codes for the supported modifiers (generic, left, right)
pub mod vk {
    pub const SHIFT: [u32; 3] = [0x10, 0xA0, 0xA1];
    pub const CONTROL: [u32; 3] = [0x11, 0xA2, 0xA3];
    pub const ALT: [u32; 3] = [0x12, 0xA4, 0xA5];
    pub const WIN: [u32; 2] = [0x5B, 0x5C];
}

/// Which of the two chord keys an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyKey {
    Modifier,
    Letter,
}

impl HotkeyKey {
    /// The other key of the chord
    pub fn other(self) -> Self {
        match self {
            HotkeyKey::Modifier => HotkeyKey::Letter,
            HotkeyKey::Letter => HotkeyKey::Modifier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Down,
    Up,
}

/// A key event already narrowed to one of the chord keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: HotkeyKey,
    pub phase: KeyPhase,
}

impl KeyEvent {
    pub fn down(key: HotkeyKey) -> Self {
        Self { key, phase: KeyPhase::Down }
    }

    pub fn up(key: HotkeyKey) -> Self {
        Self { key, phase: KeyPhase::Up }
    }
}

/// Modifier half of the chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Alt,
    Control,
    Shift,
    Win,
}

impl Modifier {
    fn codes(self) -> &'static [u32] {
        match self {
            Modifier::Alt => &vk::ALT,
            Modifier::Control => &vk::CONTROL,
            Modifier::Shift => &vk::SHIFT,
            Modifier::Win => &vk::WIN,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Alt => write!(f, "Alt"),
            Modifier::Control => write!(f, "Ctrl"),
            Modifier::Shift => write!(f, "Shift"),
            Modifier::Win => write!(f, "Win"),
        }
    }
}

/// The configured chord, e.g. Alt+Q
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub modifier: Modifier,
    /// Uppercase ASCII letter or digit; equal to its virtual-key code
    pub letter: char,
}

impl Default for HotkeyBinding {
    fn default() -> Self {
        Self {
            modifier: Modifier::Alt,
            letter: 'Q',
        }
    }
}

impl HotkeyBinding {
    /// Map a raw virtual-key code onto a chord key, if it is one
    pub fn classify(&self, vk_code: u32) -> Option<HotkeyKey> {
        if self.modifier.codes().contains(&vk_code) {
            Some(HotkeyKey::Modifier)
        } else if vk_code == self.letter as u32 {
            Some(HotkeyKey::Letter)
        } else {
            None
        }
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.modifier, self.letter)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BindingParseError {
    #[error("hotkey must look like Modifier+Key, got {0:?}")]
    Format(String),

    #[error("unknown modifier {0:?} (expected Alt, Ctrl, Shift or Win)")]
    Modifier(String),

    #[error("unsupported key {0:?} (expected a single letter or digit)")]
    Key(String),
}

impl FromStr for HotkeyBinding {
    type Err = BindingParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (modifier, key) = s
            .split_once('+')
            .ok_or_else(|| BindingParseError::Format(s.to_string()))?;

        let modifier = match modifier.trim().to_ascii_lowercase().as_str() {
            "alt" => Modifier::Alt,
            "ctrl" | "control" => Modifier::Control,
            "shift" => Modifier::Shift,
            "win" | "super" | "meta" => Modifier::Win,
            other => return Err(BindingParseError::Modifier(other.to_string())),
        };

        let key = key.trim();
        let mut chars = key.chars();
        let letter = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() => c.to_ascii_uppercase(),
            _ => return Err(BindingParseError::Key(key.to_string())),
        };

        Ok(Self { modifier, letter })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binding_is_alt_q() {
        let binding = HotkeyBinding::default();
        assert_eq!(binding.to_string(), "Alt+Q");
    }

    #[test]
    fn test_parse_binding() {
        let binding: HotkeyBinding = "ctrl + g".parse().unwrap();
        assert_eq!(binding.modifier, Modifier::Control);
        assert_eq!(binding.letter, 'G');

        let binding: HotkeyBinding = "Win+7".parse().unwrap();
        assert_eq!(binding.modifier, Modifier::Win);
        assert_eq!(binding.letter, '7');
    }

    #[test]
    fn test_parse_rejects_bad_bindings() {
        assert!(matches!(
            "AltQ".parse::<HotkeyBinding>(),
            Err(BindingParseError::Format(_))
        ));
        assert!(matches!(
            "Hyper+Q".parse::<HotkeyBinding>(),
            Err(BindingParseError::Modifier(_))
        ));
        assert!(matches!(
            "Alt+F4".parse::<HotkeyBinding>(),
            Err(BindingParseError::Key(_))
        ));
        assert!(matches!(
            "Alt+".parse::<HotkeyBinding>(),
            Err(BindingParseError::Key(_))
        ));
    }

    #[test]
    fn test_classify_left_and_right_modifiers() {
        let binding = HotkeyBinding::default();
        assert_eq!(binding.classify(0x12), Some(HotkeyKey::Modifier));
        assert_eq!(binding.classify(0xA4), Some(HotkeyKey::Modifier));
        assert_eq!(binding.classify(0xA5), Some(HotkeyKey::Modifier));
        assert_eq!(binding.classify(0x51), Some(HotkeyKey::Letter));
        assert_eq!(binding.classify(0xA2), None);
        assert_eq!(binding.classify(0x57), None);
    }

    #[test]
    fn test_other_key() {
        assert_eq!(HotkeyKey::Modifier.other(), HotkeyKey::Letter);
        assert_eq!(HotkeyKey::Letter.other(), HotkeyKey::Modifier);
    }
}
