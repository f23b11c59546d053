//! Hotkey module for global keyboard event listening
//!
//! Uses a Windows low-level keyboard hook to watch the configured
//! modifier+letter chord and hand each press to the correction worker.

mod keys;
mod listener;
#[cfg(windows)]
mod windows;

pub use keys::{HotkeyBinding, HotkeyKey, KeyEvent, KeyPhase, Modifier};
pub use listener::{HotkeyError, HotkeyListener, KeyRouter};
