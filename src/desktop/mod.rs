//! OS clipboard and keystroke simulation seams
//!
//! The correction transaction only talks to these traits; the Windows
//! adapters live in [`windows`].

#[cfg(windows)]
pub mod windows;

use thiserror::Error;

use crate::hotkey::Modifier;

#[derive(Debug, Error)]
pub enum DesktopError {
    #[error("failed to initialize input simulator: {0}")]
    Initialization(String),

    #[error("failed to simulate keyboard input: {0}")]
    Keyboard(String),

    #[error("clipboard operation failed: {0}")]
    Clipboard(String),
}

/// Plain-text access to the OS clipboard
pub trait Clipboard {
    /// Current text payload, `None` when the clipboard holds no text
    fn get_text(&mut self) -> Result<Option<String>, DesktopError>;

    fn set_text(&mut self, text: &str) -> Result<(), DesktopError>;

    fn clear(&mut self) -> Result<(), DesktopError>;
}

/// Synthetic keystrokes sent to the focused application
pub trait KeySynth {
    /// Ctrl+C
    fn copy_selection(&mut self) -> Result<(), DesktopError>;

    fn backspace(&mut self) -> Result<(), DesktopError>;

    fn type_char(&mut self, ch: char) -> Result<(), DesktopError>;

    /// Send a key-up for the chord modifier in case the OS still thinks it is held
    fn release_modifier(&mut self, modifier: Modifier) -> Result<(), DesktopError>;
}
