//! Windows adapters: arboard clipboard and enigo keystrokes

use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tracing::debug;

use super::{Clipboard, DesktopError, KeySynth};
use crate::hotkey::Modifier;

pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, DesktopError> {
        let inner =
            arboard::Clipboard::new().map_err(|err| DesktopError::Clipboard(err.to_string()))?;
        Ok(Self { inner })
    }
}

impl Clipboard for SystemClipboard {
    fn get_text(&mut self) -> Result<Option<String>, DesktopError> {
        match self.inner.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(err) => Err(DesktopError::Clipboard(err.to_string())),
        }
    }

    fn set_text(&mut self, text: &str) -> Result<(), DesktopError> {
        self.inner
            .set_text(text)
            .map_err(|err| DesktopError::Clipboard(err.to_string()))
    }

    fn clear(&mut self) -> Result<(), DesktopError> {
        self.inner
            .clear()
            .map_err(|err| DesktopError::Clipboard(err.to_string()))
    }
}

pub struct InputSimulator {
    enigo: Enigo,
}

impl InputSimulator {
    pub fn new() -> Result<Self, DesktopError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|err| DesktopError::Initialization(err.to_string()))?;
        Ok(Self { enigo })
    }

    fn key(&mut self, key: Key, direction: Direction) -> Result<(), DesktopError> {
        self.enigo
            .key(key, direction)
            .map_err(|err| DesktopError::Keyboard(err.to_string()))
    }
}

impl KeySynth for InputSimulator {
    fn copy_selection(&mut self) -> Result<(), DesktopError> {
        self.key(Key::Control, Direction::Press)?;
        let copied = self.key(Key::Unicode('c'), Direction::Click);
        // Never leave Ctrl logically held, even if the click failed
        self.key(Key::Control, Direction::Release)?;
        copied
    }

    fn backspace(&mut self) -> Result<(), DesktopError> {
        self.key(Key::Backspace, Direction::Click)
    }

    fn type_char(&mut self, ch: char) -> Result<(), DesktopError> {
        if ch == '\n' {
            return self.key(Key::Return, Direction::Click);
        }
        self.enigo
            .text(&ch.to_string())
            .map_err(|err| DesktopError::Keyboard(err.to_string()))
    }

    fn release_modifier(&mut self, modifier: Modifier) -> Result<(), DesktopError> {
        let key = match modifier {
            Modifier::Alt => Key::Alt,
            Modifier::Control => Key::Control,
            Modifier::Shift => Key::Shift,
            Modifier::Win => Key::Meta,
        };
        debug!(%modifier, "releasing modifier");
        self.key(key, Direction::Release)
    }
}
