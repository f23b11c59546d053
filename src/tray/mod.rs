//! Tray menu actions and notification routing
//!
//! The platform tray (icon, menu, toasts) is a [`Surface`]; everything it
//! is asked to do arrives as a [`UiEvent`] and is dispatched by [`UiLoop`].

#[cfg(windows)]
pub mod windows;

use std::ops::ControlFlow;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::credential::CredentialSource;
use crate::events::UiEvent;
use crate::hotkey::HotkeyBinding;
use crate::lifecycle::ShutdownSignal;

pub const APP_NAME: &str = "AI Text Correction Tool";
pub const API_KEY_URL: &str = "https://platform.openai.com/api-keys";

/// Body of the notification shown once the tray is up
pub fn startup_message(binding: &HotkeyBinding) -> String {
    format!("Running in system tray\nPress {binding} to correct text\nUse Ctrl+Z to revert")
}

/// What the UI loop can do on screen
pub trait Surface {
    fn show_notification(&mut self, title: &str, body: &str);

    fn open_url(&mut self, url: &str);

    /// Remove the tray icon
    fn close(&mut self);
}

pub struct UiLoop<S, C> {
    surface: S,
    credentials: C,
    binding: HotkeyBinding,
    credential_path: PathBuf,
    shutdown: ShutdownSignal,
    closed: bool,
}

impl<S: Surface, C: CredentialSource> UiLoop<S, C> {
    pub fn new(
        surface: S,
        credentials: C,
        binding: HotkeyBinding,
        credential_path: PathBuf,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            surface,
            credentials,
            binding,
            credential_path,
            shutdown,
            closed: false,
        }
    }

    pub fn about_message(&self) -> String {
        format!(
            "Version {}\nPress {} to correct text\nCtrl+Z to revert",
            env!("CARGO_PKG_VERSION"),
            self.binding
        )
    }

    pub fn settings_message(&self) -> String {
        let state = if self.credentials.api_key().is_some() {
            "An API key is configured."
        } else {
            "No API key is configured."
        };
        format!(
            "{state}\nRun `text-corrector set-key <KEY>` to store a new key.\nStored in {}",
            self.credential_path.display()
        )
    }

    /// Dispatch one event; `Break` means the UI thread should exit
    pub fn handle(&mut self, event: UiEvent) -> ControlFlow<()> {
        debug!(%event, "ui event");

        if self.closed {
            return ControlFlow::Break(());
        }

        match event {
            UiEvent::Notify { title, body } => {
                self.surface.show_notification(&title, &body);
            }
            UiEvent::ShowSettings => {
                let body = self.settings_message();
                self.surface.show_notification("Settings", &body);
                self.surface.open_url(API_KEY_URL);
            }
            UiEvent::ShowAbout => {
                let body = self.about_message();
                self.surface.show_notification(APP_NAME, &body);
            }
            UiEvent::Quit => {
                self.close();
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    /// Remove the tray and request shutdown; later calls do nothing
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        info!("closing tray");
        self.surface.close();
        self.shutdown.trigger();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether shutdown was requested from outside the tray (Ctrl+C)
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.is_triggered()
    }
}
