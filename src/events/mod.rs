//! Events delivered to the UI thread
//!
//! Background threads never touch the tray or show notifications
//! themselves; they post a [`UiEvent`] and the UI loop acts on it.

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Requests handled by the UI loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Show a transient notification
    Notify { title: String, body: String },

    /// Tray menu: Show Settings
    ShowSettings,

    /// Tray menu: About
    ShowAbout,

    /// Tray menu: Exit
    Quit,
}

impl std::fmt::Display for UiEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiEvent::Notify { title, .. } => write!(f, "NOTIFY ({})", title),
            UiEvent::ShowSettings => write!(f, "SHOW_SETTINGS"),
            UiEvent::ShowAbout => write!(f, "SHOW_ABOUT"),
            UiEvent::Quit => write!(f, "QUIT"),
        }
    }
}

/// Fire-and-forget user notification, callable from any thread
pub trait Notifier {
    fn notify(&self, title: &str, body: &str);
}

/// Notifier that forwards to the UI loop over a channel
#[derive(Debug, Clone)]
pub struct UiNotifier {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiNotifier {
    pub fn new(tx: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { tx }
    }
}

impl Notifier for UiNotifier {
    fn notify(&self, title: &str, body: &str) {
        debug!(title, "queueing notification");
        let event = UiEvent::Notify {
            title: title.to_string(),
            body: body.to_string(),
        };
        if self.tx.send(event).is_err() {
            warn!(title, "UI loop is gone, showing notification directly");
            #[cfg(windows)]
            crate::tray::windows::show_toast(title, body);
        }
    }
}
