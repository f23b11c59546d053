//! Windows tray icon, menu and toast notifications

use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tray_icon::menu::{Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
};
use winrt_notification::Toast;

use super::{Surface, UiLoop, APP_NAME};
use crate::credential::CredentialSource;
use crate::events::UiEvent;
use crate::hotkey::HotkeyBinding;
use crate::lifecycle::ShutdownSignal;

const PUMP_INTERVAL: Duration = Duration::from_millis(25);

/// Tray icon plus the toast notifier
pub struct TraySurface {
    tray: Option<TrayIcon>,
}

impl Surface for TraySurface {
    fn show_notification(&mut self, title: &str, body: &str) {
        show_toast(title, body);
    }

    fn open_url(&mut self, url: &str) {
        if let Err(e) = Command::new("cmd").args(["/C", "start", "", url]).spawn() {
            warn!(?e, url, "failed to open browser");
        }
    }

    fn close(&mut self) {
        if let Some(tray) = self.tray.take() {
            let _ = tray.set_visible(false);
        }
    }
}

/// Show a toast directly; safe from any thread
pub fn show_toast(title: &str, body: &str) {
    if let Err(e) = Toast::new(Toast::POWERSHELL_APP_ID)
        .title(title)
        .text1(body)
        .show()
    {
        warn!(?e, title, "failed to show notification");
    }
}

struct TrayMenu {
    settings: MenuId,
    about: MenuId,
    exit: MenuId,
}

impl TrayMenu {
    fn to_event(&self, id: &MenuId) -> Option<UiEvent> {
        if *id == self.settings {
            Some(UiEvent::ShowSettings)
        } else if *id == self.about {
            Some(UiEvent::ShowAbout)
        } else if *id == self.exit {
            Some(UiEvent::Quit)
        } else {
            None
        }
    }
}

fn build_tray() -> Result<(TraySurface, TrayMenu)> {
    let menu = Menu::new();
    let settings = MenuItem::new("Show Settings", true, None);
    let about = MenuItem::new("About", true, None);
    let exit = MenuItem::new("Exit", true, None);
    menu.append_items(&[
        &settings,
        &about,
        &PredefinedMenuItem::separator(),
        &exit,
    ])
    .context("failed to build tray menu")?;

    let tray = TrayIconBuilder::new()
        .with_tooltip(APP_NAME)
        .with_menu(Box::new(menu))
        .with_icon(tray_icon_image()?)
        .build()
        .context("failed to create tray icon")?;

    Ok((
        TraySurface { tray: Some(tray) },
        TrayMenu {
            settings: settings.id().clone(),
            about: about.id().clone(),
            exit: exit.id().clone(),
        },
    ))
}

/// 16x16 solid blue square
fn tray_icon_image() -> Result<Icon> {
    const SIZE: u32 = 16;
    let rgba = [0x1E, 0x88, 0xE5, 0xFF].repeat((SIZE * SIZE) as usize);
    Icon::from_rgba(rgba, SIZE, SIZE).context("failed to build tray icon image")
}

/// Run the tray on the current thread until Exit or shutdown
///
/// Must be called on the thread that will own the tray icon; it pumps that
/// thread's Windows messages.
pub fn run<C: CredentialSource>(
    mut events: mpsc::UnboundedReceiver<UiEvent>,
    credentials: C,
    binding: HotkeyBinding,
    credential_path: PathBuf,
    shutdown: ShutdownSignal,
) -> Result<()> {
    let (surface, menu) = build_tray()?;
    let mut ui = UiLoop::new(surface, credentials, binding, credential_path, shutdown);
    let menu_events = MenuEvent::receiver();
    info!("tray running");

    loop {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        let mut pending = Vec::new();
        while let Ok(event) = menu_events.try_recv() {
            debug!(id = ?event.id(), "tray menu clicked");
            pending.extend(menu.to_event(event.id()));
        }
        loop {
            match events.try_recv() {
                Ok(event) => pending.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    pending.push(UiEvent::Quit);
                    break;
                }
            }
        }

        for event in pending {
            if ui.handle(event).is_break() {
                info!("tray stopped");
                return Ok(());
            }
        }

        if ui.shutdown_requested() {
            ui.close();
            info!("tray stopped");
            return Ok(());
        }

        thread::sleep(PUMP_INTERVAL);
    }
}
