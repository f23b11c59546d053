//! Global hotkey listener using a Windows low-level keyboard hook
//!
//! Installs `WH_KEYBOARD_LL` on a dedicated thread with its own message
//! loop. Every chord-key event is routed through the [`HotkeyGate`],
//! which decides whether it is swallowed and whether a correction fires.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, error, info, warn};

use super::keys::{HotkeyBinding, KeyEvent, KeyPhase};
use crate::gate::HotkeyGate;
use crate::worker::TriggerHandle;

/// Per-event routing owned by the hook thread
pub struct KeyRouter {
    binding: HotkeyBinding,
    gate: HotkeyGate,
    trigger: TriggerHandle,
}

impl KeyRouter {
    pub fn new(binding: HotkeyBinding, trigger: TriggerHandle) -> Self {
        Self {
            binding,
            gate: HotkeyGate::new(),
            trigger,
        }
    }

    /// Handle one raw key event; returns true when it must be swallowed
    ///
    /// Runs inside the hook callback, so it never blocks.
    pub fn route(&mut self, vk_code: u32, phase: KeyPhase) -> bool {
        let Some(key) = self.binding.classify(vk_code) else {
            return false;
        };

        let verdict = self.gate.on_event(KeyEvent { key, phase });
        if verdict.trigger {
            debug!(hotkey = %self.binding, "chord pressed");
            self.trigger.fire();
        }
        verdict.suppress
    }
}

/// Global hotkey listener that owns the keyboard hook thread
pub struct HotkeyListener {
    router: Mutex<Option<KeyRouter>>,
    running: Arc<AtomicBool>,
    /// Win32 id of the hook thread, 0 until the hook is installed
    thread_id: Arc<AtomicU32>,
}

impl HotkeyListener {
    /// Create a new hotkey listener
    pub fn new(router: KeyRouter) -> Self {
        Self {
            router: Mutex::new(Some(router)),
            running: Arc::new(AtomicBool::new(false)),
            thread_id: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Start the hotkey listener
    ///
    /// Spawns a dedicated thread that installs the hook and pumps its
    /// message loop until `stop()` is called. A listener can only be
    /// started once.
    pub fn start(&self) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let router = match self.router.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(router) = router else {
            self.running.store(false, Ordering::SeqCst);
            return Err(HotkeyError::AlreadyRunning);
        };

        let running = Arc::clone(&self.running);
        let thread_id = Arc::clone(&self.thread_id);

        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                if let Err(e) = run_hook_loop(router, &running, &thread_id) {
                    error!(?e, "hotkey listener error");
                }

                thread_id.store(0, Ordering::SeqCst);
                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HotkeyError::ThreadSpawn(e.to_string())
            })?;

        Ok(())
    }

    /// Stop the hotkey listener and remove the hook; safe to call repeatedly
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("hotkey listener not running");
            return;
        }

        let thread_id = self.thread_id.load(Ordering::SeqCst);
        if thread_id == 0 {
            warn!("hotkey thread has no message loop yet");
            return;
        }
        quit_hook_loop(thread_id);
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to install keyboard hook: {0}")]
    HookInstall(String),

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("global keyboard hooks are only supported on Windows")]
    Unsupported,
}

#[cfg(windows)]
fn run_hook_loop(
    router: KeyRouter,
    running: &AtomicBool,
    thread_id: &AtomicU32,
) -> Result<(), HotkeyError> {
    super::windows::run_hook_loop(router, running, thread_id)
}

#[cfg(windows)]
fn quit_hook_loop(thread_id: u32) {
    super::windows::quit_hook_loop(thread_id)
}

#[cfg(not(windows))]
fn run_hook_loop(
    _router: KeyRouter,
    _running: &AtomicBool,
    _thread_id: &AtomicU32,
) -> Result<(), HotkeyError> {
    Err(HotkeyError::Unsupported)
}

#[cfg(not(windows))]
fn quit_hook_loop(_thread_id: u32) {}
