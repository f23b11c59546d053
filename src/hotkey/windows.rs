//! `WH_KEYBOARD_LL` hook plumbing
//!
//! The hook callback has no user-data pointer, so the router lives in a
//! thread-local on the thread that installed the hook. Windows delivers
//! low-level hook callbacks on that same thread while it pumps messages.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tracing::{debug, info, warn};
use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, LLKHF_INJECTED, MSG,
    WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use super::keys::KeyPhase;
use super::listener::{HotkeyError, KeyRouter};

thread_local! {
    static ROUTER: RefCell<Option<KeyRouter>> = const { RefCell::new(None) };
}

unsafe extern "system" fn keyboard_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        let kb = &*(l_param.0 as *const KBDLLHOOKSTRUCT);

        // Synthetic input (including our own Ctrl+C and typing) is never a chord
        let injected = (kb.flags & LLKHF_INJECTED).0 != 0;

        let phase = match w_param.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyPhase::Down),
            WM_KEYUP | WM_SYSKEYUP => Some(KeyPhase::Up),
            _ => None,
        };

        if let (false, Some(phase)) = (injected, phase) {
            let suppress = ROUTER.with(|slot| match slot.try_borrow_mut() {
                Ok(mut router) => router
                    .as_mut()
                    .map(|router| router.route(kb.vkCode, phase))
                    .unwrap_or(false),
                Err(_) => false,
            });
            if suppress {
                return LRESULT(1);
            }
        }
    }
    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Install the hook and pump messages until `WM_QUIT` arrives
pub(super) fn run_hook_loop(
    router: KeyRouter,
    running: &AtomicBool,
    thread_id: &AtomicU32,
) -> Result<(), HotkeyError> {
    ROUTER.with(|slot| *slot.borrow_mut() = Some(router));

    let hook = unsafe {
        let module = GetModuleHandleW(None).map_err(|e| HotkeyError::HookInstall(e.to_string()))?;
        SetWindowsHookExW(
            WH_KEYBOARD_LL,
            Some(keyboard_proc),
            HINSTANCE::from(module),
            0,
        )
        .map_err(|e| HotkeyError::HookInstall(e.to_string()))?
    };
    info!("keyboard hook installed");

    thread_id.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);

    // stop() may have raced the install and found no thread id to post to
    if running.load(Ordering::SeqCst) {
        let mut msg = MSG::default();
        unsafe {
            while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }

    if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
        warn!(?e, "failed to remove keyboard hook");
    }
    ROUTER.with(|slot| slot.borrow_mut().take());
    debug!("keyboard hook removed");
    Ok(())
}

/// Ask the hook thread's message loop to exit
pub(super) fn quit_hook_loop(thread_id: u32) {
    if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
        warn!(?e, "failed to post quit to hotkey thread");
    }
}
