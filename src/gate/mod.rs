//! Hotkey gate module
//!
//! Provides an explicit state machine for the correction chord:
//! - Idle: no chord key held
//! - Armed: one chord key held, events still reach other applications
//! - Engaged: both keys went down, every chord-key event is swallowed
//!   until both are released

mod machine;

pub use machine::{HotkeyGate, State, Verdict};
