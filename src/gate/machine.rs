//! Chord edge-detection state machine
//!
//! Tracks the held state of the two chord keys and decides, per raw
//! event, whether the event is swallowed and whether a correction fires.

use tracing::debug;

use crate::hotkey::{HotkeyKey, KeyEvent, KeyPhase};

/// Observable state of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// No chord key held
    #[default]
    Idle,
    /// Exactly one chord key held, chord not engaged
    Armed,
    /// Both keys went down; stays engaged until both are released
    Engaged,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Armed => write!(f, "Armed"),
            State::Engaged => write!(f, "Engaged"),
        }
    }
}

/// Decision for a single key event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verdict {
    /// Swallow the event instead of passing it to other applications
    pub suppress: bool,
    /// Schedule a correction
    pub trigger: bool,
}

/// Hotkey edge detector for a two-key chord
#[derive(Debug, Default)]
pub struct HotkeyGate {
    modifier_held: bool,
    letter_held: bool,
    chord_engaged: bool,
}

impl HotkeyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        if self.chord_engaged {
            State::Engaged
        } else if self.modifier_held || self.letter_held {
            State::Armed
        } else {
            State::Idle
        }
    }

    pub fn is_held(&self, key: HotkeyKey) -> bool {
        match key {
            HotkeyKey::Modifier => self.modifier_held,
            HotkeyKey::Letter => self.letter_held,
        }
    }

    fn set_held(&mut self, key: HotkeyKey, held: bool) {
        match key {
            HotkeyKey::Modifier => self.modifier_held = held,
            HotkeyKey::Letter => self.letter_held = held,
        }
    }

    /// Feed one chord-key event through the gate
    pub fn on_event(&mut self, event: KeyEvent) -> Verdict {
        let before = self.state();

        let verdict = match event.phase {
            KeyPhase::Down => self.on_down(event.key),
            KeyPhase::Up => self.on_up(event.key),
        };

        let after = self.state();
        if before != after {
            debug!(
                key = ?event.key,
                phase = ?event.phase,
                from = %before,
                to = %after,
                trigger = verdict.trigger,
                "hotkey gate transition"
            );
        }

        verdict
    }

    fn on_down(&mut self, key: HotkeyKey) -> Verdict {
        // Auto-repeat of a key we already track
        if self.is_held(key) {
            return Verdict {
                suppress: self.chord_engaged,
                trigger: false,
            };
        }

        self.set_held(key, true);

        if self.is_held(key.other()) && !self.chord_engaged {
            // Chord activates; it stays active until both keys are up
            self.chord_engaged = true;
            return Verdict {
                suppress: true,
                trigger: true,
            };
        }

        Verdict {
            suppress: self.chord_engaged,
            trigger: false,
        }
    }

    fn on_up(&mut self, key: HotkeyKey) -> Verdict {
        let suppress = self.chord_engaged;
        self.set_held(key, false);

        if !self.modifier_held && !self.letter_held {
            self.chord_engaged = false;
        }

        Verdict {
            suppress,
            trigger: false,
        }
    }
}
