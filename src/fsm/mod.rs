//! Connection lifecycle state machine.
//!
//! ```text
//!                 start / auto-reconnect (>10 s idle)
//!  DISCONNECTED ─────────────────────────────────────▶ SCANNING
//!       ▲  ▲                                              │
//!       │  └──────────── auto-reconnect ─────── ERROR     │ target found
//!       │                                        ▲        ▼
//!       │                         connect failed └──── CONNECTING
//!       │                                                  │ link + GATT ready
//!       │                                                  ▼
//!       └──── link lost / disconnect ──── CONNECTED ◀──▶ INITIALIZING
//!                                                  (init script, once)
//! ```
//!
//! [`ConnectionFsm`] only records the current state and when it was
//! entered; the [`Engine`](crate::app::service::Engine) decides when to
//! move. Every transition is logged.

pub mod init_script;

use log::info;
use serde::Serialize;

use crate::config::RECONNECT_DELAY_MS;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Scanning = 1,
    Connecting = 2,
    Initializing = 3,
    Connected = 4,
    Error = 5,
}

impl ConnectionState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Scanning => "Scanning",
            Self::Connecting => "Connecting",
            Self::Initializing => "Initializing",
            Self::Connected => "Connected",
            Self::Error => "Error",
        }
    }

    /// A GATT link is up (initialization counts as connected time).
    pub const fn is_link_up(self) -> bool {
        matches!(self, Self::Initializing | Self::Connected)
    }

    /// States the auto-reconnect timer is allowed to leave.
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// FSM
// ---------------------------------------------------------------------------

/// Current connection state plus the time it was entered.
#[derive(Debug, Clone)]
pub struct ConnectionFsm {
    state: ConnectionState,
    last_transition_ms: u64,
    transitions: u32,
}

impl Default for ConnectionFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionFsm {
    /// Starts in `Disconnected` at t = 0.
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_transition_ms: 0,
            transitions: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_transition_ms(&self) -> u64 {
        self.last_transition_ms
    }

    /// Number of transitions taken since construction.
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    pub fn time_in_state(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_transition_ms)
    }

    /// Move to `next`. Returns the previous state, or `None` if already there.
    pub fn transition(&mut self, next: ConnectionState, now_ms: u64) -> Option<ConnectionState> {
        if next == self.state {
            return None;
        }
        let prev = self.state;
        info!("FSM transition: {} -> {}", prev.name(), next.name());
        self.state = next;
        self.last_transition_ms = now_ms;
        self.transitions = self.transitions.saturating_add(1);
        Some(prev)
    }

    /// Restart the clock of the current state without a transition.
    pub fn reenter(&mut self, now_ms: u64) {
        self.last_transition_ms = now_ms;
    }

    /// Whether an automatic rescan is due.
    ///
    /// Requires auto-reconnect, no active link, an idle state, and more than
    /// [`RECONNECT_DELAY_MS`] spent in it.
    pub fn reconnect_due(&self, now_ms: u64, auto_reconnect: bool, link_active: bool) -> bool {
        auto_reconnect
            && !link_active
            && self.state.is_idle()
            && self.time_in_state(now_ms) > RECONNECT_DELAY_MS
    }
}
