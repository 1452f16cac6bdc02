//! Adapter initialization script.
//!
//! Runs once per connection, in the `Initializing` state, before the
//! command queue is populated:
//!
//! ```text
//!  wait 500 ─▶ ATZ ─ 1500 ─▶ ATE0 ─ 200 ─▶ ATL0 ─ 200 ─▶ ATS0 ─ 200 ─▶ ATSP0 ─ 500 ─▶ done
//! ```
//!
//! Settle delays are deadlines checked by [`InitScript::poll`] on each
//! tick, so the main loop keeps running while the interpreter resets.

/// Delay between link-up and the reset command.
pub const PRE_RESET_DELAY_MS: u64 = 500;

/// One setup command and the time to let it settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitStep {
    pub command: &'static str,
    pub settle_ms: u64,
}

/// Reset, echo off, linefeeds off, spaces off, automatic protocol.
pub const INIT_STEPS: [InitStep; 5] = [
    InitStep { command: "ATZ", settle_ms: 1500 },
    InitStep { command: "ATE0", settle_ms: 200 },
    InitStep { command: "ATL0", settle_ms: 200 },
    InitStep { command: "ATS0", settle_ms: 200 },
    InitStep { command: "ATSP0", settle_ms: 500 },
];

/// What the engine should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitAction {
    /// Still settling.
    Wait,
    /// Send this command now.
    Send(&'static str),
    /// The last command has settled.
    Complete,
}

/// Deadline-driven runner over [`INIT_STEPS`].
#[derive(Debug, Clone, Default)]
pub struct InitScript {
    next_step: usize,
    due_ms: u64,
}

impl InitScript {
    pub const fn new() -> Self {
        Self {
            next_step: 0,
            due_ms: 0,
        }
    }

    /// Rewind and schedule the first command.
    pub fn start(&mut self, now_ms: u64) {
        self.next_step = 0;
        self.due_ms = now_ms + PRE_RESET_DELAY_MS;
    }

    pub fn poll(&mut self, now_ms: u64) -> InitAction {
        if now_ms < self.due_ms {
            return InitAction::Wait;
        }
        let Some(step) = INIT_STEPS.get(self.next_step) else {
            return InitAction::Complete;
        };
        self.next_step += 1;
        self.due_ms = now_ms + step.settle_ms;
        InitAction::Send(step.command)
    }

    /// Commands sent so far.
    pub fn progress(&self) -> usize {
        self.next_step
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
