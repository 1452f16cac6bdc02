//! Client configuration parameters
//!
//! Tunable options for the OBD link client. Values can be overridden via
//! NVS (non-volatile storage) or at runtime through
//! [`EngineCommand::UpdateConfig`](crate::app::commands::EngineCommand).

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::adapters::utils::is_printable_ascii;

/// Adapter name advertised by the reference ELM327 BLE simulator.
pub const DEFAULT_TARGET: &str = "OBD2_Simulator_BLE";

/// Maximum stored length of the target identifier.
pub const MAX_TARGET_LEN: usize = 31;

/// Time spent in Disconnected/Error before an automatic rescan (ms).
pub const RECONNECT_DELAY_MS: u64 = 10_000;

/// Minimum spacing between command-queue passes (ms).
pub const COMMAND_INTERVAL_MS: u64 = 100;

/// How long a single scan runs before it is restarted (ms).
pub const SCAN_WINDOW_MS: u64 = 10_000;

/// Core client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    // --- Logging ---
    /// Log request/response traffic and failures
    pub debug_logging: bool,
    /// Additionally dump raw inbound chunks and buffer contents
    pub verbose_logging: bool,

    // --- Link ---
    /// Rescan automatically after link loss or failure
    pub auto_reconnect: bool,
    /// Advertised name of the adapter to connect to
    pub target_identifier: heapless::String<MAX_TARGET_LEN>,

    // --- Protocol ---
    /// Per-request response timeout (milliseconds)
    pub request_timeout_ms: u32,

    // --- Console ---
    /// Telemetry console report interval (milliseconds, 0 = off)
    pub display_interval_ms: u32,
    /// Statistics console report interval (milliseconds, 0 = off)
    pub stats_interval_ms: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut target = heapless::String::new();
        // DEFAULT_TARGET is shorter than MAX_TARGET_LEN.
        let _ = target.push_str(DEFAULT_TARGET);

        Self {
            debug_logging: true,
            verbose_logging: false,

            auto_reconnect: true,
            target_identifier: target,

            request_timeout_ms: 2000,

            display_interval_ms: 2000,
            stats_interval_ms: 10_000,
        }
    }
}

impl ClientConfig {
    /// Build a config targeting a specific adapter name.
    /// Names longer than [`MAX_TARGET_LEN`] are rejected.
    pub fn with_target(target: &str) -> Result<Self, &'static str> {
        let mut cfg = Self::default();
        cfg.set_target(target)?;
        Ok(cfg)
    }

    pub fn set_target(&mut self, target: &str) -> Result<(), &'static str> {
        let mut s = heapless::String::new();
        s.push_str(target)
            .map_err(|()| "target_identifier must be at most 31 bytes")?;
        self.target_identifier = s;
        Ok(())
    }

    /// Range-check every field. Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(100..=60_000).contains(&self.request_timeout_ms) {
            return Err("request_timeout_ms must be 100–60000");
        }
        if self.target_identifier.is_empty() {
            return Err("target_identifier must not be empty");
        }
        if !is_printable_ascii(&self.target_identifier) {
            return Err("target_identifier must be printable ASCII");
        }
        if self.display_interval_ms != 0 && self.display_interval_ms < 250 {
            return Err("display_interval_ms must be 0 or >= 250");
        }
        if self.stats_interval_ms != 0 && self.stats_interval_ms < 1000 {
            return Err("stats_interval_ms must be 0 or >= 1000");
        }
        Ok(())
    }

    /// Log filter implied by the logging flags.
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose_logging {
            LevelFilter::Trace
        } else if self.debug_logging {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}
