//! Port traits: the hexagonal boundary between the protocol engine and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Engine (domain)
//! ```
//!
//! The BLE central, the ELM327 simulator, the console sink and NVS storage
//! implement these traits. The [`Engine`](super::service::Engine) takes
//! them as generic arguments, so the core never touches the radio directly.
//!
//! Inbound traffic (scan hits, notifications, link loss) does not go
//! through a trait: adapters post it to the
//! [`LinkEvents`](crate::events::LinkEvents) handle they were given.

use crate::config::ClientConfig;
use crate::error::TransportError;

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: engine ↔ wireless link)
// ───────────────────────────────────────────────────────────────

/// Outbound half of the byte-stream link to the diagnostic interpreter.
pub trait TransportAdapter {
    /// Begin looking for `target`. A match is reported with
    /// [`LinkEvent::TargetFound`](crate::events::LinkEvent::TargetFound).
    fn start_scan(&mut self, target: &str, window_ms: u64) -> Result<(), TransportError>;

    /// Stop an active scan. No-op if none is running.
    fn stop_scan(&mut self);

    /// Open the link to the discovered target, resolve the service and
    /// both characteristics, and enable notifications.
    fn connect(&mut self, target: &str) -> Result<(), TransportError>;

    /// Close the link. A [`LinkEvent::Disconnected`](crate::events::LinkEvent::Disconnected)
    /// follows once the stack confirms.
    fn disconnect(&mut self);

    /// Write raw request bytes. Fails with [`TransportError::NotConnected`]
    /// when there is no link.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The engine emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists client configuration.
///
/// Implementations must validate before persisting and reject out-of-range
/// values with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    fn load(&self) -> Result<ClientConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &ClientConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored blob failed to deserialize or validate.
    Corrupted,
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
