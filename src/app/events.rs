//! Outbound application events.
//!
//! The [`Engine`](super::service::Engine) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them; the console sink renders them as log lines.

use crate::error::{ProtocolError, TransportError};
use crate::fsm::ConnectionState;
use crate::obd::channels::ChannelId;
use crate::telemetry::TelemetryReport;

/// Structured events emitted by the protocol engine.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The engine has started (carries initial state).
    Started(ConnectionState),

    /// The connection state machine moved.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// An automatic rescan fired; carries the running attempt count.
    ReconnectAttempt(u32),

    /// A scan or connection attempt failed.
    TransportFailed(TransportError),

    /// The link dropped; carries the length of the finished session.
    LinkLost { session_ms: u64 },

    /// Adapter initialization finished and polling begins.
    Ready,

    /// A channel request went out.
    RequestSent(ChannelId),

    /// A channel response decoded.
    Decoded {
        channel: ChannelId,
        value: f32,
        rtt_ms: u64,
    },

    /// A channel request ended without a value.
    RequestFailed {
        channel: ChannelId,
        error: ProtocolError,
    },

    /// Periodic telemetry view.
    Telemetry(TelemetryReport),

    /// Periodic statistics view.
    Statistics(TelemetryReport),
}
