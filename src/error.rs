//! Unified error types for the OBD link client.
//!
//! Two families matter at runtime:
//!
//! - [`TransportError`] aborts a connection attempt and sends the link
//!   state machine to `Error`, which schedules a rescan.
//! - [`ProtocolError`] is recorded as one failed request; the affected
//!   channel keeps its last good value and polling moves on.
//!
//! Neither is ever fatal. All variants are `Copy` so outcomes can be
//! handed around the tick without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The radio refused to start a scan.
    ScanFailed,
    /// The GATT connection could not be opened.
    ConnectFailed,
    /// The peer does not expose the UART service.
    ServiceNotFound,
    /// The write (TX) characteristic is missing.
    TxCharacteristicNotFound,
    /// The notify (RX) characteristic is missing.
    RxCharacteristicNotFound,
    /// The RX characteristic cannot notify.
    NotifyUnsupported,
    /// Operation requires an active link.
    NotConnected,
    /// The BLE stack is not available on this target.
    StackUnavailable,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanFailed => write!(f, "scan could not be started"),
            Self::ConnectFailed => write!(f, "connection failed"),
            Self::ServiceNotFound => write!(f, "UART service not found"),
            Self::TxCharacteristicNotFound => write!(f, "TX characteristic not found"),
            Self::RxCharacteristicNotFound => write!(f, "RX characteristic not found"),
            Self::NotifyUnsupported => write!(f, "RX characteristic does not support notifications"),
            Self::NotConnected => write!(f, "not connected"),
            Self::StackUnavailable => write!(f, "BLE stack unavailable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

/// Why a frame could not be turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame shorter than the channel's minimum payload.
    TooShort,
    /// Echoed mode + PID does not match the request.
    HeaderMismatch,
    /// A data byte is not two hex digits.
    InvalidHex,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "response too short"),
            Self::HeaderMismatch => write!(f, "unexpected response header"),
            Self::InvalidHex => write!(f, "invalid hex payload"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The channel decoder rejected the frame.
    Decode(DecodeError),
    /// The interpreter answered `NO DATA`.
    NoData,
    /// The interpreter answered with an empty frame.
    EmptyResponse,
    /// No terminator arrived before the request timeout.
    Timeout,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "decode failed: {e}"),
            Self::NoData => write!(f, "no data"),
            Self::EmptyResponse => write!(f, "empty response"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl From<DecodeError> for ProtocolError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}
