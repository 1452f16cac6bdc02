//! Inbound commands to the engine.
//!
//! Actions requested from outside the protocol core (boot sequence,
//! console, a future provisioning channel) that the
//! [`Engine`](super::service::Engine) interprets and acts upon.

use crate::config::ClientConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Start scanning now, if the link is idle.
    StartScan,

    /// Drop the link (or stop scanning) and go to `Disconnected`.
    Disconnect,

    /// Replace the configuration. Invalid configs are rejected.
    UpdateConfig(ClientConfig),
}
