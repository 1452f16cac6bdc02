//! Transport → engine event handoff.
//!
//! The BLE stack delivers notifications, scan results and link loss on its
//! own task, while every protocol decision happens inside
//! [`Engine::tick`](crate::app::service::Engine::tick) on the main loop.
//! The two meet in one bounded channel:
//!
//! ```text
//! ┌──────────────────┐               ┌──────────────┐
//! │ scan callback    │──TargetFound─▶│              │
//! │ notify callback  │──Bytes(..)───▶│  LinkEvents  │──▶ Engine::tick()
//! │ disconnect cb    │──Disconnected▶│  (bounded)   │    (drains first)
//! └──────────────────┘               └──────────────┘
//! ```
//!
//! The engine creates the channel and hands a cloned [`LinkEvents`] to the
//! adapter when its callbacks are registered, so there is no global engine
//! pointer. The critical section inside `embassy-sync` is the only point
//! where the two contexts touch.

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

/// Pending events before producers start dropping.
const LINK_EVENT_DEPTH: usize = 32;

/// Bytes carried by one [`LinkEvent::Bytes`]. Longer deliveries are split.
pub const CHUNK_CAP: usize = 64;

/// Raw inbound chunk.
pub type Chunk = heapless::Vec<u8, CHUNK_CAP>;

/// Discrete events posted by a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A scan matched the configured target; ready to connect.
    TargetFound,
    /// The link dropped (peer gone, supervision timeout, local disconnect).
    Disconnected,
    /// Bytes received on the notify characteristic.
    Bytes(Chunk),
}

type LinkChannel = Channel<CriticalSectionRawMutex, LinkEvent, LINK_EVENT_DEPTH>;

/// Cloneable producer/consumer handle for the link event channel.
#[derive(Clone)]
pub struct LinkEvents {
    channel: Arc<LinkChannel>,
}

impl Default for LinkEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkEvents {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(Channel::new()),
        }
    }

    /// Post an event. Returns `false` if the channel is full (event dropped).
    pub fn post(&self, event: LinkEvent) -> bool {
        if self.channel.try_send(event).is_err() {
            warn!("LINK: event channel full, dropping event");
            return false;
        }
        true
    }

    /// Hand inbound bytes to the engine, split into [`CHUNK_CAP`] pieces.
    /// Returns `false` if any piece was dropped.
    pub fn bytes_received(&self, data: &[u8]) -> bool {
        let mut all_queued = true;
        for piece in data.chunks(CHUNK_CAP) {
            let mut chunk = Chunk::new();
            // `piece` is at most CHUNK_CAP long.
            let _ = chunk.extend_from_slice(piece);
            all_queued &= self.post(LinkEvent::Bytes(chunk));
        }
        all_queued
    }

    pub fn target_found(&self) -> bool {
        self.post(LinkEvent::TargetFound)
    }

    pub fn disconnected(&self) -> bool {
        self.post(LinkEvent::Disconnected)
    }

    /// Pop the next event (consumer side, main loop only).
    pub fn try_next(&self) -> Option<LinkEvent> {
        self.channel.try_receive().ok()
    }

    /// Drain all pending events into a callback, FIFO order.
    pub fn drain(&self, mut handler: impl FnMut(LinkEvent)) {
        while let Some(event) = self.try_next() {
            handler(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.channel.len()
    }
}
