//! Simulated ELM327 interpreter behind a fake BLE link.
//!
//! Answers `AT` commands with `OK` and the eight supported PIDs with fixed,
//! plausible readings. Replies are posted to [`LinkEvents`] synchronously
//! from [`send`](TransportAdapter::send), so the engine sees them on its
//! next tick. Knobs cover the failure paths:
//!
//! - silent requests (the engine times out)
//! - `NO DATA` or arbitrary replies per request
//! - chunked delivery with a configurable split size
//! - scan misses, connect failures, and link drops

use log::{debug, info};

use super::utils::advertised_name_matches;
use crate::app::ports::TransportAdapter;
use crate::config::DEFAULT_TARGET;
use crate::error::TransportError;
use crate::events::LinkEvents;

/// Canned data payloads for the polled PIDs.
const CANNED: &[(&str, &str)] = &[
    ("010C", "41 0C 1A F8"), // 1726 rpm
    ("010D", "41 0D 3C"),    // 60 km/h
    ("0105", "41 05 5A"),    // 50 °C
    ("015C", "41 5C 64"),    // 60 °C
    ("012F", "41 2F 80"),    // 50.2 %
    ("0111", "41 11 33"),    // 20 %
    ("0104", "41 04 66"),    // 40 %
    ("0110", "41 10 01 F4"), // 5.0 g/s
];

const IDENTITY: &str = "ELM327 v1.5";

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Silent,
}

pub struct ElmSimulator {
    events: LinkEvents,
    advertised_name: String,
    overrides: Vec<(String, Reply)>,
    chunk_size: usize,
    fail_connect: bool,
    scanning: bool,
    connected: bool,
    sent: Vec<String>,
}

impl ElmSimulator {
    /// A simulator advertising [`DEFAULT_TARGET`].
    pub fn new(events: LinkEvents) -> Self {
        Self {
            events,
            advertised_name: DEFAULT_TARGET.to_string(),
            overrides: Vec::new(),
            chunk_size: 0,
            fail_connect: false,
            scanning: false,
            connected: false,
            sent: Vec::new(),
        }
    }

    /// Change the advertised name. Scans for any other name find nothing.
    pub fn advertise_as(&mut self, name: &str) {
        self.advertised_name = name.to_string();
    }

    /// Answer `request` with `reply` (without the trailing prompt).
    pub fn respond(&mut self, request: &str, reply: &str) {
        self.set_override(request, Reply::Text(reply.to_string()));
    }

    /// Answer `request` with `NO DATA`.
    pub fn no_data(&mut self, request: &str) {
        self.respond(request, "NO DATA");
    }

    /// Never answer `request`.
    pub fn silence(&mut self, request: &str) {
        self.set_override(request, Reply::Silent);
    }

    /// Restore the canned reply for `request`.
    pub fn clear(&mut self, request: &str) {
        self.overrides.retain(|(r, _)| r != request);
    }

    /// Deliver replies in pieces of `size` bytes (0 = one piece).
    pub fn split_replies(&mut self, size: usize) {
        self.chunk_size = size;
    }

    pub fn fail_connect(&mut self, fail: bool) {
        self.fail_connect = fail;
    }

    /// Drop the link as if the peer went away.
    pub fn drop_link(&mut self) {
        if self.connected {
            self.connected = false;
            info!("ELM(sim): link dropped");
            self.events.disconnected();
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Every request received, without the terminator.
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Requests for one command.
    pub fn sent_count(&self, request: &str) -> usize {
        self.sent.iter().filter(|r| *r == request).count()
    }

    fn set_override(&mut self, request: &str, reply: Reply) {
        self.clear(request);
        self.overrides.push((request.to_string(), reply));
    }

    fn reply_for(&self, request: &str) -> Reply {
        if let Some((_, reply)) = self.overrides.iter().find(|(r, _)| r == request) {
            return reply.clone();
        }
        if request.eq_ignore_ascii_case("ATZ") {
            return Reply::Text(IDENTITY.to_string());
        }
        if request.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("AT")) {
            return Reply::Text("OK".to_string());
        }
        match CANNED.iter().find(|(r, _)| *r == request) {
            Some((_, data)) => Reply::Text((*data).to_string()),
            None => Reply::Text("?".to_string()),
        }
    }

    fn deliver(&self, text: &str) {
        let mut wire = String::with_capacity(text.len() + 3);
        wire.push_str(text);
        wire.push_str("\r\r>");
        let bytes = wire.as_bytes();
        if self.chunk_size == 0 {
            self.events.bytes_received(bytes);
        } else {
            for piece in bytes.chunks(self.chunk_size) {
                self.events.bytes_received(piece);
            }
        }
    }
}

impl TransportAdapter for ElmSimulator {
    fn start_scan(&mut self, target: &str, _window_ms: u64) -> Result<(), TransportError> {
        self.scanning = true;
        if advertised_name_matches(self.advertised_name.as_bytes(), target) {
            debug!("ELM(sim): advertising '{}'", self.advertised_name);
            self.events.target_found();
        }
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.scanning = false;
    }

    fn connect(&mut self, _target: &str) -> Result<(), TransportError> {
        if self.fail_connect {
            return Err(TransportError::ConnectFailed);
        }
        self.connected = true;
        info!("ELM(sim): connected");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.drop_link();
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let request = String::from_utf8_lossy(bytes).trim_end_matches('\r').to_string();
        debug!("ELM(sim): <- {}", request);
        let reply = self.reply_for(&request);
        self.sent.push(request);
        if let Reply::Text(text) = reply {
            self.deliver(&text);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
