//! Mock transport for integration tests.
//!
//! Records every call so tests can assert on the full request history, and
//! exposes the inbound side (`reply`, `drop_link`) so tests decide exactly
//! when bytes and link loss reach the engine.

use obdlink::app::events::AppEvent;
use obdlink::app::ports::{EventSink, TransportAdapter};
use obdlink::app::service::Engine;
use obdlink::config::ClientConfig;
use obdlink::error::TransportError;
use obdlink::events::LinkEvents;
use obdlink::fsm::ConnectionState;

/// Tick spacing used by [`run_until`].
pub const TICK_MS: u64 = 10;

/// Link-up to `Connected`, including the pre-reset delay.
pub const INIT_DURATION_MS: u64 = 3_100;

// ── Transport call record ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    StartScan(String),
    StopScan,
    Connect(String),
    Disconnect,
    Send { at_ms: u64, text: String },
}

// ── MockTransport ─────────────────────────────────────────────

pub struct MockTransport {
    events: LinkEvents,
    pub calls: Vec<TransportCall>,
    pub scan_result: Result<(), TransportError>,
    pub connect_result: Result<(), TransportError>,
    /// Post `TargetFound` when a scan starts.
    pub find_target: bool,
    pub connected: bool,
    /// Timestamp stamped on recorded sends; tests keep it in step.
    pub now_ms: u64,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new(events: LinkEvents) -> Self {
        Self {
            events,
            calls: Vec::new(),
            scan_result: Ok(()),
            connect_result: Ok(()),
            find_target: true,
            connected: false,
            now_ms: 0,
        }
    }

    /// Deliver raw bytes as a notification.
    pub fn reply(&self, bytes: &[u8]) {
        self.events.bytes_received(bytes);
    }

    /// Peer went away.
    pub fn drop_link(&mut self) {
        self.connected = false;
        self.events.disconnected();
    }

    /// Requests sent, terminator stripped.
    pub fn sent(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Send { text, .. } => Some(text.trim_end_matches('\r').to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn send_times(&self) -> Vec<u64> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::Send { at_ms, .. } => Some(*at_ms),
                _ => None,
            })
            .collect()
    }

    pub fn scans(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, TransportCall::StartScan(_)))
            .count()
    }
}

impl TransportAdapter for MockTransport {
    fn start_scan(&mut self, target: &str, _window_ms: u64) -> Result<(), TransportError> {
        self.calls.push(TransportCall::StartScan(target.to_string()));
        self.scan_result?;
        if self.find_target {
            self.events.target_found();
        }
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.calls.push(TransportCall::StopScan);
    }

    fn connect(&mut self, target: &str) -> Result<(), TransportError> {
        self.calls.push(TransportCall::Connect(target.to_string()));
        self.connect_result?;
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.calls.push(TransportCall::Disconnect);
        self.connected = false;
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.calls.push(TransportCall::Send {
            at_ms: self.now_ms,
            text: String::from_utf8_lossy(bytes).into_owned(),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

pub struct Harness {
    pub engine: Engine,
    pub transport: MockTransport,
    pub sink: RecordingSink,
    pub now: u64,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(config: ClientConfig) -> Self {
        let engine = Engine::new(config);
        let transport = MockTransport::new(engine.link_events());
        Self {
            engine,
            transport,
            sink: RecordingSink::new(),
            now: 0,
        }
    }

    pub fn start(&mut self) {
        self.transport.now_ms = self.now;
        self.engine
            .start(self.now, &mut self.transport, &mut self.sink);
    }

    pub fn tick(&mut self) {
        self.transport.now_ms = self.now;
        self.engine
            .tick(self.now, &mut self.transport, &mut self.sink);
    }

    /// Tick every [`TICK_MS`] until `until` (inclusive).
    pub fn run_until(&mut self, until: u64) {
        while self.now < until {
            self.now = (self.now + TICK_MS).min(until);
            self.tick();
        }
    }

    pub fn advance(&mut self, ms: u64) {
        self.run_until(self.now + ms);
    }

    /// Start, connect on the first tick, and run the init script through.
    /// Leaves the engine `Connected` with the first request not yet sent.
    pub fn connected(config: ClientConfig) -> Self {
        let mut h = Self::new(config);
        h.start();
        h.tick();
        h.advance(INIT_DURATION_MS);
        assert_eq!(h.engine.connection_state(), ConnectionState::Connected);
        h
    }

    pub fn state(&self) -> ConnectionState {
        self.engine.connection_state()
    }
}
