//! Protocol engine: the hexagonal core.
//!
//! [`Engine`] owns the connection state machine, the frame assembler, the
//! command queue, the telemetry snapshot and the statistics. It exposes one
//! periodic entry point, [`Engine::tick`], which never blocks:
//!
//! ```text
//!  LinkEvents ──drain──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                        │            Engine             │
//!  TransportAdapter ◀────│  FSM · Init · Queue · Stats   │
//!                        └──────────────────────────────┘
//! ```
//!
//! Per tick:
//! 1. Drain every pending [`LinkEvent`] (scan hits, bytes, link loss).
//! 2. Run the current connection state (scan, connect, init, reconnect).
//! 3. In `Connected`, check the request timeout, then run a queue pass.

use log::{debug, info, trace, warn};

use crate::config::{ClientConfig, SCAN_WINDOW_MS};
use crate::error::TransportError;
use crate::events::{LinkEvent, LinkEvents};
use crate::fsm::init_script::{InitAction, InitScript};
use crate::fsm::{ConnectionFsm, ConnectionState};
use crate::obd::channels::{ChannelId, default_channels};
use crate::obd::codec::{FrameAssembler, encode_request};
use crate::obd::queue::{CommandQueue, Outcome};
use crate::telemetry::{Statistics, TelemetryReport, TelemetrySnapshot};

use super::commands::EngineCommand;
use super::events::AppEvent;
use super::ports::{EventSink, TransportAdapter};

/// Scratch space for one encoded init command.
const INIT_BUF_LEN: usize = 16;

// ───────────────────────────────────────────────────────────────
// Engine
// ───────────────────────────────────────────────────────────────

pub struct Engine {
    config: ClientConfig,
    fsm: ConnectionFsm,
    init: InitScript,
    assembler: FrameAssembler,
    queue: CommandQueue,
    snapshot: TelemetrySnapshot,
    stats: Statistics,
    events: LinkEvents,
    /// A scan reported the target; connect on the next tick.
    connect_requested: bool,
    /// A connection attempt failed; rescan on the next tick.
    rescan_pending: bool,
}

impl Engine {
    /// Construct the engine. Does not touch the transport; call
    /// [`start`](Self::start) next.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            fsm: ConnectionFsm::new(),
            init: InitScript::new(),
            assembler: FrameAssembler::new(),
            queue: CommandQueue::new(),
            snapshot: TelemetrySnapshot::default(),
            stats: Statistics::default(),
            events: LinkEvents::new(),
            connect_requested: false,
            rescan_pending: false,
        }
    }

    /// Handle for transport callbacks. Clone it into the adapter when its
    /// callbacks are registered.
    pub fn link_events(&self) -> LinkEvents {
        self.events.clone()
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Begin the first scan.
    pub fn start(&mut self, now_ms: u64, transport: &mut impl TransportAdapter, sink: &mut impl EventSink) {
        info!(
            "Engine starting, target '{}', timeout {} ms",
            self.config.target_identifier, self.config.request_timeout_ms
        );
        sink.emit(&AppEvent::Started(self.fsm.state()));
        self.begin_scan(now_ms, transport, sink);
    }

    /// Inbound byte delivery. Safe to call from the transport's own context.
    pub fn on_bytes_received(&self, bytes: &[u8]) -> bool {
        self.events.bytes_received(bytes)
    }

    // ── Per-tick orchestration ────────────────────────────────

    pub fn tick(&mut self, now_ms: u64, transport: &mut impl TransportAdapter, sink: &mut impl EventSink) {
        // 1. Drain the handoff channel
        while let Some(event) = self.events.try_next() {
            self.on_link_event(event, now_ms, sink);
        }

        // 2. Link dropped without a callback
        if self.fsm.state().is_link_up() && !transport.is_connected() {
            warn!("LINK: transport reports no connection");
            self.link_lost(now_ms, sink);
        }

        // 3. State-specific work
        match self.fsm.state() {
            ConnectionState::Disconnected | ConnectionState::Error => {
                if self.rescan_pending {
                    self.begin_scan(now_ms, transport, sink);
                } else if self.fsm.reconnect_due(
                    now_ms,
                    self.config.auto_reconnect,
                    transport.is_connected(),
                ) {
                    self.stats.record_reconnect_attempt();
                    info!("LINK: reconnect attempt {}", self.stats.reconnect_attempts);
                    sink.emit(&AppEvent::ReconnectAttempt(self.stats.reconnect_attempts));
                    self.begin_scan(now_ms, transport, sink);
                }
            }
            ConnectionState::Scanning => {
                if self.connect_requested {
                    self.connect(now_ms, transport, sink);
                } else if self.fsm.time_in_state(now_ms) > SCAN_WINDOW_MS {
                    debug!("LINK: scan window elapsed, restarting scan");
                    transport.stop_scan();
                    self.restart_scan(now_ms, transport, sink);
                }
            }
            ConnectionState::Connecting => {}
            ConnectionState::Initializing => self.run_init(now_ms, transport, sink),
            ConnectionState::Connected => self.run_queue(now_ms, transport, sink),
        }
    }

    // ── Command handling ──────────────────────────────────────

    pub fn handle_command(
        &mut self,
        cmd: EngineCommand,
        now_ms: u64,
        transport: &mut impl TransportAdapter,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            EngineCommand::StartScan => {
                if self.fsm.state().is_idle() {
                    self.begin_scan(now_ms, transport, sink);
                } else {
                    debug!("StartScan ignored in {}", self.fsm.state());
                }
            }
            EngineCommand::Disconnect => match self.fsm.state() {
                ConnectionState::Scanning => {
                    transport.stop_scan();
                    self.connect_requested = false;
                    self.set_state(ConnectionState::Disconnected, now_ms, sink);
                }
                state if state.is_link_up() => {
                    transport.disconnect();
                    self.link_lost(now_ms, sink);
                }
                _ => {}
            },
            EngineCommand::UpdateConfig(new_config) => match new_config.validate() {
                Ok(()) => {
                    self.config = new_config;
                    info!("Configuration updated at runtime");
                }
                Err(e) => warn!("Configuration rejected: {}", e),
            },
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot
    }

    pub fn statistics(&self) -> Statistics {
        self.stats
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.fsm.state()
    }

    pub fn success_rate(&self) -> f32 {
        self.stats.success_rate()
    }

    /// Length of the current session, 0 while offline.
    pub fn current_uptime(&self, now_ms: u64) -> u64 {
        self.stats
            .current_uptime_ms(now_ms, self.fsm.state().is_link_up())
    }

    /// Index of the channel in flight or next to be sent.
    pub fn queue_index(&self) -> usize {
        self.queue.index()
    }

    pub fn active_channel(&self) -> Option<ChannelId> {
        self.queue.current().map(|d| d.channel)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn report(&self, now_ms: u64) -> TelemetryReport {
        TelemetryReport {
            state: self.fsm.state(),
            time_in_state_ms: self.fsm.time_in_state(now_ms),
            snapshot: self.snapshot,
            statistics: self.stats,
            success_rate: self.stats.success_rate(),
            uptime_ms: self.current_uptime(now_ms),
            data_age_ms: self.snapshot.data_age_ms(now_ms),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn set_state(&mut self, next: ConnectionState, now_ms: u64, sink: &mut impl EventSink) {
        if let Some(from) = self.fsm.transition(next, now_ms) {
            sink.emit(&AppEvent::StateChanged { from, to: next });
        }
    }

    fn on_link_event(&mut self, event: LinkEvent, now_ms: u64, sink: &mut impl EventSink) {
        match event {
            LinkEvent::TargetFound => {
                if self.fsm.state() == ConnectionState::Scanning {
                    info!("LINK: target '{}' found", self.config.target_identifier);
                    self.connect_requested = true;
                }
            }
            LinkEvent::Disconnected => {
                if self.fsm.state().is_link_up() {
                    self.link_lost(now_ms, sink);
                }
            }
            LinkEvent::Bytes(chunk) => {
                if !self.fsm.state().is_link_up() {
                    trace!("LINK: {} bytes while offline, dropped", chunk.len());
                    return;
                }
                let mut next = self.assembler.push(&chunk);
                while let Some(frame) = next {
                    trace!("OBD: frame {:?}", frame.as_str());
                    self.queue.on_frame(frame, now_ms);
                    next = self.assembler.next_frame();
                }
            }
        }
    }

    fn begin_scan(&mut self, now_ms: u64, transport: &mut impl TransportAdapter, sink: &mut impl EventSink) {
        self.rescan_pending = false;
        self.connect_requested = false;
        match transport.start_scan(&self.config.target_identifier, SCAN_WINDOW_MS) {
            Ok(()) => {
                info!("LINK: scanning for '{}'", self.config.target_identifier);
                self.set_state(ConnectionState::Scanning, now_ms, sink);
            }
            Err(e) => self.transport_failed(e, now_ms, sink),
        }
    }

    fn restart_scan(&mut self, now_ms: u64, transport: &mut impl TransportAdapter, sink: &mut impl EventSink) {
        match transport.start_scan(&self.config.target_identifier, SCAN_WINDOW_MS) {
            Ok(()) => self.fsm.reenter(now_ms),
            Err(e) => self.transport_failed(e, now_ms, sink),
        }
    }

    fn connect(&mut self, now_ms: u64, transport: &mut impl TransportAdapter, sink: &mut impl EventSink) {
        self.connect_requested = false;
        transport.stop_scan();
        self.set_state(ConnectionState::Connecting, now_ms, sink);

        match transport.connect(&self.config.target_identifier) {
            Ok(()) => {
                self.set_state(ConnectionState::Connected, now_ms, sink);
                self.stats.session_started(now_ms);
                self.assembler.reset();
                self.queue.reset();
                self.init.start(now_ms);
                self.set_state(ConnectionState::Initializing, now_ms, sink);
            }
            Err(e) => {
                self.transport_failed(e, now_ms, sink);
                self.rescan_pending = true;
            }
        }
    }

    fn transport_failed(&mut self, e: TransportError, now_ms: u64, sink: &mut impl EventSink) {
        warn!("LINK: {}", e);
        sink.emit(&AppEvent::TransportFailed(e));
        match self.fsm.transition(ConnectionState::Error, now_ms) {
            Some(from) => sink.emit(&AppEvent::StateChanged {
                from,
                to: ConnectionState::Error,
            }),
            // Already in Error: restart the reconnect delay.
            None => self.fsm.reenter(now_ms),
        }
    }

    fn link_lost(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        let session_ms = now_ms.saturating_sub(self.stats.last_connect_ms);
        self.stats.session_ended(now_ms);
        self.queue.reset();
        self.assembler.reset();
        self.init.reset();
        self.connect_requested = false;
        warn!("LINK: connection lost after {} ms", session_ms);
        sink.emit(&AppEvent::LinkLost { session_ms });
        self.set_state(ConnectionState::Disconnected, now_ms, sink);
    }

    fn run_init(&mut self, now_ms: u64, transport: &mut impl TransportAdapter, sink: &mut impl EventSink) {
        match self.init.poll(now_ms) {
            InitAction::Wait => {}
            InitAction::Send(command) => {
                let mut buf = [0u8; INIT_BUF_LEN];
                if let Some(len) = encode_request(command, &mut buf) {
                    debug!("OBD: init -> {}", command);
                    if let Err(e) = transport.send(&buf[..len]) {
                        warn!("OBD: init {} failed: {}", command, e);
                    }
                }
            }
            InitAction::Complete => {
                self.queue
                    .populate(&default_channels(self.config.request_timeout_ms));
                self.set_state(ConnectionState::Connected, now_ms, sink);
                info!("OBD: adapter initialized, polling {} channels", self.queue.len());
                sink.emit(&AppEvent::Ready);
            }
        }
    }

    fn run_queue(&mut self, now_ms: u64, transport: &mut impl TransportAdapter, sink: &mut impl EventSink) {
        self.queue.check_timeout(now_ms);
        let step = self
            .queue
            .poll(now_ms, transport, &mut self.stats, &mut self.snapshot);

        match step.resolved {
            Some(Outcome::Decoded {
                channel,
                value,
                rtt_ms,
            }) => sink.emit(&AppEvent::Decoded {
                channel,
                value,
                rtt_ms,
            }),
            Some(Outcome::Failed { channel, error }) => {
                sink.emit(&AppEvent::RequestFailed { channel, error });
            }
            None => {}
        }
        if let Some(channel) = step.sent {
            sink.emit(&AppEvent::RequestSent(channel));
        }
    }
}
