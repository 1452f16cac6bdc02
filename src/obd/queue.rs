//! Round-robin command queue with a single in-flight request.
//!
//! ```text
//!        ┌──────────── poll() every ≥100 ms ─────────────┐
//!        ▼                                               │
//!  in-flight resolved? ──yes──▶ classify ─▶ advance ─▶ clear
//!        │ no                                            │
//!        ▼                                               ▼
//!   (wait for frame or timeout)               idle? ─▶ send queue[index]
//! ```
//!
//! Frames reach the queue through [`CommandQueue::on_frame`] and timeouts
//! through [`CommandQueue::check_timeout`]; both only mark the in-flight
//! request as resolved. Classification, statistics and snapshot writes all
//! happen in [`CommandQueue::poll`], so each request is counted exactly
//! once, as a success or as a failure.

use log::{debug, warn};

use super::channels::{ChannelDescriptor, ChannelId};
use super::codec::{Frame, encode_request};
use crate::app::ports::TransportAdapter;
use crate::config::COMMAND_INTERVAL_MS;
use crate::error::ProtocolError;
use crate::scheduler::Interval;
use crate::telemetry::{Statistics, TelemetrySnapshot};

/// Literal payload the interpreter sends when a PID has no value.
pub const NO_DATA_MARKER: &str = "NO DATA";

/// Shown in logs in place of a frame for a timed-out request.
pub const TIMEOUT_MARKER: &str = "TIMEOUT";

/// Longest request on the wire ("01XX" + CR, or an AT command).
const REQUEST_BUF_LEN: usize = 16;

// ---------------------------------------------------------------------------
// In-flight request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Response {
    Frame { text: Frame, received_at_ms: u64 },
    TimedOut,
}

/// The single outstanding request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightRequest {
    pub queue_index: usize,
    pub sent_at_ms: u64,
    response: Option<Response>,
}

impl InFlightRequest {
    /// `true` until a frame arrives or the request times out.
    pub fn awaiting_response(&self) -> bool {
        self.response.is_none()
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// How a resolved request ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Decoded {
        channel: ChannelId,
        value: f32,
        rtt_ms: u64,
    },
    Failed {
        channel: ChannelId,
        error: ProtocolError,
    },
}

/// What one [`CommandQueue::poll`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PollResult {
    pub resolved: Option<Outcome>,
    pub sent: Option<ChannelId>,
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

pub struct CommandQueue {
    channels: heapless::Vec<ChannelDescriptor, { ChannelId::COUNT }>,
    index: usize,
    in_flight: Option<InFlightRequest>,
    throttle: Interval,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            channels: heapless::Vec::new(),
            index: 0,
            in_flight: None,
            throttle: Interval::new(COMMAND_INTERVAL_MS),
        }
    }

    /// Replace the polling set and start again from the first channel.
    pub fn populate(&mut self, channels: &[ChannelDescriptor]) {
        self.reset();
        for desc in channels.iter().take(ChannelId::COUNT) {
            // Capacity equals the number of channel ids.
            let _ = self.channels.push(*desc);
        }
        debug!("OBD: queue populated with {} channels", self.channels.len());
    }

    /// Empty the queue and drop any in-flight request.
    pub fn reset(&mut self) {
        self.channels.clear();
        self.index = 0;
        self.in_flight = None;
        self.throttle.reset();
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Index of the channel that is (or will next be) in flight.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&ChannelDescriptor> {
        self.channels.get(self.index)
    }

    pub fn in_flight(&self) -> Option<&InFlightRequest> {
        self.in_flight.as_ref()
    }

    /// Attach a frame to the in-flight request.
    ///
    /// Returns `false` (frame discarded) when nothing is awaiting a response.
    pub fn on_frame(&mut self, frame: Frame, now_ms: u64) -> bool {
        match self.in_flight.as_mut() {
            Some(req) if req.response.is_none() => {
                req.response = Some(Response::Frame {
                    text: frame,
                    received_at_ms: now_ms,
                });
                true
            }
            _ => {
                debug!("OBD: discarding unsolicited frame {:?}", frame.as_str());
                false
            }
        }
    }

    /// Mark the in-flight request as timed out once its deadline passes.
    ///
    /// Runs every tick, independent of the poll throttle. Returns `true` on
    /// the tick the timeout fires.
    pub fn check_timeout(&mut self, now_ms: u64) -> bool {
        let Some(req) = self.in_flight.as_mut() else {
            return false;
        };
        if req.response.is_some() {
            return false;
        }
        let Some(desc) = self.channels.get(req.queue_index) else {
            return false;
        };
        let elapsed = now_ms.saturating_sub(req.sent_at_ms);
        if elapsed <= u64::from(desc.timeout_ms) {
            return false;
        }
        warn!(
            "OBD: {} -> {} after {} ms",
            desc.request, TIMEOUT_MARKER, elapsed
        );
        req.response = Some(Response::TimedOut);
        true
    }

    /// One throttled queue pass: resolve the finished request, then send
    /// the next one if the link is idle.
    pub fn poll(
        &mut self,
        now_ms: u64,
        transport: &mut impl TransportAdapter,
        stats: &mut Statistics,
        snapshot: &mut TelemetrySnapshot,
    ) -> PollResult {
        let mut result = PollResult::default();
        if self.channels.is_empty() || !self.throttle.ready(now_ms) {
            return result;
        }

        // 1. Resolve.
        if let Some(req) = self.in_flight.take_if(|r| r.response.is_some()) {
            result.resolved = Some(self.resolve(req, now_ms, stats, snapshot));
            self.index = (self.index + 1) % self.channels.len();
        }

        // 2. Send.
        if self.in_flight.is_none() {
            result.sent = self.send_current(now_ms, transport, stats);
        }

        result
    }

    fn resolve(
        &self,
        req: InFlightRequest,
        now_ms: u64,
        stats: &mut Statistics,
        snapshot: &mut TelemetrySnapshot,
    ) -> Outcome {
        let desc = self.channels[req.queue_index];
        let channel = desc.channel;

        let decoded = match &req.response {
            Some(Response::Frame {
                text,
                received_at_ms,
            }) => classify(&desc, text)
                .map(|value| (value, received_at_ms.saturating_sub(req.sent_at_ms))),
            Some(Response::TimedOut) | None => Err(ProtocolError::Timeout),
        };

        match decoded {
            Ok((value, rtt_ms)) => {
                snapshot.update(channel, value, now_ms);
                stats.record_success(rtt_ms);
                debug!(
                    "OBD: {} = {:.2} {} ({} ms)",
                    channel.name(),
                    value,
                    channel.unit(),
                    rtt_ms
                );
                Outcome::Decoded {
                    channel,
                    value,
                    rtt_ms,
                }
            }
            Err(error) => {
                stats.record_failure();
                debug!("OBD: {} failed: {}", desc.request, error);
                Outcome::Failed { channel, error }
            }
        }
    }

    fn send_current(
        &mut self,
        now_ms: u64,
        transport: &mut impl TransportAdapter,
        stats: &mut Statistics,
    ) -> Option<ChannelId> {
        let desc = *self.channels.get(self.index)?;
        let mut buf = [0u8; REQUEST_BUF_LEN];
        let len = encode_request(desc.request, &mut buf)?;

        // A failed write still counts; the request then times out.
        if let Err(e) = transport.send(&buf[..len]) {
            warn!("OBD: send {} failed: {}", desc.request, e);
        } else {
            debug!("OBD: -> {}", desc.request);
        }

        self.in_flight = Some(InFlightRequest {
            queue_index: self.index,
            sent_at_ms: now_ms,
            response: None,
        });
        stats.record_request();
        Some(desc.channel)
    }
}

/// Map a frame to a value or a protocol failure.
fn classify(desc: &ChannelDescriptor, frame: &str) -> Result<f32, ProtocolError> {
    if frame.is_empty() {
        return Err(ProtocolError::EmptyResponse);
    }
    if frame.starts_with(NO_DATA_MARKER) {
        return Err(ProtocolError::NoData);
    }
    Ok(desc.decode(frame)?)
}
