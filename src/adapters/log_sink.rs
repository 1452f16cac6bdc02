//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing the engine's events to the logger
//! (UART / USB-CDC on the device). Periodic reports render the console
//! view: one line per channel, then statistics and the link status. At
//! `debug` level every telemetry report is also dumped as one JSON line.

use std::fmt::Write as _;

use log::{debug, info, log_enabled, warn, Level};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::fsm::ConnectionState;
use crate::obd::channels::ChannelId;
use crate::telemetry::{Reading, TelemetryReport};

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

/// `"Engine RPM     : 1726 rpm"`, or `"--"` without a reading.
pub fn format_reading(channel: ChannelId, reading: Option<Reading>) -> String {
    let mut line = format!("{:<15}: ", channel.name());
    match reading {
        Some(r) => {
            let _ = write!(line, "{:.*} {}", channel.precision(), r.value, channel.unit());
        }
        None => line.push_str("--"),
    }
    line
}

/// Connection status line, with scan duration while scanning.
pub fn status_line(report: &TelemetryReport) -> String {
    match report.state {
        ConnectionState::Scanning => format!(
            "status={} ({} s)",
            report.state,
            report.time_in_state_ms / 1000
        ),
        ConnectionState::Connected | ConnectionState::Initializing => format!(
            "status={} uptime={} s",
            report.state,
            report.uptime_ms / 1000
        ),
        state => format!("status={}", state),
    }
}

fn log_telemetry(report: &TelemetryReport) {
    info!("TELEM | {}", status_line(report));
    for (channel, reading) in report.snapshot.iter() {
        info!("TELEM | {}", format_reading(channel, reading));
    }
    match report.data_age_ms {
        Some(age) => info!("TELEM | data age {} ms", age),
        None => info!("TELEM | no data yet"),
    }

    if log_enabled!(Level::Debug) {
        match serde_json::to_string(report) {
            Ok(json) => debug!("TELEM | json {}", json),
            Err(e) => warn!("TELEM | json export failed: {}", e),
        }
    }
}

fn log_statistics(report: &TelemetryReport) {
    let s = &report.statistics;
    info!(
        "STATS | requests={} ok={} failed={} success={:.1}% avg_rtt={} ms",
        s.total_requests, s.successes, s.failures, report.success_rate, s.average_response_ms
    );
    info!(
        "STATS | uptime={} s total={} s reconnects={} | {}",
        report.uptime_ms / 1000,
        (s.cumulative_uptime_ms + report.uptime_ms) / 1000,
        s.reconnect_attempts,
        status_line(report)
    );
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => info!("START | initial_state={}", state),
            AppEvent::StateChanged { from, to } => info!("STATE | {} -> {}", from, to),
            AppEvent::ReconnectAttempt(n) => info!("LINK | reconnect attempt {}", n),
            AppEvent::TransportFailed(e) => warn!("LINK | {}", e),
            AppEvent::LinkLost { session_ms } => {
                warn!("LINK | lost after {} s", session_ms / 1000);
            }
            AppEvent::Ready => info!("OBD | adapter ready, polling"),
            AppEvent::RequestSent(channel) => debug!("OBD | -> {}", channel.request()),
            AppEvent::Decoded {
                channel,
                value,
                rtt_ms,
            } => debug!(
                "OBD | {} = {:.*} {} ({} ms)",
                channel.name(),
                channel.precision(),
                value,
                channel.unit(),
                rtt_ms
            ),
            AppEvent::RequestFailed { channel, error } => {
                debug!("OBD | {} failed: {}", channel.name(), error);
            }
            AppEvent::Telemetry(report) => log_telemetry(report),
            AppEvent::Statistics(report) => log_statistics(report),
        }
    }
}
