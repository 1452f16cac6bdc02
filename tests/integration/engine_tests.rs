//! Integration tests for the Engine → queue → snapshot pipeline.
//!
//! The engine runs against the recording mock transport; the test decides
//! exactly which bytes arrive and when.

use crate::mock_transport::{Harness, INIT_DURATION_MS, TICK_MS as TICK, TransportCall};

use obdlink::app::commands::EngineCommand;
use obdlink::app::events::AppEvent;
use obdlink::config::ClientConfig;
use obdlink::error::{DecodeError, ProtocolError};
use obdlink::fsm::ConnectionState;
use obdlink::obd::channels::ChannelId;

/// Ticks to the next queue pass after the one that sent a request.
const PASS_MS: u64 = 100;

// ── Connection + init script ─────────────────────────────────

#[test]
fn init_script_runs_in_order_with_settle_delays() {
    let mut h = Harness::new(ClientConfig::default());
    h.start();
    h.tick();
    h.advance(INIT_DURATION_MS);

    assert_eq!(h.transport.sent(), ["ATZ", "ATE0", "ATL0", "ATS0", "ATSP0"]);
    assert_eq!(h.transport.send_times(), [500, 2000, 2200, 2400, 2600]);
    assert_eq!(
        h.sink.states(),
        [
            ConnectionState::Scanning,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Initializing,
            ConnectionState::Connected,
        ]
    );
    assert_eq!(h.sink.count(|e| *e == AppEvent::Ready), 1);
    assert!(
        h.transport
            .calls
            .contains(&TransportCall::Connect("OBD2_Simulator_BLE".to_string()))
    );
}

#[test]
fn no_requests_before_init_completes() {
    let mut h = Harness::new(ClientConfig::default());
    h.start();
    h.tick();
    h.advance(INIT_DURATION_MS - TICK);
    assert_eq!(h.state(), ConnectionState::Initializing);
    assert!(h.transport.sent().iter().all(|r| r.starts_with("AT")));
    assert_eq!(h.engine.statistics().total_requests, 0);
}

#[test]
fn first_request_goes_out_after_ready() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(TICK);
    assert_eq!(h.transport.sent().last().map(String::as_str), Some("010C"));
    assert_eq!(h.engine.active_channel(), Some(ChannelId::EngineSpeed));
    assert_eq!(h.engine.queue_index(), 0);
    assert_eq!(h.engine.statistics().total_requests, 1);
}

// ── Responses ─────────────────────────────────────────────────

#[test]
fn response_is_decoded_into_snapshot() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(TICK);
    let sent_at = h.now;

    h.transport.reply(b"41 0C 1A F8\r\r>");
    h.advance(TICK);
    h.run_until(sent_at + PASS_MS);

    let reading = h.engine.snapshot().get(ChannelId::EngineSpeed).unwrap();
    assert_eq!(reading.value, 1726.0);
    assert_eq!(reading.last_update_ms, sent_at + PASS_MS);

    let stats = h.engine.statistics();
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.average_response_ms, TICK);
    assert_eq!(h.engine.queue_index(), 1);
    assert_eq!(h.transport.sent().last().map(String::as_str), Some("010D"));
    assert!(h.sink.events.contains(&AppEvent::Decoded {
        channel: ChannelId::EngineSpeed,
        value: 1726.0,
        rtt_ms: TICK,
    }));
}

#[test]
fn response_split_across_deliveries() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(TICK);
    let sent_at = h.now;

    for piece in [&b"41 0"[..], b"C 1A", b" F8\r", b"\r>"] {
        h.transport.reply(piece);
        h.advance(TICK);
    }
    h.run_until(sent_at + PASS_MS);

    assert_eq!(h.engine.snapshot().value(ChannelId::EngineSpeed), Some(1726.0));
    // Measured when the prompt arrived.
    assert_eq!(h.engine.statistics().average_response_ms, 4 * TICK);
}

#[test]
fn bytes_after_prompt_start_the_next_frame() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(TICK);
    let first = h.now;

    h.transport.reply(b"41 0C 1A F8\r\r>41 0D");
    h.run_until(first + PASS_MS);
    assert_eq!(h.transport.sent().last().map(String::as_str), Some("010D"));

    h.transport.reply(b" 3C\r\r>");
    h.run_until(first + 2 * PASS_MS);
    assert_eq!(h.engine.snapshot().value(ChannelId::VehicleSpeed), Some(60.0));
    assert_eq!(h.engine.statistics().successes, 2);
}

#[test]
fn no_data_is_one_failure_and_polling_moves_on() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(TICK);
    let sent_at = h.now;

    h.transport.reply(b"NO DATA\r\r>");
    h.run_until(sent_at + PASS_MS);

    assert_eq!(h.engine.snapshot().get(ChannelId::EngineSpeed), None);
    assert_eq!(h.engine.statistics().failures, 1);
    assert_eq!(h.engine.queue_index(), 1);
    assert!(h.sink.events.contains(&AppEvent::RequestFailed {
        channel: ChannelId::EngineSpeed,
        error: ProtocolError::NoData,
    }));
}

#[test]
fn malformed_response_keeps_last_good_value() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(TICK);
    let mut pass = h.now;

    // Walk one full cycle with canned answers, then a bad RPM frame.
    let answers: [&[u8]; 8] = [
        b"41 0C 0F A0\r>",
        b"NO DATA\r>",
        b"NO DATA\r>",
        b"NO DATA\r>",
        b"NO DATA\r>",
        b"NO DATA\r>",
        b"NO DATA\r>",
        b"NO DATA\r>",
    ];
    for answer in answers {
        h.transport.reply(answer);
        pass += PASS_MS;
        h.run_until(pass);
    }
    assert_eq!(h.engine.snapshot().value(ChannelId::EngineSpeed), Some(1000.0));
    assert_eq!(h.transport.sent().last().map(String::as_str), Some("010C"));

    h.transport.reply(b"41 0D 1A F8\r>");
    pass += PASS_MS;
    h.run_until(pass);
    assert_eq!(h.engine.snapshot().value(ChannelId::EngineSpeed), Some(1000.0));
    assert!(h.sink.events.contains(&AppEvent::RequestFailed {
        channel: ChannelId::EngineSpeed,
        error: ProtocolError::Decode(DecodeError::HeaderMismatch),
    }));
}

#[test]
fn unsolicited_frame_is_ignored() {
    let mut h = Harness::connected(ClientConfig::default());
    h.transport.reply(b"OK\r\r>");
    h.tick();
    // Dropped before the first request went out on the same tick.
    let stats = h.engine.statistics();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.successes + stats.failures, 0);

    h.advance(TICK);
    h.transport.reply(b"41 0C 1A F8\r>");
    h.advance(PASS_MS - TICK);
    assert_eq!(h.engine.snapshot().value(ChannelId::EngineSpeed), Some(1726.0));
}

#[test]
fn silent_channel_times_out_once() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(TICK);
    let sent_at = h.now;

    // Deadline is strict; the next queue pass after it resolves.
    h.run_until(sent_at + 2_000);
    assert_eq!(h.engine.statistics().failures, 0);
    h.run_until(sent_at + 2_100);

    let stats = h.engine.statistics();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.total_requests, 2);
    assert_eq!(h.engine.queue_index(), 1);
    assert!(h.sink.events.contains(&AppEvent::RequestFailed {
        channel: ChannelId::EngineSpeed,
        error: ProtocolError::Timeout,
    }));
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn disconnect_command_closes_session() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(1_000);
    let now = h.now;
    h.engine.handle_command(
        EngineCommand::Disconnect,
        now,
        &mut h.transport,
        &mut h.sink,
    );

    assert_eq!(h.state(), ConnectionState::Disconnected);
    assert!(h.transport.calls.contains(&TransportCall::Disconnect));
    assert_eq!(h.engine.statistics().cumulative_uptime_ms, now);
    assert_eq!(h.engine.current_uptime(now), 0);
    assert_eq!(h.engine.active_channel(), None);
}

#[test]
fn start_scan_is_ignored_while_connected() {
    let mut h = Harness::connected(ClientConfig::default());
    let scans = h.transport.scans();
    let now = h.now;
    h.engine
        .handle_command(EngineCommand::StartScan, now, &mut h.transport, &mut h.sink);
    assert_eq!(h.transport.scans(), scans);
    assert_eq!(h.state(), ConnectionState::Connected);
}

#[test]
fn new_timeout_applies_from_next_session() {
    let mut h = Harness::connected(ClientConfig::default());
    let mut cfg = ClientConfig::default();
    cfg.request_timeout_ms = 500;
    cfg.auto_reconnect = false;
    let now = h.now;
    h.engine
        .handle_command(EngineCommand::UpdateConfig(cfg), now, &mut h.transport, &mut h.sink);

    // Current session keeps the old deadline.
    h.advance(TICK);
    let sent_at = h.now;
    h.run_until(sent_at + 700);
    assert_eq!(h.engine.statistics().failures, 0);

    h.transport.drop_link();
    h.tick();
    assert_eq!(h.state(), ConnectionState::Disconnected);

    let now = h.now;
    h.engine
        .handle_command(EngineCommand::StartScan, now, &mut h.transport, &mut h.sink);
    h.tick();
    h.advance(INIT_DURATION_MS);
    assert_eq!(h.state(), ConnectionState::Connected);

    let failures = h.engine.statistics().failures;
    h.advance(TICK);
    let sent_at = h.now;
    h.run_until(sent_at + 600);
    assert_eq!(h.engine.statistics().failures, failures + 1);
}

// ── Reports ───────────────────────────────────────────────────

#[test]
fn report_reflects_engine_state() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(TICK);
    let sent_at = h.now;
    h.transport.reply(b"41 0C 1A F8\r>");
    h.run_until(sent_at + PASS_MS);

    let report = h.engine.report(h.now);
    assert_eq!(report.state, ConnectionState::Connected);
    assert_eq!(report.uptime_ms, h.now);
    assert_eq!(report.data_age_ms, Some(0));
    assert_eq!(report.statistics.total_requests, 2);
    // One decoded, one in flight.
    assert_eq!(report.success_rate, 50.0);
}
