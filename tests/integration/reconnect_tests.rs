//! Integration tests for link loss, retries and the scan window.

use crate::mock_transport::{Harness, INIT_DURATION_MS, TransportCall};

use obdlink::app::events::AppEvent;
use obdlink::config::{ClientConfig, RECONNECT_DELAY_MS, SCAN_WINDOW_MS};
use obdlink::error::TransportError;
use obdlink::fsm::ConnectionState;

// ── Link loss ─────────────────────────────────────────────────

#[test]
fn link_loss_rescans_after_strict_delay() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(5_000);
    let lost_at = h.now;
    h.transport.drop_link();
    h.tick();

    assert_eq!(h.state(), ConnectionState::Disconnected);
    assert!(h.sink.events.contains(&AppEvent::LinkLost { session_ms: lost_at }));
    assert_eq!(h.engine.statistics().cumulative_uptime_ms, lost_at);

    h.now = lost_at + RECONNECT_DELAY_MS;
    h.tick();
    assert_eq!(h.state(), ConnectionState::Disconnected);

    h.now += 1;
    h.tick();
    assert_eq!(h.state(), ConnectionState::Scanning);
    assert_eq!(h.engine.statistics().reconnect_attempts, 1);
    assert!(h.sink.events.contains(&AppEvent::ReconnectAttempt(1)));

    // Found again on the next tick, then a fresh init. Ticks no longer
    // land on the init deadlines, so allow one queue pass of slack.
    h.tick();
    h.advance(INIT_DURATION_MS + 100);
    assert_eq!(h.state(), ConnectionState::Connected);
}

#[test]
fn link_loss_with_request_in_flight_lowers_success_rate() {
    let mut h = Harness::connected(ClientConfig::default());

    for session in 1..=2u32 {
        // Sent, never answered.
        h.advance(10);
        assert_eq!(h.transport.sent().last().map(String::as_str), Some("010C"));
        let lost_at = h.now;
        h.transport.drop_link();
        h.tick();
        assert_eq!(h.state(), ConnectionState::Disconnected);

        let stats = h.engine.statistics();
        assert_eq!(stats.total_requests, session);
        assert_eq!(stats.successes, 0);
        assert_eq!(stats.failures, 0);
        assert_eq!(h.engine.success_rate(), 0.0);

        h.now = lost_at + RECONNECT_DELAY_MS + 1;
        h.tick();
        h.tick();
        h.advance(INIT_DURATION_MS + 100);
        assert_eq!(h.state(), ConnectionState::Connected);
    }
}

#[test]
fn no_rescan_without_auto_reconnect() {
    let mut cfg = ClientConfig::default();
    cfg.auto_reconnect = false;
    let mut h = Harness::connected(cfg);
    h.transport.drop_link();
    h.tick();
    let scans = h.transport.scans();

    h.advance(60_000);
    assert_eq!(h.state(), ConnectionState::Disconnected);
    assert_eq!(h.transport.scans(), scans);
    assert_eq!(h.engine.statistics().reconnect_attempts, 0);
}

#[test]
fn uptime_accumulates_across_sessions() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(900);
    let first = h.now;
    h.transport.drop_link();
    h.tick();

    h.advance(RECONNECT_DELAY_MS + 10);
    h.tick();
    let reconnected_at = h.now;
    h.advance(INIT_DURATION_MS);

    assert_eq!(h.engine.current_uptime(h.now), h.now - reconnected_at);
    assert_eq!(h.engine.statistics().cumulative_uptime_ms, first);
}

#[test]
fn silent_link_loss_is_detected() {
    let mut h = Harness::connected(ClientConfig::default());
    h.transport.connected = false;
    h.tick();
    assert_eq!(h.state(), ConnectionState::Disconnected);
    assert_eq!(h.sink.count(|e| matches!(e, AppEvent::LinkLost { .. })), 1);
}

#[test]
fn duplicate_disconnect_is_ignored() {
    let mut h = Harness::connected(ClientConfig::default());
    h.transport.drop_link();
    h.transport.drop_link();
    h.tick();
    assert_eq!(h.sink.count(|e| matches!(e, AppEvent::LinkLost { .. })), 1);
}

#[test]
fn bytes_after_link_loss_are_dropped() {
    let mut h = Harness::connected(ClientConfig::default());
    h.advance(10);
    h.transport.drop_link();
    h.transport.reply(b"41 0C 1A F8\r>");
    h.tick();
    assert_eq!(h.engine.snapshot().last_update_ms(), None);
    assert_eq!(h.engine.statistics().successes, 0);
}

// ── Failures ──────────────────────────────────────────────────

#[test]
fn connect_failure_rescans_without_counting_attempt() {
    let mut h = Harness::new(ClientConfig::default());
    h.transport.connect_result = Err(TransportError::ServiceNotFound);
    h.start();
    h.tick();

    assert_eq!(h.state(), ConnectionState::Error);
    assert!(
        h.sink
            .events
            .contains(&AppEvent::TransportFailed(TransportError::ServiceNotFound))
    );

    h.advance(10);
    assert_eq!(h.state(), ConnectionState::Scanning);
    assert_eq!(h.transport.scans(), 2);
    assert_eq!(h.engine.statistics().reconnect_attempts, 0);

    h.transport.connect_result = Ok(());
    h.advance(10);
    h.advance(INIT_DURATION_MS);
    assert_eq!(h.state(), ConnectionState::Connected);
}

#[test]
fn scan_failure_waits_for_reconnect_delay() {
    let mut h = Harness::new(ClientConfig::default());
    h.transport.scan_result = Err(TransportError::ScanFailed);
    h.start();
    assert_eq!(h.state(), ConnectionState::Error);

    h.run_until(RECONNECT_DELAY_MS);
    assert_eq!(h.transport.scans(), 1);

    h.transport.scan_result = Ok(());
    h.advance(10);
    assert_eq!(h.state(), ConnectionState::Scanning);
    assert_eq!(h.engine.statistics().reconnect_attempts, 1);
}

// ── Scan window ───────────────────────────────────────────────

#[test]
fn scan_restarts_after_window() {
    let mut h = Harness::new(ClientConfig::default());
    h.transport.find_target = false;
    h.start();

    h.run_until(SCAN_WINDOW_MS);
    assert_eq!(h.transport.scans(), 1);

    h.advance(10);
    assert_eq!(h.transport.scans(), 2);
    assert!(h.transport.calls.contains(&TransportCall::StopScan));
    assert_eq!(h.state(), ConnectionState::Scanning);
    assert_eq!(h.engine.statistics().reconnect_attempts, 0);
}

#[test]
fn target_found_outside_scan_is_ignored() {
    let mut h = Harness::new(ClientConfig::default());
    h.transport.scan_result = Err(TransportError::ScanFailed);
    h.start();
    h.engine.link_events().target_found();
    h.tick();
    assert_eq!(h.state(), ConnectionState::Error);
    assert!(
        !h.transport
            .calls
            .iter()
            .any(|c| matches!(c, TransportCall::Connect(_)))
    );
}
