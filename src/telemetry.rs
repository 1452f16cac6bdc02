//! Telemetry snapshot and request statistics.
//!
//! Both are plain data owned by the [`Engine`](crate::app::service::Engine)
//! and written only by the command queue and the connection lifecycle.
//! External callers get copies.

use serde::Serialize;

use crate::fsm::ConnectionState;
use crate::obd::channels::ChannelId;

// ───────────────────────────────────────────────────────────────
// Snapshot
// ───────────────────────────────────────────────────────────────

/// Last decoded value of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub value: f32,
    /// Engine clock at decode time (ms).
    pub last_update_ms: u64,
}

/// Last-known value per channel. A channel that never decoded is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    readings: [Option<Reading>; ChannelId::COUNT],
}

impl TelemetrySnapshot {
    pub fn get(&self, channel: ChannelId) -> Option<Reading> {
        self.readings[channel.slot()]
    }

    pub fn value(&self, channel: ChannelId) -> Option<f32> {
        self.get(channel).map(|r| r.value)
    }

    pub(crate) fn update(&mut self, channel: ChannelId, value: f32, now_ms: u64) {
        self.readings[channel.slot()] = Some(Reading {
            value,
            last_update_ms: now_ms,
        });
    }

    /// `true` if the channel has no reading or it is older than `max_age_ms`.
    pub fn is_stale(&self, channel: ChannelId, now_ms: u64, max_age_ms: u64) -> bool {
        self.get(channel)
            .is_none_or(|r| now_ms.saturating_sub(r.last_update_ms) > max_age_ms)
    }

    /// Most recent update across all channels.
    pub fn last_update_ms(&self) -> Option<u64> {
        self.readings
            .iter()
            .flatten()
            .map(|r| r.last_update_ms)
            .max()
    }

    /// Age of the freshest reading.
    pub fn data_age_ms(&self, now_ms: u64) -> Option<u64> {
        self.last_update_ms().map(|t| now_ms.saturating_sub(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, Option<Reading>)> + '_ {
        ChannelId::ALL
            .iter()
            .map(|&id| (id, self.readings[id.slot()]))
    }
}

// ───────────────────────────────────────────────────────────────
// Statistics
// ───────────────────────────────────────────────────────────────

/// Request counters, response-time estimate and link uptime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_requests: u32,
    pub successes: u32,
    pub failures: u32,
    /// Exponentially smoothed round-trip time, weight ½ (ms).
    pub average_response_ms: u64,
    /// Connected time of all finished sessions (ms).
    pub cumulative_uptime_ms: u64,
    /// Engine clock when the current session connected (ms).
    pub last_connect_ms: u64,
    pub reconnect_attempts: u32,
}

impl Statistics {
    pub(crate) fn record_request(&mut self) {
        self.total_requests = self.total_requests.saturating_add(1);
    }

    /// The first sample seeds the average; later ones are blended 50/50.
    pub(crate) fn record_success(&mut self, rtt_ms: u64) {
        self.average_response_ms = if self.successes == 0 {
            rtt_ms
        } else {
            (self.average_response_ms + rtt_ms) / 2
        };
        self.successes = self.successes.saturating_add(1);
    }

    pub(crate) fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    pub(crate) fn record_reconnect_attempt(&mut self) {
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
    }

    pub(crate) fn session_started(&mut self, now_ms: u64) {
        self.last_connect_ms = now_ms;
    }

    pub(crate) fn session_ended(&mut self, now_ms: u64) {
        self.cumulative_uptime_ms += now_ms.saturating_sub(self.last_connect_ms);
    }

    /// Percentage of sent requests that decoded; 0 before the first request.
    pub fn success_rate(&self) -> f32 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successes as f32 / self.total_requests as f32 * 100.0
    }

    /// Time since the current session connected, or 0 when offline.
    pub fn current_uptime_ms(&self, now_ms: u64, link_up: bool) -> u64 {
        if link_up {
            now_ms.saturating_sub(self.last_connect_ms)
        } else {
            0
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Report
// ───────────────────────────────────────────────────────────────

/// Point-in-time view for console output and JSON export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryReport {
    pub state: ConnectionState,
    pub time_in_state_ms: u64,
    pub snapshot: TelemetrySnapshot,
    pub statistics: Statistics,
    pub success_rate: f32,
    pub uptime_ms: u64,
    pub data_age_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_response_recurrence() {
        let mut s = Statistics::default();
        s.record_success(100);
        assert_eq!(s.average_response_ms, 100);
        s.record_success(200);
        assert_eq!(s.average_response_ms, 150);
        s.record_success(300);
        assert_eq!(s.average_response_ms, 225);
    }

    #[test]
    fn failures_do_not_touch_average() {
        let mut s = Statistics::default();
        s.record_failure();
        s.record_success(80);
        assert_eq!(s.average_response_ms, 80);
        assert_eq!(s.failures, 1);
    }

    #[test]
    fn success_rate_bounds() {
        let mut s = Statistics::default();
        assert_eq!(s.success_rate(), 0.0);
        s.record_request();
        s.record_success(10);
        s.record_request();
        s.record_success(10);
        assert_eq!(s.success_rate(), 100.0);
        // In flight: not a success yet.
        s.record_request();
        assert!((s.success_rate() - 66.67).abs() < 0.01);
        s.record_failure();
        assert!((s.success_rate() - 66.67).abs() < 0.01);
        s.record_request();
        assert_eq!(s.success_rate(), 50.0);
    }

    #[test]
    fn uptime_accumulates_per_session() {
        let mut s = Statistics::default();
        s.session_started(1_000);
        assert_eq!(s.current_uptime_ms(4_000, true), 3_000);
        assert_eq!(s.current_uptime_ms(4_000, false), 0);
        s.session_ended(4_000);
        s.session_started(10_000);
        s.session_ended(12_500);
        assert_eq!(s.cumulative_uptime_ms, 5_500);
    }

    #[test]
    fn snapshot_update_and_staleness() {
        let mut snap = TelemetrySnapshot::default();
        assert!(snap.is_stale(ChannelId::VehicleSpeed, 0, 1_000));
        assert_eq!(snap.data_age_ms(0), None);

        snap.update(ChannelId::VehicleSpeed, 42.0, 5_000);
        snap.update(ChannelId::EngineLoad, 30.0, 6_000);
        assert_eq!(snap.value(ChannelId::VehicleSpeed), Some(42.0));
        assert!(!snap.is_stale(ChannelId::VehicleSpeed, 5_900, 1_000));
        assert!(snap.is_stale(ChannelId::VehicleSpeed, 6_001, 1_000));
        assert_eq!(snap.last_update_ms(), Some(6_000));
        assert_eq!(snap.data_age_ms(6_250), Some(250));
    }

    #[test]
    fn snapshot_iterates_in_channel_order() {
        let mut snap = TelemetrySnapshot::default();
        snap.update(ChannelId::IntakeAirflow, 5.0, 1);
        let ids: Vec<_> = snap.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ChannelId::ALL.to_vec());
        assert!(snap.iter().last().unwrap().1.is_some());
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let mut snap = TelemetrySnapshot::default();
        snap.update(ChannelId::EngineSpeed, 1726.0, 10);
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("1726"));
        assert!(json.contains("null"));
    }
}
