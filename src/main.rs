//! OBD link client firmware: main entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                   │
//! │                                                           │
//! │  BleCentral         LogEventSink   NvsAdapter   Clock     │
//! │  (TransportAdapter) (EventSink)    (ConfigPort)           │
//! │                                                           │
//! │  ─────────────── Port Trait Boundary ──────────────────   │
//! │                                                           │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │             Engine (pure protocol logic)            │  │
//! │  │  FSM · Init script · Frame assembler · Queue · Stats│  │
//! │  └─────────────────────────────────────────────────────┘  │
//! │                                                           │
//! │  Cooperative loop: tick · console reports · short sleep   │
//! └───────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use obdlink::adapters::ble_central::BleCentral;
use obdlink::adapters::log_sink::LogEventSink;
use obdlink::adapters::nvs::NvsAdapter;
use obdlink::adapters::time::MonotonicClock;
use obdlink::app::events::AppEvent;
use obdlink::app::ports::{ConfigPort, EventSink};
use obdlink::app::service::Engine;
use obdlink::config::ClientConfig;
use obdlink::scheduler::Interval;

/// Loop period. Short enough that the 100 ms queue throttle stays accurate.
const LOOP_SLEEP_MS: u64 = 10;

fn load_config() -> ClientConfig {
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults", e);
            return ClientConfig::default();
        }
    };
    match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            ClientConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("OBD link client v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let config = load_config();
    log::set_max_level(config.log_level());
    info!(
        "Target '{}', timeout {} ms, auto-reconnect {}",
        config.target_identifier, config.request_timeout_ms, config.auto_reconnect
    );

    // ── 3. Engine + adapters ──────────────────────────────────
    let clock = MonotonicClock::new();
    let mut engine = Engine::new(config.clone());
    let mut ble = BleCentral::new(engine.link_events());
    let mut log_sink = LogEventSink::new();

    let mut display = Interval::new(u64::from(config.display_interval_ms));
    let mut stats = Interval::new(u64::from(config.stats_interval_ms));

    engine.start(clock.now_ms(), &mut ble, &mut log_sink);
    info!("System ready. Entering main loop.");

    // ── 4. Main loop ──────────────────────────────────────────
    loop {
        let now = clock.now_ms();
        engine.tick(now, &mut ble, &mut log_sink);

        if display.ready(now) {
            log_sink.emit(&AppEvent::Telemetry(engine.report(now)));
        }
        if stats.ready(now) {
            log_sink.emit(&AppEvent::Statistics(engine.report(now)));
        }

        std::thread::sleep(Duration::from_millis(LOOP_SLEEP_MS));
    }
}
