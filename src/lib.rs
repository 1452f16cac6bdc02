//! OBD link client library.
//!
//! Exposes the pure-logic modules for integration testing and the
//! simulator. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod fsm;
pub mod obd;
pub mod scheduler;
pub mod telemetry;
