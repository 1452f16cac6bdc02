//! Application core: protocol logic, zero I/O.
//!
//! The [`service::Engine`] drives the connection lifecycle, the command
//! queue and the statistics. All interaction with the radio, console and
//! storage happens through **port traits** defined in [`ports`], keeping
//! this layer testable without a BLE stack.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
