//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives the [`Engine`] against a
//! recording mock transport. All tests run on the host with no radio.
//!
//! [`Engine`]: obdlink::app::service::Engine

mod engine_tests;
mod mock_transport;
mod reconnect_tests;
