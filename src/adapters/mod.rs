//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                    |
//! |----------------|--------------------|--------------------------------|
//! | `ble_central`  | TransportAdapter   | Bluedroid GATT client (NUS)    |
//! | `elm_sim`      | TransportAdapter   | In-process ELM327 simulator    |
//! | `log_sink`     | EventSink          | Serial log output              |
//! | `nvs`          | ConfigPort         | NVS / in-memory store          |
//! | `time`         |                    | ESP32 system timer / `Instant` |

pub mod ble_central;
pub mod elm_sim;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub(crate) mod utils;
