//! ELM327-style request/response protocol.
//!
//! ```text
//!  bytes ──▶ codec::FrameAssembler ──frame──▶ queue::CommandQueue
//!                                                 │  decoders::Decoder
//!                                                 ▼
//!                                  TelemetrySnapshot · Statistics
//! ```

pub mod channels;
pub mod codec;
pub mod decoders;
pub mod queue;
