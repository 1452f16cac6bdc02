//! Fuzz target: channel decoders
//!
//! Feeds arbitrary text to every channel's decoder. Decoding must never
//! panic, and every accepted value must be finite and inside the range the
//! channel's formula can produce.
//!
//! cargo fuzz run fuzz_decoders

#![no_main]

use libfuzzer_sys::fuzz_target;
use obdlink::obd::channels::{ChannelId, default_channels};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    for desc in default_channels(2_000) {
        if let Ok(value) = desc.decode(text) {
            assert!(value.is_finite());
            let (lo, hi) = match desc.channel {
                ChannelId::EngineSpeed => (0.0, 16_383.75),
                ChannelId::VehicleSpeed => (0.0, 255.0),
                ChannelId::CoolantTemp | ChannelId::OilTemp => (-40.0, 215.0),
                ChannelId::IntakeAirflow => (0.0, 655.35),
                _ => (0.0, 100.0),
            };
            assert!((lo..=hi).contains(&value), "{:?} = {}", desc.channel, value);
        }
    }
});
