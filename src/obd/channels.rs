//! The eight telemetry channels polled round-robin.
//!
//! | Channel            | Request | Decoder        | Unit  |
//! |--------------------|---------|----------------|-------|
//! | engine speed       | `010C`  | `EngineSpeed`  | rpm   |
//! | vehicle speed      | `010D`  | `VehicleSpeed` | km/h  |
//! | coolant temp       | `0105`  | `Temperature`  | °C    |
//! | oil temp           | `015C`  | `Temperature`  | °C    |
//! | fuel level         | `012F`  | `Percentage`   | %     |
//! | throttle position  | `0111`  | `Percentage`   | %     |
//! | engine load        | `0104`  | `Percentage`   | %     |
//! | intake airflow     | `0110`  | `Airflow`      | g/s   |

use serde::Serialize;

use super::decoders::Decoder;
use crate::error::DecodeError;

/// Identity of one telemetry channel. Doubles as the snapshot slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum ChannelId {
    EngineSpeed = 0,
    VehicleSpeed = 1,
    CoolantTemp = 2,
    OilTemp = 3,
    FuelLevel = 4,
    ThrottlePosition = 5,
    EngineLoad = 6,
    IntakeAirflow = 7,
}

impl ChannelId {
    /// Number of channels, used to size the snapshot and the queue.
    pub const COUNT: usize = 8;

    /// Polling order.
    pub const ALL: [ChannelId; Self::COUNT] = [
        Self::EngineSpeed,
        Self::VehicleSpeed,
        Self::CoolantTemp,
        Self::OilTemp,
        Self::FuelLevel,
        Self::ThrottlePosition,
        Self::EngineLoad,
        Self::IntakeAirflow,
    ];

    /// Snapshot slot.
    pub const fn slot(self) -> usize {
        self as usize
    }

    /// Mode 01 PID.
    pub const fn pid(self) -> u8 {
        match self {
            Self::EngineSpeed => 0x0C,
            Self::VehicleSpeed => 0x0D,
            Self::CoolantTemp => 0x05,
            Self::OilTemp => 0x5C,
            Self::FuelLevel => 0x2F,
            Self::ThrottlePosition => 0x11,
            Self::EngineLoad => 0x04,
            Self::IntakeAirflow => 0x10,
        }
    }

    /// Request text, without the terminator.
    pub const fn request(self) -> &'static str {
        match self {
            Self::EngineSpeed => "010C",
            Self::VehicleSpeed => "010D",
            Self::CoolantTemp => "0105",
            Self::OilTemp => "015C",
            Self::FuelLevel => "012F",
            Self::ThrottlePosition => "0111",
            Self::EngineLoad => "0104",
            Self::IntakeAirflow => "0110",
        }
    }

    pub const fn decoder(self) -> Decoder {
        match self {
            Self::EngineSpeed => Decoder::EngineSpeed,
            Self::VehicleSpeed => Decoder::VehicleSpeed,
            Self::CoolantTemp | Self::OilTemp => Decoder::Temperature,
            Self::FuelLevel | Self::ThrottlePosition | Self::EngineLoad => Decoder::Percentage,
            Self::IntakeAirflow => Decoder::Airflow,
        }
    }

    /// Human-readable label for console output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::EngineSpeed => "Engine RPM",
            Self::VehicleSpeed => "Vehicle Speed",
            Self::CoolantTemp => "Coolant Temp",
            Self::OilTemp => "Oil Temp",
            Self::FuelLevel => "Fuel Level",
            Self::ThrottlePosition => "Throttle",
            Self::EngineLoad => "Engine Load",
            Self::IntakeAirflow => "Intake Airflow",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::EngineSpeed => "rpm",
            Self::VehicleSpeed => "km/h",
            Self::CoolantTemp | Self::OilTemp => "°C",
            Self::FuelLevel | Self::ThrottlePosition | Self::EngineLoad => "%",
            Self::IntakeAirflow => "g/s",
        }
    }

    /// Decimal places shown on the console.
    pub const fn precision(self) -> usize {
        match self {
            Self::EngineSpeed | Self::VehicleSpeed | Self::CoolantTemp | Self::OilTemp => 0,
            Self::FuelLevel | Self::ThrottlePosition | Self::EngineLoad => 1,
            Self::IntakeAirflow => 2,
        }
    }

    /// Reverse lookup from the snapshot slot.
    pub fn from_slot(slot: usize) -> Option<Self> {
        Self::ALL.get(slot).copied()
    }
}

/// One entry of the command queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub request: &'static str,
    pub decoder: Decoder,
    pub timeout_ms: u32,
    pub channel: ChannelId,
}

impl ChannelDescriptor {
    pub const fn new(channel: ChannelId, timeout_ms: u32) -> Self {
        Self {
            request: channel.request(),
            decoder: channel.decoder(),
            timeout_ms,
            channel,
        }
    }

    /// Run this channel's decoder on a trimmed frame.
    pub fn decode(&self, frame: &str) -> Result<f32, DecodeError> {
        self.decoder.decode(frame, self.channel.pid())
    }
}

/// The full polling set, in order, with a common response timeout.
pub fn default_channels(timeout_ms: u32) -> [ChannelDescriptor; ChannelId::COUNT] {
    ChannelId::ALL.map(|id| ChannelDescriptor::new(id, timeout_ms))
}
