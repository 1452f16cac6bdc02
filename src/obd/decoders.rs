//! Per-channel response decoders.
//!
//! A mode 01 response echoes the mode (+0x40) and PID, followed by one or
//! two data bytes as ASCII hex:
//!
//! ```text
//!  "41 0C 1A F8"   →  41 | 0C | A=1A | B=F8
//!   │  │
//!   │  └ PID
//!   └ mode 01 + 0x40
//! ```
//!
//! Decoding is pure: it maps frame text to a physical value and never
//! touches telemetry or statistics. The command queue does all writes.
//!
//! | Decoder        | Bytes | Formula            | Min frame | Header checked |
//! |----------------|-------|--------------------|-----------|----------------|
//! | `EngineSpeed`  | A,B   | ((A·256)+B)/4 rpm  | 8         | yes            |
//! | `VehicleSpeed` | A     | A km/h             | 6         | yes            |
//! | `Temperature`  | A     | A − 40 °C          | 6         | yes            |
//! | `Percentage`   | A     | A·100/255 %        | 6         | no             |
//! | `Airflow`      | A,B   | ((A·256)+B)/100 g/s| 8         | yes            |
//!
//! The minimum length applies to the trimmed frame as received, before
//! separator spaces are removed.

use crate::error::DecodeError;

/// Mode 01 responses echo `0x41`.
const RESPONSE_MODE: u8 = 0x41;

/// Hex characters in the echoed mode + PID header.
const HEADER_CHARS: usize = 4;

/// Decoding strategy for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    EngineSpeed,
    VehicleSpeed,
    Temperature,
    Percentage,
    Airflow,
}

impl Decoder {
    /// Shortest acceptable frame, counted before spaces are stripped.
    pub const fn min_len(self) -> usize {
        match self {
            Self::EngineSpeed | Self::Airflow => 8,
            Self::VehicleSpeed | Self::Temperature | Self::Percentage => 6,
        }
    }

    /// Number of data bytes following the header.
    pub const fn data_bytes(self) -> usize {
        match self {
            Self::EngineSpeed | Self::Airflow => 2,
            Self::VehicleSpeed | Self::Temperature | Self::Percentage => 1,
        }
    }

    /// Whether the echoed mode + PID is checked before decoding.
    pub const fn checks_header(self) -> bool {
        !matches!(self, Self::Percentage)
    }

    /// Decode `frame` (trimmed response text) for the channel with `pid`.
    pub fn decode(self, frame: &str, pid: u8) -> Result<f32, DecodeError> {
        if frame.len() < self.min_len() {
            return Err(DecodeError::TooShort);
        }

        let mut compact = heapless::Vec::<u8, { crate::obd::codec::RAW_BUFFER_CAP }>::new();
        for b in frame.bytes().filter(|&b| b != b' ') {
            if compact.push(b).is_err() {
                return Err(DecodeError::InvalidHex);
            }
        }

        if compact.len() < HEADER_CHARS + 2 * self.data_bytes() {
            return Err(DecodeError::TooShort);
        }

        if self.checks_header() {
            let mode = hex_byte(&compact[0..2]).ok_or(DecodeError::HeaderMismatch)?;
            let echoed = hex_byte(&compact[2..4]).ok_or(DecodeError::HeaderMismatch)?;
            if mode != RESPONSE_MODE || echoed != pid {
                return Err(DecodeError::HeaderMismatch);
            }
        }

        let a = hex_byte(&compact[4..6]).ok_or(DecodeError::InvalidHex)?;
        let b = if self.data_bytes() == 2 {
            hex_byte(&compact[6..8]).ok_or(DecodeError::InvalidHex)?
        } else {
            0
        };

        Ok(self.apply(a, b))
    }

    fn apply(self, a: u8, b: u8) -> f32 {
        let word = f32::from(u16::from(a) * 256 + u16::from(b));
        match self {
            Self::EngineSpeed => word / 4.0,
            Self::VehicleSpeed => f32::from(a),
            Self::Temperature => f32::from(a) - 40.0,
            Self::Percentage => f32::from(a) * 100.0 / 255.0,
            Self::Airflow => word / 100.0,
        }
    }
}

/// Parse two ASCII hex digits.
fn hex_byte(pair: &[u8]) -> Option<u8> {
    let hi = char::from(*pair.first()?).to_digit(16)?;
    let lo = char::from(*pair.get(1)?).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}
