//! Prompt-delimited frame codec.
//!
//! Wire format (ELM327-style interpreter):
//! ```text
//! request:   "010C" '\r'
//! response:  "41 0C 1A F8" '\r' '\r' '>'
//!            └──── frame ────┘        └ prompt (terminator)
//! ```
//!
//! BLE notifications arrive in arbitrary slices: a single delivery may
//! hold part of a response, a whole one, or the tail of one response and
//! the head of the next. [`FrameAssembler`] accumulates bytes and yields
//! one trimmed frame per prompt. Bytes after a prompt stay buffered as the
//! start of the next frame.

use log::{trace, warn};

/// Response terminator sent by the interpreter when it is ready again.
pub const PROMPT: u8 = b'>';

/// Terminator appended to every request.
pub const REQUEST_TERMINATOR: u8 = b'\r';

/// Raw buffer capacity. ELM327 replies for single-frame PIDs are tiny;
/// anything this long without a prompt is garbage.
pub const RAW_BUFFER_CAP: usize = 256;

/// One complete, whitespace-trimmed response.
pub type Frame = heapless::String<RAW_BUFFER_CAP>;

/// Streaming frame assembler (the "RawBuffer").
pub struct FrameAssembler {
    buf: heapless::Vec<u8, RAW_BUFFER_CAP>,
    overflows: u32,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub const fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            overflows: 0,
        }
    }

    /// Append `data` and return the first complete frame, if any.
    ///
    /// Further frames already buffered are available through
    /// [`next_frame`](Self::next_frame).
    pub fn push(&mut self, data: &[u8]) -> Option<Frame> {
        for &byte in data {
            if self.buf.push(byte).is_err() {
                self.overflows = self.overflows.saturating_add(1);
                warn!(
                    "OBD: {} bytes without prompt, discarding buffer",
                    RAW_BUFFER_CAP
                );
                self.buf.clear();
                // Cannot fail: the buffer was just emptied.
                let _ = self.buf.push(byte);
            }
        }
        trace!(
            "OBD: rx {:?} (buffer {:?})",
            String::from_utf8_lossy(data),
            String::from_utf8_lossy(&self.buf)
        );
        self.next_frame()
    }

    /// Extract the next prompt-terminated frame from the buffer.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let pos = self.buf.iter().position(|&b| b == PROMPT)?;

        let mut frame = Frame::new();
        for &b in self.buf[..pos].trim_ascii() {
            let c = if b.is_ascii() { b as char } else { '?' };
            // Frame and buffer share a capacity; cannot overflow.
            let _ = frame.push(c);
        }

        let rest = self.buf.len() - (pos + 1);
        self.buf.copy_within(pos + 1.., 0);
        self.buf.truncate(rest);

        Some(frame)
    }

    /// Drop any partial response (e.g. after a disconnect).
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Bytes currently waiting for a prompt.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Times the buffer filled up without a prompt.
    pub fn overflow_count(&self) -> u32 {
        self.overflows
    }
}

/// Encode a request into `out_buf` as `command` + CR.
///
/// Returns the number of bytes written, or `None` if `out_buf` is too small.
pub fn encode_request(command: &str, out_buf: &mut [u8]) -> Option<usize> {
    let total = command.len() + 1;
    if total > out_buf.len() {
        return None;
    }
    out_buf[..command.len()].copy_from_slice(command.as_bytes());
    out_buf[command.len()] = REQUEST_TERMINATOR;
    Some(total)
}
