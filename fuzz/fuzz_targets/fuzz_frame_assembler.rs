//! Fuzz target: `FrameAssembler::push`
//!
//! Splits arbitrary bytes into deliveries (first byte picks the chunk
//! size) and asserts the assembler never panics, never yields a frame with
//! surrounding whitespace or a prompt, and never buffers past capacity.
//!
//! cargo fuzz run fuzz_frame_assembler

#![no_main]

use libfuzzer_sys::fuzz_target;
use obdlink::obd::codec::{FrameAssembler, PROMPT, RAW_BUFFER_CAP};

fuzz_target!(|data: &[u8]| {
    let Some((&size, stream)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(size).max(1);
    let mut fa = FrameAssembler::new();

    for piece in stream.chunks(chunk) {
        let mut next = fa.push(piece);
        while let Some(frame) = next {
            assert!(!frame.as_bytes().contains(&PROMPT));
            assert_eq!(frame.as_str(), frame.as_str().trim_ascii());
            next = fa.next_frame();
        }
        assert!(fa.buffered().len() <= RAW_BUFFER_CAP);
        assert!(!fa.buffered().contains(&PROMPT));
    }

    fa.reset();
    assert!(fa.buffered().is_empty());
});
