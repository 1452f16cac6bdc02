//! Shared text helpers for the adapter layer.
//!
//! Advertised names and config strings come from untrusted radios and NVS
//! blobs, so they are checked before being compared or persisted.

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E` (space through tilde, inclusive).
pub(crate) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Compare an advertised device name against the configured target.
///
/// Advertisements may pad the name with trailing NULs; those are ignored.
/// Anything else must match byte for byte.
pub(crate) fn advertised_name_matches(advertised: &[u8], target: &str) -> bool {
    let end = advertised
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |i| i + 1);
    !target.is_empty() && &advertised[..end] == target.as_bytes()
}
