//! Request path encoding for the upstream leg.
//!
//! The path that reaches the proxy is percent-decoded, then re-encoded with a
//! form-style policy:
//! - unreserved characters (`A-Z a-z 0-9 - _ . ~`) and the `/` separator are
//!   kept as they are, `~` included
//! - space becomes `+`
//! - every other byte, UTF-8 continuation bytes included, becomes `%XX`
//!
//! A literal `+` therefore goes out as `%2B`.

use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes escaped in an outbound path. Space is handled separately.
const PATH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Encode a decoded path (arbitrary bytes) for the upstream request.
pub fn encode_path_bytes(path: &[u8]) -> String {
    let mut out = String::with_capacity(path.len());
    for (i, segment) in path.split(|b| *b == b' ').enumerate() {
        if i > 0 {
            out.push('+');
        }
        out.extend(percent_encode(segment, PATH_ENCODE_SET));
    }
    out
}

/// Encode a decoded path for the upstream request.
pub fn encode_path(path: &str) -> String {
    encode_path_bytes(path.as_bytes())
}

/// Re-encode a path exactly as received on the wire (percent-encoded).
pub fn reencode_wire_path(wire_path: &str) -> String {
    let decoded: Vec<u8> = percent_decode_str(wire_path).collect();
    encode_path_bytes(&decoded)
}
