//! Binary-safe text codec for payloads crossing the wire.
//!
//! The execution service is driven with `base64_encoded=true`, so every
//! text field (source, stdin, stdout, compiler output) travels as
//! standard base64 over UTF-8. Decoding never fails: output produced by
//! arbitrary programs is not guaranteed to be valid UTF-8, and the
//! service wraps long base64 payloads across lines.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

/// Decoder that accepts both padded and unpadded input.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encode text into its transport-safe representation.
pub fn encode(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Encode optional text. `None` encodes exactly like the empty string.
pub fn encode_optional(text: Option<&str>) -> String {
    encode(text.unwrap_or_default())
}

/// Decode a transport-safe payload back into text, best effort.
///
/// - ASCII whitespace inside the payload is ignored.
/// - Bytes that are not valid UTF-8 are mapped one byte per char
///   (Latin-1), so nothing is lost and nothing panics.
/// - Input that is not base64 at all is returned unchanged.
pub fn decode(encoded: &str) -> String {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if compact.is_empty() {
        return String::new();
    }

    match LENIENT.decode(compact.as_bytes()) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => latin1(e.as_bytes()),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Payload is not valid base64, passing it through");
            encoded.to_string()
        }
    }
}

/// Decode an optional payload. `None` decodes to the empty string.
pub fn decode_optional(encoded: Option<&str>) -> String {
    encoded.map(decode).unwrap_or_default()
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
