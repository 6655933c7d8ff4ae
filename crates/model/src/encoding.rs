//! Field-key encoding for the external index schema (§6).
//!
//! Every logical field name is URL-encoded (which already turns `.`, `-`,
//! and `*` into `%2E`, `%2D`, `%2A`, since none of them are in
//! `FIELD_KEY_SAFE`), then run through one substitution pass that folds the
//! encoder's literal `+` output to `%20` to match the receiving index's
//! query-string decoding. `:` is left unescaped on purpose — it is legal in
//! field paths and every prefixed property name (`cm:name`,
//! `sys:store-identifier`, ...) contains one.

use percent_encoding::{
    percent_decode_str,
    utf8_percent_encode,
    AsciiSet,
    NON_ALPHANUMERIC,
};

const FIELD_KEY_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b':').remove(b'_').remove(b'~');

/// Encodes a logical field name for storage as an index field key.
///
/// Not a bijection over arbitrary byte strings: a literal `+` in the input
/// and a literal space both encode to `%20`, so `decode(encode(k)) == k`
/// only holds for keys that never contain `+`. No field name produced by
/// the request builder (prefixed property names, the fixed constant field
/// names in §4.6) ever does.
pub fn encode_field_key(key: &str) -> String {
    utf8_percent_encode(key, FIELD_KEY_SAFE).to_string().replace("%2B", "%20")
}

/// Reverses [`encode_field_key`]. Plain percent-decoding: `+` is never
/// treated as a space here, since the encoder never emits a literal `+`.
pub fn decode_field_key(encoded: &str) -> String {
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_colon_in_prefixed_property_name() {
        let encoded = encode_field_key("cm:name");
        assert!(encoded.contains(':'));
        assert_eq!(decode_field_key(&encoded), "cm:name");
    }

    #[test]
    fn escapes_dot_and_hyphen() {
        let encoded = encode_field_key("cm:content.tr-status");
        assert!(!encoded.contains('.'));
        assert!(!encoded.contains('-'));
        assert_eq!(decode_field_key(&encoded), "cm:content.tr-status");
    }

    #[test]
    fn round_trips_constant_field_names() {
        for key in ["METADATA_INDEXING_LAST_UPDATE", "TYPE", "PRIMARY_PARENT", "TAG"] {
            assert_eq!(decode_field_key(&encode_field_key(key)), key);
        }
    }

    #[test]
    fn underscore_and_tilde_survive_unescaped() {
        let encoded = encode_field_key("a_b~c");
        assert_eq!(encoded, "a_b~c");
    }

    #[test]
    fn escapes_asterisk() {
        let encoded = encode_field_key("cm:title*");
        assert_eq!(encoded, "cm:title%2A");
    }

    proptest::proptest! {
        #[test]
        fn round_trips_keys_without_plus(key in "[a-zA-Z0-9_.:-]{0,32}") {
            assert_eq!(decode_field_key(&encode_field_key(&key)), key);
        }
    }
}
