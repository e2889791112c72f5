//! Identifier normalization and the semantic fallback hash.

/// Width of the base-36 hash suffix.
pub const HASH_WIDTH: usize = 6;

/// Lower-cases and collapses every run of non-alphanumeric characters into a
/// single `-`, trimming leading and trailing dashes.
pub fn normalize(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }
    out
}

/// djb2 over UTF-16 code units, wrapping at 32 bits.
pub fn djb2(input: &str) -> u32 {
    input
        .encode_utf16()
        .fold(5381u32, |hash, unit| {
            hash.wrapping_mul(33).wrapping_add(u32::from(unit))
        })
}

pub fn base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(7);
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

/// Six-character base-36 digest: zero-padded, keeping the low-order digits.
pub fn short_hash(input: &str) -> String {
    let encoded = base36(djb2(input));
    if encoded.len() >= HASH_WIDTH {
        encoded[encoded.len() - HASH_WIDTH..].to_string()
    } else {
        format!("{encoded:0>width$}", width = HASH_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_runs() {
        assert_eq!(normalize("Submit Order!!"), "submit-order");
        assert_eq!(normalize("  --Email   address-- "), "email-address");
        assert_eq!(normalize("user_name.v2"), "user-name-v2");
        assert_eq!(normalize("***"), "");
    }

    #[test]
    fn djb2_matches_reference_values() {
        assert_eq!(djb2(""), 5381);
        // 5381 * 33 + 'a'(97)
        assert_eq!(djb2("a"), 177_670);
    }

    #[test]
    fn base36_round_trips_known_values() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(u32::MAX), "1z141z3");
    }

    #[test]
    fn short_hash_is_fixed_width() {
        assert_eq!(short_hash("").len(), HASH_WIDTH);
        assert_eq!(short_hash("div|card|hello|3").len(), HASH_WIDTH);
        assert_eq!(short_hash("x"), short_hash("x"));
    }
}
