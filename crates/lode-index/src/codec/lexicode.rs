// ── Order-preserving value bytes ──────────────────────────────
//
// Every encoding here compares bytewise in the same order as the values
// it encodes. Fixed-width numbers flip bits so that negatives sort first;
// variable-length byte strings are escaped and terminated so that no
// encoded value is a prefix of another.

const SIGN_32: u32 = 1 << 31;
const SIGN_64: u64 = 1 << 63;

/// Ends a variable-length value. Sorts below the escaped zero byte and
/// below every other byte, so `"a"` stays ahead of `"a\0"` and `"ab"`.
pub(crate) const TERMINATOR: [u8; 2] = [0x00, 0x00];
const ESCAPED_ZERO: [u8; 2] = [0x00, 0xFF];

pub(crate) fn encode_i32(n: i32) -> [u8; 4] {
    (n.cast_unsigned() ^ SIGN_32).to_be_bytes()
}

pub(crate) fn decode_i32(b: [u8; 4]) -> i32 {
    (u32::from_be_bytes(b) ^ SIGN_32).cast_signed()
}

pub(crate) fn encode_i64(n: i64) -> [u8; 8] {
    (n.cast_unsigned() ^ SIGN_64).to_be_bytes()
}

pub(crate) fn decode_i64(b: [u8; 8]) -> i64 {
    (u64::from_be_bytes(b) ^ SIGN_64).cast_signed()
}

/// Both zeros encode as `+0.0`; they compare equal and must land on the
/// same row.
pub(crate) fn encode_f64(f: f64) -> [u8; 8] {
    let bits = if f == 0.0 { 0 } else { f.to_bits() };
    let mask = if bits & SIGN_64 == 0 { SIGN_64 } else { u64::MAX };
    (bits ^ mask).to_be_bytes()
}

pub(crate) fn decode_f64(b: [u8; 8]) -> f64 {
    let stored = u64::from_be_bytes(b);
    let mask = if stored & SIGN_64 == 0 { u64::MAX } else { SIGN_64 };
    f64::from_bits(stored ^ mask)
}

/// Escape zero bytes and append the terminator. Without the terminator
/// the output is the common prefix of every value starting with `bytes`.
pub(crate) fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>, terminate: bool) {
    for &b in bytes {
        if b == 0 {
            out.extend_from_slice(&ESCAPED_ZERO);
        } else {
            out.push(b);
        }
    }
    if terminate {
        out.extend_from_slice(&TERMINATOR);
    }
}

/// Inverse of [`encode_bytes`] for a terminated value. `None` if the
/// input is not exactly one terminated value.
pub(crate) fn decode_bytes(encoded: &[u8]) -> Option<Vec<u8>> {
    let body = encoded.strip_suffix(&TERMINATOR)?;
    let mut out = Vec::with_capacity(body.len());
    let mut rest = body;
    while let Some((&b, tail)) = rest.split_first() {
        if b == 0 {
            let (&escape, tail) = tail.split_first()?;
            if escape != ESCAPED_ZERO[1] {
                return None;
            }
            out.push(0);
            rest = tail;
        } else {
            out.push(b);
            rest = tail;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminated(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_bytes(bytes, &mut out, true);
        out
    }

    #[test]
    fn integers_sort_bytewise() {
        let values = [i64::MIN, -1_000, -1, 0, 1, 42, i64::MAX];
        let encoded: Vec<_> = values.iter().map(|v| encode_i64(*v)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
        for v in values {
            assert_eq!(decode_i64(encode_i64(v)), v);
        }

        let values = [i32::MIN, -7, 0, 7, i32::MAX];
        let encoded: Vec<_> = values.iter().map(|v| encode_i32(*v)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
        for v in values {
            assert_eq!(decode_i32(encode_i32(v)), v);
        }
    }

    #[test]
    fn floats_sort_bytewise() {
        let values = [f64::NEG_INFINITY, -2.5, -0.1, 0.0, 0.1, 2.5, f64::INFINITY];
        let encoded: Vec<_> = values.iter().map(|v| encode_f64(*v)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
        for v in values {
            assert_eq!(decode_f64(encode_f64(v)), v);
        }
    }

    #[test]
    fn negative_zero_shares_the_zero_row() {
        assert_eq!(encode_f64(-0.0), encode_f64(0.0));
        assert!(encode_f64(-0.0) > encode_f64(-f64::MIN_POSITIVE));
        assert!(decode_f64(encode_f64(-0.0)).is_sign_positive());
    }

    #[test]
    fn terminated_bytes_are_prefix_free() {
        let values: [&[u8]; 6] = [b"", b"a", b"a\0", b"a\0b", b"ab", b"b"];
        let encoded: Vec<_> = values.iter().map(|v| terminated(v)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
        for (i, a) in encoded.iter().enumerate() {
            for b in &encoded[i + 1..] {
                assert!(!b.starts_with(a), "{a:?} is a prefix of {b:?}");
            }
        }
        for v in values {
            assert_eq!(decode_bytes(&terminated(v)).as_deref(), Some(v));
        }
    }

    #[test]
    fn malformed_bytes_are_rejected() {
        assert_eq!(decode_bytes(b"abc"), None);
        assert_eq!(decode_bytes(b"a\x00\x01\x00\x00"), None);
    }
}
