//! Base32 codec for addresses and transaction ids.
//!
//! RFC 4648 alphabet without padding.

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Reverse lookup table: ASCII byte → 5-bit value (0xFF = invalid).
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let alpha = BASE32_ALPHABET;
    let mut i = 0;
    while i < 32 {
        table[alpha[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// Encode bytes as unpadded RFC 4648 base32.
pub fn base32_encode(bytes: &[u8]) -> String {
    let num_chars = (bytes.len() * 8).div_ceil(5);
    let mut result = String::with_capacity(num_chars);

    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | byte as u64;
        bits_in_buffer += 8;
        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let idx = ((buffer >> bits_in_buffer) & 0x1F) as usize;
            result.push(BASE32_ALPHABET[idx] as char);
        }
    }
    // Remaining bits, padded with zeros on the right.
    if bits_in_buffer > 0 {
        let idx = ((buffer << (5 - bits_in_buffer)) & 0x1F) as usize;
        result.push(BASE32_ALPHABET[idx] as char);
    }

    result
}

/// Decode unpadded base32 into exactly `N` bytes. Returns `None` on invalid
/// characters, wrong length, or non-zero trailing bits.
pub fn base32_decode_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    if s.len() != (N * 8).div_ceil(5) {
        return None;
    }

    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;
    let mut result = [0u8; N];
    let mut pos = 0;

    for c in s.bytes() {
        if c >= 128 {
            return None;
        }
        let val = BASE32_DECODE[c as usize];
        if val == 0xFF {
            return None;
        }
        buffer = (buffer << 5) | val as u64;
        bits_in_buffer += 5;
        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            result[pos] = (buffer >> bits_in_buffer) as u8;
            pos += 1;
        }
    }

    // Leftover padding bits must be zero for a canonical encoding.
    if buffer & ((1 << bits_in_buffer) - 1) != 0 {
        return None;
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base32_rfc4648_vectors() {
        assert_eq!(base32_encode(b""), "");
        assert_eq!(base32_encode(b"f"), "MY");
        assert_eq!(base32_encode(b"fo"), "MZXQ");
        assert_eq!(base32_encode(b"foo"), "MZXW6");
        assert_eq!(base32_encode(b"foob"), "MZXW6YQ");
        assert_eq!(base32_encode(b"fooba"), "MZXW6YTB");
        assert_eq!(base32_encode(b"foobar"), "MZXW6YTBOI");
    }

    #[test]
    fn base32_fixed_decode() {
        assert_eq!(base32_decode_fixed::<6>("MZXW6YTBOI"), Some(*b"foobar"));
        assert_eq!(base32_decode_fixed::<5>("MZXW6YTB"), Some(*b"fooba"));
    }

    #[test]
    fn base32_rejects_bad_input() {
        assert_eq!(base32_decode_fixed::<3>("MZXW"), None);
        assert_eq!(base32_decode_fixed::<3>("mzxw6"), None);
        assert_eq!(base32_decode_fixed::<3>("MZXW1"), None);
        // "MZXW7" differs from "MZXW6" only in the trailing padding bit.
        assert_eq!(base32_decode_fixed::<3>("MZXW7"), None);
    }
}
