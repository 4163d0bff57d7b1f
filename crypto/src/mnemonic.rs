//! 25-word recovery phrases.
//!
//! The 32-byte Ed25519 seed is split into little-endian 11-bit groups
//! (24 words, the last carrying 3 bits of padding) over the BIP-39 English
//! word list. A 25th checksum word is the first 11-bit group of
//! SHA-512/256(seed)[0..2].
//!
//! Entropy always comes from the local CSPRNG. Nothing in this module talks
//! to the network.

use bip39::Language;
use biopay_types::KeyPair;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::hash::sha512_256;
use crate::keys::keypair_from_seed;

/// Number of words in a recovery phrase.
pub const MNEMONIC_WORDS: usize = 25;

const SEED_LEN: usize = 32;
const DATA_WORDS: usize = MNEMONIC_WORDS - 1;

/// Errors arising from mnemonic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MnemonicError {
    #[error("expected {MNEMONIC_WORDS} words, got {0}")]
    WrongWordCount(usize),

    #[error("unknown word at position {position}")]
    UnknownWord { position: usize },

    #[error("phrase does not decode to a 32-byte key")]
    InvalidPadding,

    #[error("checksum word does not match")]
    ChecksumMismatch,
}

fn word_list() -> &'static [&'static str; 2048] {
    Language::English.word_list()
}

fn to_u11(bytes: &[u8]) -> Vec<u16> {
    let mut out = Vec::with_capacity((bytes.len() * 8).div_ceil(11));
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in bytes {
        buffer |= (byte as u32) << bits;
        bits += 8;
        if bits >= 11 {
            out.push((buffer & 0x7FF) as u16);
            buffer >>= 11;
            bits -= 11;
        }
    }
    if bits != 0 {
        out.push((buffer & 0x7FF) as u16);
    }
    out
}

fn from_u11(words: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity((words.len() * 11).div_ceil(8));
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &word in words {
        buffer |= (word as u32) << bits;
        bits += 11;
        while bits >= 8 {
            out.push((buffer & 0xFF) as u8);
            buffer >>= 8;
            bits -= 8;
        }
    }
    if bits != 0 {
        out.push((buffer & 0xFF) as u8);
    }
    out
}

fn checksum_word(seed: &[u8; SEED_LEN]) -> u16 {
    let hash = sha512_256(seed);
    to_u11(&hash[..2])[0]
}

/// Encode a 32-byte seed as a 25-word phrase.
pub fn mnemonic_from_seed(seed: &[u8; SEED_LEN]) -> String {
    let list = word_list();
    let mut words: Vec<&str> = to_u11(seed).into_iter().map(|i| list[i as usize]).collect();
    words.push(list[checksum_word(seed) as usize]);
    words.join(" ")
}

/// Decode a 25-word phrase back into the 32-byte seed it encodes.
///
/// Words are matched case-insensitively and may be separated by any whitespace.
pub fn seed_from_mnemonic(phrase: &str) -> Result<[u8; SEED_LEN], MnemonicError> {
    let words: Zeroizing<Vec<String>> =
        Zeroizing::new(phrase.split_whitespace().map(str::to_lowercase).collect());
    if words.len() != MNEMONIC_WORDS {
        return Err(MnemonicError::WrongWordCount(words.len()));
    }

    let list = word_list();
    let mut indexes: Zeroizing<Vec<u16>> = Zeroizing::new(Vec::with_capacity(MNEMONIC_WORDS));
    for (position, word) in words.iter().enumerate() {
        let index = list
            .binary_search(&word.as_str())
            .map_err(|_| MnemonicError::UnknownWord { position })?;
        indexes.push(index as u16);
    }

    let mut bytes = from_u11(&indexes[..DATA_WORDS]);
    // 24 * 11 = 264 bits = 33 bytes, the last of which is padding.
    if bytes.len() != SEED_LEN + 1 || bytes[SEED_LEN] != 0 {
        bytes.zeroize();
        return Err(MnemonicError::InvalidPadding);
    }

    let mut seed = [0u8; SEED_LEN];
    seed.copy_from_slice(&bytes[..SEED_LEN]);
    bytes.zeroize();

    if checksum_word(&seed) != indexes[DATA_WORDS] {
        seed.zeroize();
        return Err(MnemonicError::ChecksumMismatch);
    }
    Ok(seed)
}

/// Generate a fresh 25-word phrase from 256 bits of local entropy.
pub fn generate_mnemonic() -> String {
    let mut seed = [0u8; SEED_LEN];
    OsRng.fill_bytes(&mut seed);
    let phrase = mnemonic_from_seed(&seed);
    seed.zeroize();
    phrase
}

/// Derive the Ed25519 key pair encoded by a phrase.
pub fn keypair_from_mnemonic(phrase: &str) -> Result<KeyPair, MnemonicError> {
    let mut seed = seed_from_mnemonic(phrase)?;
    let keypair = keypair_from_seed(&seed);
    seed.zeroize();
    Ok(keypair)
}

/// Whether a phrase decodes to a consistent key.
pub fn validate_mnemonic(phrase: &str) -> bool {
    seed_from_mnemonic(phrase).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::derive_address;

    #[test]
    fn generate_produces_25_words() {
        let phrase = generate_mnemonic();
        assert_eq!(phrase.split_whitespace().count(), 25);
        assert!(validate_mnemonic(&phrase));
    }

    #[test]
    fn zero_seed_phrase() {
        let phrase = mnemonic_from_seed(&[0u8; 32]);
        let words: Vec<&str> = phrase.split_whitespace().collect();
        assert!(words[..24].iter().all(|w| *w == "abandon"));
        assert_eq!(words[24], word_list()[943]);
    }

    #[test]
    fn seed_roundtrip() {
        let seed: [u8; 32] = core::array::from_fn(|i| i as u8);
        let phrase = mnemonic_from_seed(&seed);
        assert_eq!(seed_from_mnemonic(&phrase).unwrap(), seed);
        assert_eq!(phrase.split_whitespace().last(), Some(word_list()[433]));
    }

    #[test]
    fn keypair_matches_seed_derivation() {
        let phrase = mnemonic_from_seed(&[0u8; 32]);
        let kp = keypair_from_mnemonic(&phrase).unwrap();
        assert_eq!(
            derive_address(&kp.public).as_str(),
            "HNVCPPGOW2SC2YVDVDICU3YNONSTEFLXDXREHJR2YBEKDC2Z3IUZSC6YGI"
        );
    }

    #[test]
    fn case_and_spacing_are_normalized() {
        let phrase = mnemonic_from_seed(&[7u8; 32]);
        let shouty = phrase.to_uppercase().replace(' ', "  \n");
        assert_eq!(seed_from_mnemonic(&shouty).unwrap(), [7u8; 32]);
    }

    #[test]
    fn wrong_word_count_rejected() {
        let phrase = mnemonic_from_seed(&[7u8; 32]);
        let short: Vec<&str> = phrase.split_whitespace().take(24).collect();
        assert_eq!(
            seed_from_mnemonic(&short.join(" ")),
            Err(MnemonicError::WrongWordCount(24))
        );
        assert_eq!(seed_from_mnemonic(""), Err(MnemonicError::WrongWordCount(0)));
    }

    #[test]
    fn unknown_word_rejected() {
        let phrase = mnemonic_from_seed(&[7u8; 32]);
        let mut words: Vec<&str> = phrase.split_whitespace().collect();
        words[3] = "notaword";
        assert_eq!(
            seed_from_mnemonic(&words.join(" ")),
            Err(MnemonicError::UnknownWord { position: 3 })
        );
    }

    #[test]
    fn checksum_mismatch_rejected() {
        let phrase = mnemonic_from_seed(&[0u8; 32]);
        let mut words: Vec<&str> = phrase.split_whitespace().collect();
        words[24] = if words[24] == "zoo" { "abandon" } else { "zoo" };
        assert_eq!(
            seed_from_mnemonic(&words.join(" ")),
            Err(MnemonicError::ChecksumMismatch)
        );
    }

    #[test]
    fn padding_bits_must_be_zero() {
        // "zoo" (2047) in the last data word sets the three padding bits.
        let phrase = mnemonic_from_seed(&[0u8; 32]);
        let mut words: Vec<&str> = phrase.split_whitespace().collect();
        words[23] = "zoo";
        assert_eq!(
            seed_from_mnemonic(&words.join(" ")),
            Err(MnemonicError::InvalidPadding)
        );
    }
}
