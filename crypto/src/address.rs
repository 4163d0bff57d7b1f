//! Wallet address derivation from public keys.
//!
//! Address format: base32(public_key ‖ checksum), unpadded, 58 characters.
//!
//! Checksum: last 4 bytes of SHA-512/256(public_key).

use biopay_types::{PublicKey, WalletAddress};

use crate::encoding::{base32_decode_fixed, base32_encode};
use crate::hash::sha512_256;

const CHECKSUM_LEN: usize = 4;

fn checksum(public_key: &[u8; 32]) -> [u8; CHECKSUM_LEN] {
    let hash = sha512_256(public_key);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash[32 - CHECKSUM_LEN..]);
    out
}

/// Derive the wallet address for a public key.
pub fn derive_address(public_key: &PublicKey) -> WalletAddress {
    let mut raw = [0u8; 32 + CHECKSUM_LEN];
    raw[..32].copy_from_slice(public_key.as_bytes());
    raw[32..].copy_from_slice(&checksum(public_key.as_bytes()));
    WalletAddress::parse(base32_encode(&raw))
        .unwrap_or_else(|_| unreachable!("36 bytes always encode to a 58-char base32 address"))
}

/// Extract the public key bytes from a valid address.
///
/// Returns `None` if the address is malformed or has an invalid checksum.
pub fn decode_address(address: &str) -> Option<[u8; 32]> {
    if address.len() != WalletAddress::LEN {
        return None;
    }
    let raw: [u8; 32 + CHECKSUM_LEN] = base32_decode_fixed(address)?;

    let mut public_key = [0u8; 32];
    public_key.copy_from_slice(&raw[..32]);
    if raw[32..] != checksum(&public_key) {
        return None;
    }
    Some(public_key)
}

/// Validate that an address string is well-formed and its checksum is correct.
pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};

    #[test]
    fn zero_key_address() {
        let addr = derive_address(&PublicKey([0u8; 32]));
        assert_eq!(
            addr.as_str(),
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAY5HFKQ"
        );
    }

    #[test]
    fn known_seed_address() {
        let kp = keypair_from_seed(&[0u8; 32]);
        assert_eq!(
            derive_address(&kp.public).as_str(),
            "HNVCPPGOW2SC2YVDVDICU3YNONSTEFLXDXREHJR2YBEKDC2Z3IUZSC6YGI"
        );
    }

    #[test]
    fn derive_and_validate() {
        let kp = generate_keypair();
        let addr = derive_address(&kp.public);
        assert_eq!(addr.as_str().len(), 58);
        assert!(validate_address(addr.as_str()));
    }

    #[test]
    fn decode_roundtrip() {
        let kp = generate_keypair();
        let addr = derive_address(&kp.public);
        let decoded = decode_address(addr.as_str()).unwrap();
        assert_eq!(decoded, *kp.public.as_bytes());
    }

    #[test]
    fn invalid_checksum_rejected() {
        let kp = generate_keypair();
        let addr = derive_address(&kp.public);
        let mut bad = addr.as_str().to_string();
        let first = bad.remove(0);
        let replacement = if first == 'A' { 'B' } else { 'A' };
        bad.insert(0, replacement);
        assert!(!validate_address(&bad));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(!validate_address("ADDR123"));
        assert!(!validate_address(""));
    }
}
