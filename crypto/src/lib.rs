//! Cryptographic primitives for the BioPay wallet.
//!
//! - **Ed25519** for signing and signature verification
//! - **SHA-512/256** for address checksums and transaction ids
//! - Address derivation: base32(public key ‖ 4-byte checksum), 58 characters
//! - 25-word recovery phrases over the BIP-39 English word list

pub mod address;
pub mod encoding;
pub mod hash;
pub mod keys;
pub mod mnemonic;
pub mod sign;

pub use address::{decode_address, derive_address, validate_address};
pub use hash::{sha512_256, sha512_256_multi};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use mnemonic::{
    generate_mnemonic, keypair_from_mnemonic, mnemonic_from_seed, seed_from_mnemonic,
    validate_mnemonic, MnemonicError, MNEMONIC_WORDS,
};
pub use sign::{sign_message, verify_signature};
