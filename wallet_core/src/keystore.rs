//! Argon2id + AES-256-GCM envelope for the secure credential bucket.
//!
//! The secure tier serializes its whole key/value map, then:
//! 1. Argon2id derives a 32-byte key from the device secret and a random salt
//! 2. AES-256-GCM seals the serialized map under a random nonce
//! 3. The envelope is written as JSON carrying every parameter needed to open it

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use zeroize::Zeroizing;

use crate::storage::StorageError;

const ARGON2_OUTPUT_LEN: usize = 32;
const SALT_LEN: usize = 32;
/// AES-GCM nonce length in bytes (96 bits).
const NONCE_LEN: usize = 12;
const ENVELOPE_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeystoreFile {
    pub version: u32,
    pub crypto: KeystoreCrypto,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeystoreCrypto {
    pub cipher: String,
    pub kdf: String,
    pub kdf_params: KdfParams,
    /// Hex-encoded salt.
    pub salt: String,
    /// Hex-encoded nonce.
    pub nonce: String,
    /// Hex-encoded ciphertext.
    pub ciphertext: String,
}

/// Argon2id cost parameters. Stored alongside the ciphertext so an envelope
/// always opens with the parameters it was sealed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// 64 MiB, 3 passes, 1 lane.
    pub const fn standard() -> Self {
        Self {
            memory: 65_536,
            iterations: 3,
            parallelism: 1,
        }
    }

    /// Minimal cost, for tests and low-end devices where the secret is already
    /// high entropy.
    pub const fn light() -> Self {
        Self {
            memory: 1_024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::standard()
    }
}

pub fn seal(
    plaintext: &[u8],
    secret: &str,
    params: KdfParams,
) -> Result<KeystoreFile, StorageError> {
    let mut rng = rand::thread_rng();

    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let derived_key = derive_key(secret, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(derived_key.as_ref())
        .map_err(|e| StorageError::Crypto(format!("AES key init failed: {e}")))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| StorageError::Crypto(format!("encryption failed: {e}")))?;

    Ok(KeystoreFile {
        version: ENVELOPE_VERSION,
        crypto: KeystoreCrypto {
            cipher: "aes-256-gcm".to_string(),
            kdf: "argon2id".to_string(),
            kdf_params: params,
            salt: hex::encode(salt),
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
        },
    })
}

pub fn open(keystore: &KeystoreFile, secret: &str) -> Result<Zeroizing<Vec<u8>>, StorageError> {
    if keystore.version != ENVELOPE_VERSION {
        return Err(StorageError::Corrupt(format!(
            "unsupported envelope version: {}",
            keystore.version
        )));
    }

    let salt = hex::decode(&keystore.crypto.salt)
        .map_err(|e| StorageError::Corrupt(format!("invalid salt hex: {e}")))?;
    let nonce_bytes = hex::decode(&keystore.crypto.nonce)
        .map_err(|e| StorageError::Corrupt(format!("invalid nonce hex: {e}")))?;
    let ciphertext = hex::decode(&keystore.crypto.ciphertext)
        .map_err(|e| StorageError::Corrupt(format!("invalid ciphertext hex: {e}")))?;

    if nonce_bytes.len() != NONCE_LEN {
        return Err(StorageError::Corrupt(format!(
            "invalid nonce length: expected {NONCE_LEN}, got {}",
            nonce_bytes.len()
        )));
    }

    let derived_key = derive_key(secret, &salt, keystore.crypto.kdf_params)?;
    let cipher = Aes256Gcm::new_from_slice(derived_key.as_ref())
        .map_err(|e| StorageError::Crypto(format!("AES key init failed: {e}")))?;

    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map(Zeroizing::new)
        .map_err(|_| StorageError::Crypto("decryption failed: wrong device secret or corrupted data".into()))
}

pub fn save_keystore(keystore: &KeystoreFile, path: &Path) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(keystore)
        .map_err(|e| StorageError::Corrupt(format!("envelope serialization failed: {e}")))?;
    crate::storage::write_atomic(path, json.as_bytes())
}

pub fn load_keystore(path: &Path) -> Result<KeystoreFile, StorageError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| StorageError::Io(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&json)
        .map_err(|e| StorageError::Corrupt(format!("invalid envelope JSON: {e}")))
}

fn derive_key(
    secret: &str,
    salt: &[u8],
    params: KdfParams,
) -> Result<Zeroizing<[u8; ARGON2_OUTPUT_LEN]>, StorageError> {
    let params = Params::new(
        params.memory,
        params.iterations,
        params.parallelism,
        Some(ARGON2_OUTPUT_LEN),
    )
    .map_err(|e| StorageError::Crypto(format!("Argon2 params error: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut output = Zeroizing::new([0u8; ARGON2_OUTPUT_LEN]);
    argon2
        .hash_password_into(secret.as_bytes(), salt, output.as_mut())
        .map_err(|e| StorageError::Crypto(format!("Argon2 hashing failed: {e}")))?;
    Ok(output)
}
