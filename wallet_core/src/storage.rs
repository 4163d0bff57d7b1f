//! Credential and preference storage.
//!
//! Two tiers hold the wallet secret: a secure tier (an encrypted bucket
//! file) and a plaintext fallback bucket used when the secure tier errors.
//! Non-secret values such as the cached address live in a separate general
//! bucket. Every backend implements [`KeyValueStore`]; the rest of the crate
//! depends only on the trait.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::keystore::{self, KdfParams};

/// Bucket name of the non-secret store.
pub const GENERAL_BUCKET: &str = "General";
/// Bucket name of the plaintext fallback tier for secrets.
pub const FALLBACK_BUCKET: &str = "GeneralBackup";
/// Bucket name of the encrypted tier.
pub const SECURE_BUCKET: &str = "Secure";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("stored data is corrupted: {0}")]
    Corrupt(String),

    #[error("storage crypto error: {0}")]
    Crypto(String),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("secure storage failed and plaintext fallback is disabled for {key}")]
    FallbackDisabled { key: String },
}

/// A string key/value bucket.
pub trait KeyValueStore: Send + Sync {
    /// Name of the bucket this store persists to.
    fn bucket(&self) -> &str;

    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// A bucket map whose values are wiped when dropped.
#[derive(Default, Serialize, Deserialize)]
#[serde(transparent)]
struct Bucket(BTreeMap<String, String>);

impl Drop for Bucket {
    fn drop(&mut self) {
        for value in self.0.values_mut() {
            value.zeroize();
        }
    }
}

/// Write `bytes` to `path` through a temporary sibling and a rename, so a
/// crash never leaves a half-written bucket behind.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| StorageError::Io(format!("create {}: {e}", parent.display())))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)
        .map_err(|e| StorageError::Io(format!("write {}: {e}", tmp.display())))?;
    restrict_permissions(&tmp)?;
    std::fs::rename(&tmp, path)
        .map_err(|e| StorageError::Io(format!("rename into {}: {e}", path.display())))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| StorageError::Io(format!("chmod {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

/// Plaintext JSON bucket at `<dir>/<bucket>.json`.
pub struct JsonFileStore {
    bucket: String,
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>, bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let path = dir.as_ref().join(format!("{bucket}.json"));
        Self {
            bucket,
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Bucket, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => {
                let bytes = Zeroizing::new(bytes);
                serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::Corrupt(format!("{}: {e}", self.path.display())))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Bucket::default()),
            Err(e) => Err(StorageError::Io(format!("read {}: {e}", self.path.display()))),
        }
    }

    fn store(&self, bucket: &Bucket) -> Result<(), StorageError> {
        let json = Zeroizing::new(
            serde_json::to_vec_pretty(bucket)
                .map_err(|e| StorageError::Corrupt(format!("serialize {}: {e}", self.bucket)))?,
        );
        write_atomic(&self.path, &json)
    }
}

impl KeyValueStore for JsonFileStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.0.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut bucket = self.load()?;
        if let Some(mut old) = bucket.0.insert(key.to_string(), value.to_string()) {
            old.zeroize();
        }
        self.store(&bucket)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut bucket = self.load()?;
        match bucket.0.remove(key) {
            Some(mut old) => {
                old.zeroize();
                self.store(&bucket)
            }
            None => Ok(()),
        }
    }
}

/// Encrypted bucket at `<dir>/<bucket>.keystore.json`, sealed under a
/// device secret supplied by the platform integration.
pub struct EncryptedFileStore {
    bucket: String,
    path: PathBuf,
    device_secret: Zeroizing<String>,
    kdf: KdfParams,
    lock: Mutex<()>,
}

impl EncryptedFileStore {
    pub fn new(
        dir: impl AsRef<Path>,
        bucket: impl Into<String>,
        device_secret: impl Into<String>,
        kdf: KdfParams,
    ) -> Self {
        let bucket = bucket.into();
        let path = dir.as_ref().join(format!("{bucket}.keystore.json"));
        Self {
            bucket,
            path,
            device_secret: Zeroizing::new(device_secret.into()),
            kdf,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Bucket, StorageError> {
        if !self.path.exists() {
            return Ok(Bucket::default());
        }
        let sealed = keystore::load_keystore(&self.path)?;
        let plaintext = keystore::open(&sealed, &self.device_secret)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| StorageError::Corrupt(format!("{}: {e}", self.path.display())))
    }

    fn store(&self, bucket: &Bucket) -> Result<(), StorageError> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(bucket)
                .map_err(|e| StorageError::Corrupt(format!("serialize {}: {e}", self.bucket)))?,
        );
        let sealed = keystore::seal(&plaintext, &self.device_secret, self.kdf)?;
        keystore::save_keystore(&sealed, &self.path)
    }
}

impl KeyValueStore for EncryptedFileStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.load()?.0.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut bucket = self.load()?;
        if let Some(mut old) = bucket.0.insert(key.to_string(), value.to_string()) {
            old.zeroize();
        }
        self.store(&bucket)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut bucket = self.load()?;
        match bucket.0.remove(key) {
            Some(mut old) => {
                old.zeroize();
                self.store(&bucket)
            }
            None => Ok(()),
        }
    }
}

/// Which tier actually served a storage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    Secure,
    Fallback,
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secure => f.write_str("secure"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// A storage result tagged with the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served<T> {
    pub value: T,
    pub tier: StorageTier,
}

impl<T> Served<T> {
    pub fn is_degraded(&self) -> bool {
        self.tier == StorageTier::Fallback
    }
}

/// Whether secrets may land in the plaintext tier when the secure tier fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    #[default]
    Allow,
    Deny,
}

/// Secure store with a plaintext fallback.
///
/// Writes try the secure tier first and use the fallback only when the secure
/// tier returns an error. Reads consult the fallback when the secure tier
/// errors or has no value. Removal always clears both tiers.
pub struct TieredStore {
    secure: Arc<dyn KeyValueStore>,
    fallback: Arc<dyn KeyValueStore>,
    policy: FallbackPolicy,
}

impl TieredStore {
    pub fn new(secure: Arc<dyn KeyValueStore>, fallback: Arc<dyn KeyValueStore>) -> Self {
        Self {
            secure,
            fallback,
            policy: FallbackPolicy::Allow,
        }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn get(&self, key: &str) -> Result<Served<Option<String>>, StorageError> {
        match self.secure.get(key) {
            Ok(Some(value)) => Ok(Served {
                value: Some(value),
                tier: StorageTier::Secure,
            }),
            // A value written while the secure tier was down lives only in the fallback.
            Ok(None) => match self.fallback.get(key) {
                Ok(Some(value)) => {
                    tracing::warn!(key, bucket = self.fallback.bucket(), "value found only in fallback store");
                    Ok(Served {
                        value: Some(value),
                        tier: StorageTier::Fallback,
                    })
                }
                Ok(None) => Ok(Served {
                    value: None,
                    tier: StorageTier::Secure,
                }),
                Err(e) => {
                    tracing::warn!(key, bucket = self.fallback.bucket(), error = %e, "fallback read failed");
                    Ok(Served {
                        value: None,
                        tier: StorageTier::Secure,
                    })
                }
            },
            Err(e) => {
                tracing::warn!(key, bucket = self.fallback.bucket(), error = %e, "secure read failed, using fallback store");
                let value = self.fallback.get(key)?;
                Ok(Served {
                    value,
                    tier: StorageTier::Fallback,
                })
            }
        }
    }

    pub fn put(&self, key: &str, value: &str) -> Result<Served<()>, StorageError> {
        match self.secure.put(key, value) {
            Ok(()) => Ok(Served {
                value: (),
                tier: StorageTier::Secure,
            }),
            Err(e) if self.policy == FallbackPolicy::Deny => {
                tracing::warn!(key, error = %e, "secure write failed and fallback is disabled");
                Err(StorageError::FallbackDisabled {
                    key: key.to_string(),
                })
            }
            Err(e) => {
                tracing::warn!(key, bucket = self.fallback.bucket(), error = %e, "secure write failed, storing in plaintext fallback");
                self.fallback.put(key, value)?;
                Ok(Served {
                    value: (),
                    tier: StorageTier::Fallback,
                })
            }
        }
    }

    /// Remove `key` from both tiers. The result is degraded when the secure
    /// tier could not confirm the removal.
    pub fn remove(&self, key: &str) -> Result<Served<()>, StorageError> {
        let secure = self.secure.remove(key);
        if let Err(e) = &secure {
            tracing::warn!(key, error = %e, "secure remove failed");
        }
        self.fallback.remove(key)?;
        Ok(Served {
            value: (),
            tier: if secure.is_ok() {
                StorageTier::Secure
            } else {
                StorageTier::Fallback
            },
        })
    }
}
