//! Wallet session: the single local account and its persisted credential.
//!
//! The session owns at most one [`Credential`]. It is connected exactly when
//! a secret is present in the tiered store. The address is only a cache of
//! what the secret derives to and is repaired on launch when they disagree.

use biopay_crypto::{derive_address, keypair_from_seed, mnemonic_from_seed, seed_from_mnemonic, sign_message};
use biopay_types::{KeyPair, PublicKey, Signature, WalletAddress};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::{ValidationError, WalletError};
use crate::storage::{KeyValueStore, Served, StorageError, TieredStore};

/// Key of the hex-encoded 32-byte secret in the tiered store.
pub const PRIVATE_KEY_KEY: &str = "privateKey";
/// Key of the cached address in the general store.
pub const ADDRESS_KEY: &str = "address";

/// The unlocked signing credential of the connected account.
///
/// Deliberately neither `Clone` nor `Serialize`; the secret half is zeroized
/// when the credential is dropped.
pub struct Credential {
    keypair: KeyPair,
    address: WalletAddress,
}

impl Credential {
    pub(crate) fn from_seed(seed: &[u8; 32]) -> Self {
        let keypair = keypair_from_seed(seed);
        let address = derive_address(&keypair.public);
        Self { keypair, address }
    }

    pub fn address(&self) -> &WalletAddress {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        sign_message(message, &self.keypair.private)
    }

    /// The 25-word backup phrase for this credential.
    pub fn mnemonic(&self) -> Zeroizing<String> {
        Zeroizing::new(mnemonic_from_seed(self.keypair.private.as_bytes()))
    }

    fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.keypair.private.as_bytes()))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Observable connection state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub connected: bool,
    pub address: Option<WalletAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    Read,
    Write,
    Remove,
}

/// Non-fatal events a caller may want to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The secure tier failed and the plaintext fallback served the operation.
    StorageDegraded {
        operation: StorageOperation,
        key: &'static str,
    },
    /// The cached address did not match the stored secret and was rewritten.
    AddressCacheRepaired {
        cached: Option<String>,
        derived: WalletAddress,
    },
}

/// A freshly generated wallet. The phrase must be shown to the user for backup.
pub struct NewWallet {
    pub address: WalletAddress,
    pub mnemonic: Zeroizing<String>,
}

pub struct WalletSession {
    secrets: TieredStore,
    general: Arc<dyn KeyValueStore>,
    credential: Option<Credential>,
    diagnostics: Vec<Diagnostic>,
}

impl WalletSession {
    pub fn new(secrets: TieredStore, general: Arc<dyn KeyValueStore>) -> Self {
        Self {
            secrets,
            general,
            credential: None,
            diagnostics: Vec::new(),
        }
    }

    /// Generate a new account from local entropy and persist it.
    pub fn create(&mut self) -> Result<NewWallet, WalletError> {
        self.ensure_disconnected()?;
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(seed.as_mut());
        let mnemonic = Zeroizing::new(mnemonic_from_seed(&seed));
        let address = self.persist(Credential::from_seed(&seed))?;
        tracing::info!(address = %address, "wallet created");
        Ok(NewWallet { address, mnemonic })
    }

    /// Restore an account from its 25-word phrase.
    pub fn import(&mut self, phrase: &str) -> Result<WalletAddress, WalletError> {
        self.ensure_disconnected()?;
        let seed = Zeroizing::new(seed_from_mnemonic(phrase).map_err(ValidationError::from)?);
        let address = self.persist(Credential::from_seed(&seed))?;
        tracing::info!(address = %address, "wallet imported");
        Ok(address)
    }

    /// Forget the account: clear the secret from both tiers and the cached address.
    ///
    /// In-memory state, the fallback tier and the address cache are cleared
    /// even when a store reports an error. If the secure tier still holds the
    /// secret, the call fails with `StorageDegraded` and can be repeated.
    pub fn disconnect(&mut self) -> Result<(), WalletError> {
        let was = self.credential.take().map(|c| c.address.clone());
        let removed = self.secrets.remove(PRIVATE_KEY_KEY);
        let cache = self.general.remove(ADDRESS_KEY);

        let removed = removed?;
        self.note_degraded(&removed, StorageOperation::Remove, PRIVATE_KEY_KEY);
        cache?;
        if removed.is_degraded() {
            tracing::warn!("secret may remain in secure storage after disconnect");
            return Err(WalletError::StorageDegraded {
                key: PRIVATE_KEY_KEY.to_string(),
            });
        }
        match was {
            Some(address) => tracing::info!(address = %address, "wallet disconnected"),
            None => tracing::debug!("disconnect with no active wallet"),
        }
        Ok(())
    }

    /// Rebuild the session from persisted state. Connected iff a secret is stored.
    pub fn restore_on_launch(&mut self) -> Result<SessionState, WalletError> {
        let served = self.secrets.get(PRIVATE_KEY_KEY)?;
        self.note_degraded(&served, StorageOperation::Read, PRIVATE_KEY_KEY);

        let cached = match self.general.get(ADDRESS_KEY) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(error = %e, "could not read cached address");
                None
            }
        };

        let Some(secret_hex) = served.value.map(Zeroizing::new) else {
            if cached.is_some() {
                tracing::warn!("cached address without a stored secret, clearing it");
                if let Err(e) = self.general.remove(ADDRESS_KEY) {
                    tracing::warn!(error = %e, "could not clear stale address");
                }
            }
            self.credential = None;
            tracing::info!(connected = false, "session restored");
            return Ok(self.state());
        };

        let seed = decode_secret(&secret_hex)?;
        let credential = Credential::from_seed(&seed);
        if cached.as_deref() != Some(credential.address.as_str()) {
            tracing::warn!(derived = %credential.address, "cached address does not match stored secret, repairing");
            if let Err(e) = self.general.put(ADDRESS_KEY, credential.address.as_str()) {
                tracing::warn!(error = %e, "could not rewrite cached address");
            }
            self.diagnostics.push(Diagnostic::AddressCacheRepaired {
                cached,
                derived: credential.address.clone(),
            });
        }

        tracing::info!(connected = true, address = %credential.address, "session restored");
        self.credential = Some(credential);
        Ok(self.state())
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            connected: self.credential.is_some(),
            address: self.address().cloned(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.credential.is_some()
    }

    pub fn address(&self) -> Option<&WalletAddress> {
        self.credential.as_ref().map(|c| &c.address)
    }

    /// The signing credential, or `NotConnected`.
    pub fn credential(&self) -> Result<&Credential, WalletError> {
        self.credential.as_ref().ok_or(WalletError::NotConnected)
    }

    /// Drain the diagnostics recorded since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn ensure_disconnected(&self) -> Result<(), WalletError> {
        if self.credential.is_some() {
            return Err(WalletError::AlreadyConnected);
        }
        Ok(())
    }

    fn persist(&mut self, credential: Credential) -> Result<WalletAddress, WalletError> {
        let served = self.secrets.put(PRIVATE_KEY_KEY, &credential.secret_hex())?;
        self.note_degraded(&served, StorageOperation::Write, PRIVATE_KEY_KEY);
        // The address cache is derivable from the secret; losing it is not fatal.
        if let Err(e) = self.general.put(ADDRESS_KEY, credential.address.as_str()) {
            tracing::warn!(error = %e, "could not cache wallet address");
        }
        let address = credential.address.clone();
        self.credential = Some(credential);
        Ok(address)
    }

    fn note_degraded<T>(&mut self, served: &Served<T>, operation: StorageOperation, key: &'static str) {
        if served.is_degraded() {
            self.diagnostics
                .push(Diagnostic::StorageDegraded { operation, key });
        }
    }
}

fn decode_secret(secret_hex: &str) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let bytes = Zeroizing::new(
        hex::decode(secret_hex.trim())
            .map_err(|e| StorageError::Corrupt(format!("stored secret is not hex: {e}")))?,
    );
    if bytes.len() != 32 {
        return Err(StorageError::Corrupt(format!(
            "stored secret has {} bytes, expected 32",
            bytes.len()
        ))
        .into());
    }
    let mut seed = Zeroizing::new([0u8; 32]);
    seed.copy_from_slice(&bytes);
    Ok(seed)
}
