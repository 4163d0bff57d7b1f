//! Session lifecycle against in-memory stores with injected failures:
//! create / import → persist → restore → disconnect.

use std::sync::Arc;

use biopay_crypto::mnemonic_from_seed;
use biopay_nullables::NullStore;
use biopay_wallet_core::session::{Diagnostic, StorageOperation, ADDRESS_KEY, PRIVATE_KEY_KEY};
use biopay_wallet_core::storage::{FallbackPolicy, TieredStore, FALLBACK_BUCKET, GENERAL_BUCKET, SECURE_BUCKET};
use biopay_wallet_core::{ErrorKind, ValidationError, WalletError, WalletSession};

const ZERO_SEED_ADDRESS: &str = "HNVCPPGOW2SC2YVDVDICU3YNONSTEFLXDXREHJR2YBEKDC2Z3IUZSC6YGI";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Device {
    secure: Arc<NullStore>,
    fallback: Arc<NullStore>,
    general: Arc<NullStore>,
}

impl Device {
    fn new() -> Self {
        Self {
            secure: Arc::new(NullStore::new(SECURE_BUCKET)),
            fallback: Arc::new(NullStore::new(FALLBACK_BUCKET)),
            general: Arc::new(NullStore::new(GENERAL_BUCKET)),
        }
    }

    fn without_keychain() -> Self {
        let device = Self::new();
        device.secure.set_unavailable(true);
        device
    }

    fn session(&self) -> WalletSession {
        self.session_with(FallbackPolicy::Allow)
    }

    fn session_with(&self, policy: FallbackPolicy) -> WalletSession {
        let secrets = TieredStore::new(self.secure.clone(), self.fallback.clone()).with_policy(policy);
        WalletSession::new(secrets, self.general.clone())
    }

    /// A fresh process on the same device.
    fn relaunch(&self) -> WalletSession {
        let mut session = self.session();
        session.restore_on_launch().expect("restore");
        session
    }

    fn is_wiped(&self) -> bool {
        self.secure.is_empty() && self.fallback.is_empty() && self.general.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Create / import / restore
// ---------------------------------------------------------------------------

#[test]
fn create_persists_to_secure_tier_only() {
    let device = Device::new();
    let mut session = device.session();
    let created = session.create().unwrap();

    assert_eq!(created.mnemonic.split_whitespace().count(), 25);
    assert!(device.secure.peek(PRIVATE_KEY_KEY).is_some());
    assert!(device.fallback.peek(PRIVATE_KEY_KEY).is_none());
    assert_eq!(device.general.peek(ADDRESS_KEY).as_deref(), Some(created.address.as_str()));
    assert!(session.take_diagnostics().is_empty());
}

#[test]
fn create_then_disconnect_leaves_nothing_behind() -> anyhow::Result<()> {
    let device = Device::new();
    let mut session = device.session();
    session.create()?;
    session.disconnect()?;

    assert!(!session.is_connected());
    assert!(device.is_wiped());
    assert!(!device.relaunch().is_connected());
    Ok(())
}

#[test]
fn import_restores_same_address_after_relaunch() {
    let phrase = mnemonic_from_seed(&[0u8; 32]);
    let device = Device::new();
    let mut session = device.session();
    let address = session.import(&phrase).unwrap();
    assert_eq!(address.as_str(), ZERO_SEED_ADDRESS);

    let restored = device.relaunch();
    assert_eq!(restored.address().map(|a| a.as_str()), Some(ZERO_SEED_ADDRESS));
    assert_eq!(restored.credential().unwrap().mnemonic().as_str(), phrase);
}

#[test]
fn created_phrase_imports_to_the_same_account() {
    let first = Device::new();
    let created = first.session().create().unwrap();

    let second = Device::new();
    let imported = second.session().import(&created.mnemonic).unwrap();
    assert_eq!(imported, created.address);
}

#[test]
fn bad_phrase_is_a_validation_error_and_stores_nothing() {
    let device = Device::new();
    let mut session = device.session();
    let err = session.import("abandon abandon abandon").unwrap_err();
    assert!(matches!(
        err,
        WalletError::Validation(ValidationError::InvalidMnemonic(_))
    ));
    assert!(device.is_wiped());
    assert!(!session.is_connected());
}

#[test]
fn second_create_requires_disconnect() {
    let device = Device::new();
    let mut session = device.session();
    let first = session.create().unwrap();
    assert!(matches!(session.create(), Err(WalletError::AlreadyConnected)));
    assert_eq!(session.address(), Some(&first.address));
}

#[test]
fn connected_iff_secret_present() {
    let device = Device::new();
    device.general.seed(ADDRESS_KEY, ZERO_SEED_ADDRESS);
    let session = device.relaunch();
    assert!(!session.is_connected());
    assert!(device.general.peek(ADDRESS_KEY).is_none(), "stale address is cleared");
}

#[test]
fn mismatched_cached_address_is_repaired() {
    let device = Device::new();
    let phrase = mnemonic_from_seed(&[0u8; 32]);
    device.session().import(&phrase).unwrap();
    device.general.seed(ADDRESS_KEY, "SOMETHINGELSE");

    let mut session = device.relaunch();
    assert_eq!(session.address().map(|a| a.as_str()), Some(ZERO_SEED_ADDRESS));
    assert_eq!(device.general.peek(ADDRESS_KEY).as_deref(), Some(ZERO_SEED_ADDRESS));
    assert!(session
        .take_diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::AddressCacheRepaired { cached: Some(c), .. } if c == "SOMETHINGELSE")));
}

#[test]
fn corrupt_secret_fails_restore_with_storage_error() {
    let device = Device::new();
    device.secure.seed(PRIVATE_KEY_KEY, "not hex");
    let err = device.session().restore_on_launch().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
}

// ---------------------------------------------------------------------------
// Fallback tier
// ---------------------------------------------------------------------------

#[test]
fn unavailable_secure_tier_falls_back_and_reports_it() {
    let device = Device::without_keychain();
    let mut session = device.session();
    let created = session.create().unwrap();

    assert!(device.fallback.peek(PRIVATE_KEY_KEY).is_some());
    assert_eq!(
        session.take_diagnostics(),
        vec![Diagnostic::StorageDegraded {
            operation: StorageOperation::Write,
            key: PRIVATE_KEY_KEY,
        }]
    );

    let mut restored = device.relaunch();
    assert_eq!(restored.address(), Some(&created.address));
    assert!(restored
        .take_diagnostics()
        .contains(&Diagnostic::StorageDegraded {
            operation: StorageOperation::Read,
            key: PRIVATE_KEY_KEY,
        }));
}

#[test]
fn denied_fallback_refuses_to_store_plaintext() {
    let device = Device::without_keychain();
    let mut session = device.session_with(FallbackPolicy::Deny);
    let err = session.create().err().unwrap();
    assert_eq!(err.kind(), ErrorKind::StorageDegraded);
    assert!(!session.is_connected());
    assert!(device.fallback.is_empty());
}

#[test]
fn secret_stored_while_keychain_was_down_survives_recovery() -> anyhow::Result<()> {
    let device = Device::without_keychain();
    let created = device.session().create()?;
    device.secure.set_unavailable(false);

    let mut restored = device.relaunch();
    assert_eq!(restored.address(), Some(&created.address));
    assert_eq!(device.general.peek(ADDRESS_KEY).as_deref(), Some(created.address.as_str()));
    assert!(restored
        .take_diagnostics()
        .contains(&Diagnostic::StorageDegraded {
            operation: StorageOperation::Read,
            key: PRIVATE_KEY_KEY,
        }));
    Ok(())
}

#[test]
fn failed_secure_remove_fails_disconnect_until_retried() -> anyhow::Result<()> {
    let device = Device::new();
    let mut session = device.session();
    session.create()?;
    device.fallback.seed(PRIVATE_KEY_KEY, "00");
    device.secure.fail_removes(true);

    let err = session.disconnect().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageDegraded);
    assert!(!session.is_connected());
    assert!(device.fallback.is_empty());
    assert!(device.general.is_empty());
    assert!(device.secure.peek(PRIVATE_KEY_KEY).is_some());
    assert!(session
        .take_diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::StorageDegraded { operation: StorageOperation::Remove, .. })));

    // The secret is still there, so a relaunch reconnects.
    assert!(device.relaunch().is_connected());

    device.secure.fail_removes(false);
    session.disconnect()?;
    assert!(device.is_wiped());
    assert!(!device.relaunch().is_connected());
    Ok(())
}

#[test]
fn disconnect_clears_memory_even_if_general_store_fails() {
    let device = Device::new();
    let mut session = device.session();
    session.create().unwrap();
    device.general.fail_removes(true);

    assert!(session.disconnect().is_err());
    assert!(!session.is_connected());
    assert!(device.secure.is_empty());
}
