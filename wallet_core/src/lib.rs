//! Wallet core library for BioPay.
//!
//! Provides everything a payment client needs:
//! - Secret storage with an encrypted tier and a plaintext fallback
//! - Wallet session lifecycle (create, import, disconnect, restore)
//! - Balance, history and payment submission over an Algorand node
//! - The payment intent state machine, including face-authorized payments
//! - Payment URIs for QR codes
//! - The identity verification and rewards ledger

pub mod balance;
pub mod chain;
pub mod config;
pub mod error;
pub mod face;
pub mod history;
pub mod identity;
pub mod keystore;
pub mod methods;
pub mod network;
pub mod payment_flow;
pub mod payment_uri;
pub mod session;
pub mod storage;
pub mod transaction_builder;
pub mod wallet;

pub use balance::{AssetBalance, Portfolio, PriceTable};
pub use chain::{AlgodClient, ChainClient, ConfirmationStatus, HistoryPage, HttpSettings};
pub use config::WalletConfig;
pub use error::{ErrorKind, ValidationError, WalletError};
pub use face::{FaceApiClient, FaceMatchService, FaceSample, FrameSource, MatchedUser};
pub use history::{TransactionHistory, TransactionRecord};
pub use identity::{IdentityLedger, VerificationLevel};
pub use keystore::{load_keystore, save_keystore, KdfParams, KeystoreFile};
pub use methods::{MethodInfo, PaymentMethod};
pub use network::{HistoryResult, IdempotencyKey, NetworkFacade, RetryPolicy};
pub use payment_flow::{FailureReason, PaymentFlow, PaymentStage};
pub use payment_uri::{parse_payment_uri, parse_scan, PaymentRequest, PaymentUri, ScanResult};
pub use session::{Credential, Diagnostic, SessionState, WalletSession};
pub use storage::{
    EncryptedFileStore, FallbackPolicy, JsonFileStore, KeyValueStore, StorageError, TieredStore,
};
pub use wallet::{Receipt, Wallet};
