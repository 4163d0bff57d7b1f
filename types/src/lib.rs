//! Fundamental value types for the BioPay wallet.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! addresses, amounts, transaction ids, timestamps, key material and network profiles.

pub mod address;
pub mod amount;
pub mod error;
pub mod keys;
pub mod network;
pub mod time;
pub mod tx;

pub use address::WalletAddress;
pub use amount::{parse_decimal, AssetAmount, MicroAlgos};
pub use error::TypesError;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use network::{NetworkId, NetworkProfile};
pub use time::Timestamp;
pub use tx::{Direction, TxId};
