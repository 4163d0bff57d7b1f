//! Transaction identifiers and direction.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypesError;

/// A transaction id: 52 characters of unpadded base32 over the transaction hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(String);

impl TxId {
    pub const LEN: usize = 52;

    /// Parse a transaction id returned by a node or a remote service.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        if s.len() != Self::LEN || !s.chars().all(|c| matches!(c, 'A'..='Z' | '2'..='7')) {
            return Err(TypesError::InvalidTxId(s));
        }
        Ok(Self(s))
    }

    /// Wrap an id without validation. Remote services sometimes return
    /// opaque references instead of chain ids.
    pub fn opaque(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a transaction moved funds out of or into the wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}
