//! Error type for value parsing.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("amount has more than {max} decimal places")]
    TooManyDecimals { max: u32 },

    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("invalid transaction id: {0}")]
    InvalidTxId(String),

    #[error("unknown network: {0}")]
    UnknownNetwork(String),
}
