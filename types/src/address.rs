//! Wallet address type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypesError;

/// An Algorand wallet address: 58 characters of unpadded RFC 4648 base32.
///
/// Only the shape is checked here. The embedded checksum is verified by
/// `biopay_crypto::decode_address`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Encoded length of every address.
    pub const LEN: usize = 58;

    /// Parse an address string, checking length and alphabet.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        let trimmed = s.trim();
        if trimmed.len() != Self::LEN {
            return Err(TypesError::InvalidAddress(format!(
                "expected {} characters, got {}",
                Self::LEN,
                trimmed.len()
            )));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !matches!(c, 'A'..='Z' | '2'..='7'))
        {
            return Err(TypesError::InvalidAddress(format!(
                "invalid character {bad:?}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form used for display, e.g. `ABCDEF...UVWXYZ`.
    pub fn short(&self) -> String {
        format!("{}...{}", &self.0[..6], &self.0[Self::LEN - 6..])
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<WalletAddress> for String {
    fn from(addr: WalletAddress) -> Self {
        addr.0
    }
}

impl std::str::FromStr for WalletAddress {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "7ZUECA7HFLZTXENRV24SHLU4AVPUTMTTDUFUBNBD64C73F3UHRTHAIOF6Q";

    #[test]
    fn parses_well_formed_address() {
        let addr = WalletAddress::parse(SAMPLE).unwrap();
        assert_eq!(addr.as_str(), SAMPLE);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let addr = WalletAddress::parse(format!("  {SAMPLE}\n")).unwrap();
        assert_eq!(addr.as_str(), SAMPLE);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(WalletAddress::parse("ADDR123").is_err());
        assert!(WalletAddress::parse("").is_err());
    }

    #[test]
    fn rejects_lowercase_and_digits_outside_alphabet() {
        let lower = SAMPLE.to_lowercase();
        assert!(WalletAddress::parse(lower).is_err());
        let with_one = format!("1{}", &SAMPLE[1..]);
        assert!(WalletAddress::parse(with_one).is_err());
    }

    #[test]
    fn short_form() {
        let addr = WalletAddress::parse(SAMPLE).unwrap();
        assert_eq!(addr.short(), "7ZUECA...AIOF6Q");
    }

    #[test]
    fn serde_rejects_malformed() {
        let json = "\"not-an-address\"";
        assert!(serde_json::from_str::<WalletAddress>(json).is_err());
        let ok = format!("\"{SAMPLE}\"");
        assert!(serde_json::from_str::<WalletAddress>(&ok).is_ok());
    }
}
