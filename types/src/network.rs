//! Network identifiers and endpoint profiles.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypesError;

/// Identifies which Algorand network the wallet talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    MainNet,
    /// The public test network.
    TestNet,
}

impl NetworkId {
    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainNet => "mainnet",
            Self::TestNet => "testnet",
        }
    }

    /// Chain id expected by wallet-connect providers.
    pub fn chain_id(&self) -> u32 {
        match self {
            Self::MainNet => 416001,
            Self::TestNet => 416002,
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NetworkId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::MainNet),
            "testnet" => Ok(Self::TestNet),
            other => Err(TypesError::UnknownNetwork(other.to_string())),
        }
    }
}

/// The selected set of node / indexer / explorer endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub id: NetworkId,
    pub name: String,
    /// Base URL of the node (algod) REST API.
    pub node_url: String,
    /// Base URL of the indexer REST API.
    pub indexer_url: String,
    /// Base URL of the public block explorer.
    pub explorer_url: String,
    /// Genesis id written into every transaction.
    pub genesis_id: String,
}

impl NetworkProfile {
    pub fn mainnet() -> Self {
        Self {
            id: NetworkId::MainNet,
            name: "MainNet".to_string(),
            node_url: "https://mainnet-api.algonode.cloud".to_string(),
            indexer_url: "https://mainnet-idx.algonode.cloud".to_string(),
            explorer_url: "https://explorer.perawallet.app".to_string(),
            genesis_id: "mainnet-v1.0".to_string(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            id: NetworkId::TestNet,
            name: "TestNet".to_string(),
            node_url: "https://testnet-api.algonode.cloud".to_string(),
            indexer_url: "https://testnet-idx.algonode.cloud".to_string(),
            explorer_url: "https://testnet.explorer.perawallet.app".to_string(),
            genesis_id: "testnet-v1.0".to_string(),
        }
    }

    /// Built-in profile for a network id.
    pub fn for_network(id: NetworkId) -> Self {
        match id {
            NetworkId::MainNet => Self::mainnet(),
            NetworkId::TestNet => Self::testnet(),
        }
    }

    /// Profile with caller-supplied endpoints (e.g. a local sandbox).
    pub fn custom(
        id: NetworkId,
        node_url: impl Into<String>,
        indexer_url: impl Into<String>,
        explorer_url: impl Into<String>,
    ) -> Self {
        let base = Self::for_network(id);
        Self {
            name: format!("{} (custom)", base.name),
            node_url: node_url.into(),
            indexer_url: indexer_url.into(),
            explorer_url: explorer_url.into(),
            ..base
        }
    }

    pub fn is_mainnet(&self) -> bool {
        self.id == NetworkId::MainNet
    }

    /// Explorer link for a transaction id.
    pub fn explorer_tx_url(&self, tx_id: &str) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), tx_id)
    }
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Self::testnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_testnet() {
        let profile = NetworkProfile::default();
        assert_eq!(profile.id, NetworkId::TestNet);
        assert!(!profile.is_mainnet());
    }

    #[test]
    fn explorer_url_joins_cleanly() {
        let mut profile = NetworkProfile::mainnet();
        assert_eq!(
            profile.explorer_tx_url("ABC"),
            "https://explorer.perawallet.app/tx/ABC"
        );
        profile.explorer_url.push('/');
        assert_eq!(
            profile.explorer_tx_url("ABC"),
            "https://explorer.perawallet.app/tx/ABC"
        );
    }

    #[test]
    fn network_id_parses_case_insensitively() {
        assert_eq!("MainNet".parse::<NetworkId>().unwrap(), NetworkId::MainNet);
        assert_eq!("testnet".parse::<NetworkId>().unwrap(), NetworkId::TestNet);
        assert!("betanet".parse::<NetworkId>().is_err());
    }

    #[test]
    fn custom_keeps_genesis() {
        let p = NetworkProfile::custom(NetworkId::TestNet, "http://localhost:4001", "http://localhost:8980", "http://localhost");
        assert_eq!(p.genesis_id, "testnet-v1.0");
        assert_eq!(p.node_url, "http://localhost:4001");
    }

    #[test]
    fn chain_ids() {
        assert_eq!(NetworkId::MainNet.chain_id(), 416001);
        assert_eq!(NetworkId::TestNet.chain_id(), 416002);
    }
}
