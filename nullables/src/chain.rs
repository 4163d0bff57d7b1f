//! Nullable chain: scripted ledger reads and recorded broadcasts.

use async_trait::async_trait;
use biopay_types::{MicroAlgos, NetworkProfile, TxId, WalletAddress};
use biopay_wallet_core::chain::{
    AccountInfo, AssetParams, ChainClient, ConfirmationStatus, HistoryPage, SuggestedParams,
    TransferPage,
};
use biopay_wallet_core::transaction_builder::transaction_id_of_signed;
use biopay_wallet_core::WalletError;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::lock;

/// The calls a [`NullChain`] can be scripted to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainOp {
    Account,
    Asset,
    Params,
    Transfers,
    Broadcast,
    Confirmation,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    Timeout,
    Unavailable,
    /// The node refused the request, e.g. overspend on broadcast.
    Rejected(String),
    /// Broadcast only: the node accepts the bytes but the reply never arrives.
    AcceptThenTimeout,
}

impl Failure {
    fn into_error(self, op: ChainOp) -> WalletError {
        match self {
            Self::Timeout | Self::AcceptThenTimeout => WalletError::Timeout(format!("{op:?}: null chain timeout")),
            Self::Unavailable => WalletError::ServiceUnavailable(format!("{op:?}: null chain unavailable")),
            Self::Rejected(reason) => WalletError::Broadcast(reason),
        }
    }
}

struct State {
    accounts: HashMap<String, AccountInfo>,
    assets: HashMap<u64, AssetParams>,
    pages: HashMap<(String, Option<String>), TransferPage>,
    params: SuggestedParams,
    failures: HashMap<ChainOp, VecDeque<Failure>>,
    calls: HashMap<ChainOp, usize>,
    broadcasts: Vec<Vec<u8>>,
    confirmations: HashMap<TxId, ConfirmationStatus>,
    page_requests: Vec<HistoryPage>,
}

/// An in-memory ledger for testing.
///
/// Unknown accounts read as empty, like a fresh address on a real node.
/// Every call is counted; scripted failures are consumed in order.
pub struct NullChain {
    profile: NetworkProfile,
    switches: Vec<NetworkProfile>,
    state: Mutex<State>,
}

impl NullChain {
    pub fn new(profile: NetworkProfile) -> Self {
        let params = SuggestedParams {
            fee_per_byte: 0,
            min_fee: MicroAlgos::new(1_000),
            last_round: 1_000,
            genesis_id: profile.genesis_id.clone(),
            genesis_hash: [7u8; 32],
        };
        Self {
            profile,
            switches: Vec::new(),
            state: Mutex::new(State {
                accounts: HashMap::new(),
                assets: HashMap::new(),
                pages: HashMap::new(),
                params,
                failures: HashMap::new(),
                calls: HashMap::new(),
                broadcasts: Vec::new(),
                confirmations: HashMap::new(),
                page_requests: Vec::new(),
            }),
        }
    }

    pub fn set_account(&self, address: &WalletAddress, info: AccountInfo) {
        lock(&self.state).accounts.insert(address.to_string(), info);
    }

    pub fn set_asset(&self, params: AssetParams) {
        lock(&self.state).assets.insert(params.asset_id, params);
    }

    /// The page returned for `address` when asked with `token`.
    pub fn set_page(&self, address: &WalletAddress, token: Option<&str>, page: TransferPage) {
        lock(&self.state)
            .pages
            .insert((address.to_string(), token.map(str::to_string)), page);
    }

    pub fn set_params(&self, params: SuggestedParams) {
        lock(&self.state).params = params;
    }

    pub fn set_confirmation(&self, tx_id: TxId, status: ConfirmationStatus) {
        lock(&self.state).confirmations.insert(tx_id, status);
    }

    /// Make the next call of `op` fail. Repeated calls queue further failures.
    pub fn fail_next(&self, op: ChainOp, failure: Failure) {
        lock(&self.state).failures.entry(op).or_default().push_back(failure);
    }

    pub fn calls(&self, op: ChainOp) -> usize {
        lock(&self.state).calls.get(&op).copied().unwrap_or(0)
    }

    /// Signed bytes the node accepted, in order.
    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        lock(&self.state).broadcasts.clone()
    }

    pub fn page_requests(&self) -> Vec<HistoryPage> {
        lock(&self.state).page_requests.clone()
    }

    /// Profiles passed to `switch_profile`, in order.
    pub fn switches(&self) -> &[NetworkProfile] {
        &self.switches
    }

    fn enter(&self, op: ChainOp) -> Result<(), WalletError> {
        let mut state = lock(&self.state);
        *state.calls.entry(op).or_default() += 1;
        match state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(failure) => Err(failure.into_error(op)),
            None => Ok(()),
        }
    }
}

impl Default for NullChain {
    fn default() -> Self {
        Self::new(NetworkProfile::testnet())
    }
}

#[async_trait]
impl ChainClient for NullChain {
    fn profile(&self) -> &NetworkProfile {
        &self.profile
    }

    fn switch_profile(&mut self, profile: NetworkProfile) -> Result<(), WalletError> {
        lock(&self.state).params.genesis_id = profile.genesis_id.clone();
        self.switches.push(profile.clone());
        self.profile = profile;
        Ok(())
    }

    async fn account(&self, address: &WalletAddress) -> Result<AccountInfo, WalletError> {
        self.enter(ChainOp::Account)?;
        Ok(lock(&self.state)
            .accounts
            .get(address.as_str())
            .cloned()
            .unwrap_or(AccountInfo {
                amount: MicroAlgos::ZERO,
                min_balance: MicroAlgos::new(100_000),
                assets: Vec::new(),
            }))
    }

    async fn asset_params(&self, asset_id: u64) -> Result<AssetParams, WalletError> {
        self.enter(ChainOp::Asset)?;
        lock(&self.state)
            .assets
            .get(&asset_id)
            .cloned()
            .ok_or_else(|| WalletError::ServiceUnavailable(format!("asset {asset_id}: HTTP 404 Not Found")))
    }

    async fn suggested_params(&self) -> Result<SuggestedParams, WalletError> {
        self.enter(ChainOp::Params)?;
        Ok(lock(&self.state).params.clone())
    }

    async fn transfers(
        &self,
        address: &WalletAddress,
        page: &HistoryPage,
    ) -> Result<TransferPage, WalletError> {
        self.enter(ChainOp::Transfers)?;
        let mut state = lock(&self.state);
        state.page_requests.push(page.clone());
        let mut found = state
            .pages
            .get(&(address.to_string(), page.next_token.clone()))
            .cloned()
            .unwrap_or_default();
        found.transfers.truncate(page.limit as usize);
        Ok(found)
    }

    async fn broadcast(&self, signed: &[u8]) -> Result<TxId, WalletError> {
        let mut state = lock(&self.state);
        *state.calls.entry(ChainOp::Broadcast).or_default() += 1;
        let failure = state
            .failures
            .get_mut(&ChainOp::Broadcast)
            .and_then(VecDeque::pop_front);

        let tx_id = transaction_id_of_signed(signed)
            .ok_or_else(|| WalletError::Broadcast("malformed signed transaction".into()))?;
        match failure {
            Some(Failure::AcceptThenTimeout) => {
                state.broadcasts.push(signed.to_vec());
                state.confirmations.insert(tx_id, ConfirmationStatus::Pending);
                Err(Failure::AcceptThenTimeout.into_error(ChainOp::Broadcast))
            }
            Some(failure) => Err(failure.into_error(ChainOp::Broadcast)),
            None => {
                state.broadcasts.push(signed.to_vec());
                state.confirmations.insert(tx_id.clone(), ConfirmationStatus::Pending);
                Ok(tx_id)
            }
        }
    }

    async fn confirmation(&self, tx_id: &TxId) -> Result<ConfirmationStatus, WalletError> {
        self.enter(ChainOp::Confirmation)?;
        Ok(lock(&self.state)
            .confirmations
            .get(tx_id)
            .cloned()
            .unwrap_or(ConfirmationStatus::Unknown))
    }
}
