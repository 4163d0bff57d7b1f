//! Access to the ledger: node (algod) and indexer REST endpoints.
//!
//! [`ChainClient`] is the seam the network facade talks through. The
//! production implementation is [`AlgodClient`]; tests substitute a
//! nullable.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use biopay_types::{MicroAlgos, NetworkProfile, Timestamp, TxId, WalletAddress};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::WalletError;

pub const NATIVE_TRANSFER: u64 = 0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountInfo {
    pub amount: MicroAlgos,
    pub min_balance: MicroAlgos,
    pub assets: Vec<AssetHolding>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetHolding {
    pub asset_id: u64,
    pub amount: u64,
    pub frozen: bool,
}

/// Largest number of decimal places an asset can declare.
pub const MAX_ASSET_DECIMALS: u32 = 19;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetParams {
    pub asset_id: u64,
    pub name: String,
    pub unit_name: String,
    pub decimals: u32,
}

/// Parameters a new transaction needs from the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuggestedParams {
    /// Fee per encoded byte, in microAlgos. Usually zero outside congestion.
    pub fee_per_byte: u64,
    pub min_fee: MicroAlgos,
    pub last_round: u64,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
}

/// Cursor for history reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub limit: u32,
    pub next_token: Option<String>,
}

impl HistoryPage {
    pub fn first(limit: u32) -> Self {
        Self {
            limit,
            next_token: None,
        }
    }
}

/// A value transfer as reported by the indexer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainTransfer {
    pub id: TxId,
    pub sender: String,
    pub receiver: String,
    pub amount: u64,
    /// [`NATIVE_TRANSFER`] for the native currency.
    pub asset_id: u64,
    pub round_time: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct TransferPage {
    pub transfers: Vec<ChainTransfer>,
    pub next_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// In the node's pool, not yet in a block.
    Pending,
    Confirmed { round: u64 },
    /// Dropped from the pool.
    Rejected { reason: String },
    /// The node has no record of the id.
    Unknown,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    fn profile(&self) -> &NetworkProfile;

    /// Point subsequent requests at another network.
    fn switch_profile(&mut self, profile: NetworkProfile) -> Result<(), WalletError>;

    async fn account(&self, address: &WalletAddress) -> Result<AccountInfo, WalletError>;

    async fn asset_params(&self, asset_id: u64) -> Result<AssetParams, WalletError>;

    async fn suggested_params(&self) -> Result<SuggestedParams, WalletError>;

    async fn transfers(
        &self,
        address: &WalletAddress,
        page: &HistoryPage,
    ) -> Result<TransferPage, WalletError>;

    /// Submit signed wire bytes. Never retried by callers.
    async fn broadcast(&self, signed: &[u8]) -> Result<TxId, WalletError>;

    async fn confirmation(&self, tx_id: &TxId) -> Result<ConfirmationStatus, WalletError>;
}

/// Transport settings shared by every HTTP client in the crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Sent as `X-Algo-API-Token` when the node requires one.
    pub api_token: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(5),
            api_token: None,
        }
    }
}

impl HttpSettings {
    pub(crate) fn build_client(&self) -> Result<reqwest::Client, WalletError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| WalletError::Config(format!("failed to create HTTP client: {e}")))
    }
}

/// REST client for a node and its indexer.
#[derive(Clone)]
pub struct AlgodClient {
    http: reqwest::Client,
    profile: NetworkProfile,
    api_token: Option<String>,
}

const API_TOKEN_HEADER: &str = "X-Algo-API-Token";

impl AlgodClient {
    pub fn new(profile: NetworkProfile, settings: &HttpSettings) -> Result<Self, WalletError> {
        Ok(Self {
            http: settings.build_client()?,
            profile,
            api_token: settings.api_token.clone(),
        })
    }

    fn node(&self, path: &str) -> String {
        format!("{}{path}", self.profile.node_url.trim_end_matches('/'))
    }

    fn indexer(&self, path: &str) -> String {
        format!("{}{path}", self.profile.indexer_url.trim_end_matches('/'))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.api_token {
            Some(token) => builder.header(API_TOKEN_HEADER, token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T, WalletError> {
        tracing::debug!(context, "chain request");
        let response = request
            .send()
            .await
            .map_err(|e| WalletError::from_transport(context, e))?;
        let response = check_status(response, context).await?;
        response
            .json()
            .await
            .map_err(|e| WalletError::ServiceUnavailable(format!("{context}: invalid JSON response: {e}")))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) if !body.message.is_empty() => body.message,
        _ => format!("HTTP {status}"),
    }
}

async fn check_status(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, WalletError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let message = error_message(response).await;
    Err(WalletError::ServiceUnavailable(format!(
        "{context}: HTTP {status}: {message}"
    )))
}

#[async_trait]
impl ChainClient for AlgodClient {
    fn profile(&self) -> &NetworkProfile {
        &self.profile
    }

    fn switch_profile(&mut self, profile: NetworkProfile) -> Result<(), WalletError> {
        tracing::info!(network = %profile.id, node = %profile.node_url, "switching network");
        self.profile = profile;
        Ok(())
    }

    async fn account(&self, address: &WalletAddress) -> Result<AccountInfo, WalletError> {
        let url = self.node(&format!("/v2/accounts/{address}"));
        let body: AccountResponse = self
            .get_json(self.request(reqwest::Method::GET, &url), "account")
            .await?;
        Ok(body.into())
    }

    async fn asset_params(&self, asset_id: u64) -> Result<AssetParams, WalletError> {
        let url = self.node(&format!("/v2/assets/{asset_id}"));
        let body: AssetResponse = self
            .get_json(self.request(reqwest::Method::GET, &url), "asset")
            .await?;
        body.try_into()
    }

    async fn suggested_params(&self) -> Result<SuggestedParams, WalletError> {
        let url = self.node("/v2/transactions/params");
        let body: ParamsResponse = self
            .get_json(self.request(reqwest::Method::GET, &url), "suggested params")
            .await?;
        body.try_into()
    }

    async fn transfers(
        &self,
        address: &WalletAddress,
        page: &HistoryPage,
    ) -> Result<TransferPage, WalletError> {
        let url = self.indexer(&format!("/v2/accounts/{address}/transactions"));
        let mut request = self
            .request(reqwest::Method::GET, &url)
            .query(&[("limit", page.limit.to_string())]);
        if let Some(token) = &page.next_token {
            request = request.query(&[("next", token)]);
        }
        let body: IndexerPage = self.get_json(request, "history").await?;
        Ok(body.into())
    }

    async fn broadcast(&self, signed: &[u8]) -> Result<TxId, WalletError> {
        let url = self.node("/v2/transactions");
        tracing::debug!(bytes = signed.len(), "broadcasting transaction");
        let response = self
            .request(reqwest::Method::POST, &url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-binary")
            .body(signed.to_vec())
            .send()
            .await
            .map_err(|e| WalletError::from_transport("broadcast", e))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(WalletError::Broadcast(error_message(response).await));
        }
        let response = check_status(response, "broadcast").await?;
        let body: BroadcastResponse = response
            .json()
            .await
            .map_err(|e| WalletError::ServiceUnavailable(format!("broadcast: invalid JSON response: {e}")))?;
        TxId::parse(body.tx_id)
            .map_err(|e| WalletError::ServiceUnavailable(format!("broadcast: {e}")))
    }

    async fn confirmation(&self, tx_id: &TxId) -> Result<ConfirmationStatus, WalletError> {
        let url = self.node(&format!("/v2/transactions/pending/{tx_id}"));
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| WalletError::from_transport("confirmation", e))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(ConfirmationStatus::Unknown);
        }
        let response = check_status(response, "confirmation").await?;
        let body: PendingResponse = response
            .json()
            .await
            .map_err(|e| WalletError::ServiceUnavailable(format!("confirmation: invalid JSON response: {e}")))?;
        Ok(body.into())
    }
}

// ── Wire formats ────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AccountResponse {
    amount: u64,
    #[serde(default)]
    min_balance: u64,
    #[serde(default)]
    assets: Vec<HoldingResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct HoldingResponse {
    asset_id: u64,
    amount: u64,
    #[serde(default)]
    is_frozen: bool,
}

impl From<AccountResponse> for AccountInfo {
    fn from(r: AccountResponse) -> Self {
        Self {
            amount: MicroAlgos::new(r.amount),
            min_balance: MicroAlgos::new(r.min_balance),
            assets: r
                .assets
                .into_iter()
                .map(|h| AssetHolding {
                    asset_id: h.asset_id,
                    amount: h.amount,
                    frozen: h.is_frozen,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct AssetResponse {
    index: u64,
    params: AssetParamsResponse,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AssetParamsResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    unit_name: Option<String>,
    #[serde(default)]
    decimals: u32,
}

impl TryFrom<AssetResponse> for AssetParams {
    type Error = WalletError;

    fn try_from(r: AssetResponse) -> Result<Self, Self::Error> {
        if r.params.decimals > MAX_ASSET_DECIMALS {
            return Err(WalletError::ServiceUnavailable(format!(
                "asset {}: {} decimals exceeds the maximum of {MAX_ASSET_DECIMALS}",
                r.index, r.params.decimals
            )));
        }
        let unit_name = r
            .params
            .unit_name
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("#{}", r.index));
        Ok(Self {
            asset_id: r.index,
            name: r.params.name.filter(|n| !n.is_empty()).unwrap_or_else(|| unit_name.clone()),
            unit_name,
            decimals: r.params.decimals,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ParamsResponse {
    fee: u64,
    min_fee: u64,
    last_round: u64,
    genesis_id: String,
    genesis_hash: String,
}

impl TryFrom<ParamsResponse> for SuggestedParams {
    type Error = WalletError;

    fn try_from(r: ParamsResponse) -> Result<Self, Self::Error> {
        let genesis_hash: [u8; 32] = BASE64
            .decode(&r.genesis_hash)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| WalletError::ServiceUnavailable("suggested params: malformed genesis hash".into()))?;
        Ok(Self {
            fee_per_byte: r.fee,
            min_fee: MicroAlgos::new(r.min_fee),
            last_round: r.last_round,
            genesis_id: r.genesis_id,
            genesis_hash,
        })
    }
}

#[derive(Deserialize)]
struct BroadcastResponse {
    #[serde(rename = "txId")]
    tx_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PendingResponse {
    #[serde(default)]
    confirmed_round: Option<u64>,
    #[serde(default)]
    pool_error: String,
}

impl From<PendingResponse> for ConfirmationStatus {
    fn from(r: PendingResponse) -> Self {
        match r.confirmed_round {
            Some(round) if round > 0 => Self::Confirmed { round },
            _ if !r.pool_error.is_empty() => Self::Rejected {
                reason: r.pool_error,
            },
            _ => Self::Pending,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct IndexerPage {
    #[serde(default)]
    transactions: Vec<IndexerTransaction>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct IndexerTransaction {
    id: String,
    sender: String,
    #[serde(default)]
    round_time: u64,
    #[serde(default)]
    payment_transaction: Option<PaymentFields>,
    #[serde(default)]
    asset_transfer_transaction: Option<AssetTransferFields>,
}

#[derive(Deserialize)]
struct PaymentFields {
    amount: u64,
    receiver: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AssetTransferFields {
    amount: u64,
    asset_id: u64,
    receiver: String,
}

impl IndexerTransaction {
    /// Only payments and asset transfers are shown in history.
    fn into_transfer(self) -> Option<ChainTransfer> {
        let (receiver, amount, asset_id) = match (self.payment_transaction, self.asset_transfer_transaction) {
            (Some(p), _) => (p.receiver, p.amount, NATIVE_TRANSFER),
            (None, Some(a)) => (a.receiver, a.amount, a.asset_id),
            (None, None) => return None,
        };
        let id = TxId::parse(self.id.clone()).unwrap_or_else(|_| TxId::opaque(self.id));
        Some(ChainTransfer {
            id,
            sender: self.sender,
            receiver,
            amount,
            asset_id,
            round_time: Timestamp::new(self.round_time),
        })
    }
}

impl From<IndexerPage> for TransferPage {
    fn from(page: IndexerPage) -> Self {
        Self {
            transfers: page
                .transactions
                .into_iter()
                .filter_map(IndexerTransaction::into_transfer)
                .collect(),
            next_token: page.next_token.filter(|t| !t.is_empty()),
        }
    }
}
