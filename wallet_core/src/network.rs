//! Network facade: balance, history and payment submission over a [`ChainClient`].
//!
//! Reads are idempotent and retried on transient failures. Submission is
//! never retried; each payment carries an [`IdempotencyKey`] and a key that
//! has already produced a broadcast is refused instead of sent again.

use biopay_types::{AssetAmount, Direction, MicroAlgos, NetworkProfile, TxId, WalletAddress};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use crate::balance::{AssetBalance, PriceTable, Portfolio, NATIVE_UNIT};
use crate::chain::{
    AssetParams, ChainClient, ChainTransfer, ConfirmationStatus, HistoryPage, NATIVE_TRANSFER,
};
use crate::error::WalletError;
use crate::history::TransactionRecord;
use crate::session::Credential;
use crate::transaction_builder::{build_payment, sign_payment};

/// Identifies one payment intent across retries of the same user action.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first for idempotent reads.
    pub read_retries: u32,
    /// Base delay; attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            read_retries: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

/// One page of history records, newest first.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct HistoryResult {
    pub records: Vec<TransactionRecord>,
    pub next_token: Option<String>,
}

#[derive(Clone, Debug)]
enum Submission {
    InFlight,
    Sent(TxId),
}

pub struct NetworkFacade<C> {
    client: C,
    prices: PriceTable,
    retry: RetryPolicy,
    asset_cache: Mutex<HashMap<u64, AssetParams>>,
    submissions: Mutex<HashMap<IdempotencyKey, Submission>>,
}

impl<C: ChainClient> NetworkFacade<C> {
    pub fn new(client: C, prices: PriceTable, retry: RetryPolicy) -> Self {
        Self {
            client,
            prices,
            retry,
            asset_cache: Mutex::new(HashMap::new()),
            submissions: Mutex::new(HashMap::new()),
        }
    }

    pub fn profile(&self) -> &NetworkProfile {
        self.client.profile()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Explorer link for a transaction on the active network.
    pub fn explorer_url(&self, tx_id: &TxId) -> String {
        self.profile().explorer_tx_url(tx_id.as_str())
    }

    pub fn switch_network(&mut self, profile: NetworkProfile) -> Result<(), WalletError> {
        self.client.switch_profile(profile)?;
        self.lock_assets().clear();
        tracing::info!(network = %self.client.profile().id, "network switched");
        Ok(())
    }

    /// Current holdings of `address`. A failed read is an error, never a zero balance.
    pub async fn get_balance(&self, address: &WalletAddress) -> Result<Portfolio, WalletError> {
        let account = self
            .with_retries("account", || self.client.account(address))
            .await?;

        let mut assets = Vec::with_capacity(account.assets.len());
        for holding in &account.assets {
            let params = self.asset(holding.asset_id).await?;
            assets.push(AssetBalance::asset(
                holding.asset_id,
                params.name,
                params.unit_name,
                AssetAmount::new(holding.amount, params.decimals),
                holding.frozen,
                &self.prices,
            ));
        }

        tracing::debug!(address = %address, assets = assets.len(), "balance fetched");
        Ok(Portfolio {
            native: AssetBalance::native(account.amount, &self.prices),
            assets,
            min_balance: account.min_balance,
        })
    }

    pub async fn get_history(
        &self,
        address: &WalletAddress,
        page: &HistoryPage,
    ) -> Result<HistoryResult, WalletError> {
        let fetched = self
            .with_retries("history", || self.client.transfers(address, page))
            .await?;

        let mut records = Vec::with_capacity(fetched.transfers.len());
        for transfer in fetched.transfers {
            records.push(self.to_record(address, transfer).await?);
        }
        records.sort_by_key(|r| Reverse(r.timestamp));

        Ok(HistoryResult {
            records,
            next_token: fetched.next_token,
        })
    }

    /// Build, sign and broadcast a payment. Never retried.
    ///
    /// A key that already produced a broadcast fails with
    /// `DuplicateSubmission`; a key whose submission is still running fails
    /// with `SubmissionInFlight`.
    pub async fn submit_payment(
        &self,
        credential: &Credential,
        recipient: &str,
        amount: MicroAlgos,
        note: &str,
        key: &IdempotencyKey,
    ) -> Result<TxId, WalletError> {
        {
            let mut submissions = self.lock_submissions();
            match submissions.get(key) {
                Some(Submission::Sent(tx_id)) => {
                    tracing::warn!(key = %key, tx_id = %tx_id, "refusing duplicate submission");
                    return Err(WalletError::DuplicateSubmission {
                        tx_id: tx_id.clone(),
                    });
                }
                Some(Submission::InFlight) => return Err(WalletError::SubmissionInFlight),
                None => {
                    submissions.insert(key.clone(), Submission::InFlight);
                }
            }
        }

        let signed = match self.prepare(credential, recipient, amount, note).await {
            Ok(signed) => signed,
            Err(e) => {
                self.lock_submissions().remove(key);
                return Err(e);
            }
        };

        match self.client.broadcast(&signed.bytes).await {
            Ok(tx_id) => {
                if tx_id != signed.tx_id {
                    tracing::warn!(node = %tx_id, local = %signed.tx_id, "node reported a different transaction id");
                }
                tracing::info!(tx_id = %tx_id, amount = %amount, "payment broadcast");
                self.lock_submissions()
                    .insert(key.clone(), Submission::Sent(tx_id.clone()));
                Ok(tx_id)
            }
            Err(e @ WalletError::Timeout(_)) => {
                // The node may have accepted it; keep the key spent.
                tracing::warn!(tx_id = %signed.tx_id, "broadcast timed out, outcome unknown");
                self.lock_submissions()
                    .insert(key.clone(), Submission::Sent(signed.tx_id));
                Err(e)
            }
            Err(e) => {
                tracing::warn!(error = %e, "broadcast failed");
                self.lock_submissions().remove(key);
                Err(e)
            }
        }
    }

    pub async fn confirmation(&self, tx_id: &TxId) -> Result<ConfirmationStatus, WalletError> {
        self.with_retries("confirmation", || self.client.confirmation(tx_id))
            .await
    }

    async fn prepare(
        &self,
        credential: &Credential,
        recipient: &str,
        amount: MicroAlgos,
        note: &str,
    ) -> Result<crate::transaction_builder::SignedTransaction, WalletError> {
        let params = self
            .with_retries("suggested params", || self.client.suggested_params())
            .await?;
        let tx = build_payment(credential.public_key(), recipient, amount, note, &params)?;
        sign_payment(&tx, credential)
    }

    async fn asset(&self, asset_id: u64) -> Result<AssetParams, WalletError> {
        let cached = self.lock_assets().get(&asset_id).cloned();
        if let Some(params) = cached {
            return Ok(params);
        }
        let params = self
            .with_retries("asset", || self.client.asset_params(asset_id))
            .await?;
        self.lock_assets().insert(asset_id, params.clone());
        Ok(params)
    }

    async fn to_record(
        &self,
        address: &WalletAddress,
        transfer: ChainTransfer,
    ) -> Result<TransactionRecord, WalletError> {
        let (asset, decimals) = if transfer.asset_id == NATIVE_TRANSFER {
            (NATIVE_UNIT.to_string(), MicroAlgos::DECIMALS)
        } else {
            let params = self.asset(transfer.asset_id).await?;
            (params.unit_name, params.decimals)
        };
        let (direction, counterparty) = if transfer.sender == address.as_str() {
            (Direction::Sent, transfer.receiver)
        } else {
            (Direction::Received, transfer.sender)
        };
        Ok(TransactionRecord {
            id: transfer.id,
            direction,
            amount: AssetAmount::new(transfer.amount, decimals),
            asset,
            timestamp: transfer.round_time,
            counterparty,
        })
    }

    async fn with_retries<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, WalletError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WalletError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(e) if e.is_transient() && attempt < self.retry.read_retries => {
                    attempt += 1;
                    tracing::warn!(operation, attempt, error = %e, "read failed, retrying");
                    if !self.retry.backoff.is_zero() {
                        tokio::time::sleep(self.retry.backoff * attempt).await;
                    }
                }
                other => return other,
            }
        }
    }

    fn lock_assets(&self) -> std::sync::MutexGuard<'_, HashMap<u64, AssetParams>> {
        self.asset_cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_submissions(&self) -> std::sync::MutexGuard<'_, HashMap<IdempotencyKey, Submission>> {
        self.submissions.lock().unwrap_or_else(|e| e.into_inner())
    }
}
