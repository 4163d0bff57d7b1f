//! The wallet: session, network facade, face service and identity ledger
//! wired together from a [`WalletConfig`].

use std::sync::Arc;

use biopay_types::{MicroAlgos, NetworkProfile, Timestamp, TxId, WalletAddress};

use crate::balance::Portfolio;
use crate::chain::{AlgodClient, ChainClient, HistoryPage};
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::face::{FaceApiClient, FaceMatchService, FrameSource};
use crate::history::{TransactionHistory, TransactionRecord};
use crate::identity::IdentityLedger;
use crate::keystore::KdfParams;
use crate::methods::PaymentMethod;
use crate::network::NetworkFacade;
use crate::payment_flow::{PaymentFlow, PaymentStage};
use crate::payment_uri::PaymentRequest;
use crate::session::{NewWallet, SessionState, WalletSession};
use crate::storage::{
    EncryptedFileStore, JsonFileStore, KeyValueStore, TieredStore, FALLBACK_BUCKET,
    GENERAL_BUCKET, SECURE_BUCKET,
};

/// What the user sees after a payment went out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tx_id: TxId,
    pub explorer_url: String,
    pub record: TransactionRecord,
}

pub struct Wallet<C, F> {
    session: WalletSession,
    facade: NetworkFacade<C>,
    face: F,
    identity: IdentityLedger,
    history: TransactionHistory,
    history_cap: usize,
}

impl Wallet<AlgodClient, FaceApiClient> {
    /// Open the stores under `config.data_dir` and restore the last session.
    ///
    /// `device_secret` unlocks the encrypted tier.
    pub fn open(config: &WalletConfig, device_secret: &str) -> Result<Self, WalletError> {
        Self::open_with_kdf(config, device_secret, KdfParams::standard())
    }

    pub fn open_with_kdf(
        config: &WalletConfig,
        device_secret: &str,
        kdf: KdfParams,
    ) -> Result<Self, WalletError> {
        config.validate()?;
        let session = open_session(config, device_secret, kdf);
        let settings = config.http_settings();
        let chain = AlgodClient::new(config.network_profile(), &settings)?;
        let face = FaceApiClient::new(config.face_service_url.clone(), &settings)?;
        let facade = NetworkFacade::new(chain, config.price_table(), config.retry_policy());
        Self::from_parts(session, facade, face, config.history_cap)
    }
}

fn open_session(config: &WalletConfig, device_secret: &str, kdf: KdfParams) -> WalletSession {
    let dir = &config.data_dir;
    let secure: Arc<dyn KeyValueStore> =
        Arc::new(EncryptedFileStore::new(dir, SECURE_BUCKET, device_secret, kdf));
    let fallback: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(dir, FALLBACK_BUCKET));
    let general: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(dir, GENERAL_BUCKET));
    let secrets = TieredStore::new(secure, fallback).with_policy(config.fallback_policy);
    WalletSession::new(secrets, general)
}

impl<C: ChainClient, F: FaceMatchService> Wallet<C, F> {
    /// Assemble a wallet from its parts and restore the session.
    pub fn from_parts(
        mut session: WalletSession,
        facade: NetworkFacade<C>,
        face: F,
        history_cap: usize,
    ) -> Result<Self, WalletError> {
        session.restore_on_launch()?;
        Ok(Self {
            session,
            facade,
            face,
            identity: IdentityLedger::new(),
            history: TransactionHistory::new(history_cap),
            history_cap,
        })
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut WalletSession {
        &mut self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn facade(&self) -> &NetworkFacade<C> {
        &self.facade
    }

    pub fn face_service(&self) -> &F {
        &self.face
    }

    pub fn identity(&self) -> &IdentityLedger {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut IdentityLedger {
        &mut self.identity
    }

    pub fn history(&self) -> &[TransactionRecord] {
        self.history.records()
    }

    pub fn create_wallet(&mut self) -> Result<NewWallet, WalletError> {
        self.session.create()
    }

    pub fn import_wallet(&mut self, phrase: &str) -> Result<WalletAddress, WalletError> {
        self.session.import(phrase)
    }

    /// Forget the account and everything cached for it.
    pub fn disconnect(&mut self) -> Result<(), WalletError> {
        self.history.clear();
        self.session.disconnect()
    }

    pub async fn refresh_balance(&self) -> Result<Portfolio, WalletError> {
        let address = self.connected_address()?;
        self.facade.get_balance(address).await
    }

    /// Replace the local history with the newest page from the indexer.
    pub async fn refresh_history(&mut self) -> Result<&[TransactionRecord], WalletError> {
        let address = self.connected_address()?;
        let limit = u32::try_from(self.history_cap).unwrap_or(u32::MAX);
        let page = self
            .facade
            .get_history(address, &HistoryPage::first(limit))
            .await?;
        self.history.replace(page.records);
        Ok(self.history.records())
    }

    /// Point the facade at another network. Cached history belonged to the
    /// previous one and is dropped.
    pub fn switch_network(&mut self, profile: NetworkProfile) -> Result<(), WalletError> {
        self.facade.switch_network(profile)?;
        self.history.clear();
        Ok(())
    }

    pub fn begin_payment(&self, method: PaymentMethod) -> PaymentFlow {
        PaymentFlow::new(method)
    }

    pub fn confirm(&self, flow: &mut PaymentFlow) -> Result<PaymentStage, WalletError> {
        flow.confirm(&self.identity, self.session.address()).cloned()
    }

    pub fn capture(&self, flow: &mut PaymentFlow, camera: &mut dyn FrameSource) -> Result<PaymentStage, WalletError> {
        flow.capture(camera).cloned()
    }

    pub async fn match_identity(&self, flow: &mut PaymentFlow) -> Result<PaymentStage, WalletError> {
        flow.match_identity(&self.face).await.cloned()
    }

    /// Submit through whichever path the method uses. A finished payment is
    /// recorded in the local history and returned as a receipt.
    pub async fn submit(&mut self, flow: &mut PaymentFlow) -> Result<Option<Receipt>, WalletError> {
        match flow.method() {
            PaymentMethod::Face => {
                flow.submit_face(&self.face).await?;
            }
            PaymentMethod::Address | PaymentMethod::Qr => {
                let credential = self.session.credential()?;
                flow.submit(&self.facade, credential).await?;
            }
        }
        Ok(self.finish(flow))
    }

    fn finish(&mut self, flow: &PaymentFlow) -> Option<Receipt> {
        let record = flow.record(Timestamp::now())?;
        let explorer_url = self.facade.explorer_url(&record.id);
        self.history.record_local(record.clone());
        Some(Receipt {
            tx_id: record.id.clone(),
            explorer_url,
            record,
        })
    }

    /// A QR payload asking others to pay this wallet.
    pub fn payment_request(&self, amount: &str, note: Option<String>) -> Result<PaymentRequest, WalletError> {
        let recipient = self.connected_address()?.clone();
        let amount = MicroAlgos::from_algos_str(amount)?;
        Ok(PaymentRequest { recipient, amount, note })
    }

    fn connected_address(&self) -> Result<&WalletAddress, WalletError> {
        self.session.address().ok_or(WalletError::NotConnected)
    }
}
