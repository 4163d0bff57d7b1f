//! The payment intent state machine.
//!
//! ```text
//! compose ─confirm─▶ capturing ─capture─▶ matching ─match─▶ submitting ─submit─▶ done
//!    │   (face)                                               ▲
//!    └──────────────────────────confirm (address / qr)────────┘
//! ```
//!
//! Every non-terminal stage can end in `failed`; `retry` returns a failed
//! intent to `capturing` (after a failed match) or `compose`. Operations
//! return `Err` only when the call itself is not allowed in the current
//! stage; remote outcomes are reported through the stage.

use biopay_types::{AssetAmount, Direction, MicroAlgos, NetworkProfile, Timestamp, TxId, WalletAddress};

use crate::balance::NATIVE_UNIT;
use crate::chain::ChainClient;
use crate::error::{ErrorKind, ValidationError, WalletError};
use crate::face::{FaceMatchService, FacePaymentRequest, FaceSample, FrameSource, MatchedUser};
use crate::history::TransactionRecord;
use crate::identity::IdentityLedger;
use crate::methods::PaymentMethod;
use crate::network::{IdempotencyKey, NetworkFacade};
use crate::payment_uri::{parse_scan, ScanResult};
use crate::session::Credential;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentStage {
    Compose,
    Capturing,
    Matching,
    Submitting,
    Done { tx_id: TxId },
    Failed { reason: FailureReason },
    Cancelled,
}

impl PaymentStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Compose => "composing",
            Self::Capturing => "capturing",
            Self::Matching => "matching",
            Self::Submitting => "submitting",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Cancelled)
    }
}

/// Why an intent ended in `failed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    NoMatch,
    ServiceUnavailable(String),
    Timeout(String),
    Rejected(ValidationError),
    Broadcast(String),
    Signing(String),
}

impl FailureReason {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoMatch => ErrorKind::Authentication,
            Self::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Rejected(_) => ErrorKind::Validation,
            Self::Broadcast(_) => ErrorKind::Broadcast,
            Self::Signing(_) => ErrorKind::Signing,
        }
    }

    /// Outcome errors become failure reasons; anything else is a refused call.
    fn from_error(e: WalletError) -> Result<Self, WalletError> {
        match e {
            WalletError::NoMatch => Ok(Self::NoMatch),
            WalletError::ServiceUnavailable(m) => Ok(Self::ServiceUnavailable(m)),
            WalletError::Timeout(m) => Ok(Self::Timeout(m)),
            WalletError::Validation(v) => Ok(Self::Rejected(v)),
            WalletError::Broadcast(m) => Ok(Self::Broadcast(m)),
            WalletError::Signing(m) => Ok(Self::Signing(m)),
            other => Err(other),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Matching,
    Submitting,
}

/// One user-initiated transfer moving through the stages.
pub struct PaymentFlow {
    method: PaymentMethod,
    amount_input: String,
    recipient: String,
    note: String,
    key: IdempotencyKey,
    stage: PaymentStage,
    amount: Option<MicroAlgos>,
    sample: Option<FaceSample>,
    matched: Option<MatchedUser>,
    failed_during: Option<Step>,
    submission_in_flight: bool,
}

impl PaymentFlow {
    pub fn new(method: PaymentMethod) -> Self {
        Self::with_key(method, IdempotencyKey::generate())
    }

    pub fn with_key(method: PaymentMethod, key: IdempotencyKey) -> Self {
        Self {
            method,
            amount_input: String::new(),
            recipient: String::new(),
            note: String::new(),
            key,
            stage: PaymentStage::Compose,
            amount: None,
            sample: None,
            matched: None,
            failed_during: None,
            submission_in_flight: false,
        }
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn stage(&self) -> &PaymentStage {
        &self.stage
    }

    pub fn amount_input(&self) -> &str {
        &self.amount_input
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.key
    }

    pub fn matched_user(&self) -> Option<&MatchedUser> {
        self.matched.as_ref()
    }

    pub fn tx_id(&self) -> Option<&TxId> {
        match &self.stage {
            PaymentStage::Done { tx_id } => Some(tx_id),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.stage {
            PaymentStage::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Explorer link for the finished payment.
    pub fn explorer_url(&self, profile: &NetworkProfile) -> Option<String> {
        self.tx_id().map(|id| profile.explorer_tx_url(id.as_str()))
    }

    pub fn set_amount(&mut self, amount: impl Into<String>) -> Result<(), WalletError> {
        self.require(&PaymentStage::Compose, "edit the amount")?;
        self.amount_input = amount.into();
        Ok(())
    }

    pub fn set_recipient(&mut self, recipient: impl Into<String>) -> Result<(), WalletError> {
        self.require(&PaymentStage::Compose, "edit the recipient")?;
        self.recipient = recipient.into();
        Ok(())
    }

    pub fn set_note(&mut self, note: impl Into<String>) -> Result<(), WalletError> {
        self.require(&PaymentStage::Compose, "edit the note")?;
        self.note = note.into();
        Ok(())
    }

    /// Apply a scanned QR payload to the form.
    ///
    /// A payment URI fills the fields it carries. Anything else only
    /// replaces the recipient.
    pub fn apply_scan(&mut self, payload: &str) -> Result<ScanResult, WalletError> {
        self.require(&PaymentStage::Compose, "apply a scan")?;
        let scan = parse_scan(payload);
        match &scan {
            ScanResult::Uri(uri) => {
                self.recipient = uri.recipient.clone();
                if let Some(amount) = &uri.amount {
                    self.amount_input = amount.clone();
                }
                if let Some(note) = &uri.note {
                    self.note = note.clone();
                }
            }
            ScanResult::BareAddress(raw) => self.recipient = raw.clone(),
        }
        Ok(scan)
    }

    /// Leave `compose`. Validation failures keep the intent in `compose`.
    ///
    /// Face payments credit `own_address` when no recipient was entered and
    /// require a completed face verification.
    pub fn confirm(
        &mut self,
        identity: &IdentityLedger,
        own_address: Option<&WalletAddress>,
    ) -> Result<&PaymentStage, WalletError> {
        self.require(&PaymentStage::Compose, "confirm")?;

        let amount = MicroAlgos::from_algos_str(&self.amount_input)?;
        if amount.is_zero() {
            return Err(ValidationError::InvalidAmount.into());
        }

        match self.method {
            PaymentMethod::Address if self.recipient.trim().is_empty() => {
                return Err(ValidationError::MissingRecipient.into());
            }
            PaymentMethod::Face => {
                if !identity.is_verified() {
                    return Err(ValidationError::IdentityNotVerified.into());
                }
                if self.recipient.trim().is_empty() {
                    let own = own_address.ok_or(ValidationError::MissingRecipient)?;
                    self.recipient = own.to_string();
                }
            }
            _ => {}
        }

        self.amount = Some(amount);
        self.stage = match self.method {
            PaymentMethod::Face => PaymentStage::Capturing,
            PaymentMethod::Address | PaymentMethod::Qr => PaymentStage::Submitting,
        };
        tracing::info!(method = %self.method, amount = %amount, key = %self.key, "payment confirmed");
        Ok(&self.stage)
    }

    /// Take one frame. A camera error leaves the intent in `capturing`.
    pub fn capture(&mut self, camera: &mut dyn FrameSource) -> Result<&PaymentStage, WalletError> {
        self.require(&PaymentStage::Capturing, "capture")?;
        let sample = camera.capture_frame()?;
        if sample.is_empty() {
            return Err(WalletError::Capture("camera returned an empty frame".into()));
        }
        self.sample = Some(sample);
        self.stage = PaymentStage::Matching;
        Ok(&self.stage)
    }

    pub async fn match_identity(
        &mut self,
        service: &dyn FaceMatchService,
    ) -> Result<&PaymentStage, WalletError> {
        self.require(&PaymentStage::Matching, "match a face")?;
        let Some(sample) = &self.sample else {
            return Err(WalletError::InvalidTransition {
                stage: "matching",
                action: "match without a captured frame",
            });
        };

        let result = service.match_face(sample).await;
        match result {
            Ok(user) => {
                tracing::info!(user = %user, "identity matched");
                self.matched = Some(user);
                self.sample = None;
                self.stage = PaymentStage::Submitting;
            }
            Err(e) => self.fail(Step::Matching, e)?,
        }
        Ok(&self.stage)
    }

    /// Submit an address or QR payment through the network facade.
    pub async fn submit<C: ChainClient>(
        &mut self,
        facade: &NetworkFacade<C>,
        credential: &Credential,
    ) -> Result<&PaymentStage, WalletError> {
        if self.method == PaymentMethod::Face {
            return Err(WalletError::InvalidTransition {
                stage: self.stage.name(),
                action: "submit a face payment on chain",
            });
        }
        let amount = self.begin_submission()?;

        let result = facade
            .submit_payment(credential, &self.recipient, amount, &self.note, &self.key)
            .await;
        self.submission_in_flight = false;

        match result {
            Ok(tx_id) => self.stage = PaymentStage::Done { tx_id },
            Err(WalletError::DuplicateSubmission { tx_id }) => {
                tracing::info!(tx_id = %tx_id, "intent was already broadcast");
                self.stage = PaymentStage::Done { tx_id };
            }
            Err(e) => self.fail(Step::Submitting, e)?,
        }
        Ok(&self.stage)
    }

    /// Submit a face payment on behalf of the matched user.
    pub async fn submit_face(
        &mut self,
        service: &dyn FaceMatchService,
    ) -> Result<&PaymentStage, WalletError> {
        if self.method != PaymentMethod::Face {
            return Err(WalletError::InvalidTransition {
                stage: self.stage.name(),
                action: "submit through the face service",
            });
        }
        let Some(user) = self.matched.clone() else {
            return Err(WalletError::InvalidTransition {
                stage: self.stage.name(),
                action: "submit without a matched identity",
            });
        };
        let amount = self.begin_submission()?;

        let to = match WalletAddress::parse(self.recipient.as_str()) {
            Ok(to) => to,
            Err(e) => {
                self.submission_in_flight = false;
                self.fail(Step::Submitting, e.into())?;
                return Ok(&self.stage);
            }
        };
        let request = FacePaymentRequest {
            user,
            to,
            amount,
            note: self.note.clone(),
        };
        let result = service.submit_payment(&request).await;
        self.submission_in_flight = false;

        match result {
            Ok(tx_id) => self.stage = PaymentStage::Done { tx_id },
            Err(e) => self.fail(Step::Submitting, e)?,
        }
        Ok(&self.stage)
    }

    /// Send a failed intent back for another attempt with the same key.
    pub fn retry(&mut self) -> Result<&PaymentStage, WalletError> {
        if !matches!(self.stage, PaymentStage::Failed { .. }) {
            return Err(WalletError::InvalidTransition {
                stage: self.stage.name(),
                action: "retry",
            });
        }
        self.stage = match self.failed_during.take() {
            Some(Step::Matching) => PaymentStage::Capturing,
            _ => {
                self.matched = None;
                PaymentStage::Compose
            }
        };
        self.sample = None;
        Ok(&self.stage)
    }

    /// Abandon the intent. Refused once done, or while a submission may
    /// still reach the network.
    pub fn cancel(&mut self) -> Result<(), WalletError> {
        if self.submission_in_flight {
            return Err(WalletError::SubmissionInFlight);
        }
        if self.stage.is_terminal() {
            return Err(WalletError::InvalidTransition {
                stage: self.stage.name(),
                action: "cancel",
            });
        }
        tracing::info!(stage = self.stage.name(), key = %self.key, "payment cancelled");
        self.stage = PaymentStage::Cancelled;
        self.sample = None;
        Ok(())
    }

    /// History entry for a finished payment.
    pub fn record(&self, now: Timestamp) -> Option<TransactionRecord> {
        let tx_id = self.tx_id()?;
        let amount = self.amount?;
        let (direction, counterparty) = match (&self.method, &self.matched) {
            (PaymentMethod::Face, Some(user)) => (Direction::Received, user.to_string()),
            _ => (Direction::Sent, self.recipient.trim().to_string()),
        };
        Some(TransactionRecord {
            id: tx_id.clone(),
            direction,
            amount: AssetAmount::new(amount.raw(), MicroAlgos::DECIMALS),
            asset: NATIVE_UNIT.to_string(),
            timestamp: now,
            counterparty,
        })
    }

    fn require(&self, expected: &PaymentStage, action: &'static str) -> Result<(), WalletError> {
        if self.submission_in_flight {
            return Err(WalletError::SubmissionInFlight);
        }
        if &self.stage != expected {
            return Err(WalletError::InvalidTransition {
                stage: self.stage.name(),
                action,
            });
        }
        Ok(())
    }

    fn begin_submission(&mut self) -> Result<MicroAlgos, WalletError> {
        self.require(&PaymentStage::Submitting, "submit")?;
        let amount = self.amount.ok_or(WalletError::InvalidTransition {
            stage: "submitting",
            action: "submit without a confirmed amount",
        })?;
        self.submission_in_flight = true;
        Ok(amount)
    }

    fn fail(&mut self, step: Step, e: WalletError) -> Result<(), WalletError> {
        let reason = FailureReason::from_error(e)?;
        tracing::warn!(stage = self.stage.name(), reason = ?reason, key = %self.key, "payment failed");
        self.failed_during = Some(step);
        self.stage = PaymentStage::Failed { reason };
        Ok(())
    }
}
