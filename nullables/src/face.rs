//! Nullable face service: scripted matches, recorded payments.

use async_trait::async_trait;
use biopay_types::TxId;
use biopay_wallet_core::face::{FaceMatchService, FacePaymentRequest, FaceSample, MatchedUser};
use biopay_wallet_core::WalletError;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::lock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    Match(String),
    NoMatch,
    Unavailable,
    Timeout,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Accepted under the given transaction id.
    Accept(String),
    Reject(String),
    Unavailable,
    Timeout,
}

/// A face service that answers from a script.
///
/// Scripted outcomes are consumed in order; once the script is empty the
/// default outcome repeats.
pub struct NullFaceService {
    matches: Mutex<VecDeque<MatchOutcome>>,
    default_match: MatchOutcome,
    payments: Mutex<VecDeque<PaymentOutcome>>,
    samples: Mutex<Vec<FaceSample>>,
    requests: Mutex<Vec<FacePaymentRequest>>,
}

impl NullFaceService {
    pub fn new(default_match: MatchOutcome) -> Self {
        Self {
            matches: Mutex::new(VecDeque::new()),
            default_match,
            payments: Mutex::new(VecDeque::new()),
            samples: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every sample matches `user`.
    pub fn matching(user: impl Into<String>) -> Self {
        Self::new(MatchOutcome::Match(user.into()))
    }

    pub fn no_match() -> Self {
        Self::new(MatchOutcome::NoMatch)
    }

    pub fn unavailable() -> Self {
        Self::new(MatchOutcome::Unavailable)
    }

    pub fn script_match(&self, outcome: MatchOutcome) {
        lock(&self.matches).push_back(outcome);
    }

    pub fn script_payment(&self, outcome: PaymentOutcome) {
        lock(&self.payments).push_back(outcome);
    }

    pub fn match_calls(&self) -> usize {
        lock(&self.samples).len()
    }

    /// Payment requests received, in order.
    pub fn payment_requests(&self) -> Vec<FacePaymentRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl FaceMatchService for NullFaceService {
    async fn match_face(&self, sample: &FaceSample) -> Result<MatchedUser, WalletError> {
        lock(&self.samples).push(sample.clone());
        let outcome = lock(&self.matches)
            .pop_front()
            .unwrap_or_else(|| self.default_match.clone());
        match outcome {
            MatchOutcome::Match(user) => Ok(MatchedUser::new(user)),
            MatchOutcome::NoMatch => Err(WalletError::NoMatch),
            MatchOutcome::Unavailable => Err(WalletError::ServiceUnavailable("face match: HTTP 503".into())),
            MatchOutcome::Timeout => Err(WalletError::Timeout("face match".into())),
        }
    }

    async fn submit_payment(&self, request: &FacePaymentRequest) -> Result<TxId, WalletError> {
        let count = {
            let mut requests = lock(&self.requests);
            requests.push(request.clone());
            requests.len()
        };
        let outcome = lock(&self.payments)
            .pop_front()
            .unwrap_or_else(|| PaymentOutcome::Accept(format!("face-tx-{count}")));
        match outcome {
            PaymentOutcome::Accept(id) => Ok(TxId::parse(id.clone()).unwrap_or_else(|_| TxId::opaque(id))),
            PaymentOutcome::Reject(reason) => Err(WalletError::Broadcast(reason)),
            PaymentOutcome::Unavailable => Err(WalletError::ServiceUnavailable("face payment: HTTP 503".into())),
            PaymentOutcome::Timeout => Err(WalletError::Timeout("face payment".into())),
        }
    }
}
