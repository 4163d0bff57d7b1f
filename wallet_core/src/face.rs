//! Remote face matching and face-authorized payments.
//!
//! The wallet never sees the matched user's key: the service resolves a
//! face sample to an enrolled user and, for face payments, submits the
//! transfer on that user's behalf.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use biopay_types::{MicroAlgos, TxId, WalletAddress};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chain::HttpSettings;
use crate::error::WalletError;

/// A captured frame, already encoded the way the service expects
/// (a base64 JPEG data URL).
#[derive(Clone, PartialEq, Eq)]
pub struct FaceSample(String);

impl FaceSample {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn from_jpeg(bytes: &[u8]) -> Self {
        Self(format!("data:image/jpeg;base64,{}", BASE64.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for FaceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceSample({} bytes)", self.0.len())
    }
}

/// Enrolled user id returned by a successful match.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchedUser(String);

impl MatchedUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pay `amount` from the matched user to `to`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FacePaymentRequest {
    pub user: MatchedUser,
    pub to: WalletAddress,
    pub amount: MicroAlgos,
    pub note: String,
}

#[async_trait]
pub trait FaceMatchService: Send + Sync {
    /// `Err(NoMatch)` when no enrolled identity matches the sample.
    async fn match_face(&self, sample: &FaceSample) -> Result<MatchedUser, WalletError>;

    async fn submit_payment(&self, request: &FacePaymentRequest) -> Result<TxId, WalletError>;
}

/// Source of camera frames.
pub trait FrameSource {
    fn capture_frame(&mut self) -> Result<FaceSample, WalletError>;
}

/// HTTP client for the face service (`/api/getFaceID`, `/api/submitPayment`).
#[derive(Clone)]
pub struct FaceApiClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct MatchRequest<'a> {
    image: &'a str,
}

#[derive(Serialize)]
struct PaymentBody<'a> {
    user: &'a str,
    to: &'a str,
    /// Whole ALGO as a decimal string.
    amount: String,
    note: &'a str,
}

#[derive(Deserialize)]
struct ServiceReply {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl ServiceReply {
    /// The `result` field as a non-empty string.
    fn result_str(&self) -> Option<String> {
        match &self.result {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl FaceApiClient {
    pub fn new(base_url: impl Into<String>, settings: &HttpSettings) -> Result<Self, WalletError> {
        Ok(Self {
            http: settings.build_client()?,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B, context: &str) -> Result<(reqwest::StatusCode, ServiceReply), WalletError> {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        tracing::debug!(context, "face service request");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| WalletError::from_transport(context, e))?;
        let status = response.status();
        if status.is_server_error() {
            return Err(WalletError::ServiceUnavailable(format!("{context}: HTTP {status}")));
        }
        let reply = response
            .json::<ServiceReply>()
            .await
            .map_err(|e| WalletError::ServiceUnavailable(format!("{context}: invalid JSON response: {e}")))?;
        Ok((status, reply))
    }
}

#[async_trait]
impl FaceMatchService for FaceApiClient {
    async fn match_face(&self, sample: &FaceSample) -> Result<MatchedUser, WalletError> {
        let (status, reply) = self
            .post("/api/getFaceID", &MatchRequest { image: sample.as_str() }, "face match")
            .await?;
        match reply.result_str() {
            Some(user) if status.is_success() => {
                tracing::info!("face matched an enrolled user");
                Ok(MatchedUser::new(user))
            }
            _ if status.is_success()
                || status == reqwest::StatusCode::NOT_FOUND
                || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY =>
            {
                tracing::info!("face did not match any enrolled user");
                Err(WalletError::NoMatch)
            }
            _ => Err(WalletError::ServiceUnavailable(format!(
                "face match: HTTP {status}: {}",
                reply.error.unwrap_or_default()
            ))),
        }
    }

    async fn submit_payment(&self, request: &FacePaymentRequest) -> Result<TxId, WalletError> {
        let body = PaymentBody {
            user: request.user.as_str(),
            to: request.to.as_str(),
            amount: biopay_types::amount::format_decimal(
                request.amount.raw(),
                MicroAlgos::DECIMALS,
                MicroAlgos::DECIMALS,
            ),
            note: &request.note,
        };
        let (status, reply) = self.post("/api/submitPayment", &body, "face payment").await?;
        match reply.result_str() {
            Some(id) if status.is_success() => {
                let tx_id = TxId::parse(id.clone()).unwrap_or_else(|_| TxId::opaque(id));
                tracing::info!(tx_id = %tx_id, "face payment submitted");
                Ok(tx_id)
            }
            _ => Err(WalletError::Broadcast(
                reply
                    .error
                    .unwrap_or_else(|| format!("face payment rejected: HTTP {status}")),
            )),
        }
    }
}
