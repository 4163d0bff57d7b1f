//! Local identity verification and reward points.
//!
//! Volatile: the ledger lives for the process and is not persisted.

use biopay_types::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

pub const BASIC_TRUST_SCORE: u8 = 25;
pub const ENHANCED_TRUST_SCORE: u8 = 85;
pub const FACE_VERIFICATION_POINTS: u64 = 100;
/// Points redeemed by a standard claim.
pub const STANDARD_CLAIM_POINTS: u64 = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    #[default]
    None,
    Basic,
    Enhanced,
    Premium,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityLedger {
    verified: bool,
    trust_score: u8,
    reward_points: u64,
    level: VerificationLevel,
    face_id: Option<String>,
}

impl IdentityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin verification. Refused once face verification has completed.
    pub fn start_verification(&mut self) -> Result<(), WalletError> {
        if self.level > VerificationLevel::Basic {
            return Err(WalletError::InvalidTransition {
                stage: "verified",
                action: "restart verification",
            });
        }
        self.level = VerificationLevel::Basic;
        self.trust_score = BASIC_TRUST_SCORE;
        tracing::info!(level = ?self.level, "identity verification started");
        Ok(())
    }

    /// Record a completed face verification and credit the bonus.
    pub fn complete_face_verification(&mut self, now: Timestamp) {
        self.verified = true;
        self.level = VerificationLevel::Enhanced;
        self.trust_score = ENHANCED_TRUST_SCORE;
        self.reward_points = self.reward_points.saturating_add(FACE_VERIFICATION_POINTS);
        self.face_id = Some(format!("face_id_{}", now.as_secs()));
        tracing::info!(points = self.reward_points, "face verification completed");
    }

    /// Redeem `amount` points, returning the remaining balance.
    pub fn claim_rewards(&mut self, amount: u64) -> Result<u64, WalletError> {
        if self.reward_points < amount {
            return Err(WalletError::InsufficientPoints {
                requested: amount,
                available: self.reward_points,
            });
        }
        self.reward_points -= amount;
        tracing::info!(claimed = amount, remaining = self.reward_points, "rewards claimed");
        Ok(self.reward_points)
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn trust_score(&self) -> u8 {
        self.trust_score
    }

    pub fn reward_points(&self) -> u64 {
        self.reward_points
    }

    pub fn level(&self) -> VerificationLevel {
        self.level
    }

    pub fn face_id(&self) -> Option<&str> {
        self.face_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn starts_unverified() {
        let ledger = IdentityLedger::new();
        assert!(!ledger.is_verified());
        assert_eq!(ledger.level(), VerificationLevel::None);
        assert_eq!(ledger.trust_score(), 0);
        assert_eq!(ledger.reward_points(), 0);
    }

    #[test]
    fn start_then_complete() {
        let mut ledger = IdentityLedger::new();
        ledger.start_verification().unwrap();
        assert_eq!(ledger.level(), VerificationLevel::Basic);
        assert_eq!(ledger.trust_score(), 25);
        assert!(!ledger.is_verified());

        ledger.complete_face_verification(Timestamp::new(1_700_000_000));
        assert!(ledger.is_verified());
        assert_eq!(ledger.level(), VerificationLevel::Enhanced);
        assert_eq!(ledger.trust_score(), 85);
        assert_eq!(ledger.reward_points(), 100);
        assert_eq!(ledger.face_id(), Some("face_id_1700000000"));
    }

    #[test]
    fn restart_after_verification_refused() {
        let mut ledger = IdentityLedger::new();
        ledger.complete_face_verification(Timestamp::new(1));
        assert_eq!(ledger.start_verification().unwrap_err().kind(), ErrorKind::InvalidState);
        assert_eq!(ledger.level(), VerificationLevel::Enhanced);
    }

    #[test]
    fn claim_within_balance() {
        let mut ledger = IdentityLedger::new();
        ledger.complete_face_verification(Timestamp::new(1));
        assert_eq!(ledger.claim_rewards(STANDARD_CLAIM_POINTS).unwrap(), 50);
        assert_eq!(ledger.claim_rewards(50).unwrap(), 0);
    }

    #[test]
    fn over_claim_leaves_points_unchanged() {
        let mut ledger = IdentityLedger::new();
        ledger.complete_face_verification(Timestamp::new(1));
        let err = ledger.claim_rewards(101).unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientPoints { requested: 101, available: 100 }
        ));
        assert_eq!(ledger.reward_points(), 100);
    }

    #[test]
    fn claim_on_empty_ledger() {
        let mut ledger = IdentityLedger::new();
        assert_eq!(ledger.claim_rewards(STANDARD_CLAIM_POINTS).unwrap_err().kind(), ErrorKind::InsufficientPoints);
        assert_eq!(ledger.claim_rewards(0).unwrap(), 0);
    }
}
