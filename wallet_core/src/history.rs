//! Recent transactions, newest first.

use biopay_types::{AssetAmount, Direction, Timestamp, TxId};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_CAP: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TxId,
    pub direction: Direction,
    pub amount: AssetAmount,
    /// Unit name of the transferred asset.
    pub asset: String,
    pub timestamp: Timestamp,
    /// The other party: receiver when sent, sender when received.
    pub counterparty: String,
}

impl TransactionRecord {
    /// Signed display form, e.g. `-1.50 ALGO` / `+3 USDC`.
    pub fn display_amount(&self) -> String {
        let sign = match self.direction {
            Direction::Sent => '-',
            Direction::Received => '+',
        };
        format!("{sign}{} {}", self.amount.display(), self.asset)
    }
}

/// The list shown on the history screen.
///
/// Reads from the indexer replace the list wholesale; locally submitted
/// payments are prepended and the list is trimmed to `cap`.
#[derive(Clone, Debug)]
pub struct TransactionHistory {
    records: Vec<TransactionRecord>,
    cap: usize,
}

impl TransactionHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            records: Vec::new(),
            cap: cap.max(1),
        }
    }

    pub fn replace(&mut self, records: Vec<TransactionRecord>) {
        self.records = records;
    }

    pub fn record_local(&mut self, record: TransactionRecord) {
        if self.records.iter().any(|r| r.id == record.id) {
            return;
        }
        self.records.insert(0, record);
        self.records.truncate(self.cap);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for TransactionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}
