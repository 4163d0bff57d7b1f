//! Balance display: native and asset holdings valued in USD.

use biopay_types::{AssetAmount, MicroAlgos};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Asset id used for the native currency.
pub const NATIVE_ASSET_ID: u64 = 0;
pub const NATIVE_NAME: &str = "Algorand";
pub const NATIVE_UNIT: &str = "ALGO";

/// USD price per whole unit, keyed by unit name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTable(BTreeMap<String, f64>);

impl PriceTable {
    pub fn new(prices: BTreeMap<String, f64>) -> Self {
        Self(prices)
    }

    /// Unknown units are priced at zero.
    pub fn price_of(&self, unit: &str) -> f64 {
        self.0
            .get(unit)
            .or_else(|| self.0.get(&unit.to_uppercase()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, unit: impl Into<String>, usd: f64) {
        self.0.insert(unit.into(), usd);
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self(BTreeMap::from([
            (NATIVE_UNIT.to_string(), 1.60),
            ("USDC".to_string(), 1.00),
        ]))
    }
}

/// One holding of the account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset_id: u64,
    pub name: String,
    pub unit: String,
    pub amount: AssetAmount,
    pub frozen: bool,
    pub usd_value: f64,
}

impl AssetBalance {
    pub fn native(amount: MicroAlgos, prices: &PriceTable) -> Self {
        let amount = AssetAmount::new(amount.raw(), MicroAlgos::DECIMALS);
        Self {
            asset_id: NATIVE_ASSET_ID,
            name: NATIVE_NAME.to_string(),
            unit: NATIVE_UNIT.to_string(),
            usd_value: amount.as_units() * prices.price_of(NATIVE_UNIT),
            amount,
            frozen: false,
        }
    }

    pub fn asset(
        asset_id: u64,
        name: impl Into<String>,
        unit: impl Into<String>,
        amount: AssetAmount,
        frozen: bool,
        prices: &PriceTable,
    ) -> Self {
        let unit = unit.into();
        Self {
            asset_id,
            name: name.into(),
            usd_value: amount.as_units() * prices.price_of(&unit),
            unit,
            amount,
            frozen,
        }
    }

    pub fn is_native(&self) -> bool {
        self.asset_id == NATIVE_ASSET_ID
    }

    /// Amount with at most two fraction digits and the unit, e.g. `12.50 ALGO`.
    pub fn display(&self) -> String {
        format!("{} {}", self.amount.display(), self.unit)
    }
}

/// Everything shown on the balance screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub native: AssetBalance,
    pub assets: Vec<AssetBalance>,
    /// Balance the account must keep to stay open.
    pub min_balance: MicroAlgos,
}

impl Portfolio {
    pub fn total_usd(&self) -> f64 {
        self.native.usd_value + self.assets.iter().map(|a| a.usd_value).sum::<f64>()
    }

    /// Native balance minus the required minimum, saturating at zero.
    pub fn spendable(&self) -> MicroAlgos {
        MicroAlgos::new(self.native.amount.raw)
            .checked_sub(self.min_balance)
            .unwrap_or(MicroAlgos::ZERO)
    }

    pub fn holding(&self, asset_id: u64) -> Option<&AssetBalance> {
        if asset_id == NATIVE_ASSET_ID {
            return Some(&self.native);
        }
        self.assets.iter().find(|a| a.asset_id == asset_id)
    }
}
