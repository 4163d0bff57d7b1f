use proptest::prelude::*;

use biopay_types::{parse_decimal, AssetAmount, MicroAlgos, TxId, WalletAddress};

proptest! {
    /// Formatting a microAlgo value with all six decimals and parsing it back is lossless.
    #[test]
    fn micro_algos_decimal_roundtrip(raw in 0u64..10_000_000_000_000) {
        let whole = raw / 1_000_000;
        let frac = raw % 1_000_000;
        let text = format!("{whole}.{frac:06}");
        prop_assert_eq!(MicroAlgos::from_algos_str(&text).unwrap().raw(), raw);
    }

    /// Integers parse to exactly value * 10^decimals.
    #[test]
    fn integer_amounts_scale(value in 0u64..1_000_000, decimals in 0u32..=8) {
        let parsed = parse_decimal(&value.to_string(), decimals).unwrap();
        prop_assert_eq!(parsed, value * 10u64.pow(decimals));
    }

    /// Anything containing a non-digit, non-dot character is rejected.
    #[test]
    fn non_numeric_amounts_rejected(prefix in "[0-9]{0,4}", bad in "[a-zA-Z\\-+eE ,]", suffix in "[0-9]{0,4}") {
        let text = format!("{prefix}{bad}{suffix}");
        // Surrounding whitespace is trimmed before parsing.
        if text.trim().chars().any(|c| !c.is_ascii_digit() && c != '.') {
            prop_assert!(parse_decimal(&text, 6).is_err());
        }
    }

    /// Display never shows more than two fraction digits.
    #[test]
    fn asset_display_fraction_bounded(raw in 0u64..u64::MAX / 2, decimals in 0u32..=10) {
        let shown = AssetAmount::new(raw, decimals).display();
        let frac_len = shown.split_once('.').map(|(_, f)| f.len()).unwrap_or(0);
        prop_assert!(frac_len <= 2);
    }

    /// Addresses of the right length over the base32 alphabet parse; other lengths do not.
    #[test]
    fn address_shape(s in "[A-Z2-7]{1,80}") {
        prop_assert_eq!(WalletAddress::parse(s.clone()).is_ok(), s.len() == 58);
    }

    /// Transaction ids are exactly 52 base32 characters.
    #[test]
    fn tx_id_shape(s in "[A-Z2-7]{1,80}") {
        prop_assert_eq!(TxId::parse(s.clone()).is_ok(), s.len() == 52);
    }
}
