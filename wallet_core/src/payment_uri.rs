//! `algorand://` payment URIs as carried by QR codes.
//!
//! `algorand://<recipient>?amount=<decimal ALGO>&note=<percent-encoded>`.
//! Anything that does not parse as such a URI is treated as a bare
//! recipient address.

use biopay_types::amount::format_decimal;
use biopay_types::{MicroAlgos, WalletAddress};
use thiserror::Error;

pub const SCHEME: &str = "algorand://";
pub const DEFAULT_REQUEST_NOTE: &str = "Payment Request";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("missing {SCHEME} scheme")]
    MissingScheme,
    #[error("URI has no recipient")]
    MissingRecipient,
    #[error("malformed percent escape in {0}")]
    BadEscape(String),
}

/// Fields carried by a well-formed payment URI. Empty parameters are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUri {
    pub recipient: String,
    pub amount: Option<String>,
    pub note: Option<String>,
}

/// What a scanned QR payload means for the payment form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    Uri(PaymentUri),
    /// Not a payment URI; the trimmed payload is the recipient and nothing
    /// else on the form changes.
    BareAddress(String),
}

impl ScanResult {
    pub fn recipient(&self) -> &str {
        match self {
            Self::Uri(uri) => &uri.recipient,
            Self::BareAddress(raw) => raw,
        }
    }
}

pub fn parse_scan(payload: &str) -> ScanResult {
    let payload = payload.trim();
    match parse_payment_uri(payload) {
        Ok(uri) => ScanResult::Uri(uri),
        Err(e) => {
            tracing::debug!(error = %e, "scan is not a payment URI, using it as an address");
            ScanResult::BareAddress(payload.to_string())
        }
    }
}

pub fn parse_payment_uri(input: &str) -> Result<PaymentUri, UriError> {
    let input = input.trim();
    let has_scheme = input
        .get(..SCHEME.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SCHEME));
    if !has_scheme {
        return Err(UriError::MissingScheme);
    }
    let rest = &input[SCHEME.len()..];
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, query),
        None => (rest, ""),
    };

    let recipient = percent_decode(path.trim_matches('/'), false)?;
    if recipient.trim().is_empty() {
        return Err(UriError::MissingRecipient);
    }

    let mut amount = None;
    let mut note = None;
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(key, true)?;
        let value = percent_decode(value, true)?;
        let slot = match key.as_str() {
            "amount" => &mut amount,
            "note" => &mut note,
            _ => continue,
        };
        // First occurrence wins.
        if slot.is_none() && !value.is_empty() {
            *slot = Some(value);
        }
    }

    Ok(PaymentUri {
        recipient: recipient.trim().to_string(),
        amount,
        note,
    })
}

fn percent_decode(s: &str, plus_is_space: bool) -> Result<String, UriError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| UriError::BadEscape(s.to_string()))?;
                out.push(hex);
                i += 3;
            }
            b'+' if plus_is_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| UriError::BadEscape(s.to_string()))
}

/// `encodeURIComponent` semantics: everything but unreserved marks is escaped.
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// A request for payment to this wallet, rendered as a QR payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub recipient: WalletAddress,
    pub amount: MicroAlgos,
    pub note: Option<String>,
}

impl PaymentRequest {
    pub fn to_uri(&self) -> String {
        let note = self
            .note
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_REQUEST_NOTE);
        format!(
            "{SCHEME}{}?amount={}&note={}",
            self.recipient,
            algos_string(self.amount),
            percent_encode(note)
        )
    }
}

/// Decimal ALGO without trailing zeros: `5`, `0.25`.
fn algos_string(amount: MicroAlgos) -> String {
    let full = format_decimal(amount.raw(), MicroAlgos::DECIMALS, MicroAlgos::DECIMALS);
    full.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "HNVCPPGOW2SC2YVDVDICU3YNONSTEFLXDXREHJR2YBEKDC2Z3IUZSC6YGI";

    #[test]
    fn parses_full_uri() {
        let uri = parse_payment_uri(&format!("algorand://{ADDR}?amount=2.5&note=Coffee%20%26%20cake")).unwrap();
        assert_eq!(uri.recipient, ADDR);
        assert_eq!(uri.amount.as_deref(), Some("2.5"));
        assert_eq!(uri.note.as_deref(), Some("Coffee & cake"));
    }

    #[test]
    fn plus_decodes_to_space_in_query() {
        let uri = parse_payment_uri(&format!("algorand://{ADDR}?note=hello+there")).unwrap();
        assert_eq!(uri.note.as_deref(), Some("hello there"));
    }

    #[test]
    fn empty_and_unknown_params_ignored() {
        let uri = parse_payment_uri(&format!("algorand://{ADDR}?amount=&label=x&note")).unwrap();
        assert_eq!(uri.amount, None);
        assert_eq!(uri.note, None);
    }

    #[test]
    fn first_duplicate_wins() {
        let uri = parse_payment_uri(&format!("algorand://{ADDR}?amount=1&amount=2")).unwrap();
        assert_eq!(uri.amount.as_deref(), Some("1"));
    }

    #[test]
    fn scheme_is_case_insensitive() {
        assert!(parse_payment_uri(&format!("ALGORAND://{ADDR}")).is_ok());
    }

    #[test]
    fn bare_address_scan() {
        assert_eq!(parse_scan(&format!("  {ADDR}\n")), ScanResult::BareAddress(ADDR.to_string()));
    }

    #[test]
    fn malformed_uri_becomes_bare_recipient() {
        let raw = "algorand://ADDR?note=%ZZ";
        assert_eq!(parse_scan(raw), ScanResult::BareAddress(raw.to_string()));
        assert_eq!(parse_scan("algorand://?amount=1"), ScanResult::BareAddress("algorand://?amount=1".into()));
    }

    #[test]
    fn invalid_utf8_escape_rejected() {
        assert!(matches!(
            parse_payment_uri(&format!("algorand://{ADDR}?note=%FF")),
            Err(UriError::BadEscape(_))
        ));
    }

    #[test]
    fn request_renders_uri_with_default_note() {
        let request = PaymentRequest {
            recipient: WalletAddress::parse(ADDR).unwrap(),
            amount: MicroAlgos::new(5_000_000),
            note: None,
        };
        assert_eq!(request.to_uri(), format!("algorand://{ADDR}?amount=5&note=Payment%20Request"));
    }

    #[test]
    fn rendered_request_parses_back() {
        let request = PaymentRequest {
            recipient: WalletAddress::parse(ADDR).unwrap(),
            amount: MicroAlgos::new(250_000),
            note: Some("Lunch: 50% off!".into()),
        };
        let uri = parse_payment_uri(&request.to_uri()).unwrap();
        assert_eq!(uri.amount.as_deref(), Some("0.25"));
        assert_eq!(uri.note.as_deref(), Some("Lunch: 50% off!"));
        assert_eq!(uri.recipient, ADDR);
    }

    #[test]
    fn zero_amount_renders_as_zero() {
        assert_eq!(algos_string(MicroAlgos::ZERO), "0");
        assert_eq!(algos_string(MicroAlgos::new(1)), "0.000001");
    }
}
