//! Payment transaction building and signing.
//!
//! Transactions are encoded as canonical msgpack: map keys sorted, zero and
//! empty fields omitted. The id is base32(SHA-512/256("TX" ‖ encoding)) and
//! the signature covers the same prefixed bytes.

use biopay_crypto::encoding::base32_encode;
use biopay_crypto::{decode_address, sha512_256_multi, verify_signature};
use biopay_types::{MicroAlgos, PublicKey, TxId};

use crate::chain::SuggestedParams;
use crate::error::{ValidationError, WalletError};
use crate::session::Credential;

/// Largest note the network accepts.
pub const MAX_NOTE_BYTES: usize = 1024;
/// Rounds a transaction stays valid after `first_valid`.
pub const VALIDITY_WINDOW: u64 = 1000;

const TX_DOMAIN: &[u8] = b"TX";
/// `{ "sig": bin64, "txn": ... }` header bytes preceding the transaction.
const SIGNED_PREFIX_LEN: usize = 75;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentTransaction {
    pub sender: [u8; 32],
    pub receiver: [u8; 32],
    pub amount: MicroAlgos,
    pub fee: MicroAlgos,
    pub first_valid: u64,
    pub last_valid: u64,
    pub genesis_id: String,
    pub genesis_hash: [u8; 32],
    pub note: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx_id: TxId,
    /// Wire bytes ready for broadcast.
    pub bytes: Vec<u8>,
}

/// Validate inputs and build an unsigned payment from `sender` to `recipient`.
pub fn build_payment(
    sender: &PublicKey,
    recipient: &str,
    amount: MicroAlgos,
    note: &str,
    params: &SuggestedParams,
) -> Result<PaymentTransaction, WalletError> {
    let recipient = recipient.trim();
    if recipient.is_empty() {
        return Err(ValidationError::MissingRecipient.into());
    }
    let receiver = decode_address(recipient)
        .ok_or_else(|| ValidationError::InvalidAddress(recipient.to_string()))?;
    if amount < MicroAlgos::MIN_TRANSFER {
        return Err(ValidationError::AmountBelowMinimum {
            minimum: MicroAlgos::MIN_TRANSFER,
        }
        .into());
    }
    if note.len() > MAX_NOTE_BYTES {
        return Err(ValidationError::NoteTooLong { max: MAX_NOTE_BYTES }.into());
    }

    let last_valid = params.last_round.checked_add(VALIDITY_WINDOW).ok_or_else(|| {
        WalletError::ServiceUnavailable(format!("suggested params: round {} out of range", params.last_round))
    })?;

    let mut tx = PaymentTransaction {
        sender: sender.0,
        receiver,
        amount,
        fee: MicroAlgos::ZERO,
        first_valid: params.last_round,
        last_valid,
        genesis_id: params.genesis_id.clone(),
        genesis_hash: params.genesis_hash,
        note: note.as_bytes().to_vec(),
    };
    let estimated_size = (tx.encode().len() + SIGNED_PREFIX_LEN) as u64;
    tx.fee = MicroAlgos::new(
        params
            .fee_per_byte
            .saturating_mul(estimated_size)
            .max(params.min_fee.raw()),
    );
    Ok(tx)
}

/// Sign with the session credential. The credential must own the sender.
pub fn sign_payment(
    tx: &PaymentTransaction,
    credential: &Credential,
) -> Result<SignedTransaction, WalletError> {
    if credential.public_key().0 != tx.sender {
        return Err(WalletError::Signing(
            "credential does not own the sending account".into(),
        ));
    }
    let message = tx.bytes_to_sign();
    let signature = credential.sign(&message);
    if !verify_signature(&message, &signature, credential.public_key()) {
        return Err(WalletError::Signing("produced signature does not verify".into()));
    }

    let mut w = MsgpackWriter::default();
    w.map(2);
    w.str("sig");
    w.bin(signature.as_bytes());
    w.str("txn");
    let mut bytes = w.into_inner();
    bytes.extend_from_slice(&tx.encode());

    Ok(SignedTransaction {
        tx_id: tx.id(),
        bytes,
    })
}

/// Recover the id of a signed transaction from its wire bytes.
pub fn transaction_id_of_signed(bytes: &[u8]) -> Option<TxId> {
    const SIG_HEADER: &[u8] = &[0x82, 0xa3, b's', b'i', b'g', 0xc4, 0x40];
    const TXN_KEY: &[u8] = &[0xa3, b't', b'x', b'n'];
    if bytes.len() <= SIGNED_PREFIX_LEN
        || !bytes.starts_with(SIG_HEADER)
        || &bytes[SIG_HEADER.len() + 64..SIGNED_PREFIX_LEN] != TXN_KEY
    {
        return None;
    }
    Some(id_of_encoded(&bytes[SIGNED_PREFIX_LEN..]))
}

fn id_of_encoded(encoded: &[u8]) -> TxId {
    TxId::opaque(base32_encode(&sha512_256_multi(&[TX_DOMAIN, encoded])))
}

impl PaymentTransaction {
    /// Canonical msgpack encoding.
    pub fn encode(&self) -> Vec<u8> {
        let zero = [0u8; 32];
        let fields = [
            !self.amount.is_zero(),
            !self.fee.is_zero(),
            self.first_valid != 0,
            !self.genesis_id.is_empty(),
            true,
            self.last_valid != 0,
            !self.note.is_empty(),
            self.receiver != zero,
            self.sender != zero,
            true,
        ];

        let mut w = MsgpackWriter::default();
        w.map(fields.iter().filter(|present| **present).count());
        if fields[0] {
            w.str("amt");
            w.uint(self.amount.raw());
        }
        if fields[1] {
            w.str("fee");
            w.uint(self.fee.raw());
        }
        if fields[2] {
            w.str("fv");
            w.uint(self.first_valid);
        }
        if fields[3] {
            w.str("gen");
            w.str(&self.genesis_id);
        }
        w.str("gh");
        w.bin(&self.genesis_hash);
        if fields[5] {
            w.str("lv");
            w.uint(self.last_valid);
        }
        if fields[6] {
            w.str("note");
            w.bin(&self.note);
        }
        if fields[7] {
            w.str("rcv");
            w.bin(&self.receiver);
        }
        if fields[8] {
            w.str("snd");
            w.bin(&self.sender);
        }
        w.str("type");
        w.str("pay");
        w.into_inner()
    }

    pub fn bytes_to_sign(&self) -> Vec<u8> {
        let encoded = self.encode();
        let mut out = Vec::with_capacity(TX_DOMAIN.len() + encoded.len());
        out.extend_from_slice(TX_DOMAIN);
        out.extend_from_slice(&encoded);
        out
    }

    pub fn id(&self) -> TxId {
        id_of_encoded(&self.encode())
    }
}

/// Just enough of msgpack for transaction maps.
#[derive(Default)]
struct MsgpackWriter {
    buf: Vec<u8>,
}

impl MsgpackWriter {
    fn map(&mut self, len: usize) {
        if len < 16 {
            self.buf.push(0x80 | len as u8);
        } else {
            self.buf.push(0xde);
            self.buf.extend_from_slice(&(len as u16).to_be_bytes());
        }
    }

    fn str(&mut self, s: &str) {
        let len = s.len();
        if len < 32 {
            self.buf.push(0xa0 | len as u8);
        } else if len < 256 {
            self.buf.extend_from_slice(&[0xd9, len as u8]);
        } else {
            self.buf.push(0xda);
            self.buf.extend_from_slice(&(len as u16).to_be_bytes());
        }
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn bin(&mut self, b: &[u8]) {
        let len = b.len();
        if len < 256 {
            self.buf.extend_from_slice(&[0xc4, len as u8]);
        } else if len < 65_536 {
            self.buf.push(0xc5);
            self.buf.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.buf.push(0xc6);
            self.buf.extend_from_slice(&(len as u32).to_be_bytes());
        }
        self.buf.extend_from_slice(b);
    }

    fn uint(&mut self, v: u64) {
        match v {
            0..=0x7f => self.buf.push(v as u8),
            0x80..=0xff => self.buf.extend_from_slice(&[0xcc, v as u8]),
            0x100..=0xffff => {
                self.buf.push(0xcd);
                self.buf.extend_from_slice(&(v as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.buf.push(0xce);
                self.buf.extend_from_slice(&(v as u32).to_be_bytes());
            }
            _ => {
                self.buf.push(0xcf);
                self.buf.extend_from_slice(&v.to_be_bytes());
            }
        }
    }

    fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use biopay_crypto::derive_address;

    const RECEIVER: &str = "HNVCPPGOW2SC2YVDVDICU3YNONSTEFLXDXREHJR2YBEKDC2Z3IUZSC6YGI";

    fn params() -> SuggestedParams {
        SuggestedParams {
            fee_per_byte: 0,
            min_fee: MicroAlgos::new(1_000),
            last_round: 40_000_000,
            genesis_id: "testnet-v1.0".into(),
            genesis_hash: [7u8; 32],
        }
    }

    fn credential() -> Credential {
        Credential::from_seed(&[1u8; 32])
    }

    #[test]
    fn build_sets_validity_and_min_fee() {
        let c = credential();
        let tx = build_payment(c.public_key(), RECEIVER, MicroAlgos::new(5_000_000), "hi", &params()).unwrap();
        assert_eq!(tx.first_valid, 40_000_000);
        assert_eq!(tx.last_valid, 40_001_000);
        assert_eq!(tx.fee, MicroAlgos::new(1_000));
        assert_eq!(tx.note, b"hi");
    }

    #[test]
    fn round_near_u64_max_is_rejected() {
        let c = credential();
        let mut p = params();
        p.last_round = u64::MAX - 10;
        let err = build_payment(c.public_key(), RECEIVER, MicroAlgos::new(5_000_000), "", &p).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    }

    #[test]
    fn per_byte_fee_scales_with_size() {
        let c = credential();
        let mut p = params();
        p.fee_per_byte = 10;
        let tx = build_payment(c.public_key(), RECEIVER, MicroAlgos::new(5_000_000), "", &p).unwrap();
        assert!(tx.fee.raw() > 1_000);
        assert_eq!(tx.fee.raw() % 10, 0);
    }

    #[test]
    fn encoding_is_sorted_map_with_omissions() {
        let c = credential();
        let tx = build_payment(c.public_key(), RECEIVER, MicroAlgos::new(5_000_000), "", &params()).unwrap();
        let bytes = tx.encode();
        // amt fee fv gen gh lv rcv snd type, no note
        assert_eq!(bytes[0], 0x89);
        assert_eq!(&bytes[1..5], &[0xa3, b'a', b'm', b't']);
        assert_eq!(&bytes[5..10], &[0xce, 0x00, 0x4c, 0x4b, 0x40]);
        assert!(!bytes.windows(4).any(|w| w == b"note"));
        assert!(bytes.ends_with(&[0xa4, b't', b'y', b'p', b'e', 0xa3, b'p', b'a', b'y']));
    }

    #[test]
    fn signed_bytes_carry_verifiable_signature_and_id() {
        let c = credential();
        let tx = build_payment(c.public_key(), RECEIVER, MicroAlgos::new(1_000), "note", &params()).unwrap();
        let signed = sign_payment(&tx, &c).unwrap();

        assert_eq!(signed.tx_id.as_str().len(), 52);
        assert!(TxId::parse(signed.tx_id.as_str()).is_ok());
        assert_eq!(transaction_id_of_signed(&signed.bytes), Some(tx.id()));
        let sig = biopay_types::Signature(signed.bytes[7..71].try_into().unwrap());
        assert!(verify_signature(&tx.bytes_to_sign(), &sig, c.public_key()));
    }

    #[test]
    fn id_changes_with_content() {
        let c = credential();
        let a = build_payment(c.public_key(), RECEIVER, MicroAlgos::new(1_000), "", &params()).unwrap();
        let b = build_payment(c.public_key(), RECEIVER, MicroAlgos::new(1_001), "", &params()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn rejects_bad_inputs() {
        let c = credential();
        let pk = c.public_key();
        let amt = MicroAlgos::new(1_000);
        let cases = [
            build_payment(pk, "  ", amt, "", &params()),
            build_payment(pk, "NOTANADDRESS", amt, "", &params()),
            build_payment(pk, RECEIVER, MicroAlgos::new(999), "", &params()),
            build_payment(pk, RECEIVER, amt, &"x".repeat(MAX_NOTE_BYTES + 1), &params()),
        ];
        for result in cases {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn checksum_tampered_recipient_rejected() {
        let c = credential();
        let mut tampered = RECEIVER.to_string();
        tampered.replace_range(57.., "A");
        let err = build_payment(c.public_key(), &tampered, MicroAlgos::new(1_000), "", &params()).unwrap_err();
        assert!(matches!(err, WalletError::Validation(ValidationError::InvalidAddress(_))));
    }

    #[test]
    fn foreign_credential_cannot_sign() {
        let owner = credential();
        let other = Credential::from_seed(&[2u8; 32]);
        assert_ne!(derive_address(owner.public_key()), *other.address());
        let tx = build_payment(owner.public_key(), RECEIVER, MicroAlgos::new(1_000), "", &params()).unwrap();
        assert_eq!(sign_payment(&tx, &other).unwrap_err().kind(), ErrorKind::Signing);
    }

    #[test]
    fn unsigned_bytes_have_no_id() {
        let c = credential();
        let tx = build_payment(c.public_key(), RECEIVER, MicroAlgos::new(1_000), "", &params()).unwrap();
        assert_eq!(transaction_id_of_signed(&tx.encode()), None);
    }

    #[test]
    fn msgpack_uint_widths() {
        let mut w = MsgpackWriter::default();
        w.uint(5);
        w.uint(200);
        w.uint(1_000);
        w.uint(5_000_000);
        w.uint(u64::MAX);
        assert_eq!(
            w.into_inner(),
            vec![
                0x05, 0xcc, 200, 0xcd, 0x03, 0xe8, 0xce, 0x00, 0x4c, 0x4b, 0x40, 0xcf, 0xff, 0xff,
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff
            ]
        );
    }
}
