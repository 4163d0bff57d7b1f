//! Payment methods offered on the payment screen.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Address,
    Qr,
    Face,
}

/// Inputs a method collects before it can submit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequiredField {
    Amount,
    Recipient,
    Note,
    QrScan,
    FaceCapture,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodInfo {
    pub method: PaymentMethod,
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub required_fields: &'static [RequiredField],
}

const METHODS: [MethodInfo; 3] = [
    MethodInfo {
        method: PaymentMethod::Address,
        id: "address",
        title: "Pay with Address",
        description: "Send a payment to a wallet address",
        required_fields: &[RequiredField::Recipient, RequiredField::Amount, RequiredField::Note],
    },
    MethodInfo {
        method: PaymentMethod::Qr,
        id: "qr",
        title: "Pay with QR Code",
        description: "Scan a payment request QR code",
        required_fields: &[RequiredField::QrScan, RequiredField::Amount, RequiredField::Note],
    },
    MethodInfo {
        method: PaymentMethod::Face,
        id: "face",
        title: "Pay with Face ID",
        description: "Request payment using Face ID authentication",
        required_fields: &[RequiredField::Amount, RequiredField::Note, RequiredField::FaceCapture],
    },
];

impl PaymentMethod {
    pub fn all() -> &'static [MethodInfo] {
        &METHODS
    }

    /// Look a method up by its route id; unknown ids yield `None`.
    pub fn from_id(id: &str) -> Option<Self> {
        METHODS
            .iter()
            .find(|m| m.id.eq_ignore_ascii_case(id.trim()))
            .map(|m| m.method)
    }

    pub fn info(self) -> &'static MethodInfo {
        match self {
            Self::Address => &METHODS[0],
            Self::Qr => &METHODS[1],
            Self::Face => &METHODS[2],
        }
    }

    pub fn id(self) -> &'static str {
        self.info().id
    }

    pub fn requires(self, field: RequiredField) -> bool {
        self.info().required_fields.contains(&field)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
