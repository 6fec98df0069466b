//! Signed element envelopes returned by `AttestationRequest` and `CSRRequest`.
//!
//! The device signs `elements || attestation_challenge` with its DAC key, so
//! the commissioner can bind the response to the PASE session it was asked
//! over. The elements themselves are CBOR maps.

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Contents of an attestation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationElements {
    /// Certification declaration
    pub certification_declaration: Vec<u8>,
    /// Nonce echoed from the request
    pub attestation_nonce: [u8; 32],
    /// Device timestamp
    pub timestamp: u32,
}

/// Contents of a CSR response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NocsrElements {
    /// Certificate signing request
    pub csr: Vec<u8>,
    /// Nonce echoed from the request
    pub csr_nonce: [u8; 32],
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| ProtocolError::Cbor(e.to_string()))?;
    Ok(buf)
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| ProtocolError::Cbor(e.to_string()))
}

impl AttestationElements {
    /// Encode to CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    /// Decode from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }
}

impl NocsrElements {
    /// Encode to CBOR.
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    /// Decode from CBOR.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }
}

/// Message covered by the device signature: `elements || challenge`.
pub fn signed_message(elements: &[u8], attestation_challenge: &[u8; 16]) -> Vec<u8> {
    let mut message = Vec::with_capacity(elements.len() + attestation_challenge.len());
    message.extend_from_slice(elements);
    message.extend_from_slice(attestation_challenge);
    message
}
