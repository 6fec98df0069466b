//! Completions fed back into the commissioner.

use commissioner_proto::{AttributeValue, CommandResponse, ConcreteAttributePath};

use crate::{
    device::{DeviceHandle, PaseSession},
    error::CommissioningError,
    params::NocChain,
    services::{AttestationVerificationResult, RequestId, SessionHandle},
};

/// Outcome of a request previously issued through a collaborator.
///
/// Events for requests that were cancelled or superseded are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommissionerEvent {
    /// PASE establishment finished
    PaseEstablished {
        /// Commissionee
        device: DeviceHandle,
        /// Session or failure
        result: Result<PaseSession, CommissioningError>,
    },
    /// A command completed
    CommandResponse {
        /// Request
        request: RequestId,
        /// Response, or the status / transport failure
        result: Result<CommandResponse, CommissioningError>,
    },
    /// A read completed
    ReadResponse {
        /// Request
        request: RequestId,
        /// Reported attributes
        result: Result<Vec<(ConcreteAttributePath, AttributeValue)>, CommissioningError>,
    },
    /// Attestation verification finished
    AttestationVerified {
        /// Request
        request: RequestId,
        /// Outcome
        result: AttestationVerificationResult,
    },
    /// Revocation check finished
    RevocationChecked {
        /// Request
        request: RequestId,
        /// Outcome
        result: AttestationVerificationResult,
    },
    /// NOC chain generation finished
    NocChainGenerated {
        /// Request
        request: RequestId,
        /// Chain or failure
        result: Result<NocChain, CommissioningError>,
    },
    /// CASE establishment finished
    CaseEstablished {
        /// Request
        request: RequestId,
        /// Session or failure
        result: Result<SessionHandle, CommissioningError>,
    },
}
