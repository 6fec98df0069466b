//! Commissioning error types.

use commissioner_proto::{
    AttributeId, ClusterId, CommandKind, CommissioningErrorCode, FabricId, ImStatus,
    NetworkingStatus, NocStatus, NodeId, ProtocolError,
};
use thiserror::Error;

use crate::services::AttestationVerificationResult;

/// Errors produced while pairing or commissioning a device.
///
/// Only the central stage-completion path decides whether an error ends an
/// attempt. Handlers build these and hand them upward.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommissioningError {
    /// A parameter required by the current stage is missing or malformed.
    /// No device interaction was attempted.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An operation was requested in a state that does not allow it
    #[error("incorrect state: {0}")]
    IncorrectState(&'static str),

    /// A request could not be sent, or the exchange failed in transit
    #[error("transport failure: {0}")]
    Transport(String),

    /// The per-call exchange timeout elapsed
    #[error("exchange timed out")]
    Timeout,

    /// The device refused to process a request
    #[error("device returned interaction status {0:?}")]
    Status(ImStatus),

    /// General Commissioning cluster reported a non-OK error code
    #[error("device reported commissioning error {0:?}")]
    Commissioning(CommissioningErrorCode),

    /// Operational Credentials cluster reported a non-OK NOC status
    #[error("device reported NOC status {0:?}")]
    Noc(NocStatus),

    /// Network Commissioning cluster reported a non-success status
    #[error("device reported networking status {0:?}")]
    Networking(NetworkingStatus),

    /// The device answered with a response that does not fit the request
    #[error("unexpected response to {0:?}")]
    UnexpectedResponse(CommandKind),

    /// A mandatory attribute was absent from the commissioning read
    #[error("attribute {attribute:#06x} of cluster {cluster:#06x} missing from read")]
    MissingAttribute {
        /// Cluster
        cluster: ClusterId,
        /// Attribute
        attribute: AttributeId,
    },

    /// Device attestation did not succeed
    #[error("device attestation failed: {0:?}")]
    Attestation(AttestationVerificationResult),

    /// The CSR envelope failed validation
    #[error("invalid CSR: {0}")]
    InvalidCsr(&'static str),

    /// The credentials issuer could not produce a NOC chain
    #[error("NOC chain generation failed: {0}")]
    NocIssuance(String),

    /// The installed NOC names a different node than expected
    #[error("operational node id mismatch: expected {expected}, NOC carries {actual}")]
    OperationalIdMismatch {
        /// Node id the attempt was configured for
        expected: NodeId,
        /// Node id carried by the NOC
        actual: NodeId,
    },

    /// The installed NOC belongs to a different fabric
    #[error("NOC fabric {actual:?} does not match commissioner fabric {expected:?}")]
    FabricMismatch {
        /// Commissioner fabric
        expected: FabricId,
        /// Fabric carried by the NOC
        actual: FabricId,
    },

    /// PASE or CASE session establishment failed
    #[error("session establishment failed: {0}")]
    SessionEstablishment(String),

    /// The fabric table rejected an operation
    #[error("fabric table: {0}")]
    FabricTable(String),

    /// The device proxy pool has no free slot
    #[error("no free device proxy slot")]
    NoMemory,

    /// Device-supplied data could not be interpreted
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The attempt was cancelled locally
    #[error("commissioning cancelled")]
    Cancelled,
}

/// Coarse classification of a [`CommissioningError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or malformed input; nothing was sent
    Argument,
    /// Send failure, lost exchange or timeout
    Transport,
    /// Device-reported business failure
    Device,
    /// State-contract violation
    State,
    /// Trust decision failed (attestation, CSR, identity)
    Security,
    /// Local cancellation
    Cancelled,
}

impl CommissioningError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::NoMemory => ErrorKind::Argument,
            Self::Transport(_) | Self::Timeout | Self::SessionEstablishment(_) => {
                ErrorKind::Transport
            },
            Self::Status(_)
            | Self::Commissioning(_)
            | Self::Noc(_)
            | Self::Networking(_)
            | Self::UnexpectedResponse(_)
            | Self::MissingAttribute { .. }
            | Self::Protocol(_) => ErrorKind::Device,
            Self::IncorrectState(_) | Self::FabricTable(_) => ErrorKind::State,
            Self::Attestation(_)
            | Self::InvalidCsr(_)
            | Self::NocIssuance(_)
            | Self::OperationalIdMismatch { .. }
            | Self::FabricMismatch { .. } => ErrorKind::Security,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether this error is a local cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(CommissioningError::InvalidArgument("ssid").kind(), ErrorKind::Argument);
        assert_eq!(CommissioningError::Timeout.kind(), ErrorKind::Transport);
        assert_eq!(
            CommissioningError::Commissioning(CommissioningErrorCode::NoFailSafe).kind(),
            ErrorKind::Device
        );
        assert_eq!(CommissioningError::IncorrectState("x").kind(), ErrorKind::State);
        assert!(CommissioningError::Cancelled.is_cancellation());
        assert!(!CommissioningError::Timeout.is_cancellation());
    }
}
