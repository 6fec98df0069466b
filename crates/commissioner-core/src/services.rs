//! Collaborators the engine consumes.
//!
//! Every method issues work and returns at once. `Ok(())` means the request
//! was accepted; its outcome arrives later as a
//! [`CommissionerEvent`](crate::event::CommissionerEvent) carrying the same
//! [`RequestId`]. An `Err` means nothing was sent and no event will follow.

use std::{fmt, time::Duration};

use commissioner_proto::{AttributePath, Command, EndpointId, FabricId, NodeId, PeerId, VendorId};

use crate::{
    device::{DeviceHandle, PeerAddress},
    error::CommissioningError,
};

/// Correlates an issued request with the event that completes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// Opaque handle to an established CASE session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u64);

/// Where a device-facing request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Commissionee over its PASE session
    Commissionee(NodeId),
    /// Device over an operational CASE session
    Operational {
        /// Operational identity
        peer: PeerId,
        /// Session
        session: SessionHandle,
    },
}

/// Outcome of device attestation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum AttestationVerificationResult {
    Success,
    PaaUntrusted,
    PaaNotFound,
    PaaExpired,
    PaiExpired,
    PaiVendorIdMismatch,
    DacExpired,
    DacVendorIdMismatch,
    DacProductIdMismatch,
    DacRevoked,
    PaiRevoked,
    AttestationSignatureInvalid,
    AttestationNonceMismatch,
    CertificationDeclarationInvalid,
    InternalError,
}

impl AttestationVerificationResult {
    /// Whether verification passed.
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// Material handed to the attestation verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationInfo {
    /// Attestation elements
    pub attestation_elements: Vec<u8>,
    /// Signature over elements and challenge
    pub attestation_signature: Vec<u8>,
    /// PASE session challenge
    pub attestation_challenge: [u8; 16],
    /// Nonce sent in `AttestationRequest`
    pub attestation_nonce: [u8; 32],
    /// Product attestation intermediate
    pub pai: Vec<u8>,
    /// Device attestation certificate
    pub dac: Vec<u8>,
    /// Vendor id read from the device
    pub remote_vendor_id: Option<VendorId>,
    /// Product id read from the device
    pub remote_product_id: Option<u16>,
}

/// Material handed to the credentials issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NocChainRequest {
    /// Validated NOCSR elements
    pub nocsr_elements: Vec<u8>,
    /// Signature over elements and challenge
    pub csr_signature: Vec<u8>,
    /// PASE session challenge
    pub attestation_challenge: [u8; 16],
    /// Device attestation certificate
    pub dac: Vec<u8>,
    /// Product attestation intermediate
    pub pai: Vec<u8>,
    /// Node id the NOC should carry, if the caller chose one
    pub node_id: Option<NodeId>,
}

/// Invoke and read transport.
pub trait InteractionClient {
    /// Send `command` to `endpoint` on `target`.
    fn invoke(
        &mut self,
        request: RequestId,
        target: Target,
        endpoint: EndpointId,
        command: Command,
        timeout: Duration,
    ) -> Result<(), CommissioningError>;

    /// Read `paths` from `target` in one exchange.
    fn read(
        &mut self,
        request: RequestId,
        target: Target,
        paths: &[AttributePath],
        timeout: Duration,
    ) -> Result<(), CommissioningError>;

    /// Abandon an outstanding request. No event follows.
    fn cancel(&mut self, request: RequestId);
}

/// PASE and CASE session management.
pub trait SessionEstablisher {
    /// Start PASE with a commissionee. Completes with `PaseEstablished`.
    fn establish_pase(
        &mut self,
        device: DeviceHandle,
        temporary_id: NodeId,
        address: &PeerAddress,
        setup_code: u32,
    ) -> Result<(), CommissioningError>;

    /// Abandon PASE establishment.
    fn cancel_pase(&mut self, device: DeviceHandle);

    /// Tear down the PASE session of a released commissionee.
    fn close_pase(&mut self, device: DeviceHandle);

    /// Drop every CASE session to `peer`.
    fn evict_case_sessions(&mut self, peer: PeerId);

    /// Start CASE with an operational peer. Completes with `CaseEstablished`.
    fn establish_case(&mut self, request: RequestId, peer: PeerId)
    -> Result<(), CommissioningError>;

    /// Abandon CASE establishment.
    fn cancel_case(&mut self, request: RequestId);
}

/// Issues operational certificates.
pub trait OperationalCredentialsIssuer {
    /// Generate a NOC chain. Completes with `NocChainGenerated`.
    fn generate_noc_chain(
        &mut self,
        request: RequestId,
        input: NocChainRequest,
    ) -> Result<(), CommissioningError>;

    /// Node and fabric ids carried by a NOC.
    fn operational_identity(&self, noc: &[u8]) -> Result<(NodeId, FabricId), CommissioningError>;

    /// Abandon generation. No event follows.
    fn cancel(&mut self, _request: RequestId) {}
}

/// Verifies device attestation.
pub trait AttestationVerifier {
    /// Verify attestation. Completes with `AttestationVerified`.
    fn verify(&mut self, request: RequestId, info: AttestationInfo)
    -> Result<(), CommissioningError>;

    /// Check DAC and PAI revocation. Completes with `RevocationChecked`.
    fn check_revocation(
        &mut self,
        request: RequestId,
        info: AttestationInfo,
    ) -> Result<(), CommissioningError>;

    /// Ed25519 public key carried by a DAC.
    fn dac_public_key(&self, dac: &[u8]) -> Result<[u8; 32], CommissioningError>;

    /// Abandon verification. No event follows.
    fn cancel(&mut self, _request: RequestId) {}
}

/// Bundle of collaborators owned by the commissioner.
pub struct Services {
    /// Invoke and read transport
    pub interaction: Box<dyn InteractionClient>,
    /// Session management
    pub sessions: Box<dyn SessionEstablisher>,
    /// Certificate issuer
    pub issuer: Box<dyn OperationalCredentialsIssuer>,
    /// Attestation verifier
    pub attestation: Box<dyn AttestationVerifier>,
}
