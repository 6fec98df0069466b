//! Status codes reported by a commissionee.
//!
//! Interaction-model status ([`ImStatus`]) says whether a command was
//! processed at all. The cluster-specific codes say whether the business
//! operation behind a processed command succeeded.

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Interaction-model status for an invoke, read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ImStatus {
    /// Processed
    Success = 0x00,
    /// Generic failure
    Failure = 0x01,
    /// Command not supported on the cluster
    UnsupportedCommand = 0x81,
    /// Malformed command
    InvalidCommand = 0x85,
    /// Constraint violated
    ConstraintError = 0x87,
    /// Transaction timed out on the device
    Timeout = 0x94,
    /// Device busy
    Busy = 0x9C,
    /// Cluster not present on the endpoint
    UnsupportedCluster = 0xC3,
    /// Command needs an armed fail-safe
    FailsafeRequired = 0xCA,
}

/// General Commissioning cluster error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum CommissioningErrorCode {
    /// No error
    Ok = 0,
    /// Value outside the permitted range
    ValueOutsideRange = 1,
    /// Requested change not permitted over this session
    InvalidAuthentication = 2,
    /// No fail-safe armed
    NoFailSafe = 3,
    /// Another administrator holds the fail-safe
    BusyWithOtherAdmin = 4,
    /// Required terms and conditions not accepted
    RequiredTcNotAccepted = 5,
    /// Terms and conditions acknowledgement not received
    TcAcknowledgementsNotReceived = 6,
    /// Accepted terms version too old
    TcMinVersionNotMet = 7,
}

impl CommissioningErrorCode {
    /// Whether the code reports success.
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// Operational Credentials cluster NOC status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum NocStatus {
    /// Installed
    Ok = 0,
    /// Public key in the NOC does not match the CSR
    InvalidPublicKey = 1,
    /// Node id in the NOC is not operational
    InvalidNodeOpId = 2,
    /// NOC failed validation
    InvalidNoc = 3,
    /// No CSR outstanding
    MissingCsr = 4,
    /// Fabric table full
    TableFull = 5,
    /// CASE admin subject invalid
    InvalidAdminSubject = 6,
    /// Fabric already present
    FabricConflict = 9,
    /// Label already in use
    LabelConflict = 10,
    /// Fabric index unknown
    InvalidFabricIndex = 11,
}

impl NocStatus {
    /// Whether the code reports success.
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

/// Network Commissioning cluster status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum NetworkingStatus {
    /// OK
    Success = 0,
    /// Value outside range
    OutOfRange = 1,
    /// Network list full
    BoundsExceeded = 2,
    /// Network id not in the list
    NetworkIdNotFound = 3,
    /// Network id already in the list
    DuplicateNetworkId = 4,
    /// Network not reachable
    NetworkNotFound = 5,
    /// Regulatory mismatch
    RegulatoryError = 6,
    /// Credentials rejected
    AuthFailure = 7,
    /// Security type unsupported
    UnsupportedSecurity = 8,
    /// Other connection failure
    OtherConnectionFailure = 9,
    /// IPv6 setup failed
    Ipv6Failed = 10,
    /// Could not bind
    IpBindFailed = 11,
    /// Unknown error
    UnknownError = 12,
}

impl NetworkingStatus {
    /// Whether the code reports success.
    pub fn is_ok(self) -> bool {
        self == Self::Success
    }
}
