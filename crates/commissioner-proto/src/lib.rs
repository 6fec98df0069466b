//! Device-facing vocabulary for the commissioning engine.
//!
//! Everything the commissioner says to a commissionee, and everything it
//! expects back, is described here as plain data: identifiers, cluster and
//! attribute ids, attribute paths and values, command requests and responses,
//! and the status codes a device reports.
//!
//! Bit-exact encoding of these messages belongs to the transport collaborator.
//! This crate only fixes the shapes the engine reasons about.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attributes;
pub mod clusters;
pub mod commands;
pub mod elements;
pub mod errors;
pub mod flags;
pub mod ids;
pub mod status;
pub mod thread;

pub use attributes::{AttributePath, AttributeValue, ConcreteAttributePath};
pub use commands::{
    CertificateChainType, Command, CommandKind, CommandResponse, DstOffsetEntry, IcdClientType,
    RegulatoryLocation, ThreadScanResult, TimeGranularity, TimeZoneEntry, TrustedTimeSource,
    WiFiScanResult,
};
pub use elements::{AttestationElements, NocsrElements};
pub use errors::{ProtocolError, Result};
pub use flags::{IcdFeatures, NetworkCommissioningFeatures, TimeSyncFeatures};
pub use ids::{
    AttributeId, ClusterId, CompressedFabricId, EndpointId, FabricId, FabricIndex, NodeId, PeerId,
    VendorId,
};
pub use status::{CommissioningErrorCode, ImStatus, NetworkingStatus, NocStatus};
