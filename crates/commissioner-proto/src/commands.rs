//! Commands the commissioner invokes on a commissionee, and their responses.
//!
//! Each [`Command`] is a request/response pair. Commands that only return a
//! status map to [`CommandResponse::Default`].

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    clusters,
    ids::{ClusterId, NodeId, VendorId},
    status::{CommissioningErrorCode, NetworkingStatus, NocStatus},
};

/// Regulatory location of a device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum RegulatoryLocation {
    /// Indoor only
    Indoor = 0,
    /// Outdoor only
    Outdoor = 1,
    /// Both
    IndoorOutdoor = 2,
}

impl RegulatoryLocation {
    /// Decode from the attribute encoding.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Indoor),
            1 => Some(Self::Outdoor),
            2 => Some(Self::IndoorOutdoor),
            _ => None,
        }
    }
}

/// Which certificate a `CertificateChainRequest` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum CertificateChainType {
    /// Device attestation certificate
    Dac = 1,
    /// Product attestation intermediate
    Pai = 2,
}

/// ICD client type for `RegisterClient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum IcdClientType {
    /// Client stays registered across its own restarts
    Permanent = 0,
    /// Client registration is short-lived
    Ephemeral = 1,
}

/// Granularity of a UTC time value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum TimeGranularity {
    /// No time source
    NoTimeGranularity = 0,
    /// Minutes
    Minutes = 1,
    /// Seconds
    Seconds = 2,
    /// Milliseconds
    Milliseconds = 3,
    /// Microseconds
    Microseconds = 4,
}

/// One entry of the device time-zone list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeZoneEntry {
    /// Offset from UTC in seconds
    pub offset: i32,
    /// When the offset takes effect (microseconds since epoch)
    pub valid_at: u64,
    /// Optional zone name
    pub name: Option<String>,
}

/// One entry of the device DST offset list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DstOffsetEntry {
    /// DST offset in seconds
    pub offset: i32,
    /// Start (microseconds since epoch)
    pub valid_starting: u64,
    /// End (microseconds since epoch), `None` for open-ended
    pub valid_until: Option<u64>,
}

/// Trusted time source for the Time Synchronization cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedTimeSource {
    /// Node id of the time source
    pub node_id: NodeId,
    /// Endpoint hosting the time source
    pub endpoint: u16,
}

/// One Wi-Fi network seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiFiScanResult {
    /// SSID
    pub ssid: Vec<u8>,
    /// Signal strength in dBm
    pub rssi: i8,
    /// Channel
    pub channel: u16,
}

/// One Thread network seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadScanResult {
    /// Network name
    pub network_name: String,
    /// Extended PAN id
    pub extended_pan_id: u64,
    /// Channel
    pub channel: u16,
}

/// Device-facing command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Arm or extend the fail-safe; zero disarms it
    ArmFailSafe {
        /// Seconds until expiry
        expiry_length_seconds: u16,
        /// Opaque progress marker stored by the device
        breadcrumb: u64,
    },
    /// Select the regulatory configuration
    SetRegulatoryConfig {
        /// Selected location
        new_regulatory_config: RegulatoryLocation,
        /// Two-letter country code
        country_code: String,
        /// Breadcrumb
        breadcrumb: u64,
    },
    /// Acknowledge terms and conditions
    SetTcAcknowledgements {
        /// Accepted version
        tc_version: u16,
        /// Bitmask of accepted terms
        tc_user_response: u16,
    },
    /// Request a certificate from the attestation chain
    CertificateChainRequest {
        /// Which certificate
        certificate_type: CertificateChainType,
    },
    /// Ask the device to sign attestation elements
    AttestationRequest {
        /// Freshness nonce
        attestation_nonce: [u8; 32],
    },
    /// Ask the device for an operational CSR
    CsrRequest {
        /// Freshness nonce
        csr_nonce: [u8; 32],
        /// Whether this is for an `UpdateNOC`
        is_for_update_noc: bool,
    },
    /// Install the fabric's trusted root certificate
    AddTrustedRootCertificate {
        /// Root certificate
        root_ca_certificate: Vec<u8>,
    },
    /// Install the node operational certificate
    AddNoc {
        /// NOC
        noc_value: Vec<u8>,
        /// Intermediate certificate, if any
        icac_value: Option<Vec<u8>>,
        /// Identity protection key
        ipk_value: [u8; 16],
        /// Subject granted administer privilege
        case_admin_subject: u64,
        /// Vendor of the administrator
        admin_vendor_id: VendorId,
    },
    /// Set the UTC time
    SetUtcTime {
        /// Microseconds since the epoch
        utc_time: u64,
        /// Granularity of the value
        granularity: TimeGranularity,
    },
    /// Set the time-zone list
    SetTimeZone {
        /// Entries
        time_zone: Vec<TimeZoneEntry>,
    },
    /// Set the DST offset list
    SetDstOffset {
        /// Entries
        dst_offset: Vec<DstOffsetEntry>,
    },
    /// Set the default NTP server
    SetDefaultNtp {
        /// Server address or name
        default_ntp: Option<String>,
    },
    /// Set the trusted time source
    SetTrustedTimeSource {
        /// Source
        trusted_time_source: Option<TrustedTimeSource>,
    },
    /// Scan for networks
    ScanNetworks {
        /// Directed scan SSID
        ssid: Option<Vec<u8>>,
        /// Breadcrumb
        breadcrumb: u64,
    },
    /// Add or update a Wi-Fi network
    AddOrUpdateWiFiNetwork {
        /// SSID
        ssid: Vec<u8>,
        /// Passphrase or PSK
        credentials: Vec<u8>,
        /// Breadcrumb
        breadcrumb: u64,
    },
    /// Add or update a Thread network
    AddOrUpdateThreadNetwork {
        /// Operational dataset
        operational_dataset: Vec<u8>,
        /// Breadcrumb
        breadcrumb: u64,
    },
    /// Connect to a configured network
    ConnectNetwork {
        /// SSID or extended PAN id
        network_id: Vec<u8>,
        /// Breadcrumb
        breadcrumb: u64,
    },
    /// Remove a configured network
    RemoveNetwork {
        /// SSID or extended PAN id
        network_id: Vec<u8>,
        /// Breadcrumb
        breadcrumb: u64,
    },
    /// Register an ICD check-in client
    RegisterClient {
        /// Node the device checks in with
        check_in_node_id: NodeId,
        /// Subject monitored by the client
        monitored_subject: u64,
        /// Shared symmetric key
        key: [u8; 16],
        /// Client type
        client_type: IcdClientType,
    },
    /// Ask an ICD to stay active
    StayActiveRequest {
        /// Requested active duration in milliseconds
        stay_active_duration_ms: u32,
    },
    /// Commit commissioning and disarm the fail-safe
    CommissioningComplete,
}

/// Fieldless mirror of [`Command`] for logging and fault tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum CommandKind {
    ArmFailSafe,
    SetRegulatoryConfig,
    SetTcAcknowledgements,
    CertificateChainRequest,
    AttestationRequest,
    CsrRequest,
    AddTrustedRootCertificate,
    AddNoc,
    SetUtcTime,
    SetTimeZone,
    SetDstOffset,
    SetDefaultNtp,
    SetTrustedTimeSource,
    ScanNetworks,
    AddOrUpdateWiFiNetwork,
    AddOrUpdateThreadNetwork,
    ConnectNetwork,
    RemoveNetwork,
    RegisterClient,
    StayActiveRequest,
    CommissioningComplete,
}

impl Command {
    /// Fieldless kind of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::ArmFailSafe { .. } => CommandKind::ArmFailSafe,
            Self::SetRegulatoryConfig { .. } => CommandKind::SetRegulatoryConfig,
            Self::SetTcAcknowledgements { .. } => CommandKind::SetTcAcknowledgements,
            Self::CertificateChainRequest { .. } => CommandKind::CertificateChainRequest,
            Self::AttestationRequest { .. } => CommandKind::AttestationRequest,
            Self::CsrRequest { .. } => CommandKind::CsrRequest,
            Self::AddTrustedRootCertificate { .. } => CommandKind::AddTrustedRootCertificate,
            Self::AddNoc { .. } => CommandKind::AddNoc,
            Self::SetUtcTime { .. } => CommandKind::SetUtcTime,
            Self::SetTimeZone { .. } => CommandKind::SetTimeZone,
            Self::SetDstOffset { .. } => CommandKind::SetDstOffset,
            Self::SetDefaultNtp { .. } => CommandKind::SetDefaultNtp,
            Self::SetTrustedTimeSource { .. } => CommandKind::SetTrustedTimeSource,
            Self::ScanNetworks { .. } => CommandKind::ScanNetworks,
            Self::AddOrUpdateWiFiNetwork { .. } => CommandKind::AddOrUpdateWiFiNetwork,
            Self::AddOrUpdateThreadNetwork { .. } => CommandKind::AddOrUpdateThreadNetwork,
            Self::ConnectNetwork { .. } => CommandKind::ConnectNetwork,
            Self::RemoveNetwork { .. } => CommandKind::RemoveNetwork,
            Self::RegisterClient { .. } => CommandKind::RegisterClient,
            Self::StayActiveRequest { .. } => CommandKind::StayActiveRequest,
            Self::CommissioningComplete => CommandKind::CommissioningComplete,
        }
    }

    /// Cluster the command belongs to.
    pub fn cluster(&self) -> ClusterId {
        match self.kind() {
            CommandKind::ArmFailSafe
            | CommandKind::SetRegulatoryConfig
            | CommandKind::SetTcAcknowledgements
            | CommandKind::CommissioningComplete => clusters::general_commissioning::ID,
            CommandKind::CertificateChainRequest
            | CommandKind::AttestationRequest
            | CommandKind::CsrRequest
            | CommandKind::AddTrustedRootCertificate
            | CommandKind::AddNoc => clusters::operational_credentials::ID,
            CommandKind::SetUtcTime
            | CommandKind::SetTimeZone
            | CommandKind::SetDstOffset
            | CommandKind::SetDefaultNtp
            | CommandKind::SetTrustedTimeSource => clusters::time_synchronization::ID,
            CommandKind::ScanNetworks
            | CommandKind::AddOrUpdateWiFiNetwork
            | CommandKind::AddOrUpdateThreadNetwork
            | CommandKind::ConnectNetwork
            | CommandKind::RemoveNetwork => clusters::network_commissioning::ID,
            CommandKind::RegisterClient | CommandKind::StayActiveRequest => {
                clusters::icd_management::ID
            },
        }
    }
}

/// Response to a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandResponse {
    /// Status-only success
    Default,
    /// `ArmFailSafeResponse`
    ArmFailSafe {
        /// Result
        error_code: CommissioningErrorCode,
        /// Diagnostic text
        debug_text: String,
    },
    /// `SetRegulatoryConfigResponse`
    SetRegulatoryConfig {
        /// Result
        error_code: CommissioningErrorCode,
        /// Diagnostic text
        debug_text: String,
    },
    /// `SetTCAcknowledgementsResponse`
    SetTcAcknowledgements {
        /// Result
        error_code: CommissioningErrorCode,
    },
    /// `CommissioningCompleteResponse`
    CommissioningComplete {
        /// Result
        error_code: CommissioningErrorCode,
        /// Diagnostic text
        debug_text: String,
    },
    /// `CertificateChainResponse`
    CertificateChain {
        /// Requested certificate
        certificate: Vec<u8>,
    },
    /// `AttestationResponse`
    Attestation {
        /// Signed attestation elements
        attestation_elements: Vec<u8>,
        /// Signature over elements and the session challenge
        attestation_signature: Vec<u8>,
    },
    /// `CSRResponse`
    Csr {
        /// Signed NOCSR elements
        nocsr_elements: Vec<u8>,
        /// Signature over elements and the session challenge
        attestation_signature: Vec<u8>,
    },
    /// `NOCResponse`
    Noc {
        /// Result
        status_code: NocStatus,
        /// Fabric index assigned on success
        fabric_index: Option<u8>,
        /// Diagnostic text
        debug_text: Option<String>,
    },
    /// `SetTimeZoneResponse`
    SetTimeZone {
        /// Whether the device wants DST offsets
        dst_offset_required: bool,
    },
    /// `ScanNetworksResponse`
    ScanNetworks {
        /// Result
        networking_status: NetworkingStatus,
        /// Diagnostic text
        debug_text: Option<String>,
        /// Wi-Fi results
        wifi_scan_results: Vec<WiFiScanResult>,
        /// Thread results
        thread_scan_results: Vec<ThreadScanResult>,
    },
    /// `NetworkConfigResponse`
    NetworkConfig {
        /// Result
        networking_status: NetworkingStatus,
        /// Diagnostic text
        debug_text: Option<String>,
        /// Index of the affected network
        network_index: Option<u8>,
    },
    /// `ConnectNetworkResponse`
    ConnectNetwork {
        /// Result
        networking_status: NetworkingStatus,
        /// Diagnostic text
        debug_text: Option<String>,
        /// Transport-specific error value
        error_value: Option<i32>,
    },
    /// `RegisterClientResponse`
    RegisterClient {
        /// Current check-in counter
        icd_counter: u32,
    },
    /// `StayActiveResponse`
    StayActive {
        /// Duration the device promises to stay active
        promised_active_duration_ms: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_clusters() {
        let arm = Command::ArmFailSafe { expiry_length_seconds: 60, breadcrumb: 0 };
        assert_eq!(arm.kind(), CommandKind::ArmFailSafe);
        assert_eq!(arm.cluster(), clusters::general_commissioning::ID);

        let noc = Command::CsrRequest { csr_nonce: [0; 32], is_for_update_noc: false };
        assert_eq!(noc.cluster(), clusters::operational_credentials::ID);

        let stay = Command::StayActiveRequest { stay_active_duration_ms: 30_000 };
        assert_eq!(stay.cluster(), clusters::icd_management::ID);
    }

    #[test]
    fn regulatory_location_decoding() {
        assert_eq!(RegulatoryLocation::from_u8(1), Some(RegulatoryLocation::Outdoor));
        assert_eq!(RegulatoryLocation::from_u8(7), None);
    }
}
