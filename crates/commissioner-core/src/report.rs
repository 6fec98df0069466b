//! Stage results and the data they carry.

use std::collections::BTreeMap;

use commissioner_proto::{
    AttributeValue, CertificateChainType, CommissioningErrorCode, ConcreteAttributePath,
    EndpointId, FabricIndex, IcdFeatures, ImStatus, NetworkCommissioningFeatures,
    NetworkingStatus, NocStatus, NodeId, RegulatoryLocation, ThreadScanResult, TimeSyncFeatures,
    VendorId, WiFiScanResult,
};

use crate::{
    error::CommissioningError, params::NocChain, services::AttestationVerificationResult,
    stage::CommissioningStage,
};

/// Status code a device attached to a failed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorInfo {
    /// General Commissioning error code
    General(CommissioningErrorCode),
    /// Operational Credentials NOC status
    Noc(NocStatus),
    /// Network Commissioning status plus transport-specific detail
    Network {
        /// Status
        status: NetworkingStatus,
        /// Transport-specific error value
        error_value: Option<i32>,
    },
    /// Interaction-level status
    Im(ImStatus),
}

/// Payload produced by a completed stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommissioningReport {
    /// Nothing to report
    #[default]
    Empty,
    /// Parsed commissioning info
    ReadCommissioningInfo(Box<ReadCommissioningInfo>),
    /// PAI or DAC certificate
    AttestationCertificate {
        /// Which certificate
        kind: CertificateChainType,
        /// DER bytes
        certificate: Vec<u8>,
    },
    /// Signed attestation elements
    AttestationResponse {
        /// Elements
        elements: Vec<u8>,
        /// Signature
        signature: Vec<u8>,
    },
    /// Outcome of attestation verification or revocation checking
    AttestationResult(AttestationVerificationResult),
    /// Signed NOCSR elements
    CsrResponse {
        /// Elements
        elements: Vec<u8>,
        /// Signature
        signature: Vec<u8>,
    },
    /// Issued operational certificate chain
    NocChain(NocChain),
    /// Operational node id carried by the installed NOC
    OperationalNodeId(NodeId),
    /// Time-zone response
    TimeZoneResponse {
        /// Whether the device wants DST offsets
        dst_offset_required: bool,
    },
    /// ICD registration completed
    IcdRegistration {
        /// Check-in counter reported by the device
        counter: u32,
    },
    /// ICD stay-active acknowledged
    IcdStayActive {
        /// Duration the device promised
        promised_active_duration_ms: u32,
    },
    /// Device status behind a failure
    ErrorInfo(DeviceErrorInfo),
}

/// A finished stage and its report, as seen by the commissioning delegate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// Stage that finished
    pub stage: CommissioningStage,
    /// What it produced
    pub report: CommissioningReport,
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageResult {
    /// Failure, if any
    pub error: Option<CommissioningError>,
    /// Report
    pub report: CommissioningReport,
}

impl StageResult {
    /// Success with no report.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Success with a report.
    pub fn report(report: CommissioningReport) -> Self {
        Self { error: None, report }
    }

    /// Failure with no report.
    pub fn err(error: CommissioningError) -> Self {
        Self { error: Some(error), report: CommissioningReport::Empty }
    }

    /// Failure with a report.
    pub fn err_with(error: CommissioningError, report: CommissioningReport) -> Self {
        Self { error: Some(error), report }
    }
}

impl From<Result<CommissioningReport, CommissioningError>> for StageResult {
    fn from(result: Result<CommissioningReport, CommissioningError>) -> Self {
        match result {
            Ok(report) => Self::report(report),
            Err(e) => Self::err(e),
        }
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionStatus {
    /// Failure, `None` on success
    pub error: Option<CommissioningError>,
    /// Stage that failed
    pub failed_stage: Option<CommissioningStage>,
    /// Attestation outcome, if verification ran
    pub attestation_result: Option<AttestationVerificationResult>,
}

impl CompletionStatus {
    /// Whether the attempt succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Networks found by a scan, delivered on the side channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanNetworksResult {
    /// Wi-Fi networks
    pub wifi: Vec<WiFiScanResult>,
    /// Thread networks
    pub thread: Vec<ThreadScanResult>,
}

/// Basic Information section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicInformation {
    /// Vendor id
    pub vendor_id: Option<VendorId>,
    /// Product id
    pub product_id: Option<u16>,
}

/// General Commissioning section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneralCommissioningInfo {
    /// Last breadcrumb written
    pub breadcrumb: u64,
    /// Recommended fail-safe seconds
    pub recommended_fail_safe_seconds: u16,
    /// Current regulatory location
    pub regulatory_config: Option<RegulatoryLocation>,
    /// Supported regulatory locations
    pub location_capability: Option<RegulatoryLocation>,
    /// Whether commissioning and operational networks can coexist
    pub supports_concurrent_connection: bool,
    /// Minimum terms-and-conditions version
    pub tc_min_required_version: Option<u16>,
    /// Whether terms-and-conditions must be acknowledged
    pub tc_acknowledgements_required: bool,
}

/// One Network Commissioning endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkEndpoint {
    /// Endpoint
    pub endpoint: EndpointId,
    /// Transport features
    pub features: NetworkCommissioningFeatures,
    /// ConnectMaxTimeSeconds
    pub connect_max_time_seconds: Option<u8>,
    /// ScanMaxTimeSeconds
    pub scan_max_time_seconds: Option<u8>,
}

/// Network Commissioning section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Endpoints hosting the cluster, ascending
    pub endpoints: Vec<NetworkEndpoint>,
}

impl NetworkInfo {
    /// First endpoint supporting `feature`.
    pub fn endpoint_for(&self, feature: NetworkCommissioningFeatures) -> Option<&NetworkEndpoint> {
        self.endpoints.iter().find(|e| e.features.contains(feature))
    }

    /// Whether the device is reachable without network provisioning.
    pub fn is_on_network(&self) -> bool {
        self.endpoints.is_empty()
            || self.endpoint_for(NetworkCommissioningFeatures::ETHERNET).is_some()
    }
}

/// Time Synchronization section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSyncInfo {
    /// Feature map
    pub features: TimeSyncFeatures,
    /// Time-zone list capacity
    pub time_zone_list_max_size: u8,
    /// DST offset list capacity
    pub dst_offset_list_max_size: u8,
}

/// Existing fabric entry matching the commissioner's fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingFabric {
    /// Node id the device already holds on our fabric
    pub node_id: NodeId,
    /// Fabric index on the device
    pub fabric_index: FabricIndex,
}

/// ICD Management section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IcdInfo {
    /// Feature map
    pub features: IcdFeatures,
    /// Idle mode duration in seconds
    pub idle_mode_duration_s: u32,
    /// Active mode duration in milliseconds
    pub active_mode_duration_ms: u32,
    /// Active mode threshold in milliseconds
    pub active_mode_threshold_ms: u16,
    /// User-active-mode trigger hint
    pub user_active_mode_trigger_hint: u32,
    /// Whether the device currently runs as a long-idle-time ICD
    pub is_lit: bool,
}

/// Aggregate result of the commissioning-info read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadCommissioningInfo {
    /// Basic Information
    pub basic: BasicInformation,
    /// General Commissioning
    pub general: GeneralCommissioningInfo,
    /// Network Commissioning
    pub network: NetworkInfo,
    /// Time Synchronization, when read and present
    pub time: Option<TimeSyncInfo>,
    /// Fabric already holding our root, when checked
    pub matching_fabric: Option<MatchingFabric>,
    /// ICD Management, when read and present
    pub icd: Option<IcdInfo>,
    /// Values read for caller-requested extra paths
    pub extra: BTreeMap<ConcreteAttributePath, AttributeValue>,
}
