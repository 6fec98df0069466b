//! Per-attempt commissioning parameters.

use commissioner_proto::{
    AttributePath, DstOffsetEntry, IcdClientType, NodeId, RegulatoryLocation, TimeZoneEntry,
    TrustedTimeSource, VendorId,
};

use crate::error::CommissioningError;

/// Wi-Fi network credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiFiCredentials {
    /// SSID
    pub ssid: Vec<u8>,
    /// Passphrase or PSK
    pub credentials: Vec<u8>,
}

/// Credentials supplied after the device was asked to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkCredentials {
    /// Wi-Fi
    WiFi(WiFiCredentials),
    /// Thread operational dataset
    Thread(Vec<u8>),
}

/// Terms-and-conditions acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermsAndConditionsAcknowledgement {
    /// Accepted version
    pub accepted_version: u16,
    /// Bitmask of accepted terms
    pub accepted_terms: u16,
}

/// When to register the commissioner as an ICD check-in client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IcdRegistrationStrategy {
    /// Never register
    #[default]
    Ignore,
    /// Register before `CommissioningComplete`
    BeforeComplete,
}

/// Data for `RegisterClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcdRegistrationInfo {
    /// Node the device checks in with
    pub check_in_node_id: NodeId,
    /// Subject monitored by the client
    pub monitored_subject: u64,
    /// Shared symmetric key
    pub symmetric_key: [u8; 16],
    /// Client type
    pub client_type: IcdClientType,
}

/// Operational certificate chain issued for the commissionee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NocChain {
    /// Node operational certificate
    pub noc: Vec<u8>,
    /// Intermediate certificate, if any
    pub icac: Option<Vec<u8>>,
    /// Root certificate
    pub rcac: Vec<u8>,
    /// Identity protection key
    pub ipk: [u8; 16],
    /// CASE admin subject written with the NOC
    pub admin_subject: u64,
}

/// Input bag for one commissioning attempt.
///
/// Callers fill the configuration half. The commissioning delegate fills the
/// rest from stage reports as the attempt progresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommissioningParameters {
    /// Fail-safe armed for the attempt; falls back to the configured default
    pub fail_safe_expiry_seconds: Option<u16>,
    /// Node id the NOC is expected to carry
    pub remote_node_id: Option<NodeId>,
    /// Attestation nonce; drawn at random when absent
    pub attestation_nonce: Option<[u8; 32]>,
    /// CSR nonce; drawn at random when absent
    pub csr_nonce: Option<[u8; 32]>,

    /// Wi-Fi credentials to provision
    pub wifi_credentials: Option<WiFiCredentials>,
    /// Thread operational dataset to provision
    pub thread_operational_dataset: Option<Vec<u8>>,
    /// Ask the device to scan for Wi-Fi networks
    pub attempt_wifi_network_scan: bool,
    /// Ask the device to scan for Thread networks
    pub attempt_thread_network_scan: bool,

    /// Country code for `SetRegulatoryConfig`
    pub country_code: Option<String>,
    /// Commissioner override of the regulatory location
    pub regulatory_location: Option<RegulatoryLocation>,
    /// Location the device currently reports
    pub device_regulatory_location: Option<RegulatoryLocation>,
    /// Locations the device can operate in
    pub location_capability: Option<RegulatoryLocation>,
    /// Terms-and-conditions acceptance
    pub tc_acknowledgements: Option<TermsAndConditionsAcknowledgement>,

    /// UTC time in microseconds since the epoch
    pub utc_time: Option<u64>,
    /// Time-zone list
    pub time_zone: Option<Vec<TimeZoneEntry>>,
    /// DST offset list
    pub dst_offsets: Option<Vec<DstOffsetEntry>>,
    /// Default NTP server
    pub default_ntp: Option<String>,
    /// Trusted time source
    pub trusted_time_source: Option<TrustedTimeSource>,

    /// ICD registration strategy
    pub icd_registration_strategy: IcdRegistrationStrategy,
    /// ICD registration data
    pub icd_registration: Option<IcdRegistrationInfo>,
    /// Stay-active duration requested from an ICD after network setup
    pub icd_stay_active_duration_ms: Option<u32>,

    /// Stop early if the device is already on our fabric
    pub check_for_matching_fabric: bool,
    /// Leave `CommissioningComplete` to the caller
    pub skip_commissioning_complete: bool,
    /// Extra attributes read alongside the commissioning info
    pub extra_read_paths: Vec<AttributePath>,

    /// Vendor id read from the device
    pub remote_vendor_id: Option<VendorId>,
    /// Product id read from the device
    pub remote_product_id: Option<u16>,
    /// Product attestation intermediate certificate
    pub pai: Option<Vec<u8>>,
    /// Device attestation certificate
    pub dac: Option<Vec<u8>>,
    /// Attestation elements returned by the device
    pub attestation_elements: Option<Vec<u8>>,
    /// Signature over the attestation elements
    pub attestation_signature: Option<Vec<u8>>,
    /// NOCSR elements returned by the device
    pub nocsr_elements: Option<Vec<u8>>,
    /// Signature over the NOCSR elements
    pub csr_signature: Option<Vec<u8>>,
    /// Issued NOC chain
    pub noc_chain: Option<NocChain>,
}

impl CommissioningParameters {
    /// Reject malformed caller-supplied values before an attempt starts.
    pub fn validate(&self) -> Result<(), CommissioningError> {
        if let Some(wifi) = &self.wifi_credentials {
            if wifi.ssid.is_empty() || wifi.ssid.len() > 32 {
                return Err(CommissioningError::InvalidArgument("Wi-Fi SSID length"));
            }
            if wifi.credentials.len() > 64 {
                return Err(CommissioningError::InvalidArgument("Wi-Fi credentials length"));
            }
        }
        if self.thread_operational_dataset.as_ref().is_some_and(|d| d.is_empty() || d.len() > 254)
        {
            return Err(CommissioningError::InvalidArgument("Thread dataset length"));
        }
        if self.country_code.as_ref().is_some_and(|c| c.len() != 2) {
            return Err(CommissioningError::InvalidArgument("country code must be two characters"));
        }
        if self.fail_safe_expiry_seconds == Some(0) {
            return Err(CommissioningError::InvalidArgument("fail-safe expiry must be non-zero"));
        }
        if self.remote_node_id.is_some_and(|id| !id.is_operational()) {
            return Err(CommissioningError::InvalidArgument("remote node id is not operational"));
        }
        Ok(())
    }

    /// Install credentials delivered while waiting in `NeedsNetworkCreds`.
    pub fn apply_network_credentials(&mut self, credentials: NetworkCredentials) {
        match credentials {
            NetworkCredentials::WiFi(wifi) => self.wifi_credentials = Some(wifi),
            NetworkCredentials::Thread(dataset) => self.thread_operational_dataset = Some(dataset),
        }
    }
}
