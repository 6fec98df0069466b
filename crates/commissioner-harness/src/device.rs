//! Simulated commissionee.
//!
//! A [`SimDevice`] holds a real Ed25519 attestation key and enforces the
//! device side of the fail-safe contract: configuration commands need an
//! armed fail-safe, and when the fail-safe lapses or is disarmed before
//! `CommissioningComplete`, everything configured under it is rolled back.

use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use commissioner_core::CommissioningError;
use commissioner_proto::{
    AttestationElements, AttributePath, AttributeValue, CertificateChainType, Command,
    CommandKind, CommandResponse, CommissioningErrorCode, ConcreteAttributePath, EndpointId,
    FabricId, FabricIndex, IcdFeatures, ImStatus, NetworkCommissioningFeatures, NetworkingStatus,
    NocStatus, NocsrElements, NodeId, ThreadScanResult, TimeSyncFeatures, VendorId,
    WiFiScanResult,
    clusters::{
        FEATURE_MAP, basic_information, general_commissioning, icd_management,
        network_commissioning, operational_credentials, time_synchronization,
    },
    elements::signed_message,
    thread,
};
use ed25519_dalek::{Signer, SigningKey};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::bus::{decode_noc, encode_dac};

/// Network interfaces a device exposes for commissioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNetwork {
    /// Endpoint of the Wi-Fi Network Commissioning cluster
    pub wifi_endpoint: Option<EndpointId>,
    /// Endpoint of the Thread Network Commissioning cluster
    pub thread_endpoint: Option<EndpointId>,
    /// Whether the device is already on the operational network
    pub ethernet: bool,
    /// ConnectMaxTimeSeconds
    pub connect_max_time_seconds: u8,
    /// ScanMaxTimeSeconds
    pub scan_max_time_seconds: u8,
}

impl DeviceNetwork {
    /// Already reachable; no network provisioning needed.
    pub fn on_network() -> Self {
        Self {
            wifi_endpoint: None,
            thread_endpoint: None,
            ethernet: true,
            connect_max_time_seconds: 0,
            scan_max_time_seconds: 0,
        }
    }

    /// Wi-Fi only, on endpoint 1.
    pub fn wifi() -> Self {
        Self {
            wifi_endpoint: Some(1),
            ethernet: false,
            connect_max_time_seconds: 20,
            scan_max_time_seconds: 10,
            ..Self::on_network()
        }
    }

    /// Thread only, on endpoint 1.
    pub fn thread() -> Self {
        Self { wifi_endpoint: None, thread_endpoint: Some(1), ..Self::wifi() }
    }

    /// Wi-Fi on endpoint 1 and Thread on endpoint 2.
    pub fn dual() -> Self {
        Self { thread_endpoint: Some(2), ..Self::wifi() }
    }

    fn endpoints(&self) -> Vec<(EndpointId, NetworkCommissioningFeatures)> {
        let mut endpoints = Vec::new();
        if self.ethernet {
            endpoints.push((0, NetworkCommissioningFeatures::ETHERNET));
        }
        if let Some(ep) = self.wifi_endpoint {
            endpoints.push((ep, NetworkCommissioningFeatures::WIFI));
        }
        if let Some(ep) = self.thread_endpoint {
            endpoints.push((ep, NetworkCommissioningFeatures::THREAD));
        }
        endpoints
    }
}

/// Fabric the device already belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingFabric {
    /// Root public key
    pub root_public_key: Vec<u8>,
    /// Fabric id
    pub fabric_id: FabricId,
    /// Node id on that fabric
    pub node_id: NodeId,
    /// Fabric index on the device
    pub fabric_index: FabricIndex,
}

/// Device state that the fail-safe protects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Provisional {
    breadcrumb: u64,
    trusted_root: Option<Vec<u8>>,
    noc: Option<Vec<u8>>,
    networks: Vec<Vec<u8>>,
    connected: Option<Vec<u8>>,
    icd_clients: Vec<NodeId>,
}

/// Simulated commissionee.
pub struct SimDevice {
    temporary_id: NodeId,
    setup_code: u32,
    vendor_id: VendorId,
    product_id: u16,
    dac_key: SigningKey,
    operational_key: SigningKey,
    network: DeviceNetwork,
    time: Option<TimeSyncFeatures>,
    dst_required: bool,
    icd: Option<IcdFeatures>,
    tc_min_version: Option<u16>,
    fabric: Option<ExistingFabric>,
    recommended_fail_safe: u16,

    challenge: Option<[u8; 16]>,
    fail_safe: Option<Instant>,
    lapses: u32,
    disarms: u32,
    state: Provisional,
    committed: Option<Provisional>,
    handled: Vec<CommandKind>,
}

impl SimDevice {
    /// Device answering PASE for `temporary_id` with `setup_code`.
    pub fn new(temporary_id: NodeId, setup_code: u32, rng: &mut ChaCha8Rng) -> Self {
        Self {
            temporary_id,
            setup_code,
            vendor_id: VendorId(0xFFF1),
            product_id: 0x8001,
            dac_key: SigningKey::generate(rng),
            operational_key: SigningKey::generate(rng),
            network: DeviceNetwork::on_network(),
            time: None,
            dst_required: false,
            icd: None,
            tc_min_version: None,
            fabric: None,
            recommended_fail_safe: 60,
            challenge: None,
            fail_safe: None,
            lapses: 0,
            disarms: 0,
            state: Provisional::default(),
            committed: None,
            handled: Vec::new(),
        }
    }

    /// Set the network interfaces.
    pub fn with_network(mut self, network: DeviceNetwork) -> Self {
        self.network = network;
        self
    }

    /// Host the Time Synchronization cluster.
    pub fn with_time_sync(mut self, features: TimeSyncFeatures, dst_required: bool) -> Self {
        self.time = Some(features);
        self.dst_required = dst_required;
        self
    }

    /// Host the ICD Management cluster.
    pub fn with_icd(mut self, features: IcdFeatures) -> Self {
        self.icd = Some(features);
        self
    }

    /// Require terms-and-conditions acknowledgement of at least `min_version`.
    pub fn with_terms(mut self, min_version: u16) -> Self {
        self.tc_min_version = Some(min_version);
        self
    }

    /// Already a member of `fabric`.
    pub fn with_fabric(mut self, fabric: ExistingFabric) -> Self {
        self.fabric = Some(fabric);
        self
    }

    /// Temporary id.
    pub fn temporary_id(&self) -> NodeId {
        self.temporary_id
    }

    /// Setup code.
    pub fn setup_code(&self) -> u32 {
        self.setup_code
    }

    /// Device attestation certificate.
    pub fn dac(&self) -> Vec<u8> {
        encode_dac(&self.dac_key.verifying_key().to_bytes())
    }

    /// Product attestation intermediate.
    pub fn pai(&self) -> Vec<u8> {
        let mut pai = b"SIMPAI".to_vec();
        pai.extend_from_slice(&self.vendor_id.0.to_be_bytes());
        pai
    }

    /// Fail-safe expiry, if armed.
    pub fn fail_safe(&self) -> Option<Instant> {
        self.fail_safe
    }

    /// Times the fail-safe lapsed on its own.
    pub fn fail_safe_lapses(&self) -> u32 {
        self.lapses
    }

    /// Times the fail-safe was explicitly disarmed.
    pub fn disarms(&self) -> u32 {
        self.disarms
    }

    /// Whether `CommissioningComplete` was accepted.
    pub fn is_commissioned(&self) -> bool {
        self.committed.is_some()
    }

    /// Operational node id carried by the installed NOC.
    pub fn operational_id(&self) -> Option<NodeId> {
        self.live().noc.as_deref().and_then(decode_noc).map(|(node, _)| node)
    }

    /// Network the device joined.
    pub fn connected_network(&self) -> Option<&[u8]> {
        self.live().connected.as_deref()
    }

    /// Whether any provisional configuration is present.
    pub fn has_provisional_state(&self) -> bool {
        self.committed.is_none() && self.state != Provisional::default()
    }

    /// Commands handled, in order.
    pub fn handled(&self) -> &[CommandKind] {
        &self.handled
    }

    /// Whether an operational session can reach the device.
    pub fn reachable_operationally(&self) -> bool {
        self.operational_id().is_some()
            && (self.network.ethernet || self.live().connected.is_some())
    }

    fn live(&self) -> &Provisional {
        self.committed.as_ref().unwrap_or(&self.state)
    }

    /// PASE came up with this session challenge.
    pub fn establish_pase(&mut self, challenge: [u8; 16]) {
        self.challenge = Some(challenge);
    }

    /// Apply fail-safe expiry as of `now`.
    pub fn tick(&mut self, now: Instant) {
        if self.fail_safe.is_some_and(|expiry| now >= expiry) {
            debug!(node_id = %self.temporary_id, "fail-safe lapsed, reverting");
            self.lapses += 1;
            self.revert();
        }
    }

    fn revert(&mut self) {
        self.fail_safe = None;
        self.state = Provisional::default();
    }

    fn require_fail_safe(&self) -> Result<(), CommissioningError> {
        match self.fail_safe {
            Some(_) => Ok(()),
            None => Err(CommissioningError::Status(ImStatus::FailsafeRequired)),
        }
    }

    fn sign(&self, elements: &[u8]) -> Result<Vec<u8>, CommissioningError> {
        let challenge =
            self.challenge.ok_or(CommissioningError::Status(ImStatus::Failure))?;
        Ok(self.dac_key.sign(&signed_message(elements, &challenge)).to_bytes().to_vec())
    }

    /// Handle a command at `now`.
    pub fn handle_command(
        &mut self,
        now: Instant,
        command: Command,
    ) -> Result<CommandResponse, CommissioningError> {
        self.tick(now);
        self.handled.push(command.kind());

        match command {
            Command::ArmFailSafe { expiry_length_seconds: 0, .. } => {
                if self.fail_safe.is_some() {
                    self.disarms += 1;
                    self.revert();
                }
                Ok(general_ok())
            },
            Command::ArmFailSafe { expiry_length_seconds, breadcrumb } => {
                if self.committed.is_some() {
                    return Ok(CommandResponse::ArmFailSafe {
                        error_code: CommissioningErrorCode::BusyWithOtherAdmin,
                        debug_text: "already commissioned".into(),
                    });
                }
                self.fail_safe =
                    Some(now + Duration::from_secs(u64::from(expiry_length_seconds)));
                self.state.breadcrumb = breadcrumb;
                Ok(general_ok())
            },
            Command::SetRegulatoryConfig { breadcrumb, .. } => {
                if self.fail_safe.is_none() {
                    return Ok(CommandResponse::SetRegulatoryConfig {
                        error_code: CommissioningErrorCode::NoFailSafe,
                        debug_text: String::new(),
                    });
                }
                self.state.breadcrumb = breadcrumb;
                Ok(CommandResponse::SetRegulatoryConfig {
                    error_code: CommissioningErrorCode::Ok,
                    debug_text: String::new(),
                })
            },
            Command::SetTcAcknowledgements { tc_version, .. } => {
                let error_code = match self.tc_min_version {
                    Some(min) if tc_version < min => CommissioningErrorCode::TcMinVersionNotMet,
                    _ => CommissioningErrorCode::Ok,
                };
                Ok(CommandResponse::SetTcAcknowledgements { error_code })
            },
            Command::CertificateChainRequest { certificate_type } => {
                let certificate = match certificate_type {
                    CertificateChainType::Dac => self.dac(),
                    CertificateChainType::Pai => self.pai(),
                };
                Ok(CommandResponse::CertificateChain { certificate })
            },
            Command::AttestationRequest { attestation_nonce } => {
                let attestation_elements = AttestationElements {
                    certification_declaration: b"SIMCD".to_vec(),
                    attestation_nonce,
                    timestamp: 0,
                }
                .to_cbor()?;
                let attestation_signature = self.sign(&attestation_elements)?;
                Ok(CommandResponse::Attestation { attestation_elements, attestation_signature })
            },
            Command::CsrRequest { csr_nonce, .. } => {
                self.require_fail_safe()?;
                let nocsr_elements = NocsrElements {
                    csr: self.operational_key.verifying_key().to_bytes().to_vec(),
                    csr_nonce,
                }
                .to_cbor()?;
                let attestation_signature = self.sign(&nocsr_elements)?;
                Ok(CommandResponse::Csr { nocsr_elements, attestation_signature })
            },
            Command::AddTrustedRootCertificate { root_ca_certificate } => {
                self.require_fail_safe()?;
                self.state.trusted_root = Some(root_ca_certificate);
                Ok(CommandResponse::Default)
            },
            Command::AddNoc { noc_value, .. } => {
                self.require_fail_safe()?;
                let status_code = if self.state.trusted_root.is_none() {
                    NocStatus::InvalidNoc
                } else if decode_noc(&noc_value).is_none() {
                    NocStatus::InvalidNodeOpId
                } else {
                    self.state.noc = Some(noc_value);
                    NocStatus::Ok
                };
                Ok(CommandResponse::Noc {
                    status_code,
                    fabric_index: status_code.is_ok().then_some(1),
                    debug_text: None,
                })
            },
            Command::SetUtcTime { .. }
            | Command::SetDstOffset { .. }
            | Command::SetDefaultNtp { .. }
            | Command::SetTrustedTimeSource { .. } => match self.time {
                Some(_) => Ok(CommandResponse::Default),
                None => Err(CommissioningError::Status(ImStatus::UnsupportedCluster)),
            },
            Command::SetTimeZone { .. } => match self.time {
                Some(_) => {
                    Ok(CommandResponse::SetTimeZone { dst_offset_required: self.dst_required })
                },
                None => Err(CommissioningError::Status(ImStatus::UnsupportedCluster)),
            },
            Command::ScanNetworks { .. } => Ok(CommandResponse::ScanNetworks {
                networking_status: NetworkingStatus::Success,
                debug_text: None,
                wifi_scan_results: self
                    .network
                    .wifi_endpoint
                    .map(|_| WiFiScanResult { ssid: b"sim-ap".to_vec(), rssi: -40, channel: 6 })
                    .into_iter()
                    .collect(),
                thread_scan_results: self
                    .network
                    .thread_endpoint
                    .map(|_| ThreadScanResult {
                        network_name: "sim-mesh".into(),
                        extended_pan_id: 0xDEAD_00BE_EF00_CAFE,
                        channel: 15,
                    })
                    .into_iter()
                    .collect(),
            }),
            Command::AddOrUpdateWiFiNetwork { ssid, breadcrumb, .. } => {
                self.require_fail_safe()?;
                if self.network.wifi_endpoint.is_none() {
                    return Err(CommissioningError::Status(ImStatus::UnsupportedCommand));
                }
                Ok(self.add_network(ssid, breadcrumb))
            },
            Command::AddOrUpdateThreadNetwork { operational_dataset, breadcrumb } => {
                self.require_fail_safe()?;
                if self.network.thread_endpoint.is_none() {
                    return Err(CommissioningError::Status(ImStatus::UnsupportedCommand));
                }
                let id = thread::extended_pan_id(&operational_dataset)?;
                Ok(self.add_network(id.to_vec(), breadcrumb))
            },
            Command::ConnectNetwork { network_id, breadcrumb } => {
                self.require_fail_safe()?;
                let networking_status = if self.state.networks.contains(&network_id) {
                    self.state.connected = Some(network_id);
                    self.state.breadcrumb = breadcrumb;
                    NetworkingStatus::Success
                } else {
                    NetworkingStatus::NetworkIdNotFound
                };
                Ok(CommandResponse::ConnectNetwork {
                    networking_status,
                    debug_text: None,
                    error_value: None,
                })
            },
            Command::RemoveNetwork { network_id, breadcrumb } => {
                self.require_fail_safe()?;
                let before = self.state.networks.len();
                self.state.networks.retain(|n| *n != network_id);
                let networking_status = if self.state.networks.len() < before {
                    self.state.breadcrumb = breadcrumb;
                    NetworkingStatus::Success
                } else {
                    NetworkingStatus::NetworkIdNotFound
                };
                Ok(CommandResponse::NetworkConfig {
                    networking_status,
                    debug_text: None,
                    network_index: None,
                })
            },
            Command::RegisterClient { check_in_node_id, .. } => {
                if !self.icd.is_some_and(|f| f.contains(IcdFeatures::CHECK_IN)) {
                    return Err(CommissioningError::Status(ImStatus::UnsupportedCommand));
                }
                self.state.icd_clients.push(check_in_node_id);
                Ok(CommandResponse::RegisterClient { icd_counter: 0x10 })
            },
            Command::StayActiveRequest { stay_active_duration_ms } => match self.icd {
                Some(_) => Ok(CommandResponse::StayActive {
                    promised_active_duration_ms: stay_active_duration_ms,
                }),
                None => Err(CommissioningError::Status(ImStatus::UnsupportedCluster)),
            },
            Command::CommissioningComplete => {
                let error_code = if self.fail_safe.is_none() {
                    CommissioningErrorCode::NoFailSafe
                } else if self.state.noc.is_none() {
                    CommissioningErrorCode::InvalidAuthentication
                } else {
                    self.fail_safe = None;
                    self.committed = Some(std::mem::take(&mut self.state));
                    CommissioningErrorCode::Ok
                };
                Ok(CommandResponse::CommissioningComplete { error_code, debug_text: String::new() })
            },
        }
    }

    fn add_network(&mut self, network_id: Vec<u8>, breadcrumb: u64) -> CommandResponse {
        if !self.state.networks.contains(&network_id) {
            self.state.networks.push(network_id);
        }
        self.state.breadcrumb = breadcrumb;
        CommandResponse::NetworkConfig {
            networking_status: NetworkingStatus::Success,
            debug_text: None,
            network_index: u8::try_from(self.state.networks.len() - 1).ok(),
        }
    }

    /// Answer a read at `now`. Paths the device does not carry are omitted.
    pub fn read(
        &mut self,
        now: Instant,
        paths: &[AttributePath],
    ) -> Vec<(ConcreteAttributePath, AttributeValue)> {
        self.tick(now);
        let table = self.attributes();
        table
            .into_iter()
            .filter(|(path, _)| paths.iter().any(|p| p.matches(path)))
            .collect()
    }

    fn attributes(&self) -> BTreeMap<ConcreteAttributePath, AttributeValue> {
        use AttributeValue::{Bool, Unsigned};

        let mut table = BTreeMap::new();
        let mut put = |endpoint, cluster, attribute, value| {
            table.insert(ConcreteAttributePath::new(endpoint, cluster, attribute), value);
        };

        put(0, basic_information::ID, basic_information::VENDOR_ID, Unsigned(self.vendor_id.0.into()));
        put(0, basic_information::ID, basic_information::PRODUCT_ID, Unsigned(self.product_id.into()));

        {
            use general_commissioning as gc;
            put(0, gc::ID, gc::BREADCRUMB, Unsigned(self.live().breadcrumb));
            put(
                0,
                gc::ID,
                gc::BASIC_COMMISSIONING_INFO,
                AttributeValue::Struct(
                    [(0, Unsigned(self.recommended_fail_safe.into())), (1, Unsigned(900))].into(),
                ),
            );
            put(0, gc::ID, gc::REGULATORY_CONFIG, Unsigned(0));
            put(0, gc::ID, gc::LOCATION_CAPABILITY, Unsigned(2));
            put(0, gc::ID, gc::SUPPORTS_CONCURRENT_CONNECTION, Bool(true));
            if let Some(min) = self.tc_min_version {
                put(0, gc::ID, gc::TC_MIN_REQUIRED_VERSION, Unsigned(min.into()));
                put(0, gc::ID, gc::TC_ACKNOWLEDGEMENTS_REQUIRED, Bool(true));
            }
        }

        for (endpoint, features) in self.network.endpoints() {
            use network_commissioning as nc;
            put(endpoint, nc::ID, FEATURE_MAP, Unsigned(features.bits().into()));
            if features != NetworkCommissioningFeatures::ETHERNET {
                put(
                    endpoint,
                    nc::ID,
                    nc::CONNECT_MAX_TIME_SECONDS,
                    Unsigned(self.network.connect_max_time_seconds.into()),
                );
                put(
                    endpoint,
                    nc::ID,
                    nc::SCAN_MAX_TIME_SECONDS,
                    Unsigned(self.network.scan_max_time_seconds.into()),
                );
            }
        }

        if let Some(features) = self.time {
            use time_synchronization as ts;
            put(0, ts::ID, FEATURE_MAP, Unsigned(features.bits().into()));
            put(0, ts::ID, ts::TIME_ZONE_LIST_MAX_SIZE, Unsigned(2));
            put(0, ts::ID, ts::DST_OFFSET_LIST_MAX_SIZE, Unsigned(2));
        }

        {
            use operational_credentials as oc;
            let fabrics = self
                .fabric
                .iter()
                .map(|f| {
                    AttributeValue::Struct(
                        [
                            (oc::FABRIC_ROOT_PUBLIC_KEY, AttributeValue::Bytes(f.root_public_key.clone())),
                            (oc::FABRIC_VENDOR_ID, Unsigned(0xFFF1)),
                            (oc::FABRIC_ID, Unsigned(f.fabric_id.0)),
                            (oc::FABRIC_NODE_ID, Unsigned(f.node_id.0)),
                            (oc::FABRIC_INDEX, Unsigned(f.fabric_index.0.into())),
                        ]
                        .into(),
                    )
                })
                .collect();
            put(0, oc::ID, oc::FABRICS, AttributeValue::List(fabrics));
        }

        if let Some(features) = self.icd {
            use icd_management as icd;
            put(0, icd::ID, FEATURE_MAP, Unsigned(features.bits().into()));
            put(0, icd::ID, icd::IDLE_MODE_DURATION, Unsigned(3600));
            put(0, icd::ID, icd::ACTIVE_MODE_DURATION, Unsigned(300));
            put(0, icd::ID, icd::ACTIVE_MODE_THRESHOLD, Unsigned(1000));
            put(0, icd::ID, icd::USER_ACTIVE_MODE_TRIGGER_HINT, Unsigned(0));
            let lit = features.contains(IcdFeatures::LONG_IDLE_TIME);
            put(0, icd::ID, icd::OPERATING_MODE, Unsigned(u64::from(lit)));
        }
        table
    }
}

fn general_ok() -> CommandResponse {
    CommandResponse::ArmFailSafe { error_code: CommissioningErrorCode::Ok, debug_text: String::new() }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn device() -> SimDevice {
        SimDevice::new(NodeId(0x10), 20202021, &mut ChaCha8Rng::seed_from_u64(3))
            .with_network(DeviceNetwork::wifi())
    }

    fn arm(seconds: u16) -> Command {
        Command::ArmFailSafe { expiry_length_seconds: seconds, breadcrumb: 1 }
    }

    #[test]
    fn configuration_requires_fail_safe() {
        let mut dev = device();
        let now = Instant::now();
        let add = Command::AddTrustedRootCertificate { root_ca_certificate: vec![1] };
        assert_eq!(
            dev.handle_command(now, add.clone()),
            Err(CommissioningError::Status(ImStatus::FailsafeRequired))
        );
        dev.handle_command(now, arm(60)).unwrap();
        assert_eq!(dev.handle_command(now, add), Ok(CommandResponse::Default));
    }

    #[test]
    fn lapse_reverts_provisional_state() {
        let mut dev = device();
        let start = Instant::now();
        dev.handle_command(start, arm(10)).unwrap();
        dev.handle_command(
            start,
            Command::AddOrUpdateWiFiNetwork {
                ssid: b"home".to_vec(),
                credentials: vec![],
                breadcrumb: 2,
            },
        )
        .unwrap();
        assert!(dev.has_provisional_state());

        dev.tick(start + Duration::from_secs(10));
        assert_eq!(dev.fail_safe_lapses(), 1);
        assert!(!dev.has_provisional_state());
    }

    #[test]
    fn disarm_reverts_without_counting_a_lapse() {
        let mut dev = device();
        let now = Instant::now();
        dev.handle_command(now, arm(60)).unwrap();
        dev.handle_command(now, Command::AddTrustedRootCertificate { root_ca_certificate: vec![1] })
            .unwrap();
        dev.handle_command(now, arm(0)).unwrap();
        assert_eq!((dev.disarms(), dev.fail_safe_lapses()), (1, 0));
        assert!(!dev.has_provisional_state());
    }

    #[test]
    fn reads_omit_absent_clusters() {
        let mut dev = device();
        let reports = dev.read(
            Instant::now(),
            &[
                AttributePath::wildcard(network_commissioning::ID, FEATURE_MAP),
                AttributePath::new(0, icd_management::ID, FEATURE_MAP),
            ],
        );
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0.endpoint, 1);
    }
}
