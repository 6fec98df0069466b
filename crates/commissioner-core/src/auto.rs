//! Default commissioning delegate.
//!
//! [`AutoCommissioner`] owns the attempt's [`CommissioningParameters`], folds
//! every stage report back into them, and walks the stages in flow order,
//! skipping the ones the device or the parameters make pointless.
//!
//! Failure policy:
//!
//! - time synchronization is best effort; a failed time stage is logged and
//!   the walk continues
//! - a failed setup or enable of the primary operational network falls back
//!   to the other transport once, when the device supports it and the
//!   parameters carry its credentials
//! - anything else ends the attempt in `Cleanup`

use std::time::Duration;

use commissioner_proto::{
    CertificateChainType, EndpointId, IcdFeatures, NetworkCommissioningFeatures, TimeSyncFeatures,
};
use tracing::{debug, info, warn};

use crate::{
    delegate::{CommissioningDelegate, NextStep},
    error::CommissioningError,
    params::{CommissioningParameters, IcdRegistrationStrategy},
    report::{CommissioningReport, NetworkEndpoint, ReadCommissioningInfo, StageReport},
    stage::CommissioningStage,
};

use CommissioningStage as S;

/// Stages in the order an attempt visits them.
const FLOW: [CommissioningStage; 39] = [
    S::SecurePairing,
    S::ReadCommissioningInfo,
    S::ArmFailsafe,
    S::ScanNetworks,
    S::NeedsNetworkCreds,
    S::ConfigRegulatory,
    S::ConfigureTcAcknowledgments,
    S::ConfigureUtcTime,
    S::ConfigureTimeZone,
    S::ConfigureDstOffset,
    S::ConfigureDefaultNtp,
    S::SendPaiCertificateRequest,
    S::SendDacCertificateRequest,
    S::SendAttestationRequest,
    S::AttestationVerification,
    S::AttestationRevocationCheck,
    S::SendOpCertSigningRequest,
    S::ValidateCsr,
    S::GenerateNocChain,
    S::SendTrustedRootCert,
    S::SendNoc,
    S::ConfigureTrustedTimeSource,
    S::IcdGetRegistrationInfo,
    S::IcdRegistration,
    S::WiFiNetworkSetup,
    S::ThreadNetworkSetup,
    S::FailsafeBeforeWiFiEnable,
    S::FailsafeBeforeThreadEnable,
    S::WiFiNetworkEnable,
    S::ThreadNetworkEnable,
    S::PrimaryOperationalNetworkFailed,
    S::RemoveWiFiNetworkConfig,
    S::RemoveThreadNetworkConfig,
    S::EvictPreviousCaseSessions,
    S::FindOperationalForStayActive,
    S::IcdSendStayActive,
    S::FindOperationalForCommissioningComplete,
    S::SendComplete,
    S::Cleanup,
];

/// Operational network transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    WiFi,
    Thread,
}

impl Transport {
    fn feature(self) -> NetworkCommissioningFeatures {
        match self {
            Self::WiFi => NetworkCommissioningFeatures::WIFI,
            Self::Thread => NetworkCommissioningFeatures::THREAD,
        }
    }

    fn other(self) -> Self {
        match self {
            Self::WiFi => Self::Thread,
            Self::Thread => Self::WiFi,
        }
    }

    fn setup(self) -> CommissioningStage {
        match self {
            Self::WiFi => S::WiFiNetworkSetup,
            Self::Thread => S::ThreadNetworkSetup,
        }
    }

    fn remove(self) -> CommissioningStage {
        match self {
            Self::WiFi => S::RemoveWiFiNetworkConfig,
            Self::Thread => S::RemoveThreadNetworkConfig,
        }
    }

    /// Transport a network stage acts on.
    fn of(stage: CommissioningStage) -> Option<Self> {
        match stage {
            S::WiFiNetworkSetup
            | S::FailsafeBeforeWiFiEnable
            | S::WiFiNetworkEnable
            | S::RemoveWiFiNetworkConfig => Some(Self::WiFi),
            S::ThreadNetworkSetup
            | S::FailsafeBeforeThreadEnable
            | S::ThreadNetworkEnable
            | S::RemoveThreadNetworkConfig => Some(Self::Thread),
            _ => None,
        }
    }
}

/// Stage-selecting commissioning delegate used unless the embedder installs
/// its own.
#[derive(Debug, Default)]
pub struct AutoCommissioner {
    params: CommissioningParameters,
    device: ReadCommissioningInfo,
    needs_dst: bool,
    /// Transport forced after the primary network failed
    fallback: Option<Transport>,
}

impl AutoCommissioner {
    /// Delegate with empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// What the commissioning-info read reported about the device.
    pub fn device_info(&self) -> &ReadCommissioningInfo {
        &self.device
    }

    fn reset(&mut self) {
        self.device = ReadCommissioningInfo::default();
        self.needs_dst = false;
        self.fallback = None;
    }

    fn step(&self, stage: CommissioningStage) -> NextStep {
        let (endpoint, timeout) = self.addressing(stage);
        NextStep { stage, params: self.params.clone(), endpoint, timeout }
    }

    /// Endpoint and per-call timeout override for `stage`.
    fn addressing(&self, stage: CommissioningStage) -> (EndpointId, Option<Duration>) {
        let transport = match stage {
            S::ScanNetworks if self.params.attempt_wifi_network_scan => Some(Transport::WiFi),
            S::ScanNetworks => Some(Transport::Thread),
            _ => Transport::of(stage),
        };
        let Some(network) = transport.and_then(|t| self.network_endpoint(t)) else {
            return (0, None);
        };
        let seconds = match stage {
            S::ScanNetworks => network.scan_max_time_seconds,
            S::WiFiNetworkEnable | S::ThreadNetworkEnable => network.connect_max_time_seconds,
            _ => None,
        };
        (network.endpoint, seconds.filter(|s| *s > 0).map(|s| Duration::from_secs(s.into())))
    }

    fn network_endpoint(&self, transport: Transport) -> Option<&NetworkEndpoint> {
        self.device.network.endpoint_for(transport.feature())
    }

    fn has_credentials(&self, transport: Transport) -> bool {
        match transport {
            Transport::WiFi => self.params.wifi_credentials.is_some(),
            Transport::Thread => self.params.thread_operational_dataset.is_some(),
        }
    }

    fn can_use(&self, transport: Transport) -> bool {
        self.has_credentials(transport) && self.network_endpoint(transport).is_some()
    }

    fn needs_network(&self) -> bool {
        !self.device.network.is_on_network()
    }

    /// Transport being provisioned, if any.
    fn transport(&self) -> Option<Transport> {
        if !self.needs_network() {
            return None;
        }
        self.fallback
            .or_else(|| [Transport::WiFi, Transport::Thread].into_iter().find(|t| self.can_use(*t)))
    }

    fn scan_requested(&self) -> bool {
        (self.params.attempt_wifi_network_scan && self.network_endpoint(Transport::WiFi).is_some())
            || (self.params.attempt_thread_network_scan
                && self.network_endpoint(Transport::Thread).is_some())
    }

    fn time_feature(&self, feature: TimeSyncFeatures) -> bool {
        self.device.time.as_ref().is_some_and(|t| t.features.contains(feature))
    }

    fn registers_icd(&self) -> bool {
        self.params.icd_registration_strategy == IcdRegistrationStrategy::BeforeComplete
            && self.device.icd.as_ref().is_some_and(|i| i.features.contains(IcdFeatures::CHECK_IN))
    }

    /// Whether `stage` has work to do for this device and these parameters.
    fn wanted(&self, stage: CommissioningStage) -> bool {
        let params = &self.params;
        match stage {
            S::SecurePairing | S::Error => false,
            S::ScanNetworks => self.scan_requested(),
            S::NeedsNetworkCreds => {
                self.scan_requested() || (self.needs_network() && self.transport().is_none())
            },
            S::ConfigureTcAcknowledgments => params.tc_acknowledgements.is_some(),
            S::ConfigureUtcTime => self.device.time.is_some() && params.utc_time.is_some(),
            S::ConfigureTimeZone => {
                self.time_feature(TimeSyncFeatures::TIME_ZONE) && params.time_zone.is_some()
            },
            S::ConfigureDstOffset => {
                self.needs_dst
                    && self.time_feature(TimeSyncFeatures::TIME_ZONE)
                    && params.dst_offsets.is_some()
            },
            S::ConfigureDefaultNtp => {
                self.time_feature(TimeSyncFeatures::NTP_CLIENT) && params.default_ntp.is_some()
            },
            S::ConfigureTrustedTimeSource => {
                self.time_feature(TimeSyncFeatures::TIME_SYNC_CLIENT)
                    && params.trusted_time_source.is_some()
            },
            S::IcdGetRegistrationInfo => self.registers_icd() && params.icd_registration.is_none(),
            S::IcdRegistration => self.registers_icd(),
            S::WiFiNetworkSetup
            | S::FailsafeBeforeWiFiEnable
            | S::WiFiNetworkEnable
            | S::ThreadNetworkSetup
            | S::FailsafeBeforeThreadEnable
            | S::ThreadNetworkEnable => Transport::of(stage) == self.transport(),
            // Only reached through the network fallback
            S::PrimaryOperationalNetworkFailed
            | S::RemoveWiFiNetworkConfig
            | S::RemoveThreadNetworkConfig => false,
            S::FindOperationalForStayActive | S::IcdSendStayActive => {
                params.icd_stay_active_duration_ms.is_some() && self.device.icd.is_some()
            },
            S::FindOperationalForCommissioningComplete | S::SendComplete => {
                !params.skip_commissioning_complete
            },
            _ => true,
        }
    }

    fn next_stage(&self, stage: CommissioningStage) -> CommissioningStage {
        match stage {
            S::PrimaryOperationalNetworkFailed => {
                if let Some(failed) = self.fallback.map(Transport::other) {
                    return failed.remove();
                }
            },
            S::RemoveWiFiNetworkConfig | S::RemoveThreadNetworkConfig => {
                if let Some(next) = self.fallback {
                    return next.setup();
                }
            },
            _ => {},
        }

        let position = FLOW.iter().position(|s| *s == stage).unwrap_or(FLOW.len() - 1);
        FLOW[position + 1..].iter().copied().find(|s| self.wanted(*s)).unwrap_or(S::Cleanup)
    }

    /// Fold a successful stage's report into the parameters.
    fn absorb(&mut self, report: &StageReport) -> Result<(), CommissioningError> {
        let params = &mut self.params;
        match &report.report {
            CommissioningReport::ReadCommissioningInfo(info) => {
                params.remote_vendor_id = info.basic.vendor_id;
                params.remote_product_id = info.basic.product_id;
                params.device_regulatory_location = info.general.regulatory_config;
                params.location_capability = info.general.location_capability;
                if info.general.tc_acknowledgements_required {
                    let Some(tc) = params.tc_acknowledgements else {
                        return Err(CommissioningError::InvalidArgument(
                            "terms and conditions acknowledgement required",
                        ));
                    };
                    if info.general.tc_min_required_version.is_some_and(|min| tc.accepted_version < min)
                    {
                        return Err(CommissioningError::InvalidArgument(
                            "accepted terms and conditions version too old",
                        ));
                    }
                }
                self.device = (**info).clone();
            },
            CommissioningReport::AttestationCertificate { kind, certificate } => match kind {
                CertificateChainType::Pai => params.pai = Some(certificate.clone()),
                CertificateChainType::Dac => params.dac = Some(certificate.clone()),
            },
            CommissioningReport::AttestationResponse { elements, signature } => {
                params.attestation_elements = Some(elements.clone());
                params.attestation_signature = Some(signature.clone());
            },
            CommissioningReport::CsrResponse { elements, signature } => {
                params.nocsr_elements = Some(elements.clone());
                params.csr_signature = Some(signature.clone());
            },
            CommissioningReport::NocChain(chain) => params.noc_chain = Some(chain.clone()),
            CommissioningReport::OperationalNodeId(node_id) => params.remote_node_id = Some(*node_id),
            CommissioningReport::TimeZoneResponse { dst_offset_required } => {
                self.needs_dst = *dst_offset_required;
            },
            CommissioningReport::Empty
            | CommissioningReport::AttestationResult(_)
            | CommissioningReport::IcdRegistration { .. }
            | CommissioningReport::IcdStayActive { .. }
            | CommissioningReport::ErrorInfo(_) => {},
        }
        Ok(())
    }

    /// Start the secondary transport after the primary failed in `stage`.
    fn network_fallback(&mut self, stage: CommissioningStage) -> Option<CommissioningStage> {
        let failed = match stage {
            S::WiFiNetworkSetup | S::WiFiNetworkEnable => Transport::WiFi,
            S::ThreadNetworkSetup | S::ThreadNetworkEnable => Transport::Thread,
            _ => return None,
        };
        if self.fallback.is_some() || !self.can_use(failed.other()) {
            return None;
        }
        info!(?failed, "primary operational network failed, trying the other transport");
        self.fallback = Some(failed.other());
        Some(S::PrimaryOperationalNetworkFailed)
    }
}

impl CommissioningDelegate for AutoCommissioner {
    fn set_commissioning_parameters(
        &mut self,
        params: CommissioningParameters,
    ) -> Result<(), CommissioningError> {
        self.params = params;
        Ok(())
    }

    fn commissioning_parameters(&self) -> &CommissioningParameters {
        &self.params
    }

    fn start_commissioning(&mut self) -> Result<NextStep, CommissioningError> {
        self.reset();
        Ok(self.step(S::ReadCommissioningInfo))
    }

    fn commissioning_step_finished(
        &mut self,
        error: Option<&CommissioningError>,
        report: &StageReport,
    ) -> Result<NextStep, CommissioningError> {
        let stage = report.stage;
        if stage == S::Cleanup {
            self.reset();
            return Ok(self.step(S::SecurePairing));
        }

        match error {
            Some(e) if stage.is_time_sync() => {
                warn!(%stage, error = %e, "time synchronization failed, continuing");
            },
            Some(e) => {
                if let Some(next) = self.network_fallback(stage) {
                    return Ok(self.step(next));
                }
                debug!(%stage, error = %e, "stage failed, cleaning up");
                return Ok(self.step(S::Cleanup));
            },
            None => self.absorb(report)?,
        }

        if stage == S::ReadCommissioningInfo && self.params.check_for_matching_fabric {
            if let Some(matching) = self.device.matching_fabric {
                info!(node_id = %matching.node_id, "device already on our fabric");
                return Ok(self.step(S::Cleanup));
            }
        }

        let next = self.next_stage(stage);
        debug!(from = %stage, to = %next, "next commissioning stage");
        Ok(self.step(next))
    }
}

#[cfg(test)]
mod tests {
    use commissioner_proto::{FabricIndex, NodeId, TimeZoneEntry};

    use super::*;
    use crate::{
        params::{IcdRegistrationInfo, WiFiCredentials},
        report::{IcdInfo, MatchingFabric, NetworkInfo, TimeSyncInfo},
    };

    const WIFI_EP: EndpointId = 1;
    const THREAD_EP: EndpointId = 2;

    fn wifi() -> WiFiCredentials {
        WiFiCredentials { ssid: b"home".to_vec(), credentials: b"password".to_vec() }
    }

    fn endpoint(endpoint: EndpointId, features: NetworkCommissioningFeatures) -> NetworkEndpoint {
        NetworkEndpoint {
            endpoint,
            features,
            connect_max_time_seconds: Some(20),
            scan_max_time_seconds: Some(10),
        }
    }

    fn dual_radio() -> ReadCommissioningInfo {
        ReadCommissioningInfo {
            network: NetworkInfo {
                endpoints: vec![
                    endpoint(WIFI_EP, NetworkCommissioningFeatures::WIFI),
                    endpoint(THREAD_EP, NetworkCommissioningFeatures::THREAD),
                ],
            },
            ..Default::default()
        }
    }

    fn ok(stage: CommissioningStage) -> StageReport {
        StageReport { stage, report: CommissioningReport::Empty }
    }

    fn read(info: ReadCommissioningInfo) -> StageReport {
        StageReport {
            stage: S::ReadCommissioningInfo,
            report: CommissioningReport::ReadCommissioningInfo(Box::new(info)),
        }
    }

    /// Feed successes until `Cleanup`, returning every stage chosen.
    fn walk(auto: &mut AutoCommissioner, info: ReadCommissioningInfo) -> Vec<CommissioningStage> {
        let mut next = auto.commissioning_step_finished(None, &read(info)).unwrap();
        let mut stages = vec![next.stage];
        while next.stage != S::Cleanup {
            next = auto.commissioning_step_finished(None, &ok(next.stage)).unwrap();
            stages.push(next.stage);
            assert!(stages.len() < FLOW.len(), "walk does not terminate: {stages:?}");
        }
        stages
    }

    fn started(params: CommissioningParameters) -> AutoCommissioner {
        let mut auto = AutoCommissioner::new();
        auto.set_commissioning_parameters(params).unwrap();
        assert_eq!(auto.start_commissioning().unwrap().stage, S::ReadCommissioningInfo);
        auto
    }

    #[test]
    fn on_network_device_skips_network_provisioning() {
        let mut auto = started(CommissioningParameters::default());
        let stages = walk(&mut auto, ReadCommissioningInfo::default());

        assert_eq!(stages, vec![
            S::ArmFailsafe,
            S::ConfigRegulatory,
            S::SendPaiCertificateRequest,
            S::SendDacCertificateRequest,
            S::SendAttestationRequest,
            S::AttestationVerification,
            S::AttestationRevocationCheck,
            S::SendOpCertSigningRequest,
            S::ValidateCsr,
            S::GenerateNocChain,
            S::SendTrustedRootCert,
            S::SendNoc,
            S::EvictPreviousCaseSessions,
            S::FindOperationalForCommissioningComplete,
            S::SendComplete,
            S::Cleanup,
        ]);
    }

    #[test]
    fn wifi_device_gets_wifi_stages_on_its_endpoint() {
        let mut auto = started(CommissioningParameters {
            wifi_credentials: Some(wifi()),
            ..Default::default()
        });
        let mut next = auto.commissioning_step_finished(None, &read(dual_radio())).unwrap();
        let mut network = Vec::new();
        while next.stage != S::Cleanup {
            if Transport::of(next.stage).is_some() {
                network.push((next.stage, next.endpoint, next.timeout));
            }
            next = auto.commissioning_step_finished(None, &ok(next.stage)).unwrap();
        }

        assert_eq!(network, vec![
            (S::WiFiNetworkSetup, WIFI_EP, None),
            (S::FailsafeBeforeWiFiEnable, WIFI_EP, None),
            (S::WiFiNetworkEnable, WIFI_EP, Some(Duration::from_secs(20))),
        ]);
    }

    #[test]
    fn reports_are_folded_into_parameters() {
        let mut auto = started(CommissioningParameters::default());
        auto.commissioning_step_finished(None, &read(ReadCommissioningInfo::default())).unwrap();

        let next = auto
            .commissioning_step_finished(None, &StageReport {
                stage: S::SendDacCertificateRequest,
                report: CommissioningReport::AttestationCertificate {
                    kind: CertificateChainType::Dac,
                    certificate: vec![0xDA],
                },
            })
            .unwrap();
        assert_eq!(next.stage, S::SendAttestationRequest);
        assert_eq!(next.params.dac, Some(vec![0xDA]));

        let next = auto
            .commissioning_step_finished(None, &StageReport {
                stage: S::SendOpCertSigningRequest,
                report: CommissioningReport::CsrResponse { elements: vec![1], signature: vec![2] },
            })
            .unwrap();
        assert_eq!(next.params.nocsr_elements, Some(vec![1]));
        assert_eq!(next.params.csr_signature, Some(vec![2]));
    }

    #[test]
    fn time_sync_failures_are_tolerated() {
        let time_zone = vec![TimeZoneEntry { offset: 3600, valid_at: 0, name: None }];
        let mut auto = started(CommissioningParameters {
            utc_time: Some(1),
            time_zone: Some(time_zone),
            dst_offsets: Some(vec![]),
            ..Default::default()
        });
        let info = ReadCommissioningInfo {
            time: Some(TimeSyncInfo { features: TimeSyncFeatures::TIME_ZONE, ..Default::default() }),
            ..Default::default()
        };
        auto.commissioning_step_finished(None, &read(info)).unwrap();

        let next = auto
            .commissioning_step_finished(Some(&CommissioningError::Timeout), &ok(S::ConfigureUtcTime))
            .unwrap();
        assert_eq!(next.stage, S::ConfigureTimeZone);

        // No DST requested by the time-zone response
        let next = auto
            .commissioning_step_finished(None, &StageReport {
                stage: S::ConfigureTimeZone,
                report: CommissioningReport::TimeZoneResponse { dst_offset_required: false },
            })
            .unwrap();
        assert_eq!(next.stage, S::SendPaiCertificateRequest);
    }

    #[test]
    fn dst_offsets_follow_a_dst_request() {
        let time_zone = vec![TimeZoneEntry { offset: 3600, valid_at: 0, name: None }];
        let mut auto = started(CommissioningParameters {
            time_zone: Some(time_zone),
            dst_offsets: Some(vec![]),
            ..Default::default()
        });
        let info = ReadCommissioningInfo {
            time: Some(TimeSyncInfo { features: TimeSyncFeatures::TIME_ZONE, ..Default::default() }),
            ..Default::default()
        };
        auto.commissioning_step_finished(None, &read(info)).unwrap();

        let next = auto
            .commissioning_step_finished(None, &StageReport {
                stage: S::ConfigureTimeZone,
                report: CommissioningReport::TimeZoneResponse { dst_offset_required: true },
            })
            .unwrap();
        assert_eq!(next.stage, S::ConfigureDstOffset);
    }

    #[test]
    fn other_failures_clean_up() {
        let mut auto = started(CommissioningParameters::default());
        let next = auto
            .commissioning_step_finished(Some(&CommissioningError::Timeout), &ok(S::ArmFailsafe))
            .unwrap();
        assert_eq!(next.stage, S::Cleanup);
    }

    #[test]
    fn primary_network_failure_falls_back_once() {
        let mut auto = started(CommissioningParameters {
            wifi_credentials: Some(wifi()),
            thread_operational_dataset: Some(vec![0x02, 0x08, 1, 2, 3, 4, 5, 6, 7, 8]),
            ..Default::default()
        });
        auto.commissioning_step_finished(None, &read(dual_radio())).unwrap();

        let failure = CommissioningError::Timeout;
        let next = auto.commissioning_step_finished(Some(&failure), &ok(S::WiFiNetworkEnable)).unwrap();
        assert_eq!(next.stage, S::PrimaryOperationalNetworkFailed);
        let next = auto.commissioning_step_finished(None, &ok(next.stage)).unwrap();
        assert_eq!((next.stage, next.endpoint), (S::RemoveWiFiNetworkConfig, WIFI_EP));
        let next = auto.commissioning_step_finished(None, &ok(next.stage)).unwrap();
        assert_eq!((next.stage, next.endpoint), (S::ThreadNetworkSetup, THREAD_EP));
        let next = auto.commissioning_step_finished(None, &ok(next.stage)).unwrap();
        assert_eq!(next.stage, S::FailsafeBeforeThreadEnable);
        let next = auto.commissioning_step_finished(None, &ok(next.stage)).unwrap();
        assert_eq!(next.stage, S::ThreadNetworkEnable);

        // The secondary gets no second chance
        let next =
            auto.commissioning_step_finished(Some(&failure), &ok(S::ThreadNetworkEnable)).unwrap();
        assert_eq!(next.stage, S::Cleanup);
    }

    #[test]
    fn no_fallback_without_secondary_credentials() {
        let mut auto = started(CommissioningParameters {
            wifi_credentials: Some(wifi()),
            ..Default::default()
        });
        auto.commissioning_step_finished(None, &read(dual_radio())).unwrap();
        let next = auto
            .commissioning_step_finished(Some(&CommissioningError::Timeout), &ok(S::WiFiNetworkSetup))
            .unwrap();
        assert_eq!(next.stage, S::Cleanup);
    }

    #[test]
    fn scan_is_followed_by_credentials_wait() {
        let mut auto = started(CommissioningParameters {
            attempt_wifi_network_scan: true,
            ..Default::default()
        });
        auto.commissioning_step_finished(None, &read(dual_radio())).unwrap();
        let next = auto.commissioning_step_finished(None, &ok(S::ArmFailsafe)).unwrap();
        assert_eq!((next.stage, next.endpoint), (S::ScanNetworks, WIFI_EP));
        assert_eq!(next.timeout, Some(Duration::from_secs(10)));
        let next = auto.commissioning_step_finished(None, &ok(S::ScanNetworks)).unwrap();
        assert_eq!(next.stage, S::NeedsNetworkCreds);

        // Credentials arrive through the engine
        let mut params = auto.commissioning_parameters().clone();
        params.wifi_credentials = Some(wifi());
        auto.set_commissioning_parameters(params).unwrap();
        let next = auto.commissioning_step_finished(None, &ok(S::NeedsNetworkCreds)).unwrap();
        assert_eq!(next.stage, S::ConfigRegulatory);
    }

    #[test]
    fn missing_credentials_wait_even_without_scan() {
        let mut auto = started(CommissioningParameters::default());
        auto.commissioning_step_finished(None, &read(dual_radio())).unwrap();
        let next = auto.commissioning_step_finished(None, &ok(S::ArmFailsafe)).unwrap();
        assert_eq!(next.stage, S::NeedsNetworkCreds);
    }

    #[test]
    fn matching_fabric_short_circuits_to_cleanup() {
        let mut auto = started(CommissioningParameters {
            check_for_matching_fabric: true,
            ..Default::default()
        });
        let info = ReadCommissioningInfo {
            matching_fabric: Some(MatchingFabric {
                node_id: NodeId(0x1234),
                fabric_index: FabricIndex(1),
            }),
            ..Default::default()
        };
        let next = auto.commissioning_step_finished(None, &read(info)).unwrap();
        assert_eq!(next.stage, S::Cleanup);
    }

    #[test]
    fn required_terms_and_conditions_must_be_supplied() {
        let mut auto = started(CommissioningParameters::default());
        let mut info = ReadCommissioningInfo::default();
        info.general.tc_acknowledgements_required = true;
        assert!(matches!(
            auto.commissioning_step_finished(None, &read(info)),
            Err(CommissioningError::InvalidArgument(_))
        ));
    }

    #[test]
    fn icd_registration_waits_for_info_then_registers() {
        let mut auto = started(CommissioningParameters {
            icd_registration_strategy: IcdRegistrationStrategy::BeforeComplete,
            icd_stay_active_duration_ms: Some(30_000),
            ..Default::default()
        });
        let info = ReadCommissioningInfo {
            icd: Some(IcdInfo { features: IcdFeatures::CHECK_IN, ..Default::default() }),
            ..Default::default()
        };
        auto.commissioning_step_finished(None, &read(info)).unwrap();

        let next = auto.commissioning_step_finished(None, &ok(S::SendNoc)).unwrap();
        assert_eq!(next.stage, S::IcdGetRegistrationInfo);

        let mut params = auto.commissioning_parameters().clone();
        params.icd_registration = Some(IcdRegistrationInfo {
            check_in_node_id: NodeId(1),
            monitored_subject: 1,
            symmetric_key: [0; 16],
            client_type: commissioner_proto::IcdClientType::Permanent,
        });
        auto.set_commissioning_parameters(params).unwrap();
        let next = auto.commissioning_step_finished(None, &ok(S::IcdGetRegistrationInfo)).unwrap();
        assert_eq!(next.stage, S::IcdRegistration);

        let next = auto.commissioning_step_finished(None, &ok(S::EvictPreviousCaseSessions)).unwrap();
        assert_eq!(next.stage, S::FindOperationalForStayActive);
    }

    #[test]
    fn skip_commissioning_complete_ends_after_eviction() {
        let mut auto = started(CommissioningParameters {
            skip_commissioning_complete: true,
            ..Default::default()
        });
        auto.commissioning_step_finished(None, &read(ReadCommissioningInfo::default())).unwrap();
        let next = auto.commissioning_step_finished(None, &ok(S::EvictPreviousCaseSessions)).unwrap();
        assert_eq!(next.stage, S::Cleanup);
    }
}
