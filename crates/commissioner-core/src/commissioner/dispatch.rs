//! Stage dispatch.
//!
//! Each stage is first turned into a [`StepPlan`] carrying exactly the inputs
//! that stage needs. Building the plan is where required parameters are
//! checked, so a missing input fails the stage before anything is sent.

use commissioner_proto::{
    CertificateChainType, Command, CommandKind, CommandResponse, CommissioningErrorCode, PeerId,
    RegulatoryLocation, TimeGranularity,
};
use tracing::{debug, error};

use super::{Commissioner, Hold, InvokePurpose, Step};
use crate::{
    env::Environment,
    error::CommissioningError,
    params::CommissioningParameters,
    report::{CommissioningReport, DeviceErrorInfo, StageResult},
    services::{AttestationInfo, NocChainRequest, Target},
    stage::CommissioningStage,
};

/// Country code used when the caller supplies none.
const DEFAULT_COUNTRY_CODE: &str = "XX";

/// Session a command travels over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Pase,
    Case,
}

/// One stage's unit of work.
enum StepPlan {
    /// Optional input absent; complete without device interaction
    Skip,
    ReadCommissioningInfo,
    ArmFailSafe { seconds: u16 },
    FailSafeBeforeNetworkEnable { seconds: u16 },
    ScanNetworks { ssid: Option<Vec<u8>> },
    Invoke { channel: Channel, command: Command },
    AwaitNetworkCredentials,
    AwaitIcdRegistrationInfo,
    VerifyAttestation(AttestationInfo),
    CheckRevocation(AttestationInfo),
    ValidateCsr,
    GenerateNocChain(NocChainRequest),
    EvictCaseSessions(PeerId),
    FindOperational(PeerId),
    Cleanup,
}

fn require<'a, T>(value: &'a Option<T>, what: &'static str) -> Result<&'a T, CommissioningError> {
    value.as_ref().ok_or(CommissioningError::InvalidArgument(what))
}

/// Regulatory location to configure.
///
/// Commissioner override first, then the device's current setting, then the
/// most restrictive choice. A device limited to one location gets that
/// location regardless.
pub(crate) fn select_regulatory_location(params: &CommissioningParameters) -> RegulatoryLocation {
    let preferred = params
        .regulatory_location
        .or(params.device_regulatory_location)
        .unwrap_or(RegulatoryLocation::Outdoor);
    match params.location_capability {
        Some(RegulatoryLocation::Indoor) => RegulatoryLocation::Indoor,
        Some(RegulatoryLocation::Outdoor) => RegulatoryLocation::Outdoor,
        _ => preferred,
    }
}

fn general(code: CommissioningErrorCode, report: CommissioningReport) -> StageResult {
    if code.is_ok() {
        StageResult::report(report)
    } else {
        StageResult::err_with(
            CommissioningError::Commissioning(code),
            CommissioningReport::ErrorInfo(DeviceErrorInfo::General(code)),
        )
    }
}

impl<E: Environment> Commissioner<E> {
    /// Perform the current stage's unit of work.
    pub(super) fn dispatch(&mut self) -> Step {
        match self.plan() {
            Ok(plan) => self.run_plan(plan).into(),
            Err(e) => {
                debug!(stage = %self.stage(), error = %e, "stage inputs rejected");
                Step::Complete(StageResult::err(e))
            },
        }
    }

    fn plan(&self) -> Result<StepPlan, CommissioningError> {
        use CommissioningStage as S;

        let attempt = self
            .attempt
            .as_ref()
            .ok_or(CommissioningError::IncorrectState("no commissioning attempt"))?;
        let params = &attempt.params;
        let breadcrumb = attempt.stage.breadcrumb();
        let pase = |command: Command| -> Result<StepPlan, CommissioningError> {
            Ok(StepPlan::Invoke { channel: Channel::Pase, command })
        };

        match attempt.stage {
            S::SecurePairing => Ok(StepPlan::Skip),
            S::ReadCommissioningInfo => Ok(StepPlan::ReadCommissioningInfo),
            S::ArmFailsafe => Ok(StepPlan::ArmFailSafe { seconds: self.attempt_fail_safe_seconds() }),
            S::ScanNetworks => Ok(StepPlan::ScanNetworks {
                ssid: params
                    .attempt_wifi_network_scan
                    .then(|| params.wifi_credentials.as_ref().map(|w| w.ssid.clone()))
                    .flatten(),
            }),
            S::NeedsNetworkCreds => Ok(StepPlan::AwaitNetworkCredentials),
            S::ConfigRegulatory => pase(Command::SetRegulatoryConfig {
                new_regulatory_config: select_regulatory_location(params),
                country_code: params
                    .country_code
                    .clone()
                    .unwrap_or_else(|| DEFAULT_COUNTRY_CODE.to_owned()),
                breadcrumb,
            }),
            S::ConfigureTcAcknowledgments => match params.tc_acknowledgements {
                Some(tc) => pase(Command::SetTcAcknowledgements {
                    tc_version: tc.accepted_version,
                    tc_user_response: tc.accepted_terms,
                }),
                None => Ok(StepPlan::Skip),
            },
            S::ConfigureUtcTime => match params.utc_time {
                Some(utc_time) => pase(Command::SetUtcTime {
                    utc_time,
                    granularity: TimeGranularity::Microseconds,
                }),
                None => Ok(StepPlan::Skip),
            },
            S::ConfigureTimeZone => match &params.time_zone {
                Some(zones) => pase(Command::SetTimeZone { time_zone: zones.clone() }),
                None => Ok(StepPlan::Skip),
            },
            S::ConfigureDstOffset => match &params.dst_offsets {
                Some(offsets) => pase(Command::SetDstOffset { dst_offset: offsets.clone() }),
                None => Ok(StepPlan::Skip),
            },
            S::ConfigureDefaultNtp => match &params.default_ntp {
                Some(ntp) => pase(Command::SetDefaultNtp { default_ntp: Some(ntp.clone()) }),
                None => Ok(StepPlan::Skip),
            },
            S::ConfigureTrustedTimeSource => match &params.trusted_time_source {
                Some(source) => {
                    pase(Command::SetTrustedTimeSource { trusted_time_source: Some(source.clone()) })
                },
                None => Ok(StepPlan::Skip),
            },
            S::SendPaiCertificateRequest => {
                pase(Command::CertificateChainRequest { certificate_type: CertificateChainType::Pai })
            },
            S::SendDacCertificateRequest => {
                pase(Command::CertificateChainRequest { certificate_type: CertificateChainType::Dac })
            },
            S::SendAttestationRequest => pase(Command::AttestationRequest {
                attestation_nonce: *require(&params.attestation_nonce, "attestation nonce")?,
            }),
            S::AttestationVerification => Ok(StepPlan::VerifyAttestation(self.attestation_info()?)),
            S::AttestationRevocationCheck => Ok(StepPlan::CheckRevocation(self.attestation_info()?)),
            S::SendOpCertSigningRequest => pase(Command::CsrRequest {
                csr_nonce: *require(&params.csr_nonce, "CSR nonce")?,
                is_for_update_noc: false,
            }),
            S::ValidateCsr => Ok(StepPlan::ValidateCsr),
            S::GenerateNocChain => Ok(StepPlan::GenerateNocChain(self.noc_chain_request()?)),
            S::SendTrustedRootCert => pase(Command::AddTrustedRootCertificate {
                root_ca_certificate: require(&params.noc_chain, "NOC chain")?.rcac.clone(),
            }),
            S::SendNoc => {
                let chain = require(&params.noc_chain, "NOC chain")?;
                pase(Command::AddNoc {
                    noc_value: chain.noc.clone(),
                    icac_value: chain.icac.clone(),
                    ipk_value: chain.ipk,
                    case_admin_subject: chain.admin_subject,
                    admin_vendor_id: self.fabric.require_identity()?.vendor_id,
                })
            },
            S::IcdGetRegistrationInfo => Ok(StepPlan::AwaitIcdRegistrationInfo),
            S::IcdRegistration => {
                let icd = require(&params.icd_registration, "ICD registration info")?;
                pase(Command::RegisterClient {
                    check_in_node_id: icd.check_in_node_id,
                    monitored_subject: icd.monitored_subject,
                    key: icd.symmetric_key,
                    client_type: icd.client_type,
                })
            },
            S::WiFiNetworkSetup => {
                let wifi = require(&params.wifi_credentials, "Wi-Fi credentials")?;
                pase(Command::AddOrUpdateWiFiNetwork {
                    ssid: wifi.ssid.clone(),
                    credentials: wifi.credentials.clone(),
                    breadcrumb,
                })
            },
            S::ThreadNetworkSetup => pase(Command::AddOrUpdateThreadNetwork {
                operational_dataset: require(&params.thread_operational_dataset, "Thread dataset")?
                    .clone(),
                breadcrumb,
            }),
            S::FailsafeBeforeWiFiEnable | S::FailsafeBeforeThreadEnable => {
                Ok(StepPlan::FailSafeBeforeNetworkEnable {
                    seconds: self.attempt_fail_safe_seconds(),
                })
            },
            S::WiFiNetworkEnable | S::ThreadNetworkEnable => pase(Command::ConnectNetwork {
                network_id: super::network::network_id(attempt.stage, params)?,
                breadcrumb,
            }),
            S::PrimaryOperationalNetworkFailed => Ok(StepPlan::Skip),
            S::RemoveWiFiNetworkConfig | S::RemoveThreadNetworkConfig => {
                pase(Command::RemoveNetwork {
                    network_id: super::network::network_id(attempt.stage, params)?,
                    breadcrumb,
                })
            },
            S::EvictPreviousCaseSessions => {
                Ok(StepPlan::EvictCaseSessions(self.operational_peer()?))
            },
            S::FindOperationalForStayActive | S::FindOperationalForCommissioningComplete => {
                Ok(StepPlan::FindOperational(self.operational_peer()?))
            },
            S::IcdSendStayActive => Ok(StepPlan::Invoke {
                channel: Channel::Case,
                command: Command::StayActiveRequest {
                    stay_active_duration_ms: *require(
                        &params.icd_stay_active_duration_ms,
                        "stay-active duration",
                    )?,
                },
            }),
            S::SendComplete if params.skip_commissioning_complete => Ok(StepPlan::Skip),
            S::SendComplete => {
                Ok(StepPlan::Invoke { channel: Channel::Case, command: Command::CommissioningComplete })
            },
            S::Cleanup => Ok(StepPlan::Cleanup),
            S::Error => {
                error!("commissioning delegate selected the error stage");
                Err(CommissioningError::IncorrectState("error stage is not executable"))
            },
        }
    }

    fn run_plan(&mut self, plan: StepPlan) -> Result<Step, CommissioningError> {
        let (device, stage) = self
            .attempt
            .as_ref()
            .map(|a| (a.device, a.stage))
            .ok_or(CommissioningError::IncorrectState("no commissioning attempt"))?;

        match plan {
            StepPlan::Skip => {
                debug!(%stage, "nothing to do, skipping");
                Ok(Step::Complete(StageResult::ok()))
            },
            StepPlan::ReadCommissioningInfo => Ok(self.start_read()),
            StepPlan::ArmFailSafe { seconds } => {
                let timeout = Some(self.stage_timeout());
                match self.extend_arm_fail_safe(
                    device,
                    stage,
                    seconds,
                    timeout,
                    super::ExtensionMode::Stage,
                )? {
                    super::ExtensionOutcome::NoOp => Ok(Step::Complete(StageResult::ok())),
                    super::ExtensionOutcome::Sent(_) => Ok(Step::Suspended),
                }
            },
            StepPlan::FailSafeBeforeNetworkEnable { seconds } => {
                match self.extend_fail_safe_before_network_enable(device, stage, seconds)? {
                    super::ExtensionOutcome::NoOp => Ok(Step::Complete(StageResult::ok())),
                    super::ExtensionOutcome::Sent(_) => Ok(Step::Suspended),
                }
            },
            StepPlan::ScanNetworks { ssid } => Ok(self.start_scan(ssid)),
            StepPlan::Invoke { channel, command } => {
                let target = self.target(channel)?;
                let endpoint = self.attempt.as_ref().map_or(0, |a| a.endpoint);
                let timeout = self.stage_timeout();
                self.send_invoke(target, endpoint, command, timeout, InvokePurpose::Stage)?;
                Ok(Step::Suspended)
            },
            StepPlan::AwaitNetworkCredentials => Ok(self.hold(Hold::NetworkCredentials)),
            StepPlan::AwaitIcdRegistrationInfo => {
                if let Some(delegate) = self.pairing_delegate.as_mut() {
                    delegate.on_icd_registration_info_required();
                }
                Ok(self.hold(Hold::IcdRegistrationInfo))
            },
            StepPlan::VerifyAttestation(info) => self.start_attestation_verification(info),
            StepPlan::CheckRevocation(info) => self.start_revocation_check(info),
            StepPlan::ValidateCsr => Ok(Step::Complete(self.validate_csr().into())),
            StepPlan::GenerateNocChain(request) => self.start_noc_chain_generation(request),
            StepPlan::EvictCaseSessions(peer) => {
                debug!(%peer, "evicting previous CASE sessions");
                self.services.sessions.evict_case_sessions(peer);
                Ok(Step::Complete(StageResult::ok()))
            },
            StepPlan::FindOperational(peer) => self.start_case(peer),
            StepPlan::Cleanup => {
                let status =
                    self.attempt.as_ref().map(|a| a.completion.clone()).unwrap_or_default();
                let node_id = self.attempt_node_id();
                self.cleanup_commissioning(device, node_id, status);
                Ok(Step::Suspended)
            },
        }
    }

    fn hold(&mut self, hold: Hold) -> Step {
        if let Some(attempt) = self.attempt.as_mut() {
            debug!(stage = %attempt.stage, ?hold, "waiting for external input");
            attempt.hold = Some(hold);
        }
        Step::Suspended
    }

    fn target(&self, channel: Channel) -> Result<Target, CommissioningError> {
        let attempt = self
            .attempt
            .as_ref()
            .ok_or(CommissioningError::IncorrectState("no commissioning attempt"))?;
        match channel {
            Channel::Pase => Ok(Target::Commissionee(attempt.temporary_id)),
            Channel::Case => match (attempt.operational, attempt.session) {
                (Some(peer), Some(session)) => Ok(Target::Operational { peer, session }),
                _ => Err(CommissioningError::IncorrectState("no operational session")),
            },
        }
    }

    fn operational_peer(&self) -> Result<PeerId, CommissioningError> {
        self.attempt
            .as_ref()
            .and_then(|a| a.operational)
            .ok_or(CommissioningError::IncorrectState("operational identity not yet known"))
    }

    /// Interpret the response to the current stage's command.
    pub(super) fn on_stage_response(
        &mut self,
        sent: CommandKind,
        result: Result<CommandResponse, CommissioningError>,
    ) -> StageResult {
        use CommissioningStage as S;

        let stage = self.stage();
        if stage == S::ScanNetworks {
            return self.on_scan_response(result);
        }
        let response = match result {
            Ok(response) => response,
            Err(CommissioningError::Status(status)) => {
                return StageResult::err_with(
                    CommissioningError::Status(status),
                    CommissioningReport::ErrorInfo(DeviceErrorInfo::Im(status)),
                );
            },
            Err(e) => return StageResult::err(e),
        };

        match (stage, response) {
            (
                S::ArmFailsafe | S::FailsafeBeforeWiFiEnable | S::FailsafeBeforeThreadEnable,
                CommandResponse::ArmFailSafe { error_code, .. },
            ) => general(error_code, CommissioningReport::Empty),
            (S::ConfigRegulatory, CommandResponse::SetRegulatoryConfig { error_code, .. })
            | (S::SendComplete, CommandResponse::CommissioningComplete { error_code, .. })
            | (S::ConfigureTcAcknowledgments, CommandResponse::SetTcAcknowledgements { error_code }) => {
                general(error_code, CommissioningReport::Empty)
            },
            (
                S::ConfigureUtcTime
                | S::ConfigureDstOffset
                | S::ConfigureDefaultNtp
                | S::ConfigureTrustedTimeSource
                | S::SendTrustedRootCert,
                CommandResponse::Default,
            ) => StageResult::ok(),
            (S::ConfigureTimeZone, CommandResponse::SetTimeZone { dst_offset_required }) => {
                StageResult::report(CommissioningReport::TimeZoneResponse { dst_offset_required })
            },
            (S::SendPaiCertificateRequest, CommandResponse::CertificateChain { certificate }) => {
                StageResult::report(CommissioningReport::AttestationCertificate {
                    kind: CertificateChainType::Pai,
                    certificate,
                })
            },
            (S::SendDacCertificateRequest, CommandResponse::CertificateChain { certificate }) => {
                StageResult::report(CommissioningReport::AttestationCertificate {
                    kind: CertificateChainType::Dac,
                    certificate,
                })
            },
            (
                S::SendAttestationRequest,
                CommandResponse::Attestation { attestation_elements, attestation_signature },
            ) => StageResult::report(CommissioningReport::AttestationResponse {
                elements: attestation_elements,
                signature: attestation_signature,
            }),
            (
                S::SendOpCertSigningRequest,
                CommandResponse::Csr { nocsr_elements, attestation_signature },
            ) => StageResult::report(CommissioningReport::CsrResponse {
                elements: nocsr_elements,
                signature: attestation_signature,
            }),
            (S::SendNoc, CommandResponse::Noc { status_code, .. }) => {
                self.on_noc_installed(status_code)
            },
            (S::IcdRegistration, CommandResponse::RegisterClient { icd_counter }) => {
                let node_id = self.attempt_node_id();
                if let Some(delegate) = self.pairing_delegate.as_mut() {
                    delegate.on_icd_registration_complete(node_id, icd_counter);
                }
                StageResult::report(CommissioningReport::IcdRegistration { counter: icd_counter })
            },
            (S::IcdSendStayActive, CommandResponse::StayActive { promised_active_duration_ms }) => {
                let node_id = self.attempt_node_id();
                if let Some(delegate) = self.pairing_delegate.as_mut() {
                    delegate.on_icd_stay_active_complete(node_id, promised_active_duration_ms);
                }
                StageResult::report(CommissioningReport::IcdStayActive {
                    promised_active_duration_ms,
                })
            },
            (
                S::WiFiNetworkSetup
                | S::ThreadNetworkSetup
                | S::RemoveWiFiNetworkConfig
                | S::RemoveThreadNetworkConfig,
                CommandResponse::NetworkConfig { networking_status, .. },
            ) => super::network::networking(networking_status, None),
            (
                S::WiFiNetworkEnable | S::ThreadNetworkEnable,
                CommandResponse::ConnectNetwork { networking_status, error_value, .. },
            ) => super::network::networking(networking_status, error_value),
            (stage, response) => {
                error!(%stage, ?response, "response does not fit the command sent");
                StageResult::err(CommissioningError::UnexpectedResponse(sent))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regulatory_selection_order() {
        let mut params = CommissioningParameters::default();
        assert_eq!(select_regulatory_location(&params), RegulatoryLocation::Outdoor);

        params.device_regulatory_location = Some(RegulatoryLocation::Indoor);
        assert_eq!(select_regulatory_location(&params), RegulatoryLocation::Indoor);

        params.regulatory_location = Some(RegulatoryLocation::IndoorOutdoor);
        assert_eq!(select_regulatory_location(&params), RegulatoryLocation::IndoorOutdoor);

        params.location_capability = Some(RegulatoryLocation::Outdoor);
        assert_eq!(select_regulatory_location(&params), RegulatoryLocation::Outdoor);
    }

    #[test]
    fn general_maps_error_codes() {
        let ok = general(CommissioningErrorCode::Ok, CommissioningReport::Empty);
        assert!(ok.error.is_none());

        let failed = general(CommissioningErrorCode::BusyWithOtherAdmin, CommissioningReport::Empty);
        assert_eq!(
            failed.error,
            Some(CommissioningError::Commissioning(CommissioningErrorCode::BusyWithOtherAdmin))
        );
        assert_eq!(
            failed.report,
            CommissioningReport::ErrorInfo(DeviceErrorInfo::General(
                CommissioningErrorCode::BusyWithOtherAdmin
            ))
        );
    }
}
