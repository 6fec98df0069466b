//! Surfaces the engine exposes to its embedder.
//!
//! Each delegate is optional. Every [`PairingDelegate`] and
//! [`AttestationPolicyDelegate`] method has a no-op default, so an embedder
//! implements only what it observes.

use std::time::Duration;

use commissioner_proto::{EndpointId, NodeId};

use crate::{
    device::DeviceHandle,
    error::CommissioningError,
    params::CommissioningParameters,
    report::{MatchingFabric, ReadCommissioningInfo, ScanNetworksResult, StageReport},
    services::AttestationVerificationResult,
    stage::CommissioningStage,
};

/// Progress and outcome notifications.
pub trait PairingDelegate {
    /// PASE establishment finished. `error` is `None` on success.
    fn on_pairing_complete(&mut self, _temporary_id: NodeId, _error: Option<&CommissioningError>) {}

    /// A stage finished.
    fn on_commissioning_status_update(
        &mut self,
        _node_id: NodeId,
        _stage: CommissioningStage,
        _error: Option<&CommissioningError>,
    ) {
    }

    /// An attempt ended. Always paired with exactly one of
    /// [`on_commissioning_success`](Self::on_commissioning_success) or
    /// [`on_commissioning_failure`](Self::on_commissioning_failure).
    fn on_commissioning_complete(&mut self, _node_id: NodeId, _error: Option<&CommissioningError>) {
    }

    /// An attempt succeeded.
    fn on_commissioning_success(&mut self, _node_id: NodeId) {}

    /// An attempt failed.
    fn on_commissioning_failure(
        &mut self,
        _node_id: NodeId,
        _error: &CommissioningError,
        _failed_stage: CommissioningStage,
        _attestation_result: Option<AttestationVerificationResult>,
    ) {
    }

    /// The device finished a network scan.
    fn on_scan_networks_success(&mut self, _result: &ScanNetworksResult) {}

    /// A network scan could not be sent or failed on the device.
    fn on_scan_networks_failure(&mut self, _error: &CommissioningError) {}

    /// The device already holds our fabric.
    fn on_fabric_check(&mut self, _matching: &MatchingFabric) {}

    /// Commissioning info was read and parsed.
    fn on_read_commissioning_info(&mut self, _info: &ReadCommissioningInfo) {}

    /// ICD registration data is needed to continue.
    fn on_icd_registration_info_required(&mut self) {}

    /// ICD registration finished.
    fn on_icd_registration_complete(&mut self, _node_id: NodeId, _icd_counter: u32) {}

    /// ICD stay-active finished.
    fn on_icd_stay_active_complete(&mut self, _node_id: NodeId, _promised_duration_ms: u32) {}
}

/// Next unit of work chosen by a [`CommissioningDelegate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextStep {
    /// Stage to run
    pub stage: CommissioningStage,
    /// Parameters the stage reads
    pub params: CommissioningParameters,
    /// Endpoint addressed by the stage's command
    pub endpoint: EndpointId,
    /// Per-call timeout override
    pub timeout: Option<Duration>,
}

/// Chooses stages.
pub trait CommissioningDelegate {
    /// Install parameters for the next attempt.
    fn set_commissioning_parameters(
        &mut self,
        params: CommissioningParameters,
    ) -> Result<(), CommissioningError>;

    /// Current parameters.
    fn commissioning_parameters(&self) -> &CommissioningParameters;

    /// First step of an attempt.
    fn start_commissioning(&mut self) -> Result<NextStep, CommissioningError>;

    /// Absorb a finished stage and choose the next step.
    ///
    /// An `Err` aborts the attempt into cleanup.
    fn commissioning_step_finished(
        &mut self,
        error: Option<&CommissioningError>,
        report: &StageReport,
    ) -> Result<NextStep, CommissioningError>;
}

/// Lets the embedder overrule or delay attestation decisions.
pub trait AttestationPolicyDelegate {
    /// Fail-safe seconds to arm while the decision is pending.
    fn fail_safe_expiry_seconds(&self) -> Option<u16> {
        None
    }

    /// Hold the attempt for a decision even when verification passed.
    fn should_wait_after_attestation(&self) -> bool {
        false
    }

    /// Verification finished and the attempt is held.
    ///
    /// Resume with
    /// [`Commissioner::continue_commissioning_after_attestation`](crate::Commissioner::continue_commissioning_after_attestation).
    fn on_device_attestation_completed(
        &mut self,
        _device: DeviceHandle,
        _result: AttestationVerificationResult,
    ) {
    }
}
