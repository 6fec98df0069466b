//! Recording delegates.
//!
//! Every delegate callback is appended to a shared [`EventLog`] so oracles
//! can check ordering and multiplicity after a run.

use std::{cell::RefCell, rc::Rc};

use commissioner_core::{
    AttestationPolicyDelegate, CommissioningError, CommissioningStage, DeviceHandle,
    PairingDelegate, ReadCommissioningInfo,
    report::{MatchingFabric, ScanNetworksResult},
    services::AttestationVerificationResult,
};
use commissioner_proto::NodeId;

/// One observed delegate callback.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DelegateEvent {
    PairingComplete {
        temporary_id: NodeId,
        error: Option<CommissioningError>,
    },
    StatusUpdate {
        node_id: NodeId,
        stage: CommissioningStage,
        error: Option<CommissioningError>,
    },
    CommissioningComplete {
        node_id: NodeId,
        error: Option<CommissioningError>,
    },
    Success {
        node_id: NodeId,
    },
    Failure {
        node_id: NodeId,
        error: CommissioningError,
        failed_stage: CommissioningStage,
        attestation_result: Option<AttestationVerificationResult>,
    },
    ScanSuccess(ScanNetworksResult),
    ScanFailure(CommissioningError),
    FabricCheck(MatchingFabric),
    ReadCommissioningInfo(Box<ReadCommissioningInfo>),
    IcdRegistrationInfoRequired,
    IcdRegistrationComplete {
        node_id: NodeId,
        icd_counter: u32,
    },
    IcdStayActiveComplete {
        node_id: NodeId,
        promised_duration_ms: u32,
    },
    AttestationCompleted {
        device: DeviceHandle,
        result: AttestationVerificationResult,
    },
}

/// Shared, append-only log of delegate callbacks.
pub type EventLog = Rc<RefCell<Vec<DelegateEvent>>>;

/// [`PairingDelegate`] that records every callback.
pub struct RecordingPairingDelegate {
    log: EventLog,
}

impl RecordingPairingDelegate {
    /// Delegate appending to `log`.
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }

    fn push(&self, event: DelegateEvent) {
        self.log.borrow_mut().push(event);
    }
}

impl PairingDelegate for RecordingPairingDelegate {
    fn on_pairing_complete(&mut self, temporary_id: NodeId, error: Option<&CommissioningError>) {
        self.push(DelegateEvent::PairingComplete { temporary_id, error: error.cloned() });
    }

    fn on_commissioning_status_update(
        &mut self,
        node_id: NodeId,
        stage: CommissioningStage,
        error: Option<&CommissioningError>,
    ) {
        self.push(DelegateEvent::StatusUpdate { node_id, stage, error: error.cloned() });
    }

    fn on_commissioning_complete(&mut self, node_id: NodeId, error: Option<&CommissioningError>) {
        self.push(DelegateEvent::CommissioningComplete { node_id, error: error.cloned() });
    }

    fn on_commissioning_success(&mut self, node_id: NodeId) {
        self.push(DelegateEvent::Success { node_id });
    }

    fn on_commissioning_failure(
        &mut self,
        node_id: NodeId,
        error: &CommissioningError,
        failed_stage: CommissioningStage,
        attestation_result: Option<AttestationVerificationResult>,
    ) {
        self.push(DelegateEvent::Failure {
            node_id,
            error: error.clone(),
            failed_stage,
            attestation_result,
        });
    }

    fn on_scan_networks_success(&mut self, result: &ScanNetworksResult) {
        self.push(DelegateEvent::ScanSuccess(result.clone()));
    }

    fn on_scan_networks_failure(&mut self, error: &CommissioningError) {
        self.push(DelegateEvent::ScanFailure(error.clone()));
    }

    fn on_fabric_check(&mut self, matching: &MatchingFabric) {
        self.push(DelegateEvent::FabricCheck(*matching));
    }

    fn on_read_commissioning_info(&mut self, info: &ReadCommissioningInfo) {
        self.push(DelegateEvent::ReadCommissioningInfo(Box::new(info.clone())));
    }

    fn on_icd_registration_info_required(&mut self) {
        self.push(DelegateEvent::IcdRegistrationInfoRequired);
    }

    fn on_icd_registration_complete(&mut self, node_id: NodeId, icd_counter: u32) {
        self.push(DelegateEvent::IcdRegistrationComplete { node_id, icd_counter });
    }

    fn on_icd_stay_active_complete(&mut self, node_id: NodeId, promised_duration_ms: u32) {
        self.push(DelegateEvent::IcdStayActiveComplete { node_id, promised_duration_ms });
    }
}

/// [`AttestationPolicyDelegate`] that records each decision point and
/// optionally holds the attempt after successful verification.
pub struct RecordingAttestationPolicy {
    log: EventLog,
    wait: bool,
    fail_safe_seconds: Option<u16>,
}

impl RecordingAttestationPolicy {
    /// Policy appending to `log`.
    pub fn new(log: EventLog, wait: bool, fail_safe_seconds: Option<u16>) -> Self {
        Self { log, wait, fail_safe_seconds }
    }
}

impl AttestationPolicyDelegate for RecordingAttestationPolicy {
    fn fail_safe_expiry_seconds(&self) -> Option<u16> {
        self.fail_safe_seconds
    }

    fn should_wait_after_attestation(&self) -> bool {
        self.wait
    }

    fn on_device_attestation_completed(
        &mut self,
        device: DeviceHandle,
        result: AttestationVerificationResult,
    ) {
        self.log.borrow_mut().push(DelegateEvent::AttestationCompleted { device, result });
    }
}
