//! Device attestation.
//!
//! PAI, DAC and attestation requests are ordinary stage commands. This module
//! covers the verifier round trips and the policy hold: when an attestation
//! policy delegate is installed it may hold the attempt open after
//! verification, and only an explicit resumption for the same commissionee
//! in the same held stage moves it on.

use tracing::{error, info, warn};

use super::{Commissioner, ExtensionMode, Hold, Step};
use crate::{
    device::DeviceHandle,
    env::Environment,
    error::CommissioningError,
    report::{CommissioningReport, StageResult},
    services::{AttestationInfo, AttestationVerificationResult},
    stage::CommissioningStage,
};

fn attestation_result(result: AttestationVerificationResult) -> StageResult {
    let report = CommissioningReport::AttestationResult(result);
    if result.is_success() {
        StageResult::report(report)
    } else {
        StageResult::err_with(CommissioningError::Attestation(result), report)
    }
}

impl<E: Environment> Commissioner<E> {
    /// Inputs for the verifier, gathered from the attempt.
    pub(super) fn attestation_info(&self) -> Result<AttestationInfo, CommissioningError> {
        let attempt = self
            .attempt
            .as_ref()
            .ok_or(CommissioningError::IncorrectState("no commissioning attempt"))?;
        let params = &attempt.params;
        let missing = CommissioningError::InvalidArgument;

        Ok(AttestationInfo {
            attestation_elements: params
                .attestation_elements
                .clone()
                .ok_or(missing("attestation elements"))?,
            attestation_signature: params
                .attestation_signature
                .clone()
                .ok_or(missing("attestation signature"))?,
            attestation_challenge: self.attestation_challenge()?,
            attestation_nonce: params.attestation_nonce.ok_or(missing("attestation nonce"))?,
            pai: params.pai.clone().ok_or(missing("PAI certificate"))?,
            dac: params.dac.clone().ok_or(missing("DAC certificate"))?,
            remote_vendor_id: params.remote_vendor_id,
            remote_product_id: params.remote_product_id,
        })
    }

    /// Challenge derived from the commissionee's PASE session.
    pub(super) fn attestation_challenge(&self) -> Result<[u8; 16], CommissioningError> {
        self.attempt
            .as_ref()
            .and_then(|a| self.pool.get(a.device))
            .and_then(|p| p.pase.as_ref())
            .map(|s| s.attestation_challenge)
            .ok_or(CommissioningError::IncorrectState("commissionee has no PASE session"))
    }

    pub(super) fn start_attestation_verification(
        &mut self,
        info: AttestationInfo,
    ) -> Result<Step, CommissioningError> {
        let request = self.next_request_id();
        self.services.attestation.verify(request, info)?;
        self.inflight.verifier = Some(request);
        Ok(Step::Suspended)
    }

    pub(super) fn start_revocation_check(
        &mut self,
        info: AttestationInfo,
    ) -> Result<Step, CommissioningError> {
        let request = self.next_request_id();
        self.services.attestation.check_revocation(request, info)?;
        self.inflight.verifier = Some(request);
        Ok(Step::Suspended)
    }

    pub(super) fn on_attestation_verified(&mut self, result: AttestationVerificationResult) {
        let hold = self
            .attestation_delegate
            .as_ref()
            .is_some_and(|d| !result.is_success() || d.should_wait_after_attestation());
        if !hold {
            return self.complete_stage(attestation_result(result));
        }

        let Some(device) = self.device_being_commissioned() else {
            return;
        };
        let seconds = self
            .attestation_delegate
            .as_ref()
            .and_then(|d| d.fail_safe_expiry_seconds())
            .unwrap_or_else(|| self.attempt_fail_safe_seconds());
        // The embedder may take arbitrarily long to decide
        if let Err(e) = self.extend_arm_fail_safe(
            device,
            CommissioningStage::AttestationVerification,
            seconds,
            None,
            ExtensionMode::FireAndForget,
        ) {
            warn!(error = %e, "could not extend fail-safe for attestation decision");
        }

        if let Some(attempt) = self.attempt.as_mut() {
            attempt.hold = Some(Hold::AttestationPolicy(result));
            attempt.completion.attestation_result = Some(result);
        }
        info!(?result, %device, "attestation held for policy decision");
        if let Some(delegate) = self.attestation_delegate.as_mut() {
            delegate.on_device_attestation_completed(device, result);
        }
    }

    pub(super) fn on_revocation_checked(&mut self, result: AttestationVerificationResult) {
        self.complete_stage(attestation_result(result));
    }

    /// Resume an attempt held after attestation verification.
    ///
    /// `result` is the embedder's verdict: `Success` proceeds, anything else
    /// fails the attestation stage with that result.
    ///
    /// # Errors
    ///
    /// `IncorrectState` unless `device` is the live commissionee of the
    /// current attempt and that attempt is held in `AttestationVerification`.
    pub fn continue_commissioning_after_attestation(
        &mut self,
        device: DeviceHandle,
        result: AttestationVerificationResult,
    ) -> Result<(), CommissioningError> {
        let held = self.attempt.as_ref().is_some_and(|a| {
            a.device == device
                && a.stage == CommissioningStage::AttestationVerification
                && matches!(a.hold, Some(Hold::AttestationPolicy(_)))
        });
        if !held || self.pool.get(device).is_none() {
            error!(%device, stage = %self.stage(), "stale attestation resumption rejected");
            return Err(CommissioningError::IncorrectState("no attestation decision pending"));
        }

        info!(?result, %device, "attestation decision received");
        self.complete_stage(attestation_result(result));
        Ok(())
    }
}
