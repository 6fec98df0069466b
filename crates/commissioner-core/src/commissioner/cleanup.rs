//! Ending an attempt.
//!
//! [`Commissioner::cleanup_commissioning`] picks one of four recovery paths
//! from the completion status:
//!
//! | status                               | fail-safe              |
//! |--------------------------------------|------------------------|
//! | success                              | left alone             |
//! | cancelled                            | disarmed in background |
//! | failed during or after network setup | left to expire         |
//! | failed before network setup          | disarmed, awaited      |
//!
//! Every path ends in the same place: the `Cleanup` stage is reported, the
//! commissionee is released and the completion callbacks fire exactly once.

use commissioner_proto::{Command, NodeId};
use tracing::{debug, info, warn};

use super::{Commissioner, InvokePurpose, PendingCleanup, pairing_failure};
use crate::{
    device::DeviceHandle,
    env::Environment,
    error::CommissioningError,
    report::{CompletionStatus, StageResult},
    services::Target,
    stage::CommissioningStage,
};

impl<E: Environment> Commissioner<E> {
    /// Wind down the attempt on `device` and report `status` for `node_id`.
    pub fn cleanup_commissioning(
        &mut self,
        device: DeviceHandle,
        node_id: NodeId,
        status: CompletionStatus,
    ) {
        self.cancel_outstanding();

        if status.is_success() {
            info!(%node_id, "commissioning succeeded");
            self.finish_cleanup(device, node_id, status);
            return;
        }

        let cancelled = status.error.as_ref().is_some_and(CommissioningError::is_cancellation);
        let failed_stage = status.failed_stage.unwrap_or(CommissioningStage::Error);
        if cancelled {
            info!(%node_id, %failed_stage, "commissioning cancelled");
            let disarm = self.disarm_command(device).and_then(|(target, command)| {
                self.send_background_invoke(target, 0, command)
            });
            if let Err(e) = disarm {
                warn!(%device, error = %e, "background fail-safe disarm not sent");
            }
            self.finish_cleanup(device, node_id, status);
        } else if failed_stage.is_network_setup_or_later() {
            info!(%node_id, %failed_stage, "commissioning failed, keeping device-side progress");
            self.finish_cleanup(device, node_id, status);
        } else {
            info!(%node_id, %failed_stage, "commissioning failed, disarming fail-safe");
            let pending = PendingCleanup { device, node_id, status: status.clone() };
            let timeout = self.config.command_timeout;
            let sent = self.disarm_command(device).and_then(|(target, command)| {
                self.send_invoke(target, 0, command, timeout, InvokePurpose::Disarm(pending))
            });
            if let Err(e) = sent {
                warn!(%device, error = %e, "fail-safe disarm not sent, cleaning up anyway");
                self.finish_cleanup(device, node_id, status);
            }
        }
    }

    /// `ArmFailSafe(0)` for `device`, clearing the local expiry record.
    fn disarm_command(
        &mut self,
        device: DeviceHandle,
    ) -> Result<(Target, Command), CommissioningError> {
        let proxy = self
            .pool
            .get_mut(device)
            .ok_or(CommissioningError::IncorrectState("stale commissionee handle"))?;
        proxy.fail_safe.clear();
        Ok((
            Target::Commissionee(proxy.temporary_id),
            Command::ArmFailSafe { expiry_length_seconds: 0, breadcrumb: 0 },
        ))
    }

    pub(super) fn finish_cleanup(
        &mut self,
        device: DeviceHandle,
        node_id: NodeId,
        status: CompletionStatus,
    ) {
        if let Some(attempt) = self.attempt.as_mut().filter(|a| a.device == device) {
            attempt.stage = CommissioningStage::Cleanup;
            attempt.hold = None;
            self.complete_stage(StageResult::ok());
        }
        if self.pool.release(device).is_some() {
            debug!(%device, "commissionee released");
            self.services.sessions.close_pase(device);
        }
        self.send_completion_callbacks(node_id, &status);
    }

    pub(super) fn send_completion_callbacks(&mut self, node_id: NodeId, status: &CompletionStatus) {
        let Some(delegate) = self.pairing_delegate.as_mut() else {
            return;
        };
        delegate.on_commissioning_complete(node_id, status.error.as_ref());
        match &status.error {
            None => delegate.on_commissioning_success(node_id),
            Some(e) => delegate.on_commissioning_failure(
                node_id,
                e,
                status.failed_stage.unwrap_or(CommissioningStage::Error),
                status.attestation_result,
            ),
        }
    }

    /// Abandon pairing or commissioning of a device.
    ///
    /// During PASE establishment the pairing fails with a session
    /// establishment error. During commissioning every outstanding request
    /// is cancelled and the attempt ends as cancelled, releasing local state
    /// before this returns. A paired but idle device is simply released.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if no device with `temporary_id` is known.
    pub fn stop_pairing(&mut self, temporary_id: NodeId) -> Result<(), CommissioningError> {
        if let Some(pending) = self.pase.take_if(|p| p.temporary_id == temporary_id) {
            info!(node_id = %temporary_id, "PASE establishment cancelled");
            self.services.sessions.cancel_pase(pending.device);
            self.pool.release(pending.device);
            let error = CommissioningError::SessionEstablishment("pairing cancelled".into());
            if let Some(delegate) = self.pairing_delegate.as_mut() {
                delegate.on_pairing_complete(temporary_id, Some(&error));
            }
            if pending.commission.is_some() {
                self.send_completion_callbacks(temporary_id, &pairing_failure(error));
            }
            return Ok(());
        }

        if self.attempt.as_ref().is_some_and(|a| a.temporary_id == temporary_id) {
            self.cancel_attempt();
            return Ok(());
        }

        let device = self
            .pool
            .find(temporary_id)
            .ok_or(CommissioningError::InvalidArgument("unknown device"))?;
        self.pool.release(device);
        self.services.sessions.close_pase(device);
        debug!(node_id = %temporary_id, "paired device released");
        Ok(())
    }

    fn cancel_attempt(&mut self) {
        // A synchronous disarm already in flight keeps its original status.
        let disarm = |p: &mut super::PendingInvoke| matches!(p.purpose, InvokePurpose::Disarm(_));
        if let Some(pending) = self.inflight.invoke.take_if(disarm) {
            self.services.interaction.cancel(pending.id);
            if let InvokePurpose::Disarm(cleanup) = pending.purpose {
                self.finish_cleanup(cleanup.device, cleanup.node_id, cleanup.status);
            }
            return;
        }

        self.cancel_outstanding();
        let node_id = self.attempt_node_id();
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        let failed_stage = attempt.completion.failed_stage.unwrap_or(attempt.stage);
        attempt.completion.error = Some(CommissioningError::Cancelled);
        attempt.completion.failed_stage = Some(failed_stage);
        attempt.stage = CommissioningStage::Cleanup;
        attempt.hold = None;
        let (device, status) = (attempt.device, attempt.completion.clone());

        warn!(%node_id, %failed_stage, "commissioning cancelled");
        self.cleanup_commissioning(device, node_id, status);
    }
}
