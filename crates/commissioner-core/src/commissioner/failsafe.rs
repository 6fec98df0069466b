//! Fail-safe extension.

use std::time::Duration;

use commissioner_proto::Command;
use tracing::{debug, warn};

use super::{Commissioner, InvokePurpose};
use crate::{
    device::DeviceHandle,
    env::Environment,
    error::CommissioningError,
    failsafe::network_enable_extension,
    services::{RequestId, Target},
    stage::CommissioningStage,
};

/// How an extension request is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionMode {
    /// Occupies the invoke slot; the response completes the current stage.
    /// Accepted only while a fail-safe stage runs with nothing outstanding.
    Stage,
    /// Best effort; the response is only logged
    FireAndForget,
}

/// What an extension request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionOutcome {
    /// The recorded expiry already reaches past the candidate; nothing sent
    NoOp,
    /// An `ArmFailSafe` command was sent
    Sent(RequestId),
}

impl<E: Environment> Commissioner<E> {
    /// Extend a commissionee's fail-safe by `seconds` from now.
    ///
    /// The fail-safe is never shortened: when now + `seconds` is not strictly
    /// later than the recorded expiry, nothing is sent and
    /// [`ExtensionOutcome::NoOp`] is returned. On a successful send the new
    /// expiry is recorded at once, before the device answers.
    ///
    /// # Errors
    ///
    /// `IncorrectState` for a stale handle, or for [`ExtensionMode::Stage`]
    /// unless `device` is being commissioned and its attempt sits in a
    /// fail-safe stage with no request outstanding and no hold active. Send
    /// failures are returned synchronously, and no response event will
    /// follow.
    pub fn extend_arm_fail_safe(
        &mut self,
        device: DeviceHandle,
        stage: CommissioningStage,
        seconds: u16,
        timeout: Option<Duration>,
        mode: ExtensionMode,
    ) -> Result<ExtensionOutcome, CommissioningError> {
        if mode == ExtensionMode::Stage {
            self.require_fail_safe_stage(device)?;
        }
        let now = self.env.now();
        let proxy = self
            .pool
            .get(device)
            .ok_or(CommissioningError::IncorrectState("stale commissionee handle"))?;
        let Some(expiry) = proxy.fail_safe.plan_extension(now, Duration::from_secs(seconds.into()))
        else {
            debug!(%device, seconds, "fail-safe already armed long enough");
            return Ok(ExtensionOutcome::NoOp);
        };

        let target = Target::Commissionee(proxy.temporary_id);
        let command =
            Command::ArmFailSafe { expiry_length_seconds: seconds, breadcrumb: stage.breadcrumb() };
        let request = match mode {
            ExtensionMode::Stage => {
                let timeout = timeout.unwrap_or(self.config.command_timeout);
                self.send_invoke(target, 0, command, timeout, InvokePurpose::Stage)?
            },
            ExtensionMode::FireAndForget => self.send_background_invoke(target, 0, command)?,
        };

        if let Some(proxy) = self.pool.get_mut(device) {
            proxy.fail_safe.record(expiry);
        }
        debug!(%device, seconds, %request, "fail-safe extension sent");
        Ok(ExtensionOutcome::Sent(request))
    }

    /// Extend the fail-safe ahead of enabling an operational network.
    ///
    /// Adds the worst-case CASE round trip to `seconds`, saturating at the
    /// largest encodable duration.
    ///
    /// # Errors
    ///
    /// As [`Commissioner::extend_arm_fail_safe`] in stage mode.
    pub fn extend_fail_safe_before_network_enable(
        &mut self,
        device: DeviceHandle,
        stage: CommissioningStage,
        seconds: u16,
    ) -> Result<ExtensionOutcome, CommissioningError> {
        let seconds = network_enable_extension(seconds, self.config.case_sigma1_worst_case_rtt);
        self.extend_arm_fail_safe(device, stage, seconds, None, ExtensionMode::Stage)
    }

    /// A stage-mode response is read as the current stage's outcome, so only
    /// a fail-safe stage with an idle invoke slot may issue one.
    fn require_fail_safe_stage(&self, device: DeviceHandle) -> Result<(), CommissioningError> {
        let attempt = self
            .attempt
            .as_ref()
            .filter(|a| a.device == device)
            .ok_or(CommissioningError::IncorrectState("device is not being commissioned"))?;
        let fail_safe_stage = matches!(
            attempt.stage,
            CommissioningStage::ArmFailsafe
                | CommissioningStage::FailsafeBeforeWiFiEnable
                | CommissioningStage::FailsafeBeforeThreadEnable
        );
        if !fail_safe_stage || attempt.hold.is_some() || self.inflight.has_stage_work() {
            warn!(stage = %attempt.stage, %device, "stage-mode fail-safe extension refused");
            return Err(CommissioningError::IncorrectState(
                "no fail-safe stage awaiting an extension",
            ));
        }
        Ok(())
    }

    /// Fail-safe seconds for the current attempt.
    pub(super) fn attempt_fail_safe_seconds(&self) -> u16 {
        self.attempt
            .as_ref()
            .and_then(|a| a.params.fail_safe_expiry_seconds)
            .unwrap_or(self.config.fail_safe_expiry_seconds)
    }
}
