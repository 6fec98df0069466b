//! Operational (CASE) session establishment.

use commissioner_proto::PeerId;
use tracing::{info, warn};

use super::{Commissioner, ExtensionMode, Step};
use crate::{
    env::Environment,
    error::CommissioningError,
    report::StageResult,
    services::SessionHandle,
};

impl<E: Environment> Commissioner<E> {
    pub(super) fn start_case(&mut self, peer: PeerId) -> Result<Step, CommissioningError> {
        let request = self.next_request_id();
        self.services.sessions.establish_case(request, peer)?;
        info!(%peer, %request, "establishing CASE");
        self.inflight.case = Some(request);
        Ok(Step::Suspended)
    }

    pub(super) fn on_case_established(
        &mut self,
        result: Result<SessionHandle, CommissioningError>,
    ) {
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        let error = match result {
            Ok(session) => {
                attempt.session = Some(session);
                self.complete_stage(StageResult::ok());
                return;
            },
            Err(e) => e,
        };

        let (Some(peer), true) = (attempt.operational, attempt.case_retries_left > 0) else {
            self.complete_stage(StageResult::err(error));
            return;
        };
        attempt.case_retries_left -= 1;
        let (device, stage, retries_left) = (attempt.device, attempt.stage, attempt.case_retries_left);
        warn!(%peer, %error, retries_left, "CASE establishment failed, retrying");

        // Each retry must not outlive the device's fail-safe.
        let seconds = self.attempt_fail_safe_seconds();
        if let Err(e) =
            self.extend_arm_fail_safe(device, stage, seconds, None, ExtensionMode::FireAndForget)
        {
            warn!(error = %e, "fail-safe extension before CASE retry failed");
        }

        if let Step::Complete(result) = Step::from(self.start_case(peer)) {
            self.complete_stage(result);
        }
    }
}
