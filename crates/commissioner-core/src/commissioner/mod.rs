//! The commissioning orchestrator.
//!
//! [`Commissioner`] runs one commissioning attempt at a time as a saga of
//! [`CommissioningStage`]s. Each stage performs exactly one unit of work:
//! issue one request to a collaborator and suspend, skip, or fail argument
//! validation and resume immediately.
//!
//! # Architecture
//!
//! ```text
//!   handle(event) ──► stage handler ──┐
//!                                     ▼
//!                 complete_stage ◄──────────────────┐
//!                       │                           │ synchronous result
//!                       ▼                           │
//!              transition (delegate picks next) ──► execute ──► Suspended
//! ```
//!
//! Stage completions run through a single loop, so stages that finish
//! synchronously never recurse into one another.
//!
//! # Single flight
//!
//! At most one command invoke, one read, one CASE establishment, one NOC
//! issuance and one attestation verification are outstanding per instance.
//! Fire-and-forget fail-safe extensions are tracked separately and may
//! overlap with stage work.

mod attestation;
mod cleanup;
mod dispatch;
mod failsafe;
mod issuance;
mod network;
mod operational;
mod read;

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use commissioner_proto::{
    AttributePath, AttributeValue, Command, CommandKind, ConcreteAttributePath, EndpointId,
    NodeId, PeerId,
};
use tracing::{debug, error, info, warn};

pub use self::failsafe::{ExtensionMode, ExtensionOutcome};
use crate::{
    auto::AutoCommissioner,
    config::CommissionerConfig,
    delegate::{AttestationPolicyDelegate, CommissioningDelegate, NextStep, PairingDelegate},
    device::{CommissioneeDeviceProxy, DeviceHandle, DeviceProxyPool, PaseSession, PeerAddress},
    env::Environment,
    error::CommissioningError,
    event::CommissionerEvent,
    fabric::{FabricSessionController, FabricTable},
    info_reader::ReadPolicy,
    params::{CommissioningParameters, IcdRegistrationInfo, NetworkCredentials},
    report::{CommissioningReport, CompletionStatus, StageReport, StageResult},
    services::{AttestationVerificationResult, RequestId, Services, SessionHandle, Target},
    stage::CommissioningStage,
};

/// PASE establishment in progress.
struct PendingPase {
    device: DeviceHandle,
    temporary_id: NodeId,
    /// Parameters to commission with once PASE is up
    commission: Option<CommissioningParameters>,
}

/// Reason an attempt is held open waiting on an external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hold {
    AttestationPolicy(AttestationVerificationResult),
    NetworkCredentials,
    IcdRegistrationInfo,
}

/// Progress of the batched commissioning-info read.
struct ReadProgress {
    policy: ReadPolicy,
    paths: Vec<AttributePath>,
    consumed: usize,
    requested: usize,
    more: bool,
    cache: BTreeMap<ConcreteAttributePath, AttributeValue>,
}

/// One commissioning attempt.
struct Attempt {
    device: DeviceHandle,
    temporary_id: NodeId,
    stage: CommissioningStage,
    params: CommissioningParameters,
    endpoint: EndpointId,
    timeout: Option<Duration>,
    completion: CompletionStatus,
    read: Option<ReadProgress>,
    hold: Option<Hold>,
    operational: Option<PeerId>,
    session: Option<SessionHandle>,
    existing_node_id: Option<NodeId>,
    case_retries_left: u8,
}

/// Context carried by a synchronous disarm until its response arrives.
struct PendingCleanup {
    device: DeviceHandle,
    node_id: NodeId,
    status: CompletionStatus,
}

enum InvokePurpose {
    Stage,
    Disarm(PendingCleanup),
}

struct PendingInvoke {
    id: RequestId,
    kind: CommandKind,
    purpose: InvokePurpose,
}

/// Single-flight request slots.
#[derive(Default)]
struct InFlight {
    invoke: Option<PendingInvoke>,
    read: Option<RequestId>,
    case: Option<RequestId>,
    issuer: Option<RequestId>,
    verifier: Option<RequestId>,
    /// Fire-and-forget invokes; responses are only logged
    background: HashMap<RequestId, CommandKind>,
}

impl InFlight {
    fn has_stage_work(&self) -> bool {
        self.invoke.is_some()
            || self.read.is_some()
            || self.case.is_some()
            || self.issuer.is_some()
            || self.verifier.is_some()
    }
}

/// Result of executing one stage.
enum Step {
    /// Waiting on a collaborator or an external call
    Suspended,
    /// Finished synchronously
    Complete(StageResult),
}

impl From<Result<Step, CommissioningError>> for Step {
    fn from(result: Result<Step, CommissioningError>) -> Self {
        result.unwrap_or_else(|e| Self::Complete(StageResult::err(e)))
    }
}

/// Device commissioning orchestrator.
///
/// Owns the fabric identity, the commissionee pool and at most one attempt.
/// All methods run on the caller's thread and return without blocking;
/// collaborator outcomes are fed back through [`Commissioner::handle`].
pub struct Commissioner<E: Environment> {
    env: E,
    config: CommissionerConfig,
    fabric: FabricSessionController,
    pool: DeviceProxyPool,
    services: Services,
    pairing_delegate: Option<Box<dyn PairingDelegate>>,
    commissioning_delegate: Option<Box<dyn CommissioningDelegate>>,
    attestation_delegate: Option<Box<dyn AttestationPolicyDelegate>>,
    pase: Option<PendingPase>,
    attempt: Option<Attempt>,
    inflight: InFlight,
    next_request: u64,
}

impl<E: Environment> Commissioner<E> {
    /// Create a commissioner with an [`AutoCommissioner`] as its
    /// commissioning delegate.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `config` is inconsistent.
    pub fn new(
        env: E,
        config: CommissionerConfig,
        fabric_table: Box<dyn FabricTable>,
        services: Services,
    ) -> Result<Self, CommissioningError> {
        config.validate()?;
        Ok(Self {
            env,
            pool: DeviceProxyPool::new(config.proxy_pool_capacity),
            config,
            fabric: FabricSessionController::new(fabric_table),
            services,
            pairing_delegate: None,
            commissioning_delegate: Some(Box::new(AutoCommissioner::new())),
            attestation_delegate: None,
            pase: None,
            attempt: None,
            inflight: InFlight::default(),
            next_request: 1,
        })
    }

    /// Install or remove the pairing delegate.
    pub fn set_pairing_delegate(&mut self, delegate: Option<Box<dyn PairingDelegate>>) {
        self.pairing_delegate = delegate;
    }

    /// Install or remove the commissioning delegate.
    pub fn set_commissioning_delegate(
        &mut self,
        delegate: Option<Box<dyn CommissioningDelegate>>,
    ) {
        self.commissioning_delegate = delegate;
    }

    /// Install or remove the attestation policy delegate.
    pub fn set_attestation_delegate(
        &mut self,
        delegate: Option<Box<dyn AttestationPolicyDelegate>>,
    ) {
        self.attestation_delegate = delegate;
    }

    /// Configuration in use.
    pub fn config(&self) -> &CommissionerConfig {
        &self.config
    }

    /// Fabric identity controller.
    pub fn fabric(&self) -> &FabricSessionController {
        &self.fabric
    }

    /// Mutable fabric identity controller.
    pub fn fabric_mut(&mut self) -> &mut FabricSessionController {
        &mut self.fabric
    }

    /// Stage of the current attempt, or `SecurePairing` when idle.
    pub fn stage(&self) -> CommissioningStage {
        self.attempt.as_ref().map_or(CommissioningStage::SecurePairing, |a| a.stage)
    }

    /// Commissionee of the current attempt.
    pub fn device_being_commissioned(&self) -> Option<DeviceHandle> {
        self.attempt.as_ref().map(|a| a.device)
    }

    /// Commissionee whose PASE session is being established.
    pub fn device_in_pase_establishment(&self) -> Option<DeviceHandle> {
        self.pase.as_ref().map(|p| p.device)
    }

    /// Proxy behind a handle.
    pub fn commissionee(&self, device: DeviceHandle) -> Option<&CommissioneeDeviceProxy> {
        self.pool.get(device)
    }

    /// Handle of the commissionee with this temporary id.
    pub fn find_commissionee(&self, temporary_id: NodeId) -> Option<DeviceHandle> {
        self.pool.find(temporary_id)
    }

    /// Number of live commissionee proxies.
    pub fn active_proxies(&self) -> usize {
        self.pool.in_use()
    }

    /// Establish PASE with a device and commission it once the session is up.
    ///
    /// # Errors
    ///
    /// `IncorrectState` if PASE establishment or an attempt is already in
    /// progress, or the device is already paired. `InvalidArgument` if
    /// `params` fail validation. Nothing is allocated or sent on error.
    pub fn pair_device(
        &mut self,
        temporary_id: NodeId,
        address: PeerAddress,
        setup_code: u32,
        params: CommissioningParameters,
    ) -> Result<DeviceHandle, CommissioningError> {
        if self.attempt.is_some() {
            return Err(CommissioningError::IncorrectState("commissioning already in progress"));
        }
        params.validate()?;
        self.start_pase(temporary_id, address, setup_code, Some(params))
    }

    /// Establish PASE with a device without commissioning it.
    ///
    /// # Errors
    ///
    /// `IncorrectState` if PASE establishment is already in progress or the
    /// device is already paired.
    pub fn establish_pase_connection(
        &mut self,
        temporary_id: NodeId,
        address: PeerAddress,
        setup_code: u32,
    ) -> Result<DeviceHandle, CommissioningError> {
        self.start_pase(temporary_id, address, setup_code, None)
    }

    fn start_pase(
        &mut self,
        temporary_id: NodeId,
        address: PeerAddress,
        setup_code: u32,
        commission: Option<CommissioningParameters>,
    ) -> Result<DeviceHandle, CommissioningError> {
        if self.pase.is_some() {
            return Err(CommissioningError::IncorrectState("PASE establishment already in progress"));
        }
        if self.pool.find(temporary_id).is_some() {
            return Err(CommissioningError::IncorrectState("device already paired"));
        }

        let device = self.pool.allocate(temporary_id, address.clone())?;
        if let Err(e) = self.services.sessions.establish_pase(device, temporary_id, &address, setup_code)
        {
            self.pool.release(device);
            return Err(e);
        }

        info!(node_id = %temporary_id, %address, %device, "establishing PASE");
        self.pase = Some(PendingPase { device, temporary_id, commission });
        Ok(device)
    }

    fn on_pase_established(
        &mut self,
        device: DeviceHandle,
        result: Result<PaseSession, CommissioningError>,
    ) {
        let Some(pending) = self.pase.take_if(|p| p.device == device) else {
            debug!(%device, "ignoring PASE result for unknown establishment");
            return;
        };
        let temporary_id = pending.temporary_id;

        let session = match result {
            Ok(session) => session,
            Err(e) => {
                warn!(node_id = %temporary_id, error = %e, "PASE establishment failed");
                self.pool.release(device);
                if let Some(delegate) = self.pairing_delegate.as_mut() {
                    delegate.on_pairing_complete(temporary_id, Some(&e));
                }
                if pending.commission.is_some() {
                    self.send_completion_callbacks(temporary_id, &pairing_failure(e));
                }
                return;
            },
        };

        match self.pool.get_mut(device) {
            Some(proxy) => proxy.pase = Some(session),
            None => {
                error!(%device, "PASE completed for a released commissionee");
                return;
            },
        }
        info!(node_id = %temporary_id, "PASE established");
        if let Some(delegate) = self.pairing_delegate.as_mut() {
            delegate.on_pairing_complete(temporary_id, None);
        }

        if let Some(params) = pending.commission {
            if let Err(e) = self.commission(temporary_id, params) {
                warn!(node_id = %temporary_id, error = %e, "could not start commissioning");
                self.send_completion_callbacks(temporary_id, &pairing_failure(e));
            }
        }
    }

    /// Commission an already paired device.
    ///
    /// Missing nonces are drawn from the environment and a missing fail-safe
    /// duration falls back to the configured default.
    ///
    /// # Errors
    ///
    /// `IncorrectState` if an attempt is already running, the device has no
    /// PASE session, or no commissioning delegate is installed. Errors from
    /// the delegate's parameter validation are returned as-is. Nothing is sent
    /// on error.
    pub fn commission(
        &mut self,
        temporary_id: NodeId,
        mut params: CommissioningParameters,
    ) -> Result<(), CommissioningError> {
        if self.attempt.is_some() {
            return Err(CommissioningError::IncorrectState("commissioning already in progress"));
        }
        let device = self
            .pool
            .find(temporary_id)
            .filter(|d| self.pool.get(*d).is_some_and(CommissioneeDeviceProxy::is_secure))
            .ok_or(CommissioningError::IncorrectState("commissionee has no PASE session"))?;
        self.fabric.require_identity()?;
        let delegate = self
            .commissioning_delegate
            .as_mut()
            .ok_or(CommissioningError::IncorrectState("no commissioning delegate"))?;

        params.validate()?;
        if params.attestation_nonce.is_none() {
            params.attestation_nonce = Some(self.env.random_array());
        }
        if params.csr_nonce.is_none() {
            params.csr_nonce = Some(self.env.random_array());
        }
        params.fail_safe_expiry_seconds.get_or_insert(self.config.fail_safe_expiry_seconds);

        delegate.set_commissioning_parameters(params)?;
        let first = delegate.start_commissioning()?;

        info!(node_id = %temporary_id, %device, "starting commissioning");
        self.attempt = Some(Attempt {
            device,
            temporary_id,
            stage: CommissioningStage::SecurePairing,
            params: first.params.clone(),
            endpoint: first.endpoint,
            timeout: first.timeout,
            completion: CompletionStatus::default(),
            read: None,
            hold: None,
            operational: None,
            session: None,
            existing_node_id: None,
            case_retries_left: self.config.max_case_retries,
        });
        self.run(first);
        Ok(())
    }

    /// Perform one step of the current attempt.
    ///
    /// Normally driven by the commissioning delegate's choices. Exposed so a
    /// custom delegate can inject a step.
    ///
    /// # Errors
    ///
    /// `IncorrectState` if `device` is not being commissioned or stage work
    /// is already outstanding.
    pub fn perform_commissioning_step(
        &mut self,
        device: DeviceHandle,
        step: NextStep,
    ) -> Result<(), CommissioningError> {
        let attempt = self
            .attempt
            .as_ref()
            .ok_or(CommissioningError::IncorrectState("no commissioning attempt"))?;
        if attempt.device != device {
            return Err(CommissioningError::IncorrectState("device is not being commissioned"));
        }
        if self.inflight.has_stage_work() || attempt.hold.is_some() {
            return Err(CommissioningError::IncorrectState("a stage is already in progress"));
        }
        self.run(step);
        Ok(())
    }

    /// Complete the current stage.
    ///
    /// This is the one transition function of the saga: it reports the
    /// finished stage and lets the commissioning delegate choose what runs
    /// next. Stage handlers call it internally; embedders driving a custom
    /// stage may call it too.
    ///
    /// # Errors
    ///
    /// `IncorrectState` when no attempt is running, the attempt is cleaning
    /// up, or the current stage still has a request outstanding. The attempt
    /// is left untouched.
    pub fn commissioning_stage_complete(
        &mut self,
        error: Option<CommissioningError>,
        report: CommissioningReport,
    ) -> Result<(), CommissioningError> {
        let stage = self
            .attempt
            .as_ref()
            .map(|a| a.stage)
            .ok_or(CommissioningError::IncorrectState("no commissioning attempt"))?;
        if stage == CommissioningStage::Cleanup {
            error!("external stage completion during cleanup refused");
            return Err(CommissioningError::IncorrectState("attempt is cleaning up"));
        }
        if self.inflight.has_stage_work() {
            error!(%stage, "external stage completion while a request is outstanding");
            return Err(CommissioningError::IncorrectState("stage has a request outstanding"));
        }
        self.complete_stage(StageResult { error, report });
        Ok(())
    }

    /// Feed a collaborator outcome back into the saga.
    pub fn handle(&mut self, event: CommissionerEvent) {
        match event {
            CommissionerEvent::PaseEstablished { device, result } => {
                self.on_pase_established(device, result);
            },
            CommissionerEvent::CommandResponse { request, result } => {
                self.on_command_response(request, result);
            },
            CommissionerEvent::ReadResponse { request, result } => {
                if self.inflight.read.take_if(|id| *id == request).is_some() {
                    self.on_read_response(result);
                } else {
                    debug!(%request, "ignoring stale read response");
                }
            },
            CommissionerEvent::AttestationVerified { request, result } => {
                if self.inflight.verifier.take_if(|id| *id == request).is_some() {
                    self.on_attestation_verified(result);
                } else {
                    debug!(%request, "ignoring stale attestation result");
                }
            },
            CommissionerEvent::RevocationChecked { request, result } => {
                if self.inflight.verifier.take_if(|id| *id == request).is_some() {
                    self.on_revocation_checked(result);
                } else {
                    debug!(%request, "ignoring stale revocation result");
                }
            },
            CommissionerEvent::NocChainGenerated { request, result } => {
                if self.inflight.issuer.take_if(|id| *id == request).is_some() {
                    self.on_noc_chain_generated(result);
                } else {
                    debug!(%request, "ignoring stale NOC chain");
                }
            },
            CommissionerEvent::CaseEstablished { request, result } => {
                if self.inflight.case.take_if(|id| *id == request).is_some() {
                    self.on_case_established(result);
                } else {
                    debug!(%request, "ignoring stale CASE result");
                }
            },
        }
    }

    fn on_command_response(
        &mut self,
        request: RequestId,
        result: Result<commissioner_proto::CommandResponse, CommissioningError>,
    ) {
        if let Some(kind) = self.inflight.background.remove(&request) {
            match result {
                Ok(_) => debug!(%request, command = ?kind, "background command completed"),
                Err(e) => warn!(%request, command = ?kind, error = %e, "background command failed"),
            }
            return;
        }

        let Some(pending) = self.inflight.invoke.take_if(|p| p.id == request) else {
            debug!(%request, "ignoring stale command response");
            return;
        };
        match pending.purpose {
            InvokePurpose::Stage => {
                let outcome = self.on_stage_response(pending.kind, result);
                self.complete_stage(outcome);
            },
            InvokePurpose::Disarm(cleanup) => {
                if let Err(e) = &result {
                    warn!(error = %e, "fail-safe disarm failed");
                }
                self.finish_cleanup(cleanup.device, cleanup.node_id, cleanup.status);
            },
        }
    }

    /// Supply network credentials while the attempt waits in
    /// `NeedsNetworkCreds`.
    ///
    /// # Errors
    ///
    /// `IncorrectState` unless the attempt is waiting for credentials.
    /// `InvalidArgument` if the credentials are malformed.
    pub fn network_credentials_ready(
        &mut self,
        credentials: NetworkCredentials,
    ) -> Result<(), CommissioningError> {
        self.require_hold(CommissioningStage::NeedsNetworkCreds, Hold::NetworkCredentials)?;
        self.update_parameters(|params| params.apply_network_credentials(credentials))?;
        self.complete_stage(StageResult::ok());
        Ok(())
    }

    /// Supply ICD registration data while the attempt waits in
    /// `IcdGetRegistrationInfo`.
    ///
    /// # Errors
    ///
    /// `IncorrectState` unless the attempt is waiting for registration data.
    pub fn icd_registration_info_ready(
        &mut self,
        info: IcdRegistrationInfo,
    ) -> Result<(), CommissioningError> {
        self.require_hold(CommissioningStage::IcdGetRegistrationInfo, Hold::IcdRegistrationInfo)?;
        self.update_parameters(|params| params.icd_registration = Some(info))?;
        self.complete_stage(StageResult::ok());
        Ok(())
    }

    fn require_hold(
        &self,
        stage: CommissioningStage,
        hold: Hold,
    ) -> Result<(), CommissioningError> {
        match &self.attempt {
            Some(attempt) if attempt.stage == stage && attempt.hold == Some(hold) => Ok(()),
            _ => {
                error!(expected = %stage, current = %self.stage(), "resumption in wrong state");
                Err(CommissioningError::IncorrectState("attempt is not waiting for this input"))
            },
        }
    }

    fn update_parameters(
        &mut self,
        update: impl FnOnce(&mut CommissioningParameters),
    ) -> Result<(), CommissioningError> {
        let delegate = self
            .commissioning_delegate
            .as_mut()
            .ok_or(CommissioningError::IncorrectState("no commissioning delegate"))?;
        let mut params = delegate.commissioning_parameters().clone();
        update(&mut params);
        params.validate()?;
        delegate.set_commissioning_parameters(params)
    }

    /// Drop the fabric identity after abandoning any pairing or attempt.
    pub fn shutdown(&mut self) {
        let pairing = self.pase.as_ref().map(|p| p.temporary_id);
        let commissioning = self.attempt.as_ref().map(|a| a.temporary_id);
        for temporary_id in pairing.into_iter().chain(commissioning) {
            if let Err(e) = self.stop_pairing(temporary_id) {
                warn!(node_id = %temporary_id, error = %e, "could not stop pairing on shutdown");
            }
        }
        if self.fabric.shutdown().is_some() {
            info!("commissioner shut down");
        }
    }

    /// Execute `step` and keep the saga moving until it suspends.
    fn run(&mut self, step: NextStep) {
        if let Step::Complete(result) = self.execute(step) {
            self.complete_stage(result);
        }
    }

    /// Central completion loop.
    fn complete_stage(&mut self, mut result: StageResult) {
        loop {
            let Some(next) = self.transition(result) else {
                return;
            };
            match self.execute(next) {
                Step::Suspended => return,
                Step::Complete(r) => result = r,
            }
        }
    }

    /// Report the finished stage and choose the next one.
    fn transition(&mut self, result: StageResult) -> Option<NextStep> {
        let Some(attempt) = self.attempt.as_mut() else {
            error!("stage completion with no attempt in progress");
            return None;
        };
        let stage = attempt.stage;
        attempt.hold = None;
        if let CommissioningReport::AttestationResult(r) = &result.report {
            attempt.completion.attestation_result = Some(*r);
        }
        let node_id = self.attempt_node_id();

        match &result.error {
            Some(e) => warn!(%stage, node_id = %node_id, error = %e, "stage failed"),
            None => info!(%stage, node_id = %node_id, "stage complete"),
        }
        if let Some(delegate) = self.pairing_delegate.as_mut() {
            delegate.on_commissioning_status_update(node_id, stage, result.error.as_ref());
        }

        let report = StageReport { stage, report: result.report };
        let decided = match self.commissioning_delegate.as_mut() {
            Some(delegate) => delegate.commissioning_step_finished(result.error.as_ref(), &report),
            None => Err(CommissioningError::IncorrectState("no commissioning delegate")),
        };

        if stage == CommissioningStage::Cleanup {
            if let Err(e) = decided {
                debug!(error = %e, "delegate rejected cleanup report");
            }
            self.attempt = None;
            return None;
        }

        let attempt = self.attempt.as_mut()?;
        match decided {
            Ok(next) => {
                if next.stage == CommissioningStage::Cleanup {
                    if let Some(e) = result.error {
                        record_failure(&mut attempt.completion, e, stage);
                    }
                }
                Some(next)
            },
            Err(e) => {
                error!(%stage, error = %e, "commissioning delegate failed to advance");
                record_failure(&mut attempt.completion, result.error.unwrap_or(e), stage);
                Some(NextStep {
                    stage: CommissioningStage::Cleanup,
                    params: attempt.params.clone(),
                    endpoint: 0,
                    timeout: None,
                })
            },
        }
    }

    /// Enter `step` and perform its unit of work.
    fn execute(&mut self, step: NextStep) -> Step {
        let Some(attempt) = self.attempt.as_mut() else {
            return Step::Suspended;
        };
        attempt.stage = step.stage;
        attempt.params = step.params;
        attempt.endpoint = step.endpoint;
        attempt.timeout = step.timeout;
        debug!(stage = %step.stage, device = %attempt.device, "performing commissioning step");
        self.dispatch()
    }

    /// Node id used in notifications: operational once known.
    fn attempt_node_id(&self) -> NodeId {
        let Some(attempt) = &self.attempt else {
            return NodeId::UNDEFINED;
        };
        self.pool
            .get(attempt.device)
            .and_then(|p| p.operational_node_id)
            .or(attempt.existing_node_id)
            .unwrap_or(attempt.temporary_id)
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        id
    }

    /// Per-call timeout for the current stage.
    fn stage_timeout(&self) -> Duration {
        self.attempt.as_ref().and_then(|a| a.timeout).unwrap_or(self.config.command_timeout)
    }

    /// Issue a single-flight invoke.
    fn send_invoke(
        &mut self,
        target: Target,
        endpoint: EndpointId,
        command: Command,
        timeout: Duration,
        purpose: InvokePurpose,
    ) -> Result<RequestId, CommissioningError> {
        if self.inflight.invoke.is_some() {
            return Err(CommissioningError::IncorrectState("an invoke is already outstanding"));
        }
        let id = self.next_request_id();
        let kind = command.kind();
        debug!(request = %id, command = ?kind, endpoint, "invoke");
        self.services.interaction.invoke(id, target, endpoint, command, timeout)?;
        self.inflight.invoke = Some(PendingInvoke { id, kind, purpose });
        Ok(id)
    }

    /// Issue a fire-and-forget invoke. Does not consume the invoke slot.
    fn send_background_invoke(
        &mut self,
        target: Target,
        endpoint: EndpointId,
        command: Command,
    ) -> Result<RequestId, CommissioningError> {
        let id = self.next_request_id();
        let kind = command.kind();
        debug!(request = %id, command = ?kind, "background invoke");
        self.services.interaction.invoke(id, target, endpoint, command, self.config.command_timeout)?;
        self.inflight.background.insert(id, kind);
        Ok(id)
    }

    /// Cancel every outstanding single-flight request.
    fn cancel_outstanding(&mut self) {
        if let Some(pending) = self.inflight.invoke.take() {
            self.services.interaction.cancel(pending.id);
        }
        if let Some(id) = self.inflight.read.take() {
            self.services.interaction.cancel(id);
        }
        if let Some(id) = self.inflight.case.take() {
            self.services.sessions.cancel_case(id);
        }
        if let Some(id) = self.inflight.issuer.take() {
            self.services.issuer.cancel(id);
        }
        if let Some(id) = self.inflight.verifier.take() {
            self.services.attestation.cancel(id);
        }
    }
}

fn record_failure(
    completion: &mut CompletionStatus,
    error: CommissioningError,
    stage: CommissioningStage,
) {
    if completion.error.is_none() {
        completion.error = Some(error);
        completion.failed_stage = Some(stage);
    }
}

fn pairing_failure(error: CommissioningError) -> CompletionStatus {
    CompletionStatus {
        error: Some(error),
        failed_stage: Some(CommissioningStage::SecurePairing),
        attestation_result: None,
    }
}
