//! World state for scenario execution.
//!
//! The world owns the commissioner under test, the simulated devices and the
//! request bus. [`World::step`] answers one queued request and feeds the
//! outcome back, advancing virtual time by the configured latency.

use std::{
    cell::Ref,
    rc::Rc,
    time::Duration,
};

use commissioner_core::{
    Commissioner, CommissionerConfig, CommissionerEvent, CommissioningError,
    CommissioningParameters, DeviceHandle, Environment, PeerAddress,
    device::PaseSession,
    fabric::{FabricTable, NocMaterial},
    params::NocChain,
    services::{AttestationInfo, AttestationVerificationResult, NocChainRequest, SessionHandle, Target},
};
use commissioner_proto::{
    AttestationElements, Command, FabricId, FabricIndex, NodeId, PeerId, VendorId,
    elements::signed_message,
};
use ed25519_dalek::{Signature, SigningKey, Verifier, VerifyingKey};
use tracing::{debug, trace};

use crate::{
    bus::{Bus, Outbound, SharedBus, decode_dac, encode_noc},
    device::{ExistingFabric, SimDevice},
    faults::{Fault, FaultPlan},
    recorder::{DelegateEvent, EventLog, RecordingPairingDelegate},
    sim_env::SimEnv,
};

/// Fabric administered by the simulated commissioner.
pub const FABRIC_ID: FabricId = FabricId(0x2906_C908_D115_D362);

/// Commissioner's own node id.
pub const COMMISSIONER_NODE_ID: NodeId = NodeId(0x0001_B669);

/// First node id handed out by the simulated issuer.
const FIRST_ISSUED_NODE_ID: u64 = 0x0000_0001_0000_0000;

/// Upper bound on steps in [`World::run_until_idle`].
const MAX_STEPS: usize = 10_000;

/// In-memory fabric table with immediate commits.
#[derive(Default)]
struct MemoryFabricTable {
    next_index: u8,
}

impl FabricTable for MemoryFabricTable {
    fn add_noc(&mut self, _material: &NocMaterial) -> Result<FabricIndex, CommissioningError> {
        self.next_index += 1;
        Ok(FabricIndex(self.next_index))
    }

    fn update_noc(
        &mut self,
        _index: FabricIndex,
        _noc: &[u8],
        _icac: Option<&[u8]>,
    ) -> Result<(), CommissioningError> {
        Ok(())
    }

    fn commit_pending(&mut self) -> Result<(), CommissioningError> {
        Ok(())
    }

    fn revert_pending(&mut self) {}

    fn delete(&mut self, _index: FabricIndex) -> Result<(), CommissioningError> {
        Ok(())
    }
}

/// Check a device attestation the way a verifier would: DAC signature over
/// `elements || challenge`, then the echoed nonce.
fn verify_attestation(info: &AttestationInfo) -> AttestationVerificationResult {
    use AttestationVerificationResult as R;

    let Some(key) = decode_dac(&info.dac).and_then(|k| VerifyingKey::from_bytes(&k).ok()) else {
        return R::PaaNotFound;
    };
    let Ok(signature) = Signature::from_slice(&info.attestation_signature) else {
        return R::AttestationSignatureInvalid;
    };
    let message = signed_message(&info.attestation_elements, &info.attestation_challenge);
    if key.verify(&message, &signature).is_err() {
        return R::AttestationSignatureInvalid;
    }
    match AttestationElements::from_cbor(&info.attestation_elements) {
        Ok(elements) if elements.attestation_nonce == info.attestation_nonce => R::Success,
        Ok(_) => R::AttestationNonceMismatch,
        Err(_) => R::CertificationDeclarationInvalid,
    }
}

/// World state containing the commissioner, devices and bus.
pub struct World {
    commissioner: Commissioner<SimEnv>,
    env: SimEnv,
    bus: SharedBus,
    log: EventLog,
    devices: Vec<SimDevice>,
    root_public_key: Vec<u8>,
    next_node_id: u64,
    next_session: u64,
    steps: usize,
}

impl World {
    /// Create a world with an initialized commissioner fabric identity.
    pub fn new(
        seed: u64,
        config: CommissionerConfig,
        faults: FaultPlan,
    ) -> Result<Self, CommissioningError> {
        let env = SimEnv::with_seed(seed);
        let bus = Bus::shared(faults);
        let mut commissioner = Commissioner::new(
            env.clone(),
            config,
            Box::new(MemoryFabricTable::default()),
            Bus::services(&bus),
        )?;

        let root_public_key =
            SigningKey::generate(&mut env.fork_rng()).verifying_key().to_bytes().to_vec();
        let mut rcac = b"SIMRCAC".to_vec();
        rcac.extend_from_slice(&root_public_key);
        commissioner.fabric_mut().init(&NocMaterial {
            rcac,
            icac: None,
            noc: encode_noc(COMMISSIONER_NODE_ID, FABRIC_ID),
            root_public_key: root_public_key.clone(),
            fabric_id: FABRIC_ID,
            node_id: COMMISSIONER_NODE_ID,
            vendor_id: VendorId(0xFFF1),
        })?;

        let log = EventLog::default();
        commissioner.set_pairing_delegate(Some(Box::new(RecordingPairingDelegate::new(log.clone()))));

        Ok(Self {
            commissioner,
            env,
            bus,
            log,
            devices: Vec::new(),
            root_public_key,
            next_node_id: FIRST_ISSUED_NODE_ID,
            next_session: 1,
            steps: 0,
        })
    }

    /// Add a device to the world.
    pub fn add_device(&mut self, device: SimDevice) {
        self.devices.push(device);
    }

    /// Device with this temporary id.
    pub fn device(&self, temporary_id: NodeId) -> Option<&SimDevice> {
        self.devices.iter().find(|d| d.temporary_id() == temporary_id)
    }

    /// Every device.
    pub fn devices(&self) -> &[SimDevice] {
        &self.devices
    }

    /// Commissioner under test.
    pub fn commissioner(&self) -> &Commissioner<SimEnv> {
        &self.commissioner
    }

    /// Mutable commissioner under test.
    pub fn commissioner_mut(&mut self) -> &mut Commissioner<SimEnv> {
        &mut self.commissioner
    }

    /// Simulated environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Request bus.
    pub fn bus(&self) -> Ref<'_, Bus> {
        self.bus.borrow()
    }

    /// Shared event log, for installing further recording delegates.
    pub fn log(&self) -> EventLog {
        Rc::clone(&self.log)
    }

    /// Snapshot of the delegate events so far.
    pub fn events(&self) -> Vec<DelegateEvent> {
        self.log.borrow().clone()
    }

    /// Steps taken so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Fabric entry a device would hold if already on our fabric.
    pub fn our_fabric(&self, node_id: NodeId, fabric_index: FabricIndex) -> ExistingFabric {
        ExistingFabric {
            root_public_key: self.root_public_key.clone(),
            fabric_id: FABRIC_ID,
            node_id,
            fabric_index,
        }
    }

    /// Start pairing and commissioning a device by temporary id.
    pub fn pair(
        &mut self,
        temporary_id: NodeId,
        params: CommissioningParameters,
    ) -> Result<DeviceHandle, CommissioningError> {
        let setup_code = self
            .device(temporary_id)
            .map(SimDevice::setup_code)
            .ok_or(CommissioningError::InvalidArgument("no such simulated device"))?;
        let address = PeerAddress::Ble { discriminator: 0xF00 };
        self.commissioner.pair_device(temporary_id, address, setup_code, params)
    }

    /// Move virtual time forward, letting device fail-safes lapse.
    pub fn advance(&mut self, by: Duration) {
        self.env.advance(by);
        let now = self.env.now();
        for device in &mut self.devices {
            device.tick(now);
        }
    }

    /// Answer one queued request. Returns whether there was one.
    pub fn step(&mut self) -> bool {
        let Some(outbound) = self.bus.borrow_mut().pop() else {
            return false;
        };
        self.steps += 1;
        trace!(?outbound, "answering");

        let event = self.respond(&outbound);
        self.bus.borrow_mut().settle(&outbound);
        if let Some(event) = event {
            self.commissioner.handle(event);
        }
        true
    }

    /// Answer requests until the bus is empty. Returns the steps taken.
    pub fn run_until_idle(&mut self) -> usize {
        let mut taken = 0;
        while taken < MAX_STEPS && self.step() {
            taken += 1;
        }
        taken
    }

    fn latency(&self) -> Duration {
        self.bus.borrow().faults().response_latency()
    }

    fn device_for(&mut self, target: Target) -> Option<&mut SimDevice> {
        self.devices.iter_mut().find(|d| match target {
            Target::Commissionee(id) => d.temporary_id() == id,
            Target::Operational { peer, .. } => d.operational_id() == Some(peer.node_id),
        })
    }

    fn respond(&mut self, outbound: &Outbound) -> Option<CommissionerEvent> {
        match outbound.clone() {
            Outbound::Pase { device, temporary_id, setup_code } => {
                self.advance(self.latency());
                let result = self.respond_pase(temporary_id, setup_code);
                Some(CommissionerEvent::PaseEstablished { device, result })
            },
            Outbound::Invoke { request, target, command, timeout, .. } => {
                self.respond_invoke(target, command, timeout)
                    .map(|result| CommissionerEvent::CommandResponse { request, result })
            },
            Outbound::Read { request, target, paths } => {
                self.advance(self.latency());
                let failure = self.bus.borrow().faults().read_failure();
                let now = self.env.now();
                let result = match (failure, self.device_for(target)) {
                    (Some(e), _) => Err(e),
                    (None, Some(device)) => Ok(device.read(now, &paths)),
                    (None, None) => Err(CommissioningError::Transport("device unreachable".into())),
                };
                Some(CommissionerEvent::ReadResponse { request, result })
            },
            Outbound::Verify { request, info } => {
                self.advance(self.latency());
                let forced = self.bus.borrow().faults().attestation_override();
                let result = forced.unwrap_or_else(|| verify_attestation(&info));
                Some(CommissionerEvent::AttestationVerified { request, result })
            },
            Outbound::Revocation { request, .. } => {
                self.advance(self.latency());
                let forced = self.bus.borrow().faults().revocation_override();
                let result = forced.unwrap_or(AttestationVerificationResult::Success);
                Some(CommissionerEvent::RevocationChecked { request, result })
            },
            Outbound::Issue { request, input } => {
                self.advance(self.latency());
                let result = self.issue(input);
                Some(CommissionerEvent::NocChainGenerated { request, result })
            },
            Outbound::Case { request, peer } => {
                self.advance(self.latency());
                let result = self.respond_case(peer);
                Some(CommissionerEvent::CaseEstablished { request, result })
            },
        }
    }

    fn respond_pase(
        &mut self,
        temporary_id: NodeId,
        setup_code: u32,
    ) -> Result<PaseSession, CommissioningError> {
        if let Some(e) = self.bus.borrow().faults().pase_failure() {
            return Err(e);
        }
        let challenge = self.env.random_array();
        let session_id = u16::try_from(self.next_session % u64::from(u16::MAX)).unwrap_or(1);
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.temporary_id() == temporary_id && d.setup_code() == setup_code)
            .ok_or_else(|| CommissioningError::SessionEstablishment("no device answered".into()))?;
        device.establish_pase(challenge);
        self.next_session += 1;
        Ok(PaseSession { attestation_challenge: challenge, session_id })
    }

    fn respond_invoke(
        &mut self,
        target: Target,
        command: Command,
        timeout: Duration,
    ) -> Option<Result<commissioner_proto::CommandResponse, CommissioningError>> {
        let fault = self.bus.borrow_mut().faults_mut().take_command_fault(command.kind());
        match fault {
            Some(Fault::Drop) => {
                debug!(command = ?command.kind(), "dropping request");
                None
            },
            Some(Fault::Timeout) => {
                self.advance(timeout);
                Some(Err(CommissioningError::Timeout))
            },
            Some(Fault::Status(status)) => {
                self.advance(self.latency());
                Some(Err(CommissioningError::Status(status)))
            },
            Some(Fault::Respond(response)) => {
                self.advance(self.latency());
                Some(Ok(response))
            },
            None => {
                self.advance(self.latency());
                let now = self.env.now();
                Some(match self.device_for(target) {
                    Some(device) => device.handle_command(now, command),
                    None => Err(CommissioningError::Transport("device unreachable".into())),
                })
            },
        }
    }

    fn issue(&mut self, input: NocChainRequest) -> Result<NocChain, CommissioningError> {
        if let Some(e) = self.bus.borrow().faults().issuer_failure() {
            return Err(e);
        }
        let node_id = input.node_id.unwrap_or_else(|| {
            let id = NodeId(self.next_node_id);
            self.next_node_id += 1;
            id
        });
        let mut rcac = b"SIMRCAC".to_vec();
        rcac.extend_from_slice(&self.root_public_key);
        Ok(NocChain {
            noc: encode_noc(node_id, FABRIC_ID),
            icac: None,
            rcac,
            ipk: [0x11; 16],
            admin_subject: COMMISSIONER_NODE_ID.0,
        })
    }

    fn respond_case(&mut self, peer: PeerId) -> Result<SessionHandle, CommissioningError> {
        if self.bus.borrow_mut().faults_mut().take_case_failure() {
            return Err(CommissioningError::SessionEstablishment("CASE handshake failed".into()));
        }
        let reachable = self
            .devices
            .iter()
            .any(|d| d.operational_id() == Some(peer.node_id) && d.reachable_operationally());
        if !reachable {
            return Err(CommissioningError::SessionEstablishment(format!("{peer} not found")));
        }
        let session = SessionHandle(self.next_session);
        self.next_session += 1;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn tampered_attestation_is_rejected() {
        let mut device = SimDevice::new(NodeId(1), 1, &mut ChaCha8Rng::seed_from_u64(1));
        device.establish_pase([4; 16]);
        let now = std::time::Instant::now();
        let commissioner_proto::CommandResponse::Attestation {
            attestation_elements,
            attestation_signature,
        } = device
            .handle_command(now, Command::AttestationRequest { attestation_nonce: [9; 32] })
            .unwrap()
        else {
            panic!("expected attestation response");
        };

        let mut info = AttestationInfo {
            attestation_elements,
            attestation_signature,
            attestation_challenge: [4; 16],
            attestation_nonce: [9; 32],
            pai: device.pai(),
            dac: device.dac(),
            remote_vendor_id: None,
            remote_product_id: None,
        };
        assert_eq!(verify_attestation(&info), AttestationVerificationResult::Success);

        info.attestation_nonce = [8; 32];
        assert_eq!(verify_attestation(&info), AttestationVerificationResult::AttestationNonceMismatch);

        info.attestation_challenge = [5; 16];
        assert_eq!(
            verify_attestation(&info),
            AttestationVerificationResult::AttestationSignatureInvalid
        );
    }

    #[test]
    fn world_initializes_fabric_identity() {
        let world = World::new(1, CommissionerConfig::default(), FaultPlan::new()).unwrap();
        let identity = world.commissioner().fabric().identity().unwrap();
        assert_eq!(identity.fabric_id, FABRIC_ID);
        assert_eq!(identity.node_id, COMMISSIONER_NODE_ID);
    }
}
