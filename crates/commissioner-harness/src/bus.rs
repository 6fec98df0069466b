//! Simulated collaborators.
//!
//! Each collaborator accepts a request by queueing an [`Outbound`] on the
//! shared [`Bus`] and returning at once. Nothing is answered here; the
//! [`World`](crate::World) drains the queue and feeds outcomes back to the
//! commissioner. Cancellation marks a request so the world drops it instead
//! of answering.

use std::{
    cell::RefCell,
    collections::{HashSet, VecDeque},
    rc::Rc,
    time::Duration,
};

use commissioner_core::{
    CommissioningError, DeviceHandle, PeerAddress,
    services::{
        AttestationInfo, AttestationVerifier, InteractionClient, NocChainRequest,
        OperationalCredentialsIssuer, RequestId, SessionEstablisher, Services, Target,
    },
};
use commissioner_proto::{AttributePath, Command, CommandKind, EndpointId, FabricId, NodeId, PeerId};

use crate::faults::FaultPlan;

/// Shared handle to the bus. Clones observe the same queue.
pub type SharedBus = Rc<RefCell<Bus>>;

const NOC_MAGIC: &[u8] = b"NOC";
const DAC_MAGIC: &[u8] = b"SIMDAC";

/// Simulated NOC: magic, node id and fabric id, both big-endian.
pub fn encode_noc(node_id: NodeId, fabric_id: FabricId) -> Vec<u8> {
    let mut noc = NOC_MAGIC.to_vec();
    noc.extend_from_slice(&node_id.0.to_be_bytes());
    noc.extend_from_slice(&fabric_id.0.to_be_bytes());
    noc
}

/// Inverse of [`encode_noc`].
pub fn decode_noc(noc: &[u8]) -> Option<(NodeId, FabricId)> {
    let body = noc.strip_prefix(NOC_MAGIC)?;
    let node: [u8; 8] = body.get(..8)?.try_into().ok()?;
    let fabric: [u8; 8] = body.get(8..16)?.try_into().ok()?;
    Some((NodeId(u64::from_be_bytes(node)), FabricId(u64::from_be_bytes(fabric))))
}

/// Simulated DAC: magic followed by the Ed25519 public key.
pub fn encode_dac(public_key: &[u8; 32]) -> Vec<u8> {
    let mut dac = DAC_MAGIC.to_vec();
    dac.extend_from_slice(public_key);
    dac
}

/// Inverse of [`encode_dac`].
pub fn decode_dac(dac: &[u8]) -> Option<[u8; 32]> {
    dac.strip_prefix(DAC_MAGIC)?.try_into().ok()
}

/// A request accepted by a simulated collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// PASE establishment
    Pase {
        /// Proxy handle
        device: DeviceHandle,
        /// Temporary id
        temporary_id: NodeId,
        /// Setup code offered
        setup_code: u32,
    },
    /// Command invoke
    Invoke {
        /// Request
        request: RequestId,
        /// Destination
        target: Target,
        /// Endpoint
        endpoint: EndpointId,
        /// Command
        command: Command,
        /// Per-call timeout
        timeout: Duration,
    },
    /// Attribute read
    Read {
        /// Request
        request: RequestId,
        /// Destination
        target: Target,
        /// Paths in this exchange
        paths: Vec<AttributePath>,
    },
    /// Attestation verification
    Verify {
        /// Request
        request: RequestId,
        /// Inputs
        info: AttestationInfo,
    },
    /// Revocation check
    Revocation {
        /// Request
        request: RequestId,
        /// Inputs
        info: AttestationInfo,
    },
    /// NOC chain generation
    Issue {
        /// Request
        request: RequestId,
        /// Inputs
        input: NocChainRequest,
    },
    /// CASE establishment
    Case {
        /// Request
        request: RequestId,
        /// Operational peer
        peer: PeerId,
    },
}

impl Outbound {
    /// Request id, for everything but PASE.
    pub fn request(&self) -> Option<RequestId> {
        match self {
            Self::Pase { .. } => None,
            Self::Invoke { request, .. }
            | Self::Read { request, .. }
            | Self::Verify { request, .. }
            | Self::Revocation { request, .. }
            | Self::Issue { request, .. }
            | Self::Case { request, .. } => Some(*request),
        }
    }

    /// Command kind, for invokes.
    pub fn command_kind(&self) -> Option<CommandKind> {
        match self {
            Self::Invoke { command, .. } => Some(command.kind()),
            _ => None,
        }
    }
}

/// Request queue shared by the simulated collaborators.
#[derive(Debug, Default)]
pub struct Bus {
    outbox: VecDeque<Outbound>,
    sent: Vec<Outbound>,
    cancelled: HashSet<RequestId>,
    cancelled_pase: HashSet<DeviceHandle>,
    closed_pase: Vec<DeviceHandle>,
    evicted: Vec<PeerId>,
    /// Requests accepted and not yet answered, dropped or cancelled
    open: Vec<Outbound>,
    max_open_invokes: usize,
    max_open_reads: usize,
    faults: FaultPlan,
}

impl Bus {
    /// Empty bus injecting `faults`.
    pub fn shared(faults: FaultPlan) -> SharedBus {
        Rc::new(RefCell::new(Self { faults, ..Default::default() }))
    }

    /// Collaborator bundle backed by `bus`.
    pub fn services(bus: &SharedBus) -> Services {
        Services {
            interaction: Box::new(SimInteraction(bus.clone())),
            sessions: Box::new(SimSessions(bus.clone())),
            issuer: Box::new(SimIssuer(bus.clone())),
            attestation: Box::new(SimVerifier(bus.clone())),
        }
    }

    fn accept(&mut self, outbound: Outbound) {
        self.sent.push(outbound.clone());
        self.open.push(outbound.clone());
        self.outbox.push_back(outbound);

        let open_invokes = self
            .open
            .iter()
            .filter(|o| o.command_kind().is_some_and(|k| k != CommandKind::ArmFailSafe))
            .count();
        let open_reads = self.open.iter().filter(|o| matches!(o, Outbound::Read { .. })).count();
        self.max_open_invokes = self.max_open_invokes.max(open_invokes);
        self.max_open_reads = self.max_open_reads.max(open_reads);
    }

    fn cancel(&mut self, request: RequestId) {
        self.cancelled.insert(request);
        self.open.retain(|o| o.request() != Some(request));
    }

    /// Next request to answer, skipping cancelled ones.
    pub fn pop(&mut self) -> Option<Outbound> {
        loop {
            let outbound = self.outbox.pop_front()?;
            let cancelled = match &outbound {
                Outbound::Pase { device, .. } => self.cancelled_pase.contains(device),
                other => other.request().is_some_and(|r| self.cancelled.contains(&r)),
            };
            if !cancelled {
                return Some(outbound);
            }
        }
    }

    /// The answer to `outbound` was delivered, or the request was lost.
    pub fn settle(&mut self, outbound: &Outbound) {
        self.open.retain(|o| o != outbound);
    }

    /// Requests waiting to be answered.
    pub fn pending(&self) -> usize {
        self.outbox.len()
    }

    /// Every request ever accepted, in order.
    pub fn sent(&self) -> &[Outbound] {
        &self.sent
    }

    /// Commands accepted so far, in order.
    pub fn commands(&self) -> Vec<CommandKind> {
        self.sent.iter().filter_map(Outbound::command_kind).collect()
    }

    /// Read requests accepted so far.
    pub fn reads(&self) -> Vec<&[AttributePath]> {
        self.sent
            .iter()
            .filter_map(|o| match o {
                Outbound::Read { paths, .. } => Some(paths.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Whether `request` was cancelled.
    pub fn was_cancelled(&self, request: RequestId) -> bool {
        self.cancelled.contains(&request)
    }

    /// PASE sessions torn down, in order.
    pub fn closed_pase(&self) -> &[DeviceHandle] {
        &self.closed_pase
    }

    /// Peers whose CASE sessions were evicted.
    pub fn evicted(&self) -> &[PeerId] {
        &self.evicted
    }

    /// Most non-fail-safe invokes ever outstanding at once.
    pub fn max_open_invokes(&self) -> usize {
        self.max_open_invokes
    }

    /// Most reads ever outstanding at once.
    pub fn max_open_reads(&self) -> usize {
        self.max_open_reads
    }

    /// Fault plan.
    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    /// Mutable fault plan.
    pub fn faults_mut(&mut self) -> &mut FaultPlan {
        &mut self.faults
    }
}

struct SimInteraction(SharedBus);

impl InteractionClient for SimInteraction {
    fn invoke(
        &mut self,
        request: RequestId,
        target: Target,
        endpoint: EndpointId,
        command: Command,
        timeout: Duration,
    ) -> Result<(), CommissioningError> {
        let mut bus = self.0.borrow_mut();
        if bus.faults.rejects_send(command.kind()) {
            return Err(CommissioningError::Transport(format!("{:?} not sent", command.kind())));
        }
        bus.accept(Outbound::Invoke { request, target, endpoint, command, timeout });
        Ok(())
    }

    fn read(
        &mut self,
        request: RequestId,
        target: Target,
        paths: &[AttributePath],
        _timeout: Duration,
    ) -> Result<(), CommissioningError> {
        self.0.borrow_mut().accept(Outbound::Read { request, target, paths: paths.to_vec() });
        Ok(())
    }

    fn cancel(&mut self, request: RequestId) {
        self.0.borrow_mut().cancel(request);
    }
}

struct SimSessions(SharedBus);

impl SessionEstablisher for SimSessions {
    fn establish_pase(
        &mut self,
        device: DeviceHandle,
        temporary_id: NodeId,
        _address: &PeerAddress,
        setup_code: u32,
    ) -> Result<(), CommissioningError> {
        self.0.borrow_mut().accept(Outbound::Pase { device, temporary_id, setup_code });
        Ok(())
    }

    fn cancel_pase(&mut self, device: DeviceHandle) {
        let mut bus = self.0.borrow_mut();
        bus.cancelled_pase.insert(device);
        bus.open.retain(|o| !matches!(o, Outbound::Pase { device: d, .. } if *d == device));
    }

    fn close_pase(&mut self, device: DeviceHandle) {
        self.0.borrow_mut().closed_pase.push(device);
    }

    fn evict_case_sessions(&mut self, peer: PeerId) {
        self.0.borrow_mut().evicted.push(peer);
    }

    fn establish_case(&mut self, request: RequestId, peer: PeerId) -> Result<(), CommissioningError> {
        self.0.borrow_mut().accept(Outbound::Case { request, peer });
        Ok(())
    }

    fn cancel_case(&mut self, request: RequestId) {
        self.0.borrow_mut().cancel(request);
    }
}

struct SimIssuer(SharedBus);

impl OperationalCredentialsIssuer for SimIssuer {
    fn generate_noc_chain(
        &mut self,
        request: RequestId,
        input: NocChainRequest,
    ) -> Result<(), CommissioningError> {
        self.0.borrow_mut().accept(Outbound::Issue { request, input });
        Ok(())
    }

    fn operational_identity(&self, noc: &[u8]) -> Result<(NodeId, FabricId), CommissioningError> {
        decode_noc(noc).ok_or(CommissioningError::InvalidArgument("unrecognized NOC"))
    }

    fn cancel(&mut self, request: RequestId) {
        self.0.borrow_mut().cancel(request);
    }
}

struct SimVerifier(SharedBus);

impl AttestationVerifier for SimVerifier {
    fn verify(&mut self, request: RequestId, info: AttestationInfo) -> Result<(), CommissioningError> {
        self.0.borrow_mut().accept(Outbound::Verify { request, info });
        Ok(())
    }

    fn check_revocation(
        &mut self,
        request: RequestId,
        info: AttestationInfo,
    ) -> Result<(), CommissioningError> {
        self.0.borrow_mut().accept(Outbound::Revocation { request, info });
        Ok(())
    }

    fn dac_public_key(&self, dac: &[u8]) -> Result<[u8; 32], CommissioningError> {
        decode_dac(dac).ok_or(CommissioningError::InvalidArgument("unrecognized DAC"))
    }

    fn cancel(&mut self, request: RequestId) {
        self.0.borrow_mut().cancel(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noc_and_dac_encodings_invert() {
        let noc = encode_noc(NodeId(0x1234), FabricId(0xFAB));
        assert_eq!(decode_noc(&noc), Some((NodeId(0x1234), FabricId(0xFAB))));
        assert_eq!(decode_noc(b"NOC"), None);

        let dac = encode_dac(&[7; 32]);
        assert_eq!(decode_dac(&dac), Some([7; 32]));
        assert_eq!(decode_dac(&dac[1..]), None);
    }

    #[test]
    fn cancelled_requests_are_skipped() {
        let bus = Bus::shared(FaultPlan::new());
        let mut services = Bus::services(&bus);
        let target = Target::Commissionee(NodeId(1));
        let disarm = Command::ArmFailSafe { expiry_length_seconds: 0, breadcrumb: 0 };
        let timeout = Duration::from_secs(1);

        services.interaction.invoke(RequestId(1), target, 0, disarm.clone(), timeout).unwrap();
        services.interaction.invoke(RequestId(2), target, 0, disarm, timeout).unwrap();
        services.interaction.cancel(RequestId(1));

        let next = bus.borrow_mut().pop().unwrap();
        assert_eq!(next.request(), Some(RequestId(2)));
        assert!(bus.borrow().was_cancelled(RequestId(1)));
        assert_eq!(bus.borrow().pending(), 0);
    }

    #[test]
    fn rejected_send_is_not_queued() {
        let bus = Bus::shared(FaultPlan::new().reject_send(CommandKind::CommissioningComplete));
        let mut services = Bus::services(&bus);
        let result = services.interaction.invoke(
            RequestId(1),
            Target::Commissionee(NodeId(1)),
            0,
            Command::CommissioningComplete,
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(CommissioningError::Transport(_))));
        assert!(bus.borrow().sent().is_empty());
    }
}
