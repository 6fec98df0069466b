//! Fault injection.
//!
//! A [`FaultPlan`] decides, per request, whether the simulated world answers
//! normally. Command faults are consumed as they fire, so "fail the first
//! two `ConnectNetwork`s" is a plan entry with a count of two.

use std::time::Duration;

use commissioner_core::{CommissioningError, services::AttestationVerificationResult};
use commissioner_proto::{CommandKind, CommandResponse, ImStatus};

/// How a faulted command is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The exchange times out
    Timeout,
    /// The device refuses the command
    Status(ImStatus),
    /// The device answers with this response instead
    Respond(CommandResponse),
    /// The request is lost; no response ever arrives
    Drop,
}

#[derive(Debug, Clone)]
struct CommandFault {
    kind: CommandKind,
    fault: Fault,
    remaining: u32,
}

/// Faults to inject into one simulated run.
#[derive(Debug, Clone)]
pub struct FaultPlan {
    commands: Vec<CommandFault>,
    rejected_sends: Vec<CommandKind>,
    pase: Option<CommissioningError>,
    read: Option<CommissioningError>,
    attestation: Option<AttestationVerificationResult>,
    revocation: Option<AttestationVerificationResult>,
    issuer: Option<CommissioningError>,
    case_failures: u32,
    latency: Duration,
}

impl Default for FaultPlan {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            rejected_sends: Vec::new(),
            pase: None,
            read: None,
            attestation: None,
            revocation: None,
            issuer: None,
            case_failures: 0,
            latency: Duration::from_millis(100),
        }
    }
}

impl FaultPlan {
    /// No faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fault the next `kind` command.
    pub fn fail_command(self, kind: CommandKind, fault: Fault) -> Self {
        self.fail_command_times(kind, fault, 1)
    }

    /// Fault the next `times` commands of `kind`.
    pub fn fail_command_times(mut self, kind: CommandKind, fault: Fault, times: u32) -> Self {
        self.commands.push(CommandFault { kind, fault, remaining: times });
        self
    }

    /// Make every send of `kind` fail synchronously.
    pub fn reject_send(mut self, kind: CommandKind) -> Self {
        self.rejected_sends.push(kind);
        self
    }

    /// Fail PASE establishment.
    pub fn fail_pase(mut self, error: CommissioningError) -> Self {
        self.pase = Some(error);
        self
    }

    /// Fail every attribute read.
    pub fn fail_read(mut self, error: CommissioningError) -> Self {
        self.read = Some(error);
        self
    }

    /// Force the attestation verifier's verdict.
    pub fn attestation(mut self, result: AttestationVerificationResult) -> Self {
        self.attestation = Some(result);
        self
    }

    /// Force the revocation check's verdict.
    pub fn revocation(mut self, result: AttestationVerificationResult) -> Self {
        self.revocation = Some(result);
        self
    }

    /// Fail NOC chain generation.
    pub fn fail_issuer(mut self, error: CommissioningError) -> Self {
        self.issuer = Some(error);
        self
    }

    /// Fail the first `times` CASE establishments.
    pub fn fail_case(mut self, times: u32) -> Self {
        self.case_failures = times;
        self
    }

    /// Virtual time consumed by each delivered response.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Consume the fault planned for the next `kind` command, if any.
    pub fn take_command_fault(&mut self, kind: CommandKind) -> Option<Fault> {
        let entry = self.commands.iter_mut().find(|f| f.kind == kind && f.remaining > 0)?;
        entry.remaining -= 1;
        Some(entry.fault.clone())
    }

    /// Whether sends of `kind` fail synchronously.
    pub fn rejects_send(&self, kind: CommandKind) -> bool {
        self.rejected_sends.contains(&kind)
    }

    /// Planned PASE failure.
    pub fn pase_failure(&self) -> Option<CommissioningError> {
        self.pase.clone()
    }

    /// Planned read failure.
    pub fn read_failure(&self) -> Option<CommissioningError> {
        self.read.clone()
    }

    /// Forced attestation verdict.
    pub fn attestation_override(&self) -> Option<AttestationVerificationResult> {
        self.attestation
    }

    /// Forced revocation verdict.
    pub fn revocation_override(&self) -> Option<AttestationVerificationResult> {
        self.revocation
    }

    /// Planned issuer failure.
    pub fn issuer_failure(&self) -> Option<CommissioningError> {
        self.issuer.clone()
    }

    /// Consume one planned CASE failure. Returns whether this attempt fails.
    pub fn take_case_failure(&mut self) -> bool {
        if self.case_failures == 0 {
            return false;
        }
        self.case_failures -= 1;
        true
    }

    /// Per-response latency.
    pub fn response_latency(&self) -> Duration {
        self.latency
    }
}
