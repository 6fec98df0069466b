//! CSR validation, NOC chain issuance and the operational identity hand-off.

use commissioner_proto::{NocStatus, NocsrElements, elements::signed_message};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use tracing::info;

use super::{Commissioner, Step};
use crate::{
    env::Environment,
    error::CommissioningError,
    params::NocChain,
    report::{CommissioningReport, DeviceErrorInfo, StageResult},
    services::NocChainRequest,
};

impl<E: Environment> Commissioner<E> {
    /// Check the CSR envelope before anything is issued for it.
    ///
    /// The elements must decode, echo our CSR nonce, and carry a DAC
    /// signature over `elements || attestation_challenge`.
    pub(super) fn validate_csr(&self) -> Result<CommissioningReport, CommissioningError> {
        let attempt = self
            .attempt
            .as_ref()
            .ok_or(CommissioningError::IncorrectState("no commissioning attempt"))?;
        let params = &attempt.params;

        let elements = params
            .nocsr_elements
            .as_deref()
            .ok_or(CommissioningError::InvalidArgument("NOCSR elements"))?;
        let signature =
            params.csr_signature.as_deref().ok_or(CommissioningError::InvalidArgument("CSR signature"))?;
        let dac = params.dac.as_deref().ok_or(CommissioningError::InvalidArgument("DAC certificate"))?;
        let nonce = params.csr_nonce.ok_or(CommissioningError::InvalidArgument("CSR nonce"))?;
        let challenge = self.attestation_challenge()?;

        let decoded = NocsrElements::from_cbor(elements)
            .map_err(|_| CommissioningError::InvalidCsr("malformed NOCSR elements"))?;
        if decoded.csr_nonce != nonce {
            return Err(CommissioningError::InvalidCsr("CSR nonce mismatch"));
        }

        let key = VerifyingKey::from_bytes(&self.services.attestation.dac_public_key(dac)?)
            .map_err(|_| CommissioningError::InvalidCsr("unusable DAC public key"))?;
        let signature = Signature::from_slice(signature)
            .map_err(|_| CommissioningError::InvalidCsr("malformed signature"))?;
        key.verify(&signed_message(elements, &challenge), &signature)
            .map_err(|_| CommissioningError::InvalidCsr("signature does not verify"))?;

        Ok(CommissioningReport::Empty)
    }

    /// Inputs for the credentials issuer, gathered from the attempt.
    pub(super) fn noc_chain_request(&self) -> Result<NocChainRequest, CommissioningError> {
        let attempt = self
            .attempt
            .as_ref()
            .ok_or(CommissioningError::IncorrectState("no commissioning attempt"))?;
        let params = &attempt.params;
        let missing = CommissioningError::InvalidArgument;

        Ok(NocChainRequest {
            nocsr_elements: params.nocsr_elements.clone().ok_or(missing("NOCSR elements"))?,
            csr_signature: params.csr_signature.clone().ok_or(missing("CSR signature"))?,
            attestation_challenge: self.attestation_challenge()?,
            dac: params.dac.clone().ok_or(missing("DAC certificate"))?,
            pai: params.pai.clone().ok_or(missing("PAI certificate"))?,
            node_id: params.remote_node_id,
        })
    }

    pub(super) fn start_noc_chain_generation(
        &mut self,
        input: NocChainRequest,
    ) -> Result<Step, CommissioningError> {
        let request = self.next_request_id();
        self.services.issuer.generate_noc_chain(request, input)?;
        self.inflight.issuer = Some(request);
        Ok(Step::Suspended)
    }

    pub(super) fn on_noc_chain_generated(&mut self, result: Result<NocChain, CommissioningError>) {
        let result = result.map(CommissioningReport::NocChain).map_err(|e| match e {
            CommissioningError::NocIssuance(_) => e,
            other => CommissioningError::NocIssuance(other.to_string()),
        });
        self.complete_stage(result.into());
    }

    /// Handle `NOCResponse`.
    ///
    /// On success the commissionee's identity switches from its temporary id
    /// to the operational id the NOC carries. Every later lookup uses it.
    pub(super) fn on_noc_installed(&mut self, status: NocStatus) -> StageResult {
        if !status.is_ok() {
            return StageResult::err_with(
                CommissioningError::Noc(status),
                CommissioningReport::ErrorInfo(DeviceErrorInfo::Noc(status)),
            );
        }
        self.adopt_operational_identity().into()
    }

    fn adopt_operational_identity(&mut self) -> Result<CommissioningReport, CommissioningError> {
        let attempt = self
            .attempt
            .as_ref()
            .ok_or(CommissioningError::IncorrectState("no commissioning attempt"))?;
        let chain = attempt
            .params
            .noc_chain
            .as_ref()
            .ok_or(CommissioningError::InvalidArgument("NOC chain"))?;

        let (node_id, fabric_id) = self.services.issuer.operational_identity(&chain.noc)?;
        if !node_id.is_operational() {
            return Err(CommissioningError::Noc(NocStatus::InvalidNodeOpId));
        }
        let identity = self.fabric.require_identity()?;
        if fabric_id != identity.fabric_id {
            return Err(CommissioningError::FabricMismatch {
                expected: identity.fabric_id,
                actual: fabric_id,
            });
        }
        if let Some(expected) = attempt.params.remote_node_id.filter(|id| *id != node_id) {
            return Err(CommissioningError::OperationalIdMismatch { expected, actual: node_id });
        }
        let peer = self.fabric.peer_id(node_id)?;
        let device = attempt.device;

        if let Some(proxy) = self.pool.get_mut(device) {
            proxy.operational_node_id = Some(node_id);
        }
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.operational = Some(peer);
        }
        info!(%peer, %device, "commissionee operational identity assigned");
        Ok(CommissioningReport::OperationalNodeId(node_id))
    }
}
