//! Scenario builder API.
//!
//! Provides a declarative API for constructing commissioning scenarios that
//! enforce the Oracle Pattern.

use commissioner_core::{CommissionerConfig, CommissioningParameters};
use commissioner_proto::NodeId;

use crate::{
    device::SimDevice,
    faults::FaultPlan,
    recorder::RecordingAttestationPolicy,
    scenario::{OracleFn, World},
};

/// Setup code every scenario device answers to.
pub const SETUP_CODE: u32 = 20202021;

type DeviceFn = Box<dyn FnOnce(SimDevice) -> SimDevice>;

/// Scenario builder.
///
/// Construct a scenario by adding devices, parameters and faults. Must call
/// `.oracle()` to get a [`RunnableScenario`] that can be executed.
pub struct Scenario {
    name: String,
    seed: u64,
    config: CommissionerConfig,
    faults: FaultPlan,
    params: CommissioningParameters,
    devices: Vec<(NodeId, DeviceFn)>,
    attestation_policy: Option<(bool, Option<u16>)>,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seed: 0,
            config: CommissionerConfig::default(),
            faults: FaultPlan::default(),
            params: CommissioningParameters::default(),
            devices: Vec::new(),
            attestation_policy: None,
        }
    }

    /// Seed for the world's RNG.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Commissioner configuration.
    pub fn config(mut self, config: CommissionerConfig) -> Self {
        self.config = config;
        self
    }

    /// Faults to inject.
    pub fn faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    /// Parameters for the commissioning attempt.
    pub fn params(mut self, params: CommissioningParameters) -> Self {
        self.params = params;
        self
    }

    /// Add a device. The first device added is the one commissioned.
    pub fn device(
        mut self,
        temporary_id: NodeId,
        configure: impl FnOnce(SimDevice) -> SimDevice + 'static,
    ) -> Self {
        self.devices.push((temporary_id, Box::new(configure)));
        self
    }

    /// Install an attestation policy delegate.
    pub fn attestation_policy(mut self, wait: bool, fail_safe_seconds: Option<u16>) -> Self {
        self.attestation_policy = Some((wait, fail_safe_seconds));
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Pairs and commissions the first device, answers requests until none
    /// remain, then runs the oracle. The world is returned so a test can keep
    /// driving an attempt that is waiting on external input.
    pub fn run(self) -> Result<World, String> {
        let Scenario { name, seed, config, faults, params, devices, attestation_policy } =
            self.scenario;

        let mut world = World::new(seed, config, faults)
            .map_err(|e| format!("Scenario '{name}': world setup failed: {e}"))?;
        if let Some((wait, seconds)) = attestation_policy {
            let policy = RecordingAttestationPolicy::new(world.log(), wait, seconds);
            world.commissioner_mut().set_attestation_delegate(Some(Box::new(policy)));
        }

        let first = devices
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| format!("Scenario '{name}': no device to commission"))?;
        for (temporary_id, configure) in devices {
            let device = SimDevice::new(temporary_id, SETUP_CODE, &mut world.env().fork_rng());
            world.add_device(configure(device));
        }

        world
            .pair(first, params)
            .map_err(|e| format!("Scenario '{name}': pair_device failed: {e}"))?;
        world.run_until_idle();

        (self.oracle)(&world).map_err(|e| format!("Scenario '{name}': {e}"))?;
        Ok(world)
    }
}
