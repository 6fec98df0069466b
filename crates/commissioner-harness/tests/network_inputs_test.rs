//! Network stages check their inputs before sending.
//!
//! A commissioning delegate may pick a network stage the default flow would
//! skip. Without the matching credentials the stage fails with
//! `InvalidArgument` and nothing reaches the device.

use commissioner_core::{
    AutoCommissioner, CommissionerConfig, CommissioningDelegate, CommissioningError,
    CommissioningParameters, CommissioningStage, NextStep, report::StageReport,
};
use commissioner_harness::{
    DelegateEvent, DeviceNetwork, FaultPlan, SimDevice, World,
    scenario::{SETUP_CODE, oracle},
};
use commissioner_proto::{CommandKind, NodeId};

const DEVICE: NodeId = NodeId(0x70);

/// Default flow, except that one chosen stage is swapped for another.
struct Redirect {
    inner: AutoCommissioner,
    from: CommissioningStage,
    to: CommissioningStage,
}

impl CommissioningDelegate for Redirect {
    fn set_commissioning_parameters(
        &mut self,
        params: CommissioningParameters,
    ) -> Result<(), CommissioningError> {
        self.inner.set_commissioning_parameters(params)
    }

    fn commissioning_parameters(&self) -> &CommissioningParameters {
        self.inner.commissioning_parameters()
    }

    fn start_commissioning(&mut self) -> Result<NextStep, CommissioningError> {
        self.inner.start_commissioning()
    }

    fn commissioning_step_finished(
        &mut self,
        error: Option<&CommissioningError>,
        report: &StageReport,
    ) -> Result<NextStep, CommissioningError> {
        let mut next = self.inner.commissioning_step_finished(error, report)?;
        if next.stage == self.from {
            next.stage = self.to;
        }
        Ok(next)
    }
}

/// Commission a device that needs `network` with no credentials, entering
/// `stage` where the attempt would otherwise wait for them.
fn run_without_credentials(stage: CommissioningStage, network: DeviceNetwork) -> World {
    let mut world =
        World::new(11, CommissionerConfig::default(), FaultPlan::new()).expect("world setup");
    let device = SimDevice::new(DEVICE, SETUP_CODE, &mut world.env().fork_rng());
    world.add_device(device.with_network(network));
    world.commissioner_mut().set_commissioning_delegate(Some(Box::new(Redirect {
        inner: AutoCommissioner::new(),
        from: CommissioningStage::NeedsNetworkCreds,
        to: stage,
    })));

    world.pair(DEVICE, CommissioningParameters::default()).expect("pairing starts");
    world.run_until_idle();
    world
}

fn assert_rejected_without_sending(stage: CommissioningStage, network: DeviceNetwork) {
    let world = run_without_credentials(stage, network);

    let verdict =
        oracle::all_of(vec![oracle::failed_at(stage), oracle::single_completion(), oracle::idle()])(
            &world,
        );
    assert!(verdict.is_ok(), "{stage}: {verdict:?}");

    let events = world.events();
    assert!(
        events.iter().any(|e| matches!(
            e,
            DelegateEvent::StatusUpdate {
                stage: s,
                error: Some(CommissioningError::InvalidArgument(_)),
                ..
            } if *s == stage
        )),
        "{stage}: no InvalidArgument status update"
    );

    // Only the initial arm went out; failing at a network stage keeps the
    // fail-safe armed, so no disarm follows either
    assert_eq!(world.bus().commands(), vec![CommandKind::ArmFailSafe], "{stage}");
    assert_eq!(world.device(DEVICE).map(SimDevice::connected_network), Some(None), "{stage}");
}

#[test]
fn wifi_setup_without_credentials() {
    assert_rejected_without_sending(CommissioningStage::WiFiNetworkSetup, DeviceNetwork::wifi());
}

#[test]
fn thread_setup_without_dataset() {
    assert_rejected_without_sending(
        CommissioningStage::ThreadNetworkSetup,
        DeviceNetwork::thread(),
    );
}

#[test]
fn wifi_enable_without_credentials() {
    assert_rejected_without_sending(CommissioningStage::WiFiNetworkEnable, DeviceNetwork::wifi());
}

#[test]
fn thread_enable_without_dataset() {
    assert_rejected_without_sending(
        CommissioningStage::ThreadNetworkEnable,
        DeviceNetwork::thread(),
    );
}

#[test]
fn default_flow_waits_instead() {
    let world = run_without_credentials(
        CommissioningStage::NeedsNetworkCreds,
        DeviceNetwork::wifi(),
    );
    assert_eq!(world.commissioner().stage(), CommissioningStage::NeedsNetworkCreds);
    assert!(world.events().iter().all(|e| !matches!(e, DelegateEvent::Failure { .. })));
}
