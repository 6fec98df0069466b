//! Commissioning CLI entrypoint.
//!
//! Commissions one simulated device end to end and reports the outcome.
//! Everything the engine talks to is simulated, so a run is reproducible from
//! its seed. Ctrl-C cancels the attempt the way an operator would, through
//! `stop_pairing`.

#![forbid(unsafe_code)]

mod args;

use std::{process::ExitCode, time::Duration};

use args::Cli;
use clap::Parser;
use commissioner_core::{
    CommissioningError, CommissioningStage, services::AttestationVerificationResult,
};
use commissioner_harness::{
    DelegateEvent, RecordingAttestationPolicy, SimDevice, World, scenario::SETUP_CODE,
};
use commissioner_proto::NodeId;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Temporary id of the simulated commissionee.
const DEVICE_ID: NodeId = NodeId(0xFFFF_FFFB_0000_0001);

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Commissioning(#[from] CommissioningError),

    #[error("commissioning failed at {stage}: {error}")]
    Failed { stage: CommissioningStage, error: CommissioningError },

    #[error("attempt stopped waiting in {0}")]
    Waiting(CommissioningStage),

    #[error("interrupted")]
    Interrupted,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(node_id) => {
            info!(%node_id, seed = cli.seed, "device commissioned");
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!(error = %e, seed = cli.seed, "commissioning did not complete");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: &Cli) -> Result<NodeId, CliError> {
    let config = cli.config();
    config.validate()?;

    let mut world = World::new(cli.seed, config, cli.faults())?;
    if cli.attestation_hold_secs.is_some() {
        let policy = RecordingAttestationPolicy::new(world.log(), true, cli.hold_fail_safe_secs);
        world.commissioner_mut().set_attestation_delegate(Some(Box::new(policy)));
    }
    let device = SimDevice::new(DEVICE_ID, SETUP_CODE, &mut world.env().fork_rng())
        .with_network(cli.device_network());
    world.add_device(device);
    world.pair(DEVICE_ID, cli.params())?;

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut hold = cli.attestation_hold_secs.map(Duration::from_secs);

    loop {
        tokio::select! {
            biased;
            _ = &mut interrupt => {
                warn!("interrupted, cancelling the attempt");
                world.commissioner_mut().stop_pairing(DEVICE_ID)?;
                world.run_until_idle();
                return Err(CliError::Interrupted);
            },
            () = pace(cli.pace_ms) => {},
        }

        if world.step() {
            continue;
        }
        // Queue drained: either finished or waiting on us
        let held = world.commissioner().stage() == CommissioningStage::AttestationVerification;
        match (world.commissioner().device_being_commissioned(), hold.take()) {
            (Some(device), Some(delay)) if held => {
                info!(?delay, "approving attestation after operator delay");
                world.advance(delay);
                world
                    .commissioner_mut()
                    .continue_commissioning_after_attestation(device, AttestationVerificationResult::Success)?;
            },
            _ => break,
        }
    }

    info!(steps = world.steps(), requests = world.bus().sent().len(), "simulation idle");
    outcome(&world)
}

async fn pace(ms: u64) {
    if ms == 0 {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

fn outcome(world: &World) -> Result<NodeId, CliError> {
    for event in world.events() {
        match event {
            DelegateEvent::Success { node_id } => return Ok(node_id),
            DelegateEvent::Failure { error, failed_stage, .. } => {
                return Err(CliError::Failed { stage: failed_stage, error });
            },
            _ => {},
        }
    }
    Err(CliError::Waiting(world.commissioner().stage()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("commissioner").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[tokio::test(flavor = "current_thread")]
    async fn on_network_run_succeeds() {
        let node_id = run(&cli(&["--seed", "11"])).await.expect("commissioned");
        assert!(node_id.is_operational());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn attestation_hold_is_approved() {
        let args = ["--attestation-hold-secs", "90", "--hold-fail-safe-secs", "300"];
        assert!(run(&cli(&args)).await.is_ok());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn slow_approval_without_extension_fails() {
        let result = run(&cli(&["--attestation-hold-secs", "120"])).await;
        assert!(matches!(
            result,
            Err(CliError::Failed { stage: CommissioningStage::SendOpCertSigningRequest, .. })
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_credentials_leave_attempt_waiting() {
        let result = run(&cli(&["--network", "wifi"])).await;
        assert!(matches!(result, Err(CliError::Waiting(CommissioningStage::NeedsNetworkCreds))));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn invalid_config_is_rejected() {
        let result = run(&cli(&["--fail-safe-secs", "10"])).await;
        assert!(matches!(result, Err(CliError::Commissioning(CommissioningError::InvalidArgument(_)))));
    }
}
