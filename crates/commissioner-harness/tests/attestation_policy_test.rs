//! Attestation policy hold.
//!
//! With a policy delegate installed, a failed verification (or any
//! verification, when the policy asks to wait) parks the attempt until the
//! embedder decides. The fail-safe is extended while parked.

use std::time::Duration;

use commissioner_core::{
    CommissioningError, CommissioningStage, services::AttestationVerificationResult,
};
use commissioner_harness::{
    DelegateEvent, FaultPlan, Scenario, World, scenario::oracle,
};
use commissioner_proto::{CommandKind, ImStatus, NodeId};

const DEVICE: NodeId = NodeId(0x40);

fn held_at_attestation() -> commissioner_harness::OracleFn {
    Box::new(|world| match world.commissioner().stage() {
        CommissioningStage::AttestationVerification => Ok(()),
        other => Err(format!("expected attestation hold, at {other}")),
    })
}

fn held_result(world: &World) -> Option<AttestationVerificationResult> {
    world.events().into_iter().find_map(|e| match e {
        DelegateEvent::AttestationCompleted { result, .. } => Some(result),
        _ => None,
    })
}

fn resume(world: &mut World, result: AttestationVerificationResult) {
    let device = world.commissioner().device_being_commissioned().expect("attempt in progress");
    world
        .commissioner_mut()
        .continue_commissioning_after_attestation(device, result)
        .expect("attempt is held");
    world.run_until_idle();
}

#[test]
fn hold_extends_fail_safe_while_waiting() {
    let mut world = Scenario::new("policy hold")
        .device(DEVICE, |d| d)
        .attestation_policy(true, Some(600))
        .oracle(held_at_attestation())
        .run()
        .expect("scenario should pass");
    assert_eq!(held_result(&world), Some(AttestationVerificationResult::Success));

    // Longer than the initial 60 s arm, shorter than the extension
    world.advance(Duration::from_secs(300));
    resume(&mut world, AttestationVerificationResult::Success);

    oracle::all_of(vec![
        oracle::commissioned(DEVICE),
        oracle::single_completion(),
        oracle::fail_safe_held(),
        oracle::idle(),
    ])(&world)
    .expect("commissioned after the decision");
}

#[test]
fn fail_safe_lapse_while_held_surfaces_at_next_stage() {
    let mut world = Scenario::new("policy too slow")
        .device(DEVICE, |d| d)
        .attestation_policy(true, None)
        .oracle(held_at_attestation())
        .run()
        .expect("scenario should pass");

    world.advance(Duration::from_secs(120));
    assert_eq!(world.device(DEVICE).map(|d| d.fail_safe_lapses()), Some(1));
    resume(&mut world, AttestationVerificationResult::Success);

    oracle::all_of(vec![
        oracle::failed_at(CommissioningStage::SendOpCertSigningRequest),
        oracle::single_completion(),
        oracle::idle(),
    ])(&world)
    .expect("fails once the device refuses");
    let error = world.events().into_iter().find_map(|e| match e {
        DelegateEvent::Failure { error, .. } => Some(error),
        _ => None,
    });
    assert_eq!(error, Some(CommissioningError::Status(ImStatus::FailsafeRequired)));
}

#[test]
fn failed_verification_is_offered_to_policy() {
    let mut world = Scenario::new("policy override")
        .faults(FaultPlan::new().attestation(AttestationVerificationResult::PaaNotFound))
        .device(DEVICE, |d| d)
        .attestation_policy(false, None)
        .oracle(held_at_attestation())
        .run()
        .expect("scenario should pass");
    assert_eq!(held_result(&world), Some(AttestationVerificationResult::PaaNotFound));

    // The embedder trusts the device anyway
    resume(&mut world, AttestationVerificationResult::Success);
    oracle::all_of(vec![oracle::commissioned(DEVICE), oracle::single_completion()])(&world)
        .expect("commissioned after override");
}

#[test]
fn policy_rejection_fails_attestation() {
    let mut world = Scenario::new("policy rejects")
        .faults(FaultPlan::new().attestation(AttestationVerificationResult::PaaNotFound))
        .device(DEVICE, |d| d)
        .attestation_policy(false, None)
        .oracle(held_at_attestation())
        .run()
        .expect("scenario should pass");

    resume(&mut world, AttestationVerificationResult::PaaNotFound);
    oracle::all_of(vec![
        oracle::failed_at(CommissioningStage::AttestationVerification),
        oracle::single_completion(),
        oracle::idle(),
    ])(&world)
    .expect("failed at attestation");

    let reported = world.events().into_iter().find_map(|e| match e {
        DelegateEvent::Failure { attestation_result, .. } => attestation_result,
        _ => None,
    });
    assert_eq!(reported, Some(AttestationVerificationResult::PaaNotFound));
    assert_eq!(world.device(DEVICE).map(|d| d.disarms()), Some(1));
}

#[test]
fn successful_verification_does_not_wait_by_default() {
    let world = Scenario::new("policy passive")
        .device(DEVICE, |d| d)
        .attestation_policy(false, None)
        .oracle(oracle::commissioned(DEVICE))
        .run()
        .expect("scenario should pass");
    assert_eq!(held_result(&world), None);
}

#[test]
fn resumption_without_hold_is_rejected() {
    let mut world = Scenario::new("unexpected decision")
        .faults(FaultPlan::new().fail_command(CommandKind::CsrRequest, commissioner_harness::Fault::Drop))
        .device(DEVICE, |d| d)
        .oracle(Box::new(|world| match world.commissioner().stage() {
            CommissioningStage::SendOpCertSigningRequest => Ok(()),
            other => Err(format!("expected to be stuck on the CSR, at {other}")),
        }))
        .run()
        .expect("scenario should pass");

    let device = world.commissioner().device_being_commissioned().expect("attempt in progress");
    let result = world
        .commissioner_mut()
        .continue_commissioning_after_attestation(device, AttestationVerificationResult::Success);
    assert!(matches!(result, Err(CommissioningError::IncorrectState(_))));
    assert_eq!(world.commissioner().stage(), CommissioningStage::SendOpCertSigningRequest);
}
