//! End-to-end commissioning flows against simulated devices.
//!
//! Each scenario pairs one device, lets the world answer every request, and
//! checks the outcome with oracles. Stage-level expectations are checked
//! against the commands the device actually handled.

use commissioner_core::{
    CommissionerConfig, CommissioningParameters, CommissioningStage,
    params::{
        IcdRegistrationInfo, IcdRegistrationStrategy, NetworkCredentials,
        TermsAndConditionsAcknowledgement, WiFiCredentials,
    },
    report::MatchingFabric,
};
use commissioner_harness::{
    DelegateEvent, DeviceNetwork, FaultPlan, Scenario, SimDevice, World,
    scenario::{SETUP_CODE, oracle},
};
use commissioner_proto::{
    CommandKind, DstOffsetEntry, FabricId, FabricIndex, IcdClientType, IcdFeatures, NodeId,
    TimeSyncFeatures, TimeZoneEntry,
};

const DEVICE: NodeId = NodeId(0xFFFF_FFFB_0000_0001);

fn wifi() -> WiFiCredentials {
    WiFiCredentials { ssid: b"home".to_vec(), credentials: b"hunter22".to_vec() }
}

fn thread_dataset() -> Vec<u8> {
    vec![0x00, 0x03, 0x00, 0x00, 0x0F, 0x02, 0x08, 1, 2, 3, 4, 5, 6, 7, 8]
}

#[test]
fn on_network_device_is_commissioned() {
    let world = Scenario::new("on-network")
        .device(DEVICE, |d| d)
        .oracle(oracle::all_of(vec![
            oracle::commissioned(DEVICE),
            oracle::single_completion(),
            oracle::fail_safe_held(),
            oracle::single_flight(),
            oracle::idle(),
        ]))
        .run()
        .expect("scenario should pass");

    let device = world.device(DEVICE).expect("device");
    assert!(device.operational_id().is_some_and(|id| id.is_operational()));
    assert_eq!(device.disarms(), 0);

    let commands = world.bus().commands();
    assert_eq!(commands.first(), Some(&CommandKind::ArmFailSafe));
    assert_eq!(commands.last(), Some(&CommandKind::CommissioningComplete));
    assert!(!commands.contains(&CommandKind::ConnectNetwork));
    assert!(!commands.contains(&CommandKind::ScanNetworks));
    assert_eq!(world.bus().evicted().len(), 1);
}

#[test]
fn status_updates_follow_stage_order() {
    let world = Scenario::new("stage order")
        .device(DEVICE, |d| d)
        .oracle(oracle::commissioned(DEVICE))
        .run()
        .expect("scenario should pass");

    let stages: Vec<CommissioningStage> = world
        .events()
        .into_iter()
        .filter_map(|e| match e {
            DelegateEvent::StatusUpdate { stage, error: None, .. } => Some(stage),
            _ => None,
        })
        .collect();

    assert_eq!(stages.first(), Some(&CommissioningStage::ReadCommissioningInfo));
    assert!(stages.windows(2).all(|w| w[0] < w[1]), "stages out of order: {stages:?}");
    assert!(stages.contains(&CommissioningStage::AttestationRevocationCheck));
    assert!(stages.contains(&CommissioningStage::SendComplete));
}

#[test]
fn wifi_device_joins_network() {
    let world = Scenario::new("wifi")
        .device(DEVICE, |d| d.with_network(DeviceNetwork::wifi()))
        .params(CommissioningParameters { wifi_credentials: Some(wifi()), ..Default::default() })
        .oracle(oracle::all_of(vec![
            oracle::commissioned(DEVICE),
            oracle::single_completion(),
            oracle::fail_safe_held(),
            oracle::single_flight(),
        ]))
        .run()
        .expect("scenario should pass");

    let device = world.device(DEVICE).expect("device");
    assert_eq!(device.connected_network(), Some(&b"home"[..]));

    let commands = world.bus().commands();
    let add = commands.iter().position(|c| *c == CommandKind::AddOrUpdateWiFiNetwork);
    let connect = commands.iter().position(|c| *c == CommandKind::ConnectNetwork);
    assert!(add < connect, "network added after connect: {commands:?}");
    // Initial arm, extension before enable, nothing else
    let arms = commands.iter().filter(|c| **c == CommandKind::ArmFailSafe).count();
    assert_eq!(arms, 2);
}

#[test]
fn thread_device_joins_network() {
    let world = Scenario::new("thread")
        .device(DEVICE, |d| d.with_network(DeviceNetwork::thread()))
        .params(CommissioningParameters {
            thread_operational_dataset: Some(thread_dataset()),
            ..Default::default()
        })
        .oracle(oracle::all_of(vec![oracle::commissioned(DEVICE), oracle::fail_safe_held()]))
        .run()
        .expect("scenario should pass");

    let device = world.device(DEVICE).expect("device");
    assert_eq!(device.connected_network(), Some(&[1, 2, 3, 4, 5, 6, 7, 8][..]));
    assert!(world.bus().commands().contains(&CommandKind::AddOrUpdateThreadNetwork));
}

#[test]
fn missing_credentials_wait_for_caller() {
    let mut world = Scenario::new("credentials wait")
        .device(DEVICE, |d| d.with_network(DeviceNetwork::wifi()))
        .oracle(Box::new(|world| {
            let stage = world.commissioner().stage();
            if stage != CommissioningStage::NeedsNetworkCreds {
                return Err(format!("expected to wait for credentials, at {stage}"));
            }
            Ok(())
        }))
        .run()
        .expect("scenario should pass");

    world
        .commissioner_mut()
        .network_credentials_ready(NetworkCredentials::WiFi(wifi()))
        .expect("attempt is waiting");
    world.run_until_idle();

    oracle::all_of(vec![oracle::commissioned(DEVICE), oracle::single_completion()])(&world)
        .expect("commissioned after credentials arrive");

    // Not waiting any more
    let again = world.commissioner_mut().network_credentials_ready(NetworkCredentials::WiFi(wifi()));
    assert!(again.is_err());
}

#[test]
fn read_is_split_by_capacity() {
    let config = CommissionerConfig { max_paths_per_read: 4, ..Default::default() };
    let world = Scenario::new("read batching")
        .config(config)
        .device(DEVICE, |d| d)
        .oracle(oracle::all_of(vec![oracle::commissioned(DEVICE), oracle::single_flight()]))
        .run()
        .expect("scenario should pass");

    let bus = world.bus();
    let reads = bus.reads();
    assert!(reads.len() >= 3, "expected several reads, saw {}", reads.len());
    assert!(reads.iter().all(|paths| !paths.is_empty() && paths.len() <= 4));

    let info = world.events().into_iter().find_map(|e| match e {
        DelegateEvent::ReadCommissioningInfo(info) => Some(info),
        _ => None,
    });
    let info = info.expect("commissioning info reported");
    assert_eq!(info.general.recommended_fail_safe_seconds, 60);
}

#[test]
fn time_sync_configured_when_supported() {
    let params = CommissioningParameters {
        utc_time: Some(1_700_000_000_000_000),
        time_zone: Some(vec![TimeZoneEntry { offset: 3600, valid_at: 0, name: None }]),
        dst_offsets: Some(vec![DstOffsetEntry {
            offset: 3600,
            valid_starting: 0,
            valid_until: None,
        }]),
        ..Default::default()
    };

    let world = Scenario::new("time sync")
        .device(DEVICE, |d| d.with_time_sync(TimeSyncFeatures::TIME_ZONE, true))
        .params(params.clone())
        .oracle(oracle::commissioned(DEVICE))
        .run()
        .expect("scenario should pass");
    let commands = world.bus().commands();
    for kind in [CommandKind::SetUtcTime, CommandKind::SetTimeZone, CommandKind::SetDstOffset] {
        assert!(commands.contains(&kind), "{kind:?} missing from {commands:?}");
    }

    let world = Scenario::new("time sync without dst")
        .device(DEVICE, |d| d.with_time_sync(TimeSyncFeatures::TIME_ZONE, false))
        .params(params.clone())
        .oracle(oracle::commissioned(DEVICE))
        .run()
        .expect("scenario should pass");
    assert!(!world.bus().commands().contains(&CommandKind::SetDstOffset));

    let world = Scenario::new("no time cluster")
        .device(DEVICE, |d| d)
        .params(params)
        .oracle(oracle::commissioned(DEVICE))
        .run()
        .expect("scenario should pass");
    assert!(!world.bus().commands().contains(&CommandKind::SetUtcTime));
}

#[test]
fn terms_and_conditions_acknowledged() {
    let world = Scenario::new("terms accepted")
        .device(DEVICE, |d| d.with_terms(2))
        .params(CommissioningParameters {
            tc_acknowledgements: Some(TermsAndConditionsAcknowledgement {
                accepted_version: 2,
                accepted_terms: 0b11,
            }),
            ..Default::default()
        })
        .oracle(oracle::commissioned(DEVICE))
        .run()
        .expect("scenario should pass");
    assert!(world.bus().commands().contains(&CommandKind::SetTcAcknowledgements));
}

#[test]
fn terms_version_too_old_fails_before_arming() {
    let world = Scenario::new("terms too old")
        .device(DEVICE, |d| d.with_terms(3))
        .params(CommissioningParameters {
            tc_acknowledgements: Some(TermsAndConditionsAcknowledgement {
                accepted_version: 2,
                accepted_terms: 0b1,
            }),
            ..Default::default()
        })
        .oracle(oracle::all_of(vec![
            oracle::failed_at(CommissioningStage::ReadCommissioningInfo),
            oracle::single_completion(),
            oracle::idle(),
        ]))
        .run()
        .expect("scenario should pass");

    let device = world.device(DEVICE).expect("device");
    assert!(!device.is_commissioned());
    assert!(!device.handled().contains(&CommandKind::SetTcAcknowledgements));
}

#[test]
fn icd_registration_waits_for_info() {
    let mut world = Scenario::new("icd")
        .device(DEVICE, |d| d.with_icd(IcdFeatures::CHECK_IN))
        .params(CommissioningParameters {
            icd_registration_strategy: IcdRegistrationStrategy::BeforeComplete,
            icd_stay_active_duration_ms: Some(30_000),
            ..Default::default()
        })
        .oracle(Box::new(|world| {
            let waiting = world.events().contains(&DelegateEvent::IcdRegistrationInfoRequired);
            if !waiting || world.commissioner().stage() != CommissioningStage::IcdGetRegistrationInfo {
                return Err("attempt is not waiting for ICD registration info".into());
            }
            Ok(())
        }))
        .run()
        .expect("scenario should pass");

    world
        .commissioner_mut()
        .icd_registration_info_ready(IcdRegistrationInfo {
            check_in_node_id: NodeId(0x0001_B669),
            monitored_subject: 0x0001_B669,
            symmetric_key: [0x5A; 16],
            client_type: IcdClientType::Permanent,
        })
        .expect("attempt is waiting");
    world.run_until_idle();

    oracle::all_of(vec![oracle::commissioned(DEVICE), oracle::single_completion()])(&world)
        .expect("commissioned after registration");

    let events = world.events();
    assert!(events.iter().any(|e| matches!(
        e,
        DelegateEvent::IcdRegistrationComplete { icd_counter: 0x10, .. }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        DelegateEvent::IcdStayActiveComplete { promised_duration_ms: 30_000, .. }
    )));
    let commands = world.bus().commands();
    let register = commands.iter().position(|c| *c == CommandKind::RegisterClient);
    let stay = commands.iter().position(|c| *c == CommandKind::StayActiveRequest);
    assert!(register.is_some() && register < stay);
}

#[test]
fn icd_ignored_without_strategy() {
    let world = Scenario::new("icd ignored")
        .device(DEVICE, |d| d.with_icd(IcdFeatures::CHECK_IN))
        .oracle(oracle::commissioned(DEVICE))
        .run()
        .expect("scenario should pass");
    assert!(!world.bus().commands().contains(&CommandKind::RegisterClient));
}

#[test]
fn skipped_completion_leaves_fail_safe_armed() {
    let world = Scenario::new("skip complete")
        .device(DEVICE, |d| d)
        .params(CommissioningParameters { skip_commissioning_complete: true, ..Default::default() })
        .oracle(oracle::all_of(vec![oracle::single_completion(), oracle::idle()]))
        .run()
        .expect("scenario should pass");

    let device = world.device(DEVICE).expect("device");
    assert!(!device.is_commissioned());
    assert!(device.fail_safe().is_some());
    assert!(world.events().iter().any(|e| matches!(e, DelegateEvent::Success { .. })));
    assert!(!world.bus().commands().contains(&CommandKind::CommissioningComplete));
}

#[test]
fn device_already_on_our_fabric_stops_early() {
    let mut world =
        World::new(3, CommissionerConfig::default(), FaultPlan::new()).expect("world setup");
    let existing = world.our_fabric(NodeId(0x42), FabricIndex(3));
    let device = SimDevice::new(DEVICE, SETUP_CODE, &mut world.env().fork_rng()).with_fabric(existing);
    world.add_device(device);

    world
        .pair(DEVICE, CommissioningParameters { check_for_matching_fabric: true, ..Default::default() })
        .expect("pairing starts");
    world.run_until_idle();

    oracle::all_of(vec![oracle::single_completion(), oracle::idle()])(&world)
        .expect("attempt finished");
    let events = world.events();
    assert!(events.contains(&DelegateEvent::FabricCheck(MatchingFabric {
        node_id: NodeId(0x42),
        fabric_index: FabricIndex(3),
    })));
    assert!(events.iter().any(|e| matches!(e, DelegateEvent::Success { .. })));
    // Nothing was armed or provisioned
    assert!(world.bus().commands().is_empty());
}

#[test]
fn foreign_fabric_is_commissioned_normally() {
    let mut world =
        World::new(3, CommissionerConfig::default(), FaultPlan::new()).expect("world setup");
    let mut foreign = world.our_fabric(NodeId(0x42), FabricIndex(1));
    foreign.fabric_id = FabricId(0xDEAD);
    let device = SimDevice::new(DEVICE, SETUP_CODE, &mut world.env().fork_rng()).with_fabric(foreign);
    world.add_device(device);

    world
        .pair(DEVICE, CommissioningParameters { check_for_matching_fabric: true, ..Default::default() })
        .expect("pairing starts");
    world.run_until_idle();

    oracle::all_of(vec![oracle::commissioned(DEVICE), oracle::single_completion()])(&world)
        .expect("commissioned");
    assert!(!world.events().iter().any(|e| matches!(e, DelegateEvent::FabricCheck(_))));
}
