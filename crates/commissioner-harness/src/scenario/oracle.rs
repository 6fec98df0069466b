//! Oracle helpers.
//!
//! Reusable checks over a finished [`World`](super::World). Combine them with
//! [`all_of`].

use commissioner_core::CommissioningStage;
use commissioner_proto::NodeId;

use crate::{recorder::DelegateEvent, scenario::OracleFn};

/// Every oracle must pass.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world| oracles.iter().try_for_each(|oracle| oracle(world)))
}

/// Exactly one `on_commissioning_complete`, immediately followed by exactly
/// one success or failure callback.
pub fn single_completion() -> OracleFn {
    Box::new(|world| {
        let events = world.events();
        let completions: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, DelegateEvent::CommissioningComplete { .. }))
            .map(|(i, _)| i)
            .collect();
        let [at] = completions.as_slice() else {
            return Err(format!("expected one completion, saw {}", completions.len()));
        };
        let outcomes = events
            .iter()
            .filter(|e| matches!(e, DelegateEvent::Success { .. } | DelegateEvent::Failure { .. }))
            .count();
        if outcomes != 1 {
            return Err(format!("expected one success/failure callback, saw {outcomes}"));
        }
        match events.get(at + 1) {
            Some(DelegateEvent::Success { .. } | DelegateEvent::Failure { .. }) => Ok(()),
            other => Err(format!("completion followed by {other:?}")),
        }
    })
}

/// The attempt succeeded and the device committed its configuration.
pub fn commissioned(temporary_id: NodeId) -> OracleFn {
    Box::new(move |world| {
        let device = world.device(temporary_id).ok_or("device missing")?;
        if !device.is_commissioned() {
            return Err(format!("device not commissioned; handled {:?}", device.handled()));
        }
        if !world.events().iter().any(|e| matches!(e, DelegateEvent::Success { .. })) {
            return Err("no success callback".into());
        }
        Ok(())
    })
}

/// The attempt failed at `stage`.
pub fn failed_at(stage: CommissioningStage) -> OracleFn {
    Box::new(move |world| {
        let failure = world.events().into_iter().find_map(|e| match e {
            DelegateEvent::Failure { failed_stage, .. } => Some(failed_stage),
            _ => None,
        });
        match failure {
            Some(failed) if failed == stage => Ok(()),
            other => Err(format!("expected failure at {stage}, got {other:?}")),
        }
    })
}

/// No device fail-safe lapsed on its own.
pub fn fail_safe_held() -> OracleFn {
    Box::new(|world| {
        match world.devices().iter().find(|d| d.fail_safe_lapses() > 0) {
            Some(d) => Err(format!("fail-safe lapsed on {}", d.temporary_id())),
            None => Ok(()),
        }
    })
}

/// At most one stage invoke and one read were ever outstanding.
pub fn single_flight() -> OracleFn {
    Box::new(|world| {
        let bus = world.bus();
        if bus.max_open_invokes() > 1 || bus.max_open_reads() > 1 {
            return Err(format!(
                "concurrent requests: {} invokes, {} reads",
                bus.max_open_invokes(),
                bus.max_open_reads()
            ));
        }
        Ok(())
    })
}

/// The commissioner released every proxy and holds no attempt.
pub fn idle() -> OracleFn {
    Box::new(|world| {
        let commissioner = world.commissioner();
        if commissioner.active_proxies() != 0 || commissioner.device_being_commissioned().is_some()
        {
            return Err(format!(
                "commissioner not idle: {} proxies, stage {}",
                commissioner.active_proxies(),
                commissioner.stage()
            ));
        }
        Ok(())
    })
}
