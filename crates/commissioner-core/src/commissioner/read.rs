//! Batched commissioning-info read.

use std::collections::BTreeMap;

use commissioner_proto::{AttributeValue, ConcreteAttributePath};
use tracing::{debug, warn};

use super::{Commissioner, ReadProgress, Step};
use crate::{
    env::Environment,
    error::CommissioningError,
    info_reader::{ReadPolicy, build_read_batch, parse_commissioning_info},
    report::{CommissioningReport, StageResult},
    services::Target,
};

impl<E: Environment> Commissioner<E> {
    /// Begin the read, fixing the path policy for every request it takes.
    pub(super) fn start_read(&mut self) -> Step {
        let Some(attempt) = self.attempt.as_mut() else {
            return Step::Suspended;
        };
        let policy = ReadPolicy::from_params(&attempt.params);
        let paths = policy.paths();
        debug!(paths = paths.len(), "reading commissioning info");
        attempt.read = Some(ReadProgress {
            policy,
            paths,
            consumed: 0,
            requested: 0,
            more: false,
            cache: BTreeMap::new(),
        });
        self.issue_read_batch()
    }

    fn issue_read_batch(&mut self) -> Step {
        let capacity = self.config.max_paths_per_read;
        let timeout = self.stage_timeout();
        let Some(attempt) = self.attempt.as_mut() else {
            return Step::Suspended;
        };
        let Some(read) = attempt.read.as_mut() else {
            return Step::Complete(StageResult::err(CommissioningError::IncorrectState(
                "no read in progress",
            )));
        };

        let batch = build_read_batch(&read.paths, read.consumed, capacity);
        read.requested = batch.paths.len();
        read.more = batch.exceeded;
        if batch.paths.is_empty() {
            return Step::Complete(self.finish_read());
        }
        if self.inflight.read.is_some() {
            return Step::Complete(StageResult::err(CommissioningError::IncorrectState(
                "a read is already outstanding",
            )));
        }

        let target = Target::Commissionee(attempt.temporary_id);
        let request = self.next_request_id();
        debug!(%request, paths = batch.paths.len(), more = batch.exceeded, "read request");
        match self.services.interaction.read(request, target, &batch.paths, timeout) {
            Ok(()) => {
                self.inflight.read = Some(request);
                Step::Suspended
            },
            Err(e) => Step::Complete(StageResult::err(e)),
        }
    }

    pub(super) fn on_read_response(
        &mut self,
        result: Result<Vec<(ConcreteAttributePath, AttributeValue)>, CommissioningError>,
    ) {
        let reports = match result {
            Ok(reports) => reports,
            Err(e) => return self.complete_stage(StageResult::err(e)),
        };
        let more = match self.attempt.as_mut().and_then(|a| a.read.as_mut()) {
            Some(read) => {
                read.cache.extend(reports);
                read.consumed += read.requested;
                read.more
            },
            None => return,
        };

        let step = if more { self.issue_read_batch() } else { Step::Complete(self.finish_read()) };
        if let Step::Complete(result) = step {
            self.complete_stage(result);
        }
    }

    /// Parse everything read so far into the stage report.
    fn finish_read(&mut self) -> StageResult {
        let Some(read) = self.attempt.as_mut().and_then(|a| a.read.take()) else {
            return StageResult::err(CommissioningError::IncorrectState("no read in progress"));
        };
        let (info, errors) =
            parse_commissioning_info(&read.cache, &read.policy, self.fabric.identity());

        if let Some(matching) = info.matching_fabric {
            debug!(node_id = %matching.node_id, "device already on this fabric");
            if let Some(attempt) = self.attempt.as_mut() {
                attempt.existing_node_id = Some(matching.node_id);
            }
            if let Some(delegate) = self.pairing_delegate.as_mut() {
                delegate.on_fabric_check(&matching);
            }
        }
        if let Some(delegate) = self.pairing_delegate.as_mut() {
            delegate.on_read_commissioning_info(&info);
        }
        for e in &errors {
            warn!(error = %e, "commissioning info incomplete");
        }

        StageResult {
            error: errors.into_iter().next(),
            report: CommissioningReport::ReadCommissioningInfo(Box::new(info)),
        }
    }
}
