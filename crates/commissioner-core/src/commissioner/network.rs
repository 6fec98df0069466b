//! Network provisioning.
//!
//! Scanning is the one stage whose failure never fails the attempt: the scan
//! outcome goes to the pairing delegate and the stage completes cleanly.

use commissioner_proto::{Command, CommandKind, CommandResponse, NetworkingStatus, thread};
use tracing::{info, warn};

use super::{Commissioner, InvokePurpose, Step};
use crate::{
    env::Environment,
    error::CommissioningError,
    params::CommissioningParameters,
    report::{CommissioningReport, DeviceErrorInfo, ScanNetworksResult, StageResult},
    services::Target,
    stage::CommissioningStage,
};

/// Network id addressed by `ConnectNetwork` and `RemoveNetwork`: the SSID for
/// Wi-Fi, the extended PAN id for Thread.
pub(super) fn network_id(
    stage: CommissioningStage,
    params: &CommissioningParameters,
) -> Result<Vec<u8>, CommissioningError> {
    match stage {
        CommissioningStage::WiFiNetworkEnable | CommissioningStage::RemoveWiFiNetworkConfig => params
            .wifi_credentials
            .as_ref()
            .map(|w| w.ssid.clone())
            .ok_or(CommissioningError::InvalidArgument("Wi-Fi credentials")),
        _ => {
            let dataset = params
                .thread_operational_dataset
                .as_deref()
                .ok_or(CommissioningError::InvalidArgument("Thread dataset"))?;
            Ok(thread::extended_pan_id(dataset)?.to_vec())
        },
    }
}

pub(super) fn networking(status: NetworkingStatus, error_value: Option<i32>) -> StageResult {
    if status.is_ok() {
        StageResult::ok()
    } else {
        StageResult::err_with(
            CommissioningError::Networking(status),
            CommissioningReport::ErrorInfo(DeviceErrorInfo::Network { status, error_value }),
        )
    }
}

impl<E: Environment> Commissioner<E> {
    pub(super) fn start_scan(&mut self, ssid: Option<Vec<u8>>) -> Step {
        let Some((temporary_id, endpoint)) =
            self.attempt.as_ref().map(|a| (a.temporary_id, a.endpoint))
        else {
            return Step::Suspended;
        };
        let command =
            Command::ScanNetworks { ssid, breadcrumb: CommissioningStage::ScanNetworks.breadcrumb() };
        let timeout = self.stage_timeout();

        match self.send_invoke(
            Target::Commissionee(temporary_id),
            endpoint,
            command,
            timeout,
            InvokePurpose::Stage,
        ) {
            Ok(_) => Step::Suspended,
            Err(e) => {
                self.report_scan_failure(&e);
                Step::Complete(StageResult::ok())
            },
        }
    }

    pub(super) fn on_scan_response(
        &mut self,
        result: Result<CommandResponse, CommissioningError>,
    ) -> StageResult {
        match result {
            Ok(CommandResponse::ScanNetworks {
                networking_status,
                wifi_scan_results,
                thread_scan_results,
                ..
            }) if networking_status.is_ok() => {
                let found = ScanNetworksResult { wifi: wifi_scan_results, thread: thread_scan_results };
                info!(wifi = found.wifi.len(), thread = found.thread.len(), "network scan finished");
                if let Some(delegate) = self.pairing_delegate.as_mut() {
                    delegate.on_scan_networks_success(&found);
                }
            },
            Ok(CommandResponse::ScanNetworks { networking_status, .. }) => {
                self.report_scan_failure(&CommissioningError::Networking(networking_status));
            },
            Ok(_) => {
                self.report_scan_failure(&CommissioningError::UnexpectedResponse(
                    CommandKind::ScanNetworks,
                ));
            },
            Err(e) => self.report_scan_failure(&e),
        }
        StageResult::ok()
    }

    fn report_scan_failure(&mut self, error: &CommissioningError) {
        warn!(%error, "network scan failed");
        if let Some(delegate) = self.pairing_delegate.as_mut() {
            delegate.on_scan_networks_failure(error);
        }
    }
}
