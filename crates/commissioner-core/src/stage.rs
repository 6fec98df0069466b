//! Commissioning stages.
//!
//! Stages are declared in flow order. The ordering is meaningful: cleanup uses
//! it to decide whether network setup had begun when an attempt failed.

use std::fmt;

/// One named step of a commissioning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum CommissioningStage {
    #[default]
    SecurePairing,
    ReadCommissioningInfo,
    ArmFailsafe,
    ScanNetworks,
    NeedsNetworkCreds,
    ConfigRegulatory,
    ConfigureTcAcknowledgments,
    ConfigureUtcTime,
    ConfigureTimeZone,
    ConfigureDstOffset,
    ConfigureDefaultNtp,
    SendPaiCertificateRequest,
    SendDacCertificateRequest,
    SendAttestationRequest,
    AttestationVerification,
    AttestationRevocationCheck,
    SendOpCertSigningRequest,
    ValidateCsr,
    GenerateNocChain,
    SendTrustedRootCert,
    SendNoc,
    ConfigureTrustedTimeSource,
    IcdGetRegistrationInfo,
    IcdRegistration,
    WiFiNetworkSetup,
    ThreadNetworkSetup,
    FailsafeBeforeWiFiEnable,
    FailsafeBeforeThreadEnable,
    WiFiNetworkEnable,
    ThreadNetworkEnable,
    PrimaryOperationalNetworkFailed,
    RemoveWiFiNetworkConfig,
    RemoveThreadNetworkConfig,
    EvictPreviousCaseSessions,
    FindOperationalForStayActive,
    IcdSendStayActive,
    FindOperationalForCommissioningComplete,
    SendComplete,
    Cleanup,
    Error,
}

impl CommissioningStage {
    /// Stable name for logs and status updates.
    pub fn name(self) -> &'static str {
        match self {
            Self::SecurePairing => "SecurePairing",
            Self::ReadCommissioningInfo => "ReadCommissioningInfo",
            Self::ArmFailsafe => "ArmFailSafe",
            Self::ScanNetworks => "ScanNetworks",
            Self::NeedsNetworkCreds => "NeedsNetworkCreds",
            Self::ConfigRegulatory => "ConfigRegulatory",
            Self::ConfigureTcAcknowledgments => "ConfigureTCAcknowledgments",
            Self::ConfigureUtcTime => "ConfigureUTCTime",
            Self::ConfigureTimeZone => "ConfigureTimeZone",
            Self::ConfigureDstOffset => "ConfigureDSTOffset",
            Self::ConfigureDefaultNtp => "ConfigureDefaultNTP",
            Self::SendPaiCertificateRequest => "SendPAICertificateRequest",
            Self::SendDacCertificateRequest => "SendDACCertificateRequest",
            Self::SendAttestationRequest => "SendAttestationRequest",
            Self::AttestationVerification => "AttestationVerification",
            Self::AttestationRevocationCheck => "AttestationRevocationCheck",
            Self::SendOpCertSigningRequest => "SendOpCertSigningRequest",
            Self::ValidateCsr => "ValidateCSR",
            Self::GenerateNocChain => "GenerateNOCChain",
            Self::SendTrustedRootCert => "SendTrustedRootCert",
            Self::SendNoc => "SendNOC",
            Self::ConfigureTrustedTimeSource => "ConfigureTrustedTimeSource",
            Self::IcdGetRegistrationInfo => "ICDGetRegistrationInfo",
            Self::IcdRegistration => "ICDRegistration",
            Self::WiFiNetworkSetup => "WiFiNetworkSetup",
            Self::ThreadNetworkSetup => "ThreadNetworkSetup",
            Self::FailsafeBeforeWiFiEnable => "FailsafeBeforeWiFiEnable",
            Self::FailsafeBeforeThreadEnable => "FailsafeBeforeThreadEnable",
            Self::WiFiNetworkEnable => "WiFiNetworkEnable",
            Self::ThreadNetworkEnable => "ThreadNetworkEnable",
            Self::PrimaryOperationalNetworkFailed => "PrimaryOperationalNetworkFailed",
            Self::RemoveWiFiNetworkConfig => "RemoveWiFiNetworkConfig",
            Self::RemoveThreadNetworkConfig => "RemoveThreadNetworkConfig",
            Self::EvictPreviousCaseSessions => "EvictPreviousCaseSessions",
            Self::FindOperationalForStayActive => "FindOperationalForStayActive",
            Self::IcdSendStayActive => "ICDSendStayActive",
            Self::FindOperationalForCommissioningComplete => {
                "FindOperationalForCommissioningComplete"
            },
            Self::SendComplete => "SendComplete",
            Self::Cleanup => "Cleanup",
            Self::Error => "Error",
        }
    }

    /// Opaque progress marker written to the device with each command.
    pub fn breadcrumb(self) -> u64 {
        u64::from(self as u8)
    }

    /// Whether network provisioning had begun by this stage.
    ///
    /// A failure at or past this point leaves the fail-safe armed so the
    /// device keeps its partial network configuration.
    pub fn is_network_setup_or_later(self) -> bool {
        self >= Self::WiFiNetworkSetup && self < Self::Cleanup
    }

    /// Best-effort time synchronization stages.
    pub fn is_time_sync(self) -> bool {
        matches!(
            self,
            Self::ConfigureUtcTime
                | Self::ConfigureTimeZone
                | Self::ConfigureDstOffset
                | Self::ConfigureDefaultNtp
                | Self::ConfigureTrustedTimeSource
        )
    }
}

impl fmt::Display for CommissioningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_setup_boundary() {
        assert!(!CommissioningStage::SendNoc.is_network_setup_or_later());
        assert!(!CommissioningStage::IcdRegistration.is_network_setup_or_later());
        assert!(CommissioningStage::WiFiNetworkSetup.is_network_setup_or_later());
        assert!(CommissioningStage::SendComplete.is_network_setup_or_later());
        assert!(!CommissioningStage::Cleanup.is_network_setup_or_later());
        assert!(!CommissioningStage::Error.is_network_setup_or_later());
    }

    #[test]
    fn breadcrumbs_follow_flow_order() {
        assert_eq!(CommissioningStage::SecurePairing.breadcrumb(), 0);
        assert!(
            CommissioningStage::ArmFailsafe.breadcrumb()
                < CommissioningStage::SendComplete.breadcrumb()
        );
    }
}
