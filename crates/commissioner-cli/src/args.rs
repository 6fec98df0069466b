//! Command-line arguments and their mapping onto the engine's inputs.

use std::{str::FromStr, time::Duration};

use clap::{Parser, ValueEnum};
use commissioner_core::{CommissionerConfig, CommissioningParameters, params::WiFiCredentials};
use commissioner_harness::{DeviceNetwork, FaultPlan};

/// Commission a simulated device.
#[derive(Debug, Parser)]
#[command(name = "commissioner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Seed for the simulated world.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Network interfaces the simulated device exposes.
    #[arg(long, value_enum, default_value_t = Network::OnNetwork)]
    pub network: Network,

    /// Wi-Fi SSID to provision.
    #[arg(long, requires = "passphrase")]
    pub ssid: Option<String>,

    /// Wi-Fi passphrase.
    #[arg(long, requires = "ssid")]
    pub passphrase: Option<String>,

    /// Thread operational dataset, hex encoded.
    #[arg(long)]
    pub thread_dataset: Option<HexBytes>,

    /// Ask the device to scan for networks first.
    #[arg(long)]
    pub scan: bool,

    /// Fail-safe armed at the start of the attempt.
    #[arg(long, default_value_t = 60)]
    pub fail_safe_secs: u16,

    /// Per-command exchange timeout.
    #[arg(long, default_value_t = 30)]
    pub command_timeout_secs: u64,

    /// CASE retries after the first attempt.
    #[arg(long, default_value_t = 2)]
    pub max_case_retries: u8,

    /// Attribute paths per read request.
    #[arg(long, default_value_t = 9)]
    pub max_paths_per_read: usize,

    /// Leave `CommissioningComplete` unsent.
    #[arg(long)]
    pub skip_complete: bool,

    /// Hold after attestation and approve after this many simulated seconds.
    #[arg(long)]
    pub attestation_hold_secs: Option<u64>,

    /// Fail-safe to request while an attestation decision is pending.
    #[arg(long, requires = "attestation_hold_secs")]
    pub hold_fail_safe_secs: Option<u16>,

    /// Number of CASE handshakes that fail before one succeeds.
    #[arg(long, default_value_t = 0)]
    pub case_failures: u32,

    /// Simulated latency of every response.
    #[arg(long, default_value_t = 100)]
    pub latency_ms: u64,

    /// Real time to wait between simulation steps.
    #[arg(long, default_value_t = 0)]
    pub pace_ms: u64,
}

/// Interfaces of the simulated device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Network {
    /// Already on the operational network
    #[default]
    OnNetwork,
    /// Wi-Fi only
    Wifi,
    /// Thread only
    Thread,
    /// Wi-Fi and Thread
    Dual,
}

/// Bytes parsed from a hex string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

impl FromStr for HexBytes {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        hex::decode(s.trim_start_matches("0x")).map(Self)
    }
}

impl Cli {
    /// Engine configuration.
    pub fn config(&self) -> CommissionerConfig {
        CommissionerConfig {
            fail_safe_expiry_seconds: self.fail_safe_secs,
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            max_case_retries: self.max_case_retries,
            max_paths_per_read: self.max_paths_per_read,
            ..CommissionerConfig::default()
        }
    }

    /// Parameters for the attempt.
    pub fn params(&self) -> CommissioningParameters {
        let wifi_credentials = self.ssid.as_ref().map(|ssid| WiFiCredentials {
            ssid: ssid.as_bytes().to_vec(),
            credentials: self.passphrase.clone().unwrap_or_default().into_bytes(),
        });
        CommissioningParameters {
            wifi_credentials,
            thread_operational_dataset: self.thread_dataset.clone().map(|d| d.0),
            attempt_wifi_network_scan: self.scan
                && matches!(self.network, Network::Wifi | Network::Dual),
            attempt_thread_network_scan: self.scan
                && matches!(self.network, Network::Thread | Network::Dual),
            skip_commissioning_complete: self.skip_complete,
            ..CommissioningParameters::default()
        }
    }

    /// Faults to inject.
    pub fn faults(&self) -> FaultPlan {
        FaultPlan::new()
            .fail_case(self.case_failures)
            .latency(Duration::from_millis(self.latency_ms))
    }

    /// Device-side network configuration.
    pub fn device_network(&self) -> DeviceNetwork {
        match self.network {
            Network::OnNetwork => DeviceNetwork::on_network(),
            Network::Wifi => DeviceNetwork::wifi(),
            Network::Thread => DeviceNetwork::thread(),
            Network::Dual => DeviceNetwork::dual(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("commissioner").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_match_engine_defaults() {
        let cli = parse(&[]).expect("defaults parse");
        assert_eq!(cli.config(), CommissionerConfig::default());
        assert_eq!(cli.params(), CommissioningParameters::default());
        assert_eq!(cli.network, Network::OnNetwork);
    }

    #[test]
    fn wifi_arguments() {
        let cli = parse(&["--network", "wifi", "--ssid", "home", "--passphrase", "secret", "--scan"])
            .expect("parse");
        let params = cli.params();
        let wifi = params.wifi_credentials.expect("credentials");
        assert_eq!(wifi.ssid, b"home");
        assert_eq!(wifi.credentials, b"secret");
        assert!(params.attempt_wifi_network_scan);
        assert!(!params.attempt_thread_network_scan);
    }

    #[test]
    fn ssid_requires_passphrase() {
        assert!(parse(&["--ssid", "home"]).is_err());
    }

    #[test]
    fn thread_dataset_is_hex() {
        let cli = parse(&["--network", "thread", "--thread-dataset", "0x0208aabbccddeeff0011"])
            .expect("parse");
        assert_eq!(
            cli.params().thread_operational_dataset,
            Some(vec![0x02, 0x08, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11])
        );
        assert!(parse(&["--thread-dataset", "zz"]).is_err());
    }

    #[test]
    fn hold_fail_safe_requires_hold() {
        assert!(parse(&["--hold-fail-safe-secs", "300"]).is_err());
        assert!(parse(&["--attestation-hold-secs", "5", "--hold-fail-safe-secs", "300"]).is_ok());
    }

    #[test]
    fn timing_arguments_reach_config() {
        let cli = parse(&["--fail-safe-secs", "120", "--command-timeout-secs", "10"]).expect("parse");
        let config = cli.config();
        assert_eq!(config.fail_safe_expiry_seconds, 120);
        assert_eq!(config.command_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }
}
