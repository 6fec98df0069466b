//! Commissioner configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::CommissioningError;

/// Commissioner configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommissionerConfig {
    /// Fail-safe duration armed at the start of an attempt, unless the
    /// parameters override it
    pub fail_safe_expiry_seconds: u16,
    /// Per-call exchange timeout for device-facing requests
    pub command_timeout: Duration,
    /// Worst-case round trip of an initial CASE message; added to the
    /// fail-safe before network enable
    pub case_sigma1_worst_case_rtt: Duration,
    /// Automatic CASE establishment retries after the first attempt
    pub max_case_retries: u8,
    /// Number of commissionee proxies that may exist at once
    pub proxy_pool_capacity: usize,
    /// Attribute paths carried by one read request
    pub max_paths_per_read: usize,
}

impl Default for CommissionerConfig {
    fn default() -> Self {
        Self {
            fail_safe_expiry_seconds: 60,
            command_timeout: Duration::from_secs(30),
            case_sigma1_worst_case_rtt: Duration::from_secs(10),
            max_case_retries: 2,
            proxy_pool_capacity: 4,
            max_paths_per_read: 9,
        }
    }
}

impl CommissionerConfig {
    /// Check internal consistency.
    ///
    /// The fail-safe must outlast a single exchange, otherwise the device
    /// could revert while the commissioner is still waiting for a reply.
    pub fn validate(&self) -> Result<(), CommissioningError> {
        if Duration::from_secs(self.fail_safe_expiry_seconds.into()) <= self.command_timeout {
            return Err(CommissioningError::InvalidArgument(
                "fail-safe expiry must exceed the per-call command timeout",
            ));
        }
        if self.max_paths_per_read == 0 {
            return Err(CommissioningError::InvalidArgument("read capacity must be non-zero"));
        }
        if self.proxy_pool_capacity == 0 {
            return Err(CommissioningError::InvalidArgument("proxy pool capacity must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(CommissionerConfig::default().validate().is_ok());
    }

    #[test]
    fn fail_safe_shorter_than_timeout_is_rejected() {
        let config = CommissionerConfig {
            fail_safe_expiry_seconds: 10,
            command_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CommissioningError::InvalidArgument(_))));
    }

    #[test]
    fn zero_read_capacity_is_rejected() {
        let config = CommissionerConfig { max_paths_per_read: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
