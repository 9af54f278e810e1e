//! Engine configuration and capability flags
//!
//! One engine serves every release line; behavioral differences between
//! installations are data selected at construction time, not parallel code
//! trees. Configuration is validated fail-fast: a bad value is fatal and
//! never retried.

use std::time::Duration;

use nimbus_common::{Error, Result};

use crate::ipam::SubnetScheme;

/// Backend used to encrypt tenant secrets at rest
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EncrypterBackend {
    /// Provider-managed key service
    #[default]
    Kms,
    /// External Vault deployment
    Vault,
}

impl EncrypterBackend {
    /// Stable identifier handed to the template renderer
    pub fn as_str(self) -> &'static str {
        match self {
            EncrypterBackend::Kms => "kms",
            EncrypterBackend::Vault => "vault",
        }
    }
}

/// Feature set of one engine instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineCapabilities {
    /// Whether node pools exist in this installation (gates the
    /// dependent check before control-plane deletion)
    pub node_pools: bool,
    /// Whether DNS records are part of the rendered stack
    pub route53: bool,
    /// Secret encryption backend
    pub encrypter: EncrypterBackend,
}

impl Default for EngineCapabilities {
    fn default() -> Self {
        Self {
            node_pools: true,
            route53: true,
            encrypter: EncrypterBackend::Kms,
        }
    }
}

/// Engine-wide configuration, validated at construction
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Capability flags for this installation
    pub capabilities: EngineCapabilities,

    /// How parent blocks are carved into zone subnets
    pub subnet_scheme: SubnetScheme,

    /// Best-effort window to confirm a stack creation before the pass ends
    pub create_confirmation_timeout: Duration,

    /// How long to wait for a master instance to reach a settled state
    pub instance_stop_timeout: Duration,

    /// Interval between polls inside the bounded waits
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capabilities: EngineCapabilities::default(),
            subnet_scheme: SubnetScheme::default(),
            create_confirmation_timeout: Duration::from_secs(120),
            instance_stop_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(10),
        }
    }
}

impl EngineConfig {
    /// Validate value-level configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::configuration(
                "poll_interval",
                "poll interval must be non-zero",
            ));
        }
        if self.instance_stop_timeout < self.poll_interval {
            return Err(Error::configuration(
                "instance_stop_timeout",
                "stop timeout must be at least one poll interval",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let config = EngineConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            Error::Configuration { .. }
        ));
    }

    #[test]
    fn stop_timeout_shorter_than_poll_is_rejected() {
        let config = EngineConfig {
            instance_stop_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_secs(10),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn encrypter_backend_identifiers() {
        assert_eq!(EncrypterBackend::Kms.as_str(), "kms");
        assert_eq!(EncrypterBackend::Vault.as_str(), "vault");
    }
}
