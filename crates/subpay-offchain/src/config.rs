//! Protocol configuration.
//!
//! Loaded from JSON, with `SUBPAY_NETWORK` and `SUBPAY_BLUEPRINT` overriding
//! the file's network and blueprint path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use subpay_types::Network;

use crate::error::{ProtocolError, Result};

/// Default validity window: 15 minutes.
pub const DEFAULT_TX_TTL_MS: u64 = 15 * 60 * 1000;

/// Blueprint titles of the protocol's validators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorTitles {
    pub service: String,
    pub account: String,
    pub payment: String,
    pub multisig: String,
}

impl Default for ValidatorTitles {
    fn default() -> Self {
        Self {
            service: "service_multi_validator.mint".to_string(),
            account: "account_multi_validator.mint".to_string(),
            payment: "payment_multi_validator.mint".to_string(),
            multisig: "multisig_validator.mint".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub network: Network,
    /// Path of the compiled-script artifact.
    pub blueprint: PathBuf,
    pub validators: ValidatorTitles,
    /// Upper validity bound added to a workflow's `current_time`.
    pub tx_ttl_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            network: Network::Preview,
            blueprint: PathBuf::from("plutus.json"),
            validators: ValidatorTitles::default(),
            tx_ttl_ms: DEFAULT_TX_TTL_MS,
        }
    }
}

impl ProtocolConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s).map_err(|e| ProtocolError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&s)
    }

    /// Apply `SUBPAY_NETWORK` / `SUBPAY_BLUEPRINT` when set.
    pub fn apply_env(self) -> Result<Self> {
        let network = std::env::var("SUBPAY_NETWORK").ok();
        let blueprint = std::env::var("SUBPAY_BLUEPRINT").ok();
        self.apply_overrides(network.as_deref(), blueprint.as_deref())
    }

    pub fn apply_overrides(mut self, network: Option<&str>, blueprint: Option<&str>) -> Result<Self> {
        if let Some(network) = network {
            self.network = network.parse().map_err(ProtocolError::InvalidConfig)?;
        }
        if let Some(blueprint) = blueprint {
            self.blueprint = PathBuf::from(blueprint);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tx_ttl_ms == 0 {
            return Err(ProtocolError::InvalidConfig("tx_ttl_ms must be positive".into()));
        }
        let titles = [
            &self.validators.service,
            &self.validators.account,
            &self.validators.payment,
            &self.validators.multisig,
        ];
        if titles.iter().any(|t| t.trim().is_empty()) {
            return Err(ProtocolError::InvalidConfig("validator titles must not be empty".into()));
        }
        Ok(())
    }
}
