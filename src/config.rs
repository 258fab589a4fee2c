//! Node configuration
//!
//! Defaults cover a throwaway local chain. A JSON file can override any
//! field, and CLI flags override the file.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::amount::Amount;
use crate::core::blockchain::{ChainConfig, MemChain, DEFAULT_NETWORK_ID};
use crate::core::fee::DEFAULT_FEE_PER_GAS;
use crate::crypto::{KeyError, KeyPair, KeyStore};
use crate::mining::producer::{BlockProducer, DEFAULT_BLOCK_TIME_STEP};
use crate::runner::{Runner, RunnerContext};

/// Whole DNA credited to the god address at genesis
pub const DEFAULT_GOD_BALANCE: i64 = 1_000_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid god key: {0}")]
    Key(#[from] KeyError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    /// Hex private key of the god account; generated when absent
    pub god_private_key: Option<String>,
    pub god_balance: Amount,
    pub fee_per_gas: Amount,
    /// Seconds added to the parent timestamp for each generated block
    pub block_time_step: i64,
    pub network_id: u32,
    /// Unix seconds; the current time when absent
    pub genesis_timestamp: Option<i64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9009,
            god_private_key: None,
            god_balance: Amount::from_whole(DEFAULT_GOD_BALANCE),
            fee_per_gas: DEFAULT_FEE_PER_GAS.parse().unwrap_or_else(|_| Amount::zero()),
            block_time_step: DEFAULT_BLOCK_TIME_STEP,
            network_id: DEFAULT_NETWORK_ID,
            genesis_timestamp: None,
        }
    }
}

impl NodeConfig {
    /// Load and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&data)?;
        config.validate()?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_time_step <= 0 {
            return Err(ConfigError::Invalid(format!(
                "blockTimeStep must be positive, got {}",
                self.block_time_step
            )));
        }
        if self.god_balance.is_negative() {
            return Err(ConfigError::Invalid("godBalance is negative".to_string()));
        }
        if self.fee_per_gas.is_negative() {
            return Err(ConfigError::Invalid("feePerGas is negative".to_string()));
        }
        if let Some(key) = &self.god_private_key {
            KeyPair::from_private_key_hex(key)?;
        }
        Ok(())
    }

    /// `host:port` to bind the RPC server to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn god_key(&self) -> Result<KeyPair, ConfigError> {
        match &self.god_private_key {
            Some(key) => Ok(KeyPair::from_private_key_hex(key)?),
            None => {
                warn!("No god key configured, generating one");
                Ok(KeyPair::generate())
            }
        }
    }

    /// Create the chain and a runner whose god key is also the validator
    pub fn build_runner(&self) -> Result<(Runner<MemChain>, KeyPair), ConfigError> {
        self.validate()?;
        let god = self.god_key()?;
        let chain = MemChain::new(ChainConfig {
            network_id: self.network_id,
            validator: god.address(),
            alloc: vec![(god.address(), self.god_balance.clone())],
            fee_per_gas: self.fee_per_gas.clone(),
            genesis_timestamp: self
                .genesis_timestamp
                .unwrap_or_else(|| chrono::Utc::now().timestamp()),
        });

        let mut keys = KeyStore::new();
        let god_address = keys.add(god.clone());
        let context = RunnerContext::new(Some(god_address), keys);
        let producer = BlockProducer::new(god.clone(), self.block_time_step);
        Ok((Runner::new(context, chain, producer), god))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::LedgerEngine;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.block_time_step, 20);
        assert_eq!(config.god_balance, Amount::from_whole(1_000_000));
        assert_eq!(config.bind_address(), "127.0.0.1:9009");
    }

    #[test]
    fn test_load_partial_file() {
        let key = KeyPair::generate();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"port": 7000, "godPrivateKey": "{}", "godBalance": "25.5", "genesisTimestamp": 500}}"#,
            key.private_key_hex()
        )
        .unwrap();

        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.host, "127.0.0.1");

        let (runner, god) = config.build_runner().unwrap();
        assert_eq!(god.address(), key.address());
        assert_eq!(runner.god_address(), Some(key.address()));
        assert_eq!(runner.balance(&key.address()), "25.5".parse().unwrap());
        assert_eq!(runner.chain.head().timestamp(), 500);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"blockTimeStep": 0}}"#).unwrap();
        assert!(matches!(
            NodeConfig::load(file.path()),
            Err(ConfigError::Invalid(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"godPrivateKey": "not-a-key"}}"#).unwrap();
        assert!(matches!(NodeConfig::load(file.path()), Err(ConfigError::Key(_))));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{").unwrap();
        assert!(matches!(NodeConfig::load(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_generated_god_can_produce_blocks() {
        let (mut runner, _) = NodeConfig::default().build_runner().unwrap();
        runner.generate_blocks(2);
        assert_eq!(runner.head().height, 2);
    }
}
