use crate::ledger::ProofOfWork;
use crate::utils::{BallotError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Voter process configuration, loaded from TOML. Missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// interface every voter listens on and dials
    pub host: String,
    /// voter `i` listens on `port_base + i`
    pub port_base: u16,
    /// shared directory of `<id>.pem` registrations
    pub registry_dir: PathBuf,
    pub key_bits: usize,
    /// digest prefix every mined block must start with (ASCII)
    pub pow_target: String,
    /// default tracing filter; `RUST_LOG` overrides it
    pub log_level: String,
    pub connect_retries: u32,
    pub connect_backoff_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port_base: 10_000,
            registry_dir: PathBuf::from("./registered_voters"),
            key_bits: 2048,
            pow_target: "0".into(),
            log_level: "info".into(),
            connect_retries: 5,
            connect_backoff_ms: 200,
        }
    }
}

impl NodeConfig {
    /// Load and validate a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let cfg: NodeConfig =
            toml::from_str(&data).map_err(|e| BallotError::ConfigError(format!("{}: {}", path.display(), e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write the default configuration to `path`, refusing to overwrite.
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            return Err(BallotError::ConfigError(format!("{} already exists", path.display())));
        }
        let text = toml::to_string_pretty(&NodeConfig::default())
            .map_err(|e| BallotError::ConfigError(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        // rsa refuses anything smaller, and the 384-bit commitment must fit the modulus
        if self.key_bits < 1024 {
            return Err(BallotError::ConfigError(format!("key_bits must be at least 1024, got {}", self.key_bits)));
        }
        if self.connect_retries == 0 {
            return Err(BallotError::ConfigError("connect_retries must be at least 1".into()));
        }
        self.proof_of_work()?;
        Ok(())
    }

    pub fn proof_of_work(&self) -> Result<ProofOfWork> {
        ProofOfWork::new(self.pow_target.as_bytes().to_vec())
    }

    /// Listen address of voter `id`.
    pub fn voter_addr(&self, id: u32) -> Result<String> {
        let port = u32::from(self.port_base)
            .checked_add(id)
            .filter(|p| *p <= u32::from(u16::MAX))
            .ok_or_else(|| BallotError::ConfigError(format!("voter id {} overflows port range", id)))?;
        Ok(format!("{}:{}", self.host, port))
    }
}
