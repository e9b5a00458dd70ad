use crate::node::config::NodeConfig;
use crate::node::shell::run_shell;
use crate::node::VoterNode;
use crate::utils::init_logging;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

/// CLI for running a voter.
#[derive(Parser, Debug)]
#[clap(name = "ballotchain", version)]
pub struct Cli {
    /// Path to the TOML config file (defaults apply if it does not exist)
    #[clap(long, default_value = "ballotchain.toml")]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Write a default config file
    Init,
    /// Start voter <ID> and open its prompt
    Run {
        /// voter id; also selects the listen port
        id: u32,

        /// directory of registered voter keys
        #[clap(long)]
        registry_dir: Option<PathBuf>,

        /// first port; voter i listens on port_base + i
        #[clap(long)]
        port_base: Option<u16>,

        #[clap(long)]
        host: Option<String>,

        /// RSA modulus size in bits
        #[clap(long)]
        key_bits: Option<usize>,

        /// tracing filter, e.g. "debug" or "ballotchain=trace"
        #[clap(long)]
        log_level: Option<String>,
    },
}

/// Config file if present, otherwise defaults.
fn load_config(path: &Path) -> Result<NodeConfig> {
    if path.exists() {
        Ok(NodeConfig::load(path)?)
    } else {
        Ok(NodeConfig::default())
    }
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Init => {
            NodeConfig::write_default(&cli.config)?;
            println!("wrote default config to {}", cli.config.display());
            Ok(())
        }
        Cmd::Run { id, registry_dir, port_base, host, key_bits, log_level } => {
            let mut cfg = load_config(&cli.config)?;
            if let Some(dir) = registry_dir {
                cfg.registry_dir = dir;
            }
            if let Some(p) = port_base {
                cfg.port_base = p;
            }
            if let Some(h) = host {
                cfg.host = h;
            }
            if let Some(bits) = key_bits {
                cfg.key_bits = bits;
            }
            if let Some(level) = log_level {
                cfg.log_level = level;
            }
            init_logging(&cfg.log_level);

            let node = VoterNode::start(id, cfg).await?;
            info!(voter = id, addr = %node.listen_addr, "listening");

            tokio::select! {
                res = run_shell(node.voter.clone()) => res?,
                _ = tokio::signal::ctrl_c() => println!(),
            }
            node.stop().await?;
            println!("Voter {} stopped", id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_takes_id_and_overrides() {
        let cli = Cli::parse_from(["ballotchain", "run", "3", "--port-base", "20000", "--key-bits", "1024"]);
        match cli.cmd {
            Cmd::Run { id, port_base, key_bits, registry_dir, .. } => {
                assert_eq!(id, 3);
                assert_eq!(port_base, Some(20_000));
                assert_eq!(key_bits, Some(1024));
                assert!(registry_dir.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(cli.config, PathBuf::from("ballotchain.toml"));
    }

    #[test]
    fn id_is_required() {
        assert!(Cli::try_parse_from(["ballotchain", "run"]).is_err());
    }
}
