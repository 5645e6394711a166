use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "sentinel-node")]
#[command(about = "Collaborative anomaly detection with ledger consensus")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the simulation
    Run {
        #[arg(short, long, value_name = "FILE", default_value = "config.json")]
        config: PathBuf,
        #[command(flatten)]
        overrides: RunOverrides,
    },
    /// Write the default configuration
    InitConfig {
        #[arg(short, long, value_name = "FILE", default_value = "config.json")]
        config: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Dump the ledger as JSON
    Audit {
        #[arg(short, long, value_name = "FILE", default_value = "config.json")]
        config: PathBuf,
        #[arg(short, long, value_name = "OUT")]
        out: Option<PathBuf>,
    },
}

impl Commands {
    pub fn config_path(&self) -> &PathBuf {
        match self {
            Commands::Run { config, .. } | Commands::InitConfig { config, .. } | Commands::Audit { config, .. } => {
                config
            }
        }
    }
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunOverrides {
    #[arg(long)]
    pub steps: Option<u64>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
    #[arg(long)]
    pub agents: Option<usize>,
    /// Keep the ledger in memory
    #[arg(long)]
    pub in_memory: bool,
}

impl RunOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.display().to_string();
        }
        if let Some(agents) = self.agents {
            config.agents = agents;
        }
        if self.in_memory {
            config.in_memory = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "sentinel-node",
            "run",
            "--config",
            "nodes/a/config.json",
            "--steps",
            "3",
            "--seed",
            "9",
            "--in-memory",
        ])
        .unwrap();

        let Commands::Run { config, overrides } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(config, PathBuf::from("nodes/a/config.json"));

        let mut cfg = Config::default();
        overrides.apply(&mut cfg);
        assert_eq!(cfg.steps, 3);
        assert_eq!(cfg.seed, 9);
        assert!(cfg.in_memory);
        assert_eq!(cfg.agents, Config::default().agents);
    }

    #[test]
    fn test_parse_audit_and_init() {
        let cli = Cli::try_parse_from(["sentinel-node", "audit", "--out", "audit.json"]).unwrap();
        assert_eq!(cli.command.config_path(), &PathBuf::from("config.json"));
        assert!(matches!(cli.command, Commands::Audit { out: Some(_), .. }));

        let cli = Cli::try_parse_from(["sentinel-node", "init-config", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::InitConfig { force: true, .. }));
    }
}
