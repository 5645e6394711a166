use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use sentinel_agent::AgentConfig;
use sentinel_common::{Result, SentinelError};
use sentinel_consensus::{QuorumPolicy, SchedulerConfig};
use sentinel_ledger::RetryPolicy;

/// Shape of the synthetic traffic every agent observes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficSettings {
    pub feature_dim: usize,
    pub batch_size: usize,
    /// Chance per batch of an injected burst.
    pub anomaly_rate: f64,
    pub anomaly_magnitude: f64,
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self { feature_dim: 4, batch_size: 50, anomaly_rate: 0.3, anomaly_magnitude: 4.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub detection_threshold: f64,
    pub validation_threshold: f64,
    /// Per-row z-score above which a row counts as anomalous.
    pub row_cutoff: f64,
    /// Initial known-anomaly centroid. Derived from the traffic shape when unset.
    pub anomaly_prior: Option<Vec<f64>>,
    pub blacklist_ttl_secs: Option<u64>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            detection_threshold: 3.0,
            validation_threshold: 0.65,
            row_cutoff: 3.0,
            anomaly_prior: None,
            blacklist_ttl_secs: None,
        }
    }
}

impl AgentSettings {
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            detection_threshold: self.detection_threshold,
            validation_threshold: self.validation_threshold,
            blacklist_ttl: self.blacklist_ttl_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run name, used for the audit log file.
    pub name: String,
    pub data_dir: String,
    /// Keep the ledger in memory instead of `<data_dir>/ledger.redb`.
    pub in_memory: bool,
    pub seed: u64,
    pub agents: usize,
    /// Steps to run; 0 runs until interrupted.
    pub steps: u64,
    pub step_interval_ms: u64,
    pub traffic: TrafficSettings,
    pub agent: AgentSettings,
    pub quorum_policy: QuorumPolicy,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub validation_workers: usize,
    pub parallel_threshold: usize,
    /// Where to write the ledger audit once the run ends.
    pub audit_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "sentinel".to_string(),
            data_dir: "data/ledger".to_string(),
            in_memory: false,
            seed: 42,
            agents: 5,
            steps: 20,
            step_interval_ms: 500,
            traffic: TrafficSettings::default(),
            agent: AgentSettings::default(),
            quorum_policy: QuorumPolicy::default(),
            retry_attempts: 3,
            retry_backoff_ms: 25,
            validation_workers: 4,
            parallel_threshold: 8,
            audit_path: None,
        }
    }
}

impl Config {
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let parsed = serde_json::from_str::<Config>(&data)
            .map_err(|e| SentinelError::Config(format!("{}: {}", path.display(), e)))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        fn bad(msg: String) -> Result<()> {
            Err(SentinelError::Config(msg))
        }

        if self.agents == 0 {
            return bad("agents must be at least 1".into());
        }
        if self.traffic.feature_dim == 0 || self.traffic.batch_size == 0 {
            return bad("traffic.feature_dim and traffic.batch_size must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.traffic.anomaly_rate) {
            return bad(format!("traffic.anomaly_rate must be in [0, 1], got {}", self.traffic.anomaly_rate));
        }
        for (field, value) in [
            ("agent.detection_threshold", self.agent.detection_threshold),
            ("agent.validation_threshold", self.agent.validation_threshold),
            ("agent.row_cutoff", self.agent.row_cutoff),
            ("traffic.anomaly_magnitude", self.traffic.anomaly_magnitude),
        ] {
            if !value.is_finite() {
                return bad(format!("{} must be finite", field));
            }
        }
        if let Some(prior) = &self.agent.anomaly_prior {
            if prior.len() != self.traffic.feature_dim {
                return bad(format!(
                    "agent.anomaly_prior has {} values, traffic.feature_dim is {}",
                    prior.len(),
                    self.traffic.feature_dim
                ));
            }
        }
        if self.retry_attempts == 0 {
            return bad("retry_attempts must be at least 1".into());
        }
        if self.validation_workers == 0 {
            return bad("validation_workers must be at least 1".into());
        }
        self.quorum_policy.validate()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            quorum: self.quorum_policy.clone(),
            validation_workers: self.validation_workers,
            parallel_threshold: self.parallel_threshold,
        }
    }

    /// The configured prior, or the centroid of an average burst: half a
    /// unit of baseline plus the magnitude on the ~60% of features a burst
    /// inflates.
    pub fn anomaly_prior(&self) -> Vec<f64> {
        self.agent.anomaly_prior.clone().unwrap_or_else(|| {
            vec![0.5 + 0.6 * self.traffic.anomaly_magnitude; self.traffic.feature_dim]
        })
    }
}
