//! Autonomous detection agents.
//!
//! An [`Agent`] watches its own slice of traffic, proposes signatures for the
//! anomalies it finds, scores signatures proposed by others, and learns from
//! whatever the population accepts.

pub mod agent;
pub mod blacklist;
pub mod model;
pub mod similarity;
pub mod traffic;

pub use agent::{Agent, AgentConfig};
pub use blacklist::{Blacklist, BlacklistEntry};
pub use model::{AnomalyModel, CentroidModel, Detection, LabeledExample};
pub use traffic::{SyntheticTraffic, TrafficBatch, TrafficRow, TrafficSource};
