//! utils.rs
//!
//! Small helpers shared across Sentinel: agent identifiers and clock access.

pub mod agent_id;
pub use agent_id::AgentId;

pub mod time;
