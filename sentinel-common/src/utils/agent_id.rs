use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an agent inside one simulation.
///
/// Ordered numerically so the scheduler can iterate agents deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

impl From<u32> for AgentId {
    fn from(value: u32) -> Self {
        AgentId(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_order() {
        let a = AgentId::from(2);
        let b = AgentId(10);
        assert_eq!(a.to_string(), "agent-2");
        assert!(a < b);
    }
}
