use std::collections::BTreeMap;
use std::{fs, path::Path};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use sentinel_common::{Result, SignatureRecord};
use sentinel_consensus::StepReport;
use sentinel_ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

/// Snapshot of the ledger, optionally annotated with the consensus decisions
/// of the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub generated_at: String,
    pub total: usize,
    pub last_id: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub decisions: BTreeMap<u64, Decision>,
    pub records: Vec<SignatureRecord>,
}

impl AuditReport {
    pub async fn collect(ledger: &Ledger, reports: &[StepReport]) -> Result<Self> {
        let records = ledger.read_all().await?;

        let mut decisions = BTreeMap::new();
        for report in reports {
            decisions.extend(report.accepted.iter().map(|id| (*id, Decision::Accepted)));
            decisions.extend(report.rejected.iter().map(|id| (*id, Decision::Rejected)));
        }

        Ok(Self {
            generated_at: Utc::now().to_rfc3339(),
            total: records.len(),
            last_id: records.last().map(|r| r.id).unwrap_or(0),
            decisions,
            records: records.as_ref().clone(),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the report to `out`, creating parent directories as needed.
    pub fn write_to<P: AsRef<Path>>(&self, out: P) -> Result<()> {
        let out = out.as_ref();
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(out, self.to_json()?)?;
        info!("📝 Audit of {} signatures written to {}", self.total, out.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_common::{AgentId, SignatureDraft};

    #[tokio::test]
    async fn test_collect_annotates_decisions() {
        let ledger = Ledger::in_memory();
        ledger.append(SignatureDraft::new(AgentId(1), vec![5.0], 4.0)).await.unwrap();
        ledger.append(SignatureDraft::new(AgentId(2), vec![1.0], 3.5)).await.unwrap();

        let mut report = StepReport::new(1);
        report.accepted = vec![1];
        report.rejected = vec![2];

        let audit = AuditReport::collect(&ledger, &[report]).await.unwrap();
        assert_eq!(audit.total, 2);
        assert_eq!(audit.last_id, 2);
        assert_eq!(audit.decisions[&1], Decision::Accepted);
        assert_eq!(audit.decisions[&2], Decision::Rejected);

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("audit").join("ledger.json");
        audit.write_to(&out).unwrap();
        let parsed: AuditReport = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(parsed, audit);
    }

    #[tokio::test]
    async fn test_plain_ledger_dump_has_no_decisions() {
        let ledger = Ledger::in_memory();
        let audit = AuditReport::collect(&ledger, &[]).await.unwrap();
        assert_eq!(audit.total, 0);
        assert!(!audit.to_json().unwrap().contains("decisions"));
    }
}
