use tokio::sync::watch;

use sentinel_common::AgentId;
use sentinel_ledger::{Ledger, RetryPolicy};
use sentinel_node::{audit::AuditReport, build_runtime, run_simulation, setup::ensure_config, Config};

fn quick_config() -> Config {
    let mut config = Config {
        in_memory: true,
        seed: 7,
        agents: 4,
        steps: 12,
        step_interval_ms: 0,
        ..Config::default()
    };
    config.traffic.anomaly_rate = 0.6;
    config
}

fn running() -> watch::Receiver<bool> {
    watch::channel(false).1
}

#[tokio::test]
async fn test_every_appended_signature_gets_decided() {
    let mut runtime = build_runtime(quick_config()).await.unwrap();
    let summary = run_simulation(&mut runtime, running()).await.unwrap();

    assert_eq!(summary.steps_completed, 12);
    assert!(!summary.interrupted);
    assert!(summary.proposals > 0, "a 60% burst rate should produce proposals");
    assert_eq!(summary.dropped, 0);
    assert_eq!(summary.accepted + summary.rejected, summary.ledger_len);

    let records = runtime.ledger.read_all().await.unwrap();
    for (pos, record) in records.iter().enumerate() {
        assert_eq!(record.id, pos as u64 + 1);
        assert!(runtime.scheduler.is_decided(record.id));
    }

    // Every agent has caught up with the ledger
    for agent in runtime.scheduler.agents() {
        assert_eq!(agent.read().await.last_seen_ledger_id(), records.len() as u64);
    }
}

#[tokio::test]
async fn test_same_seed_same_outcome() {
    let mut first = build_runtime(quick_config()).await.unwrap();
    let mut second = build_runtime(quick_config()).await.unwrap();

    let a = run_simulation(&mut first, running()).await.unwrap();
    let b = run_simulation(&mut second, running()).await.unwrap();
    assert_eq!(a, b);

    let shape = |records: &[sentinel_common::SignatureRecord]| -> Vec<(AgentId, Vec<f64>)> {
        records.iter().map(|r| (r.origin, r.feature_vector.clone())).collect()
    };
    let left = first.ledger.read_all().await.unwrap();
    let right = second.ledger.read_all().await.unwrap();
    assert_eq!(shape(left.as_slice()), shape(right.as_slice()));
}

#[tokio::test]
async fn test_shutdown_before_start_runs_nothing() {
    let mut runtime = build_runtime(quick_config()).await.unwrap();
    let (_tx, rx) = watch::channel(true);

    let summary = run_simulation(&mut runtime, rx).await.unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.steps_completed, 0);
    assert_eq!(summary.ledger_len, 0);
}

#[tokio::test]
async fn test_file_backed_run_can_be_audited_and_resumed() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("lab").join("config.json");
    assert!(ensure_config(&config_path).unwrap());

    let mut config = Config::load_from_file(&config_path).unwrap();
    config.data_dir = dir.path().join("ledger").display().to_string();
    config.steps = 5;
    config.step_interval_ms = 0;
    config.traffic.anomaly_rate = 1.0;
    config.audit_path = Some(dir.path().join("audit.json").display().to_string());

    let first_len = {
        let mut runtime = build_runtime(config.clone()).await.unwrap();
        let summary = run_simulation(&mut runtime, running()).await.unwrap();

        let audit = AuditReport::collect(&runtime.ledger, &runtime.reports.reports()).await.unwrap();
        assert_eq!(audit.total, summary.ledger_len);
        assert_eq!(audit.decisions.len(), summary.ledger_len);
        audit.write_to(config.audit_path.as_ref().unwrap()).unwrap();
        summary.ledger_len
    };
    assert!(first_len > 0);

    // The ledger survives the runtime and keeps its counter
    let reopened = Ledger::open(&config.data_dir, RetryPolicy::default()).await.unwrap();
    assert_eq!(reopened.len().unwrap(), first_len);
    drop(reopened);

    let mut resumed = build_runtime(config).await.unwrap();
    run_simulation(&mut resumed, running()).await.unwrap();
    let records = resumed.ledger.read_all().await.unwrap();
    assert!(records.len() > first_len);
    assert_eq!(records.last().unwrap().id, records.len() as u64);
}

#[tokio::test]
async fn test_reopened_ledger_is_not_decided_again() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config {
        data_dir: dir.path().join("ledger").display().to_string(),
        seed: 11,
        agents: 4,
        steps: 5,
        step_interval_ms: 0,
        ..Config::default()
    };
    config.traffic.anomaly_rate = 1.0;

    let old_last = {
        let mut runtime = build_runtime(config.clone()).await.unwrap();
        run_simulation(&mut runtime, running()).await.unwrap();
        runtime.ledger.last_id().unwrap()
    };
    assert!(old_last > 0);

    let mut resumed = build_runtime(config).await.unwrap();
    assert!(resumed.scheduler.is_decided(old_last));
    for agent in resumed.scheduler.agents() {
        assert_eq!(agent.read().await.last_seen_ledger_id(), old_last);
    }

    let report = resumed.scheduler.run_step(&running()).await.unwrap();
    assert!(report.is_completed());
    for id in report.accepted.iter().chain(&report.rejected) {
        assert!(*id > old_last, "signature {} was already decided before the reopen", id);
    }
    assert_eq!(report.accepted.len() + report.rejected.len(), report.appended.len());
}
