use std::time::Duration;

use serde_json::json;

use sentinel_agent::{
    Agent, AgentConfig, AnomalyModel, CentroidModel, Detection, LabeledExample, SyntheticTraffic, TrafficBatch,
    TrafficSource,
};
use sentinel_common::{AgentId, Participant, Result, SignatureDraft, SignatureRecord, Vote};

const DIM: usize = 2;

fn agent(id: u32, traffic: Box<dyn TrafficSource>) -> Agent {
    let model = CentroidModel::uniform_baseline(DIM, 3.0).with_prior(vec![1.5, 1.5]);
    Agent::new(AgentId(id), AgentConfig::default(), Box::new(model), traffic)
}

fn quiet_agent(id: u32) -> Agent {
    agent(id, Box::new(SyntheticTraffic::new(id as u64, DIM, 16, 0.0)))
}

fn record(id: u64, origin: u32, features: Vec<f64>, ips: &[&str]) -> SignatureRecord {
    SignatureDraft::new(AgentId(origin), features, 4.0)
        .with_source_ips(ips.iter().copied())
        .into_record(id)
}

#[test]
fn test_reapplying_accepted_record_is_idempotent() {
    let mut agent = quiet_agent(1);
    let accepted = record(1, 2, vec![5.0, 5.0], &["203.0.113.5", "203.0.113.17"]);

    agent.on_consensus_accept(&accepted).unwrap();
    let centroid_once = agent.model().reference();
    agent.on_consensus_accept(&accepted).unwrap();

    assert_eq!(agent.blacklist().len(), 2);
    assert_eq!(agent.applied_count(), 1);
    assert_eq!(agent.model().reference(), centroid_once);
}

#[test]
fn test_records_from_any_origin_are_applied_identically() {
    let mut own = quiet_agent(1);
    let mut peer = quiet_agent(2);
    let accepted = record(1, 1, vec![5.0, 5.0], &["198.51.100.7"]);

    own.on_consensus_accept(&accepted).unwrap();
    peer.on_consensus_accept(&accepted).unwrap();

    assert_eq!(own.model().reference(), peer.model().reference());
    assert_eq!(
        own.blacklist().entities().collect::<Vec<_>>(),
        peer.blacklist().entities().collect::<Vec<_>>()
    );
}

#[test]
fn test_own_proposal_is_scored_like_a_peer_one() {
    let mut detector = agent(1, Box::new(SyntheticTraffic::new(11, DIM, 40, 1.0)));
    let draft = detector.propose().expect("a burst every batch");
    let own = draft.clone().into_record(1);

    let mut peer_copy = draft.into_record(1);
    peer_copy.origin = AgentId(9);

    let own_vote = detector.validate(&own).unwrap();
    let peer_vote = detector.validate(&peer_copy).unwrap();
    assert_eq!(own_vote.vote, peer_vote.vote);
    assert_eq!(own_vote.similarity, peer_vote.similarity);
}

#[test]
fn test_malformed_records_get_low_confidence_reject() {
    let agent = quiet_agent(1);

    let empty = record(1, 2, Vec::new(), &[]);
    let non_finite = record(2, 2, vec![f64::INFINITY, 1.0], &[]);
    let wrong_width = record(3, 2, vec![5.0, 5.0, 5.0], &[]);
    for bad in [&empty, &non_finite, &wrong_width] {
        let vote = agent.validate(bad).unwrap();
        assert_eq!(vote.vote, Vote::Reject);
        assert_eq!(vote.similarity, 0.0);
    }
}

#[test]
fn test_garbled_metadata_does_not_break_validation() {
    let agent = quiet_agent(1);
    let mut garbled = record(1, 2, vec![5.0, 5.0], &[]);
    garbled.metadata.insert("source_ips".into(), json!({"not": "a list"}));
    garbled.metadata.insert("batch_rows".into(), json!("many"));

    let vote = agent.validate(&garbled).unwrap();
    // Features still decide: the record lines up with the prior
    assert_eq!(vote.vote, Vote::Accept);
    assert!(vote.similarity > 0.99);
}

#[test]
fn test_no_reference_and_no_blacklist_rejects() {
    let model = CentroidModel::uniform_baseline(DIM, 3.0);
    let agent = Agent::new(
        AgentId(1),
        AgentConfig::default(),
        Box::new(model),
        Box::new(SyntheticTraffic::new(1, DIM, 8, 0.0)),
    );

    let vote = agent.validate(&record(1, 2, vec![5.0, 5.0], &["203.0.113.5"])).unwrap();
    assert_eq!(vote.vote, Vote::Reject);
    assert_eq!(vote.similarity, 0.0);
}

#[test]
fn test_quiet_traffic_never_proposes() {
    let mut agent = quiet_agent(4);
    for _ in 0..20 {
        assert!(agent.propose().is_none());
    }
}

/// Model whose score is fixed, to pin the detection threshold edge.
struct FixedScore(f64);

impl AnomalyModel for FixedScore {
    fn dimensions(&self) -> usize {
        DIM
    }

    fn detect(&self, _batch: &TrafficBatch) -> Detection {
        Detection {
            is_anomaly: true,
            score: self.0,
            feature_vector: vec![5.0, 5.0],
            sources: vec!["203.0.113.5".into()],
        }
    }

    fn reference(&self) -> Option<Vec<f64>> {
        None
    }

    fn similarity(&self, _features: &[f64]) -> Option<f64> {
        None
    }

    fn retrain(&self, _example: &LabeledExample) -> Result<Box<dyn AnomalyModel>> {
        Ok(Box::new(FixedScore(self.0)))
    }
}

#[test]
fn test_score_must_exceed_detection_threshold() {
    let config = AgentConfig { detection_threshold: 3.0, ..AgentConfig::default() };
    let traffic = || Box::new(SyntheticTraffic::new(2, DIM, 4, 0.0));

    let mut at_threshold = Agent::new(AgentId(1), config.clone(), Box::new(FixedScore(3.0)), traffic());
    assert!(at_threshold.propose().is_none());

    let mut above = Agent::new(AgentId(2), config, Box::new(FixedScore(3.01)), traffic());
    assert!(above.propose().is_some());
}

#[test]
fn test_blacklist_entries_expire_with_ttl() {
    let config = AgentConfig { blacklist_ttl: Some(Duration::from_millis(0)), ..AgentConfig::default() };
    let model = CentroidModel::uniform_baseline(DIM, 3.0).with_prior(vec![1.5, 1.5]);
    let mut agent =
        Agent::new(AgentId(1), config, Box::new(model), Box::new(SyntheticTraffic::new(5, DIM, 8, 0.0)));

    agent.on_consensus_accept(&record(1, 2, vec![5.0, 5.0], &["192.0.2.14"])).unwrap();
    assert_eq!(agent.blacklist().len(), 1);

    // Expiry runs at the start of every proposal round
    agent.propose();
    assert!(agent.blacklist().is_empty());
}
