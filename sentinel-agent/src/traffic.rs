use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// One observed flow: who sent it and its numeric features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRow {
    pub source_ip: String,
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficBatch {
    pub rows: Vec<TrafficRow>,
}

impl TrafficBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Anything that can hand an agent its next batch of traffic.
pub trait TrafficSource: Send + Sync {
    fn next_batch(&mut self) -> TrafficBatch;
}

/// Seeded synthetic traffic.
///
/// Normal rows draw every feature from `[0, 1)`. With probability
/// `anomaly_rate` a batch also carries a burst from a few hostile hosts whose
/// rows are shifted up by `anomaly_magnitude` on a random subset of features.
#[derive(Debug, Clone)]
pub struct SyntheticTraffic {
    rng: StdRng,
    feature_dim: usize,
    batch_size: usize,
    anomaly_rate: f64,
    anomaly_magnitude: f64,
}

const HOSTILE_POOL: [&str; 8] = [
    "203.0.113.5",
    "203.0.113.17",
    "203.0.113.42",
    "198.51.100.7",
    "198.51.100.23",
    "198.51.100.99",
    "192.0.2.14",
    "192.0.2.200",
];

impl SyntheticTraffic {
    pub fn new(seed: u64, feature_dim: usize, batch_size: usize, anomaly_rate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            feature_dim,
            batch_size,
            anomaly_rate: if anomaly_rate.is_finite() { anomaly_rate.clamp(0.0, 1.0) } else { 0.0 },
            anomaly_magnitude: 4.0,
        }
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.anomaly_magnitude = magnitude;
        self
    }

    fn normal_row(&mut self) -> TrafficRow {
        let source_ip = format!("10.0.{}.{}", self.rng.gen_range(0..4), self.rng.gen_range(1..255));
        let features = (0..self.feature_dim).map(|_| self.rng.gen::<f64>()).collect();
        TrafficRow { source_ip, features }
    }

    fn burst(&mut self) -> Vec<TrafficRow> {
        let hosts = self.rng.gen_range(1..=3);
        let sources: Vec<&str> = HOSTILE_POOL.choose_multiple(&mut self.rng, hosts).copied().collect();

        // Which features the attack inflates; at least one
        let mut elevated: Vec<bool> = (0..self.feature_dim).map(|_| self.rng.gen_bool(0.6)).collect();
        if !elevated.iter().any(|e| *e) && self.feature_dim > 0 {
            let idx = self.rng.gen_range(0..self.feature_dim);
            elevated[idx] = true;
        }

        let rows_per_host = (self.batch_size / 10).max(1);
        let mut rows = Vec::with_capacity(hosts * rows_per_host);
        for source in sources {
            for _ in 0..rows_per_host {
                let features = elevated
                    .iter()
                    .map(|up| {
                        let base = self.rng.gen::<f64>();
                        if *up {
                            base + self.anomaly_magnitude
                        } else {
                            base
                        }
                    })
                    .collect();
                rows.push(TrafficRow { source_ip: source.to_string(), features });
            }
        }
        rows
    }
}

impl TrafficSource for SyntheticTraffic {
    fn next_batch(&mut self) -> TrafficBatch {
        let mut rows: Vec<TrafficRow> = (0..self.batch_size).map(|_| self.normal_row()).collect();
        if self.rng.gen_bool(self.anomaly_rate) {
            rows.extend(self.burst());
        }
        TrafficBatch { rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_traffic() {
        let mut a = SyntheticTraffic::new(7, 4, 20, 0.5);
        let mut b = SyntheticTraffic::new(7, 4, 20, 0.5);
        for _ in 0..5 {
            assert_eq!(a.next_batch(), b.next_batch());
        }
    }

    #[test]
    fn test_no_anomalies_when_rate_is_zero() {
        let mut traffic = SyntheticTraffic::new(1, 3, 16, 0.0);
        for _ in 0..10 {
            let batch = traffic.next_batch();
            assert_eq!(batch.len(), 16);
            assert!(batch.rows.iter().all(|r| r.features.iter().all(|f| (0.0..1.0).contains(f))));
            assert!(batch.rows.iter().all(|r| r.source_ip.starts_with("10.0.")));
        }
    }

    #[test]
    fn test_non_finite_rate_means_no_bursts() {
        for rate in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut traffic = SyntheticTraffic::new(5, 2, 8, rate);
            for _ in 0..5 {
                let batch = traffic.next_batch();
                assert_eq!(batch.len(), 8);
                assert!(batch.rows.iter().all(|r| r.source_ip.starts_with("10.0.")));
            }
        }
    }

    #[test]
    fn test_burst_rows_come_from_hostile_pool() {
        let mut traffic = SyntheticTraffic::new(3, 4, 20, 1.0);
        let batch = traffic.next_batch();
        let hostile: Vec<&TrafficRow> = batch.rows.iter().filter(|r| !r.source_ip.starts_with("10.0.")).collect();

        assert!(!hostile.is_empty());
        assert!(hostile.iter().all(|r| HOSTILE_POOL.contains(&r.source_ip.as_str())));
        assert!(hostile.iter().all(|r| r.features.iter().any(|f| *f >= 4.0)));
    }
}
