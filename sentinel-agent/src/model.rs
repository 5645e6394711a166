use std::collections::BTreeSet;

use sentinel_common::{Result, SentinelError};

use crate::{
    similarity::cosine_similarity,
    traffic::{TrafficBatch, TrafficRow},
};

/// Outcome of running detection over one traffic batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub is_anomaly: bool,
    pub score: f64,
    pub feature_vector: Vec<f64>,
    pub sources: Vec<String>,
}

impl Detection {
    pub fn quiet(score: f64) -> Self {
        Self { is_anomaly: false, score, feature_vector: Vec::new(), sources: Vec::new() }
    }
}

/// A signature the population agreed is anomalous.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledExample {
    pub signature_id: u64,
    pub features: Vec<f64>,
}

/// Local anomaly-detection model of an agent.
///
/// Models are never mutated in place: `retrain` hands back the next model and
/// the agent swaps its reference.
pub trait AnomalyModel: Send + Sync {
    fn dimensions(&self) -> usize;

    fn detect(&self, batch: &TrafficBatch) -> Detection;

    /// Centroid of the anomalies this model has learned, if any.
    fn reference(&self) -> Option<Vec<f64>>;

    /// How close `features` is to the anomalies this model knows about.
    /// `None` when the model has nothing to compare against yet.
    fn similarity(&self, features: &[f64]) -> Option<f64>;

    fn retrain(&self, example: &LabeledExample) -> Result<Box<dyn AnomalyModel>>;
}

/// Z-score detector with a running centroid of known anomalies.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidModel {
    baseline_mean: Vec<f64>,
    baseline_std: Vec<f64>,
    row_cutoff: f64,
    centroid: Option<Vec<f64>>,
    examples: usize,
}

impl CentroidModel {
    pub fn new(baseline_mean: Vec<f64>, baseline_std: Vec<f64>, row_cutoff: f64) -> Self {
        Self { baseline_mean, baseline_std, row_cutoff, centroid: None, examples: 0 }
    }

    /// Baseline matching features drawn uniformly from `[0, 1)`.
    pub fn uniform_baseline(feature_dim: usize, row_cutoff: f64) -> Self {
        let std = (1.0f64 / 12.0).sqrt();
        Self::new(vec![0.5; feature_dim], vec![std; feature_dim], row_cutoff)
    }

    /// Seeds the anomaly centroid with a prior pattern counted as one example.
    pub fn with_prior(mut self, prior: Vec<f64>) -> Self {
        if prior.len() == self.dimensions() {
            self.centroid = Some(prior);
            self.examples = 1;
        }
        self
    }

    pub fn centroid(&self) -> Option<&[f64]> {
        self.centroid.as_deref()
    }

    pub fn examples(&self) -> usize {
        self.examples
    }

    fn row_score(&self, features: &[f64]) -> Option<f64> {
        if features.len() != self.dimensions() || features.is_empty() {
            return None;
        }
        let total: f64 = features
            .iter()
            .zip(self.baseline_mean.iter().zip(&self.baseline_std))
            .map(|(x, (mu, sigma))| if *sigma > 0.0 { (x - mu).abs() / sigma } else { 0.0 })
            .sum();
        let score = total / features.len() as f64;
        score.is_finite().then_some(score)
    }

    fn centered(&self, features: &[f64]) -> Vec<f64> {
        features.iter().zip(&self.baseline_mean).map(|(x, mu)| x - mu).collect()
    }
}

impl AnomalyModel for CentroidModel {
    fn dimensions(&self) -> usize {
        self.baseline_mean.len()
    }

    fn detect(&self, batch: &TrafficBatch) -> Detection {
        let scored: Vec<(f64, &TrafficRow)> = batch
            .rows
            .iter()
            .filter_map(|row| self.row_score(&row.features).map(|score| (score, row)))
            .collect();

        let top = scored.iter().map(|(score, _)| *score).fold(0.0, f64::max);
        let flagged: Vec<&TrafficRow> = scored
            .iter()
            .filter(|(score, _)| *score > self.row_cutoff)
            .map(|(_, row)| *row)
            .collect();

        if flagged.is_empty() {
            return Detection::quiet(top);
        }

        let mut feature_vector = vec![0.0; self.dimensions()];
        for row in &flagged {
            for (acc, x) in feature_vector.iter_mut().zip(&row.features) {
                *acc += x;
            }
        }
        for acc in feature_vector.iter_mut() {
            *acc /= flagged.len() as f64;
        }

        let sources: BTreeSet<String> = flagged.iter().map(|row| row.source_ip.clone()).collect();

        Detection {
            is_anomaly: true,
            score: top,
            feature_vector,
            sources: sources.into_iter().collect(),
        }
    }

    fn reference(&self) -> Option<Vec<f64>> {
        self.centroid.clone()
    }

    fn similarity(&self, features: &[f64]) -> Option<f64> {
        let centroid = self.centroid.as_ref()?;
        if features.len() != centroid.len() {
            return None;
        }
        cosine_similarity(&self.centered(features), &self.centered(centroid))
    }

    fn retrain(&self, example: &LabeledExample) -> Result<Box<dyn AnomalyModel>> {
        if example.features.len() != self.dimensions() {
            return Err(SentinelError::Update(format!(
                "signature {} has {} features, model expects {}",
                example.signature_id,
                example.features.len(),
                self.dimensions()
            )));
        }

        let mut next = self.clone();
        next.centroid = Some(match &self.centroid {
            Some(current) => {
                let n = self.examples as f64;
                current
                    .iter()
                    .zip(&example.features)
                    .map(|(c, x)| (c * n + x) / (n + 1.0))
                    .collect()
            }
            None => example.features.clone(),
        });
        next.examples = self.examples + 1;
        Ok(Box::new(next))
    }
}
