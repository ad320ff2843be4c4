//! Churn scoring against a pre-fit logistic model artifact

use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::StageError;
use crate::features::feature_matrix;
use crate::pipeline::{PipelineState, Stage};
use crate::record::{Record, RiskTier};

/// Scores at or above this are high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Scores at or above this (and below `HIGH_RISK_THRESHOLD`) are medium risk.
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.4;

impl RiskTier {
    /// Bucket a churn probability. Boundary values resolve to the higher
    /// bucket (inclusive lower bounds).
    pub fn from_score(score: f64) -> RiskTier {
        if score >= HIGH_RISK_THRESHOLD {
            RiskTier::High
        } else if score >= MEDIUM_RISK_THRESHOLD {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// Pre-fit binary logistic classifier, loaded once at startup from a JSON
/// artifact and shared read-only across the run.
///
/// The artifact fixes the feature manifest: `feature_cols` lists the exact
/// names, in the exact order, the model was fit on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnModel {
    pub feature_cols: Vec<String>,
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl ChurnModel {
    /// Load and validate the artifact. Any problem here is fatal: scoring
    /// without a consistent model would be meaningless.
    pub fn load(path: &Path) -> Result<ChurnModel, StageError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            StageError::ModelUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let model: ChurnModel = serde_json::from_str(&raw).map_err(|e| {
            StageError::ModelUnavailable(format!("malformed artifact {}: {}", path.display(), e))
        })?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), StageError> {
        if self.feature_cols.is_empty() {
            return Err(StageError::ModelUnavailable(
                "artifact declares no feature columns".to_string(),
            ));
        }
        if self.feature_cols.len() != self.weights.len() {
            return Err(StageError::ModelUnavailable(format!(
                "artifact has {} feature columns but {} weights",
                self.feature_cols.len(),
                self.weights.len()
            )));
        }
        Ok(())
    }

    /// Positive-class probability for each row of `features`.
    pub fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64> {
        let w = Array1::from_vec(self.weights.clone());
        let intercept = self.intercept;
        features.dot(&w).mapv(|z| sigmoid(z + intercept))
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Pipeline stage assigning `churn_score` and `churn_risk` to every record.
pub struct ChurnScorer {
    model: Arc<ChurnModel>,
}

impl ChurnScorer {
    pub fn new(model: Arc<ChurnModel>) -> Self {
        ChurnScorer { model }
    }
}

impl Stage for ChurnScorer {
    fn name(&self) -> &'static str {
        "churn_scorer"
    }

    fn state(&self) -> PipelineState {
        PipelineState::Scoring
    }

    fn run(&self, mut batch: Vec<Record>) -> Result<Vec<Record>, StageError> {
        if batch.is_empty() {
            return Ok(batch);
        }

        let features = feature_matrix(&batch, &self.model.feature_cols);
        let scores = self.model.predict_proba(&features);

        for (record, &score) in batch.iter_mut().zip(scores.iter()) {
            record.churn_score = Some(score);
            record.churn_risk = Some(RiskTier::from_score(score));
        }

        log::info!("scored {} customers for churn risk", batch.len());
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_model() -> ChurnModel {
        ChurnModel {
            feature_cols: vec![
                "visit_freq".to_string(),
                "avg_basket".to_string(),
                "last_coupon_days".to_string(),
                "reward_points".to_string(),
            ],
            // Inactivity drives churn up, engagement drives it down
            weights: vec![-0.4, -0.01, 0.05, -0.002],
            intercept: 0.0,
        }
    }

    #[test]
    fn test_risk_tier_boundaries() {
        assert_eq!(RiskTier::from_score(0.85), RiskTier::High);
        assert_eq!(RiskTier::from_score(0.7), RiskTier::High);
        assert_eq!(RiskTier::from_score(0.69999), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(0.4), RiskTier::Medium);
        assert_eq!(RiskTier::from_score(0.39999), RiskTier::Low);
        assert_eq!(RiskTier::from_score(0.0), RiskTier::Low);
        assert_eq!(RiskTier::from_score(1.0), RiskTier::High);
    }

    #[test]
    fn test_predict_proba_in_unit_interval() {
        let model = test_model();
        let features = feature_matrix(
            &[
                Record::new("c1", 0.0, 0.0, 99.0, 0.0),
                Record::new("c2", 12.0, 80.0, 1.0, 900.0),
            ],
            &model.feature_cols,
        );
        let scores = model.predict_proba(&features);
        assert_eq!(scores.len(), 2);
        for &s in scores.iter() {
            assert!((0.0..=1.0).contains(&s));
        }
        // The dormant customer must look riskier than the engaged one
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_scorer_assigns_score_and_risk() {
        let scorer = ChurnScorer::new(Arc::new(test_model()));
        let batch = vec![
            Record::new("c1", 0.0, 0.0, 99.0, 0.0),
            Record::new("c2", 12.0, 80.0, 1.0, 900.0),
        ];

        let scored = scorer.run(batch).unwrap();
        assert_eq!(scored.len(), 2);
        for record in &scored {
            let score = record.churn_score.unwrap();
            assert_eq!(record.churn_risk.unwrap(), RiskTier::from_score(score));
        }
    }

    #[test]
    fn test_load_rejects_inconsistent_artifact() {
        let mut file = NamedTempFile::new().unwrap();
        // Three feature columns, two weights
        write!(
            file,
            r#"{{"feature_cols": ["a", "b", "c"], "weights": [0.1, 0.2], "intercept": 0.0}}"#
        )
        .unwrap();

        let result = ChurnModel::load(file.path());
        assert!(matches!(result, Err(StageError::ModelUnavailable(_))));
    }

    #[test]
    fn test_load_rejects_missing_artifact() {
        let result = ChurnModel::load(Path::new("/nonexistent/churn_model.json"));
        assert!(matches!(result, Err(StageError::ModelUnavailable(_))));
    }

    #[test]
    fn test_load_roundtrip() {
        let mut file = NamedTempFile::new().unwrap();
        let json = serde_json::to_string(&test_model()).unwrap();
        write!(file, "{}", json).unwrap();

        let loaded = ChurnModel::load(file.path()).unwrap();
        assert_eq!(loaded.feature_cols, test_model().feature_cols);
        assert_eq!(loaded.weights, test_model().weights);
    }
}
