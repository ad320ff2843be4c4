//! Persona segmentation via seeded k-means clustering

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::error::StageError;
use crate::pipeline::{PipelineState, Stage};
use crate::record::Record;

/// Numeric attributes the segmenter prefers, in priority order. Only the
/// subset actually present on the batch is used.
pub fn preferred_features() -> Vec<String> {
    ["churn_score", "visit_freq", "avg_basket", "reward_points"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Pipeline stage assigning each record a `persona` cluster index and a
/// `persona_label`.
///
/// Clustering is a joint computation over the whole batch: centroids depend
/// on every record, so unlike the other stages this one cannot shard its
/// work per record.
pub struct PersonaSegmenter {
    k: usize,
    seed: u64,
    max_iters: usize,
    tolerance: f64,
    feature_cols: Vec<String>,
}

impl PersonaSegmenter {
    pub fn new(k: usize, seed: u64, max_iters: usize, tolerance: f64) -> Self {
        PersonaSegmenter {
            k,
            seed,
            max_iters,
            tolerance,
            feature_cols: preferred_features(),
        }
    }

    /// Override the preferred feature list.
    pub fn with_features(mut self, feature_cols: Vec<String>) -> Self {
        self.feature_cols = feature_cols;
        self
    }

    /// Preferred features that at least one record in the batch carries.
    fn available_features(&self, batch: &[Record]) -> Vec<String> {
        self.feature_cols
            .iter()
            .filter(|name| batch.iter().any(|r| r.numeric_attr(name).is_some()))
            .cloned()
            .collect()
    }

    /// Batch matrix over the available features. Missing values coerce to 0
    /// rather than erroring; the availability check already guarantees each
    /// column has at least one real value.
    fn batch_matrix(batch: &[Record], features: &[String]) -> Array2<f64> {
        let mut flat = Vec::with_capacity(batch.len() * features.len());
        for record in batch {
            for name in features {
                flat.push(record.numeric_attr(name).unwrap_or(0.0));
            }
        }
        Array2::from_shape_vec((batch.len(), features.len()), flat)
            .unwrap_or_else(|_| Array2::zeros((batch.len(), features.len())))
    }

    fn cluster(&self, matrix: Array2<f64>) -> Result<Array1<usize>, StageError> {
        let n_samples = matrix.nrows();
        let targets: Array1<usize> = Array1::zeros(n_samples);
        let dataset = Dataset::new(matrix, targets);

        let rng = SmallRng::seed_from_u64(self.seed);
        let model = KMeans::params_with(self.k, rng, L2Dist)
            .max_n_iterations(self.max_iters as u64)
            .tolerance(self.tolerance)
            .fit(&dataset)
            .map_err(|e| StageError::Clustering(e.to_string()))?;

        Ok(model.predict(&dataset))
    }
}

impl Stage for PersonaSegmenter {
    fn name(&self) -> &'static str {
        "persona_segmenter"
    }

    fn state(&self) -> PipelineState {
        PipelineState::Segmenting
    }

    fn run(&self, mut batch: Vec<Record>) -> Result<Vec<Record>, StageError> {
        if batch.is_empty() {
            return Ok(batch);
        }

        let features = self.available_features(&batch);
        if features.is_empty() {
            return Err(StageError::NoClusterableFeatures);
        }
        log::debug!("clustering on features: {}", features.join(", "));

        let labels: Vec<usize> = if batch.len() < self.k {
            // Accepted degradation: fewer records than clusters means every
            // record is its own persona.
            log::warn!(
                "batch of {} is smaller than k={}, assigning one persona per customer",
                batch.len(),
                self.k
            );
            (0..batch.len()).collect()
        } else {
            let matrix = Self::batch_matrix(&batch, &features);
            self.cluster(matrix)?.to_vec()
        };

        for (record, label) in batch.iter_mut().zip(labels) {
            record.persona = Some(label);
            record.persona_label = Some(format!("persona_{}", label));
        }

        log::info!(
            "segmented {} customers into at most {} personas",
            batch.len(),
            self.k
        );
        Ok(batch)
    }
}
