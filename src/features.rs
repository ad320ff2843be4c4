//! Feature extraction: ordered manifest -> numeric vector

use ndarray::{Array1, Array2};
use rayon::prelude::*;

use crate::record::Record;

/// Default for a missing numeric attribute.
pub const MISSING_DEFAULT: f64 = 0.0;

/// Default for a missing "days since" style attribute, where zero would read
/// as very recent activity.
pub const MISSING_DAYS_DEFAULT: f64 = 99.0;

/// Sentinel used when a record lacks an attribute the manifest names.
pub fn missing_default(feature: &str) -> f64 {
    if feature.ends_with("_days") {
        MISSING_DAYS_DEFAULT
    } else {
        MISSING_DEFAULT
    }
}

/// Build a feature vector for one record.
///
/// The manifest must be the exact ordered feature list the consuming model
/// was fit on; passing any other manifest is a caller bug, not a runtime
/// condition. Missing attributes resolve to their sentinel, never an error.
pub fn feature_vector(record: &Record, manifest: &[String]) -> Array1<f64> {
    Array1::from_iter(
        manifest
            .iter()
            .map(|name| record.numeric_attr(name).unwrap_or_else(|| missing_default(name))),
    )
}

/// Build the `(n_records, manifest.len())` feature matrix for a batch.
/// Per-record extraction runs in parallel; row order matches input order.
pub fn feature_matrix(records: &[Record], manifest: &[String]) -> Array2<f64> {
    let rows: Vec<Vec<f64>> = records
        .par_iter()
        .map(|record| {
            manifest
                .iter()
                .map(|name| record.numeric_attr(name).unwrap_or_else(|| missing_default(name)))
                .collect()
        })
        .collect();

    let mut flat = Vec::with_capacity(records.len() * manifest.len());
    for row in rows {
        flat.extend(row);
    }

    // Shape is (n, len) by construction, so this cannot fail.
    Array2::from_shape_vec((records.len(), manifest.len()), flat)
        .unwrap_or_else(|_| Array2::zeros((records.len(), manifest.len())))
}
