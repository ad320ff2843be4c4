//! Error taxonomy for pipeline stages.

/// A stage's fatal failure condition. Any of these halts the pipeline; the
/// orchestrator reports the stage that raised it and runs nothing further.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// The churn classifier artifact is absent, unreadable, or internally
    /// inconsistent.
    #[error("churn model unavailable: {0}")]
    ModelUnavailable(String),

    /// The segmentation batch carries none of the preferred numeric features.
    #[error("no clusterable features present in the batch")]
    NoClusterableFeatures,

    /// A required input column is missing from the source file.
    #[error("required column `{0}` missing from input")]
    MissingColumn(String),

    /// Two source rows share a customer id.
    #[error("duplicate customer_id `{0}` in input")]
    DuplicateCustomer(String),

    /// A source row could not be turned into a record.
    #[error("row {row}: {detail}")]
    InvalidRow { row: usize, detail: String },

    #[error("clustering failed: {0}")]
    Clustering(String),

    #[error(transparent)]
    Csv(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
