//! Pipeline orchestration: stage contract, state machine, and boundary checks

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::error::StageError;
use crate::record::Record;

/// Where the pipeline currently is. `Failed` is terminal and reachable from
/// any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    Ingesting,
    Scoring,
    Segmenting,
    OfferSelecting,
    Engaging,
    FeedbackCollecting,
    Done,
    Failed,
}

/// One pipeline stage.
///
/// A stage receives the whole batch, extends each record with the attributes
/// it owns, and hands the batch back. It must not retain records beyond its
/// own invocation, drop or create records (ingestion excepted), or touch
/// attributes owned by other stages.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// State the pipeline is in while this stage runs.
    fn state(&self) -> PipelineState;

    /// Record attributes that must already be present on every record before
    /// this stage may run. Checked by the orchestrator.
    fn required_inputs(&self) -> &'static [&'static str] {
        &[]
    }

    fn run(&self, batch: Vec<Record>) -> Result<Vec<Record>, StageError>;
}

/// Why a run ended in `Failed`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: StageError,
    },

    #[error("{stage} violated the stage contract: {detail}")]
    ContractViolation {
        stage: &'static str,
        detail: String,
    },
}

impl PipelineError {
    /// The stage that triggered the failure.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Stage { stage, .. } => stage,
            PipelineError::ContractViolation { stage, .. } => stage,
        }
    }
}

/// Sequential stage driver.
///
/// Stages run strictly in order; stage `i + 1` sees exactly the collection
/// stage `i` produced. The first fatal condition or contract violation moves
/// the pipeline to `Failed` and nothing further runs.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    state: PipelineState,
    timings: Vec<(&'static str, Duration)>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Pipeline {
            stages,
            state: PipelineState::Pending,
            timings: Vec::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Wall-clock time each completed stage took, in execution order.
    pub fn timings(&self) -> &[(&'static str, Duration)] {
        &self.timings
    }

    /// Drive every stage to completion and return the final collection.
    pub fn run(&mut self) -> Result<Vec<Record>, PipelineError> {
        let mut batch: Vec<Record> = Vec::new();
        // Cardinality is pinned once ingestion has produced the collection.
        let mut expected_len: Option<usize> = None;
        self.timings.clear();

        for i in 0..self.stages.len() {
            let stage = &self.stages[i];
            let name = stage.name();
            self.state = stage.state();
            log::info!("entering stage {}", name);

            if let Err(detail) = check_required_inputs(&batch, stage.required_inputs()) {
                self.state = PipelineState::Failed;
                return Err(PipelineError::ContractViolation { stage: name, detail });
            }

            let stage_start = Instant::now();
            batch = match stage.run(batch) {
                Ok(batch) => batch,
                Err(source) => {
                    self.state = PipelineState::Failed;
                    return Err(PipelineError::Stage { stage: name, source });
                }
            };
            self.timings.push((name, stage_start.elapsed()));

            if let Err(detail) = check_batch_invariants(&batch, expected_len) {
                self.state = PipelineState::Failed;
                return Err(PipelineError::ContractViolation { stage: name, detail });
            }

            if expected_len.is_none() {
                expected_len = Some(batch.len());
            }
        }

        self.state = PipelineState::Done;
        Ok(batch)
    }
}

fn check_required_inputs(batch: &[Record], required: &[&str]) -> Result<(), String> {
    for record in batch {
        for key in required {
            if !record.has_attr(key) {
                return Err(format!(
                    "record `{}` is missing required attribute `{}`",
                    record.customer_id, key
                ));
            }
        }
    }
    Ok(())
}

fn check_batch_invariants(batch: &[Record], expected_len: Option<usize>) -> Result<(), String> {
    if let Some(expected) = expected_len {
        if batch.len() != expected {
            return Err(format!(
                "batch size changed from {} to {}",
                expected,
                batch.len()
            ));
        }
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(batch.len());
    for record in batch {
        if !seen.insert(record.customer_id.as_str()) {
            return Err(format!("duplicate customer_id `{}`", record.customer_id));
        }
    }
    Ok(())
}
